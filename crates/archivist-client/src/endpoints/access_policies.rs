//! Access policies endpoint
//!
//! Besides CRUD, the service answers the two matching queries: assets a
//! policy matches (`iam/v1/<policy>/assets`) and policies matching an asset
//! (`iam/v1/<asset>/access_policies`).

use super::{resource_path, IAM_V1};
use crate::archivist::{decode, decode_all, Archivist};
use crate::error::{ArchivistError, ArchivistResult};
use crate::params::Criteria;
use archivist_model::{AccessPermission, AccessPolicy, Asset, Filter};
use archivist_policy::AccessPolicyMatcher;
use serde_json::{Map, Value};

const LABEL: &str = "access_policies";
const ASSETS_LABEL: &str = "assets";

/// Access to `iam/v1/access_policies`
#[derive(Debug, Clone, Copy)]
pub struct AccessPoliciesClient<'a> {
    archivist: &'a Archivist,
}

impl<'a> AccessPoliciesClient<'a> {
    pub(crate) fn new(archivist: &'a Archivist) -> Self {
        Self { archivist }
    }

    fn collection() -> String {
        format!("{IAM_V1}/{LABEL}")
    }

    fn query(&self, criteria: &Criteria) -> Value {
        self.archivist.with_fixture(LABEL, criteria.to_value())
    }

    /// Create a policy
    ///
    /// `props` carries `display_name`, `description` and any other top-level
    /// fields.
    pub async fn create(
        &self,
        props: Value,
        filters: &Filter,
        access_permissions: &[AccessPermission],
    ) -> ArchivistResult<AccessPolicy> {
        let mut body = object(props)?;
        body.insert("filters".into(), to_json(filters)?);
        body.insert("access_permissions".into(), to_json(access_permissions)?);
        let body = self.archivist.with_fixture(LABEL, Value::Object(body));
        self.create_from_data(body).await
    }

    /// Create a policy from a complete request body
    pub async fn create_from_data(&self, data: Value) -> ArchivistResult<AccessPolicy> {
        let policy: AccessPolicy = decode(self.archivist.post(&Self::collection(), data).await?)?;
        tracing::info!(identity = %policy.identity, "access policy created");
        Ok(policy)
    }

    /// Read a policy
    pub async fn read(&self, identity: &str) -> ArchivistResult<AccessPolicy> {
        decode(self.archivist.get(&resource_path(IAM_V1, identity)).await?)
    }

    /// Update a policy; unset arguments are left unchanged
    pub async fn update(
        &self,
        identity: &str,
        props: Value,
        filters: Option<&Filter>,
        access_permissions: Option<&[AccessPermission]>,
    ) -> ArchivistResult<AccessPolicy> {
        let mut body = object(props)?;
        if let Some(filters) = filters {
            body.insert("filters".into(), to_json(filters)?);
        }
        if let Some(permissions) = access_permissions {
            body.insert("access_permissions".into(), to_json(permissions)?);
        }
        let value = self
            .archivist
            .patch(&resource_path(IAM_V1, identity), Value::Object(body))
            .await?;
        decode(value)
    }

    /// Delete a policy
    ///
    /// Later matching queries stop returning it. Records fetched earlier are
    /// owned by the caller and are not touched.
    pub async fn delete(&self, identity: &str) -> ArchivistResult<Value> {
        let value = self.archivist.delete(&resource_path(IAM_V1, identity)).await?;
        tracing::info!(identity, "access policy deleted");
        Ok(value)
    }

    /// List policies matching `criteria`
    pub async fn list(&self, criteria: &Criteria) -> ArchivistResult<Vec<AccessPolicy>> {
        let records = self
            .archivist
            .list(&Self::collection(), LABEL, &self.query(criteria))
            .await?;
        decode_all(records)
    }

    /// Count policies matching `criteria`
    pub async fn count(&self, criteria: &Criteria) -> ArchivistResult<u64> {
        self.archivist
            .count(&Self::collection(), &self.query(criteria))
            .await
    }

    /// Count assets matched by `policy_id`
    pub async fn count_matching_assets(
        &self,
        policy_id: &str,
        criteria: &Criteria,
    ) -> ArchivistResult<u64> {
        let path = format!("{}/{ASSETS_LABEL}", resource_path(IAM_V1, policy_id));
        self.archivist.count(&path, &criteria.to_value()).await
    }

    /// Assets matched by `policy_id`
    pub async fn list_matching_assets(
        &self,
        policy_id: &str,
        criteria: &Criteria,
    ) -> ArchivistResult<Vec<Asset>> {
        let path = format!("{}/{ASSETS_LABEL}", resource_path(IAM_V1, policy_id));
        let records = self
            .archivist
            .list(&path, ASSETS_LABEL, &criteria.to_value())
            .await?;
        decode_all(records)
    }

    /// Count policies matching `asset_id`
    pub async fn count_matching_access_policies(
        &self,
        asset_id: &str,
        criteria: &Criteria,
    ) -> ArchivistResult<u64> {
        let path = format!("{}/{LABEL}", resource_path(IAM_V1, asset_id));
        self.archivist.count(&path, &criteria.to_value()).await
    }

    /// Policies matching `asset_id`
    pub async fn list_matching_access_policies(
        &self,
        asset_id: &str,
        criteria: &Criteria,
    ) -> ArchivistResult<Vec<AccessPolicy>> {
        let path = format!("{}/{LABEL}", resource_path(IAM_V1, asset_id));
        let records = self
            .archivist
            .list(&path, LABEL, &criteria.to_value())
            .await?;
        decode_all(records)
    }

    /// Every visible policy, loaded into a local matcher
    pub async fn snapshot(&self) -> ArchivistResult<AccessPolicyMatcher> {
        Ok(self.list(&Criteria::new()).await?.into_iter().collect())
    }
}

fn object(props: Value) -> ArchivistResult<Map<String, Value>> {
    match props {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(ArchivistError::invalid_request(
            "access policy props must be an object",
        )),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> ArchivistResult<Value> {
    serde_json::to_value(value).map_err(|e| ArchivistError::invalid_request(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArchivistConfig;
    use crate::transport::{Method, MockTransport, Request, Response};
    use archivist_model::Predicate;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn archivist(mock: MockTransport) -> Archivist {
        Archivist::with_transport(Arc::new(mock), ArchivistConfig::new("https://app.example.io"))
    }

    #[tokio::test]
    async fn create_sends_filters_as_strings() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|r: &Request| r.method == Method::Post && r.path == "iam/v1/access_policies")
            .times(1)
            .returning(|r| {
                let body = r.body.unwrap_or_default();
                assert_eq!(
                    body["filters"],
                    json!([{"or": ["attributes.arc_display_type=acme_display_type"]}])
                );
                assert_eq!(body["access_permissions"][0]["subjects"], json!(["subjects/1"]));
                let mut created = body;
                created["identity"] = json!("access_policies/1");
                Ok(Response::json(created))
            });

        let filters =
            Filter::open().and_any_of([Predicate::attribute("arc_display_type", "acme_display_type")]);
        let permissions = [AccessPermission::for_subjects(["subjects/1"])
            .with_include_attributes(["arc_display_name"])];

        let policy = archivist(mock)
            .access_policies()
            .create(json!({"display_name": "acme"}), &filters, &permissions)
            .await
            .unwrap();

        assert_eq!(policy.identity, "access_policies/1");
        assert_eq!(policy.display_name, "acme");
        assert_eq!(policy.filters, filters);
    }

    #[tokio::test]
    async fn matching_paths() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|r: &Request| r.path == "iam/v1/access_policies/1/assets")
            .times(1)
            .returning(|_| Ok(Response::json(json!({"assets": [{"identity": "assets/9"}]}))));
        mock.expect_send()
            .withf(|r: &Request| r.path == "iam/v1/assets/9/access_policies" && r.count_only)
            .times(1)
            .returning(|_| Ok(Response::json(json!({})).with_total_count(1)));

        let arch = archivist(mock);
        let policies = arch.access_policies();
        let assets = policies
            .list_matching_assets("access_policies/1", &Criteria::new())
            .await
            .unwrap();
        assert_eq!(assets[0].identity, "assets/9");
        assert_eq!(
            policies
                .count_matching_access_policies("assets/9", &Criteria::new())
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn rejects_non_object_props() {
        let arch = archivist(MockTransport::new());
        let err = arch
            .access_policies()
            .create(json!(["x"]), &Filter::open(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ArchivistError::InvalidRequest(_)));
    }
}
