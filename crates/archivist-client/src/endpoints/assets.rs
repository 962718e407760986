//! Assets endpoint

use super::{resource_path, LocationsClient, V2};
use crate::archivist::{decode, decode_all, Archivist};
use crate::confirmer::{Probe, ResourceReader};
use crate::error::{ArchivistError, ArchivistResult};
use crate::params::Criteria;
use archivist_model::{Asset, Attributes, ConfirmationStatus, ProofMechanism, BEHAVIOURS};
use async_trait::async_trait;
use serde_json::{Map, Value};

const LABEL: &str = "assets";

/// Attribute linking an asset to its home location
pub const HOME_LOCATION: &str = "arc_home_location_identity";

/// Body of an asset create
///
/// Behaviours default to [`BEHAVIOURS`] when not set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetRequest {
    props: Map<String, Value>,
    attributes: Attributes,
    behaviours: Option<Vec<String>>,
}

impl AssetRequest {
    /// Empty request
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With attribute
    #[inline]
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// With attribute map, replacing any set so far
    #[inline]
    #[must_use]
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// With behaviours
    #[inline]
    #[must_use]
    pub fn behaviours(mut self, behaviours: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.behaviours = Some(behaviours.into_iter().map(Into::into).collect());
        self
    }

    /// With proof mechanism
    #[inline]
    #[must_use]
    pub fn proof_mechanism(self, mechanism: ProofMechanism) -> Self {
        self.prop("proof_mechanism", mechanism.as_str())
    }

    /// Mark the asset public
    #[inline]
    #[must_use]
    pub fn public(self, public: bool) -> Self {
        self.prop("public", public)
    }

    /// With any other top-level property
    #[inline]
    #[must_use]
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// JSON body
    #[must_use]
    pub fn into_body(self) -> Value {
        let mut body = self.props;
        let behaviours = self
            .behaviours
            .unwrap_or_else(|| BEHAVIOURS.iter().map(|b| (*b).to_string()).collect());
        body.insert("behaviours".into(), Value::from(behaviours));
        body.insert(
            "attributes".into(),
            Value::Object(self.attributes.into_inner().into_iter().collect()),
        );
        Value::Object(body)
    }
}

/// Access to `v2/assets`
#[derive(Debug, Clone, Copy)]
pub struct AssetsClient<'a> {
    archivist: &'a Archivist,
}

impl<'a> AssetsClient<'a> {
    pub(crate) fn new(archivist: &'a Archivist) -> Self {
        Self { archivist }
    }

    fn collection() -> String {
        format!("{V2}/{LABEL}")
    }

    fn query(&self, criteria: &Criteria) -> Value {
        self.archivist.with_fixture(LABEL, criteria.to_value())
    }

    /// Create an asset, optionally waiting for confirmation
    pub async fn create(&self, request: AssetRequest, confirm: bool) -> ArchivistResult<Asset> {
        let body = self.archivist.with_fixture(LABEL, request.into_body());
        self.create_from_data(body, confirm).await
    }

    /// Create an asset from a complete request body
    pub async fn create_from_data(&self, data: Value, confirm: bool) -> ArchivistResult<Asset> {
        let asset: Asset = decode(self.archivist.post(&Self::collection(), data).await?)?;
        tracing::info!(identity = %asset.identity, "asset created");
        if confirm {
            return self.wait_for_confirmation(&asset.identity).await;
        }
        Ok(asset)
    }

    /// Create an asset unless one matching `data.selector` exists
    ///
    /// A `location` entry (itself carrying a selector) is created if needed
    /// and linked through `arc_home_location_identity`. Returns the asset and
    /// whether it already existed.
    pub async fn create_if_not_exists(
        &self,
        data: Value,
        confirm: bool,
    ) -> ArchivistResult<(Asset, bool)> {
        let Value::Object(mut data) = data else {
            return Err(ArchivistError::invalid_request("asset data must be an object"));
        };
        let selector = data
            .remove("selector")
            .ok_or_else(|| ArchivistError::invalid_request("asset data has no selector"))?;

        if let Some(location) = data.remove("location") {
            let (location, _) = LocationsClient::new(self.archivist)
                .create_if_not_exists(location)
                .await?;
            let attributes = data
                .entry("attributes")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(attributes) = attributes {
                attributes.insert(HOME_LOCATION.into(), Value::from(location.identity));
            }
        }

        let data = Value::Object(data);
        let criteria = Criteria::from_selector(&selector, &data)?;
        match self.read_by_signature(&criteria).await {
            Ok(asset) => {
                tracing::info!(identity = %asset.identity, "asset already exists");
                Ok((asset, true))
            }
            Err(ArchivistError::NotFound { .. }) => {
                let body = self.archivist.with_fixture(LABEL, data);
                Ok((self.create_from_data(body, confirm).await?, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Read an asset
    pub async fn read(&self, identity: &str) -> ArchivistResult<Asset> {
        decode(self.archivist.get(&resource_path(V2, identity)).await?)
    }

    /// List assets matching `criteria`
    pub async fn list(&self, criteria: &Criteria) -> ArchivistResult<Vec<Asset>> {
        let records = self
            .archivist
            .list(&Self::collection(), LABEL, &self.query(criteria))
            .await?;
        decode_all(records)
    }

    /// Count assets matching `criteria`
    pub async fn count(&self, criteria: &Criteria) -> ArchivistResult<u64> {
        self.archivist
            .count(&Self::collection(), &self.query(criteria))
            .await
    }

    /// The single asset matching `criteria`
    ///
    /// # Errors
    /// `NotFound` on no match, `Ambiguous` on several.
    pub async fn read_by_signature(&self, criteria: &Criteria) -> ArchivistResult<Asset> {
        let record = self
            .archivist
            .get_by_signature(&Self::collection(), LABEL, &self.query(criteria))
            .await?;
        decode(record)
    }

    /// Wait for one asset to be CONFIRMED
    pub async fn wait_for_confirmation(&self, identity: &str) -> ArchivistResult<Asset> {
        self.archivist.waiter().wait(self, identity).await
    }

    /// Wait until no asset matching `criteria` is PENDING
    ///
    /// # Errors
    /// `Confirmation` as soon as any matching asset is FAILED.
    pub async fn wait_for_confirmed(&self, criteria: &Criteria) -> ArchivistResult<()> {
        let pending = criteria
            .clone()
            .prop("confirmation_status", ConfirmationStatus::Pending.as_str());
        let failed = criteria
            .clone()
            .prop("confirmation_status", ConfirmationStatus::Failed.as_str());

        let (pending, failed) = (&pending, &failed);
        self.archivist
            .waiter()
            .poll(LABEL, move || async move {
                let failed_count = self.count(failed).await?;
                if failed_count > 0 {
                    return Err(ArchivistError::confirmation(
                        LABEL,
                        format!("{failed_count} assets FAILED"),
                    ));
                }
                if self.count(pending).await? == 0 {
                    return Ok(Probe::Settled(()));
                }
                Ok(Probe::Pending(Some(ConfirmationStatus::Pending)))
            })
            .await
    }
}

#[async_trait]
impl ResourceReader for AssetsClient<'_> {
    type Resource = Asset;

    async fn read_resource(&self, identity: &str) -> ArchivistResult<Asset> {
        self.read(identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArchivistConfig, BackoffPolicy};
    use crate::transport::{Method, MockTransport, Request, Response};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn archivist(mock: MockTransport) -> Archivist {
        let config = ArchivistConfig::new("https://app.example.io")
            .with_backoff(BackoffPolicy::constant(Duration::from_millis(10)))
            .with_max_time(Duration::from_secs(1));
        Archivist::with_transport(Arc::new(mock), config)
    }

    #[test]
    fn request_defaults_behaviours() {
        let body = AssetRequest::new()
            .attr("arc_display_name", "door")
            .proof_mechanism(ProofMechanism::SimpleHash)
            .into_body();

        assert_eq!(body["behaviours"].as_array().map(Vec::len), Some(BEHAVIOURS.len()));
        assert_eq!(body["attributes"], json!({"arc_display_name": "door"}));
        assert_eq!(body["proof_mechanism"], json!("SIMPLE_HASH"));
    }

    #[tokio::test]
    async fn create_posts_merged_body() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|r: &Request| {
                r.method == Method::Post
                    && r.path == "v2/assets"
                    && r.body.as_ref().map(|b| b["attributes"].clone())
                        == Some(json!({"arc_namespace": "ns", "arc_display_name": "door"}))
            })
            .times(1)
            .returning(|r| {
                let mut body = r.body.unwrap_or_default();
                body["identity"] = json!("assets/1");
                Ok(Response::json(body))
            });

        let arch = archivist(mock)
            .with_fixtures(json!({"assets": {"attributes": {"arc_namespace": "ns"}}}));
        let asset = arch
            .assets()
            .create(AssetRequest::new().attr("arc_display_name", "door"), false)
            .await
            .unwrap();

        assert_eq!(asset.identity, "assets/1");
        assert_eq!(asset.name(), Some("door"));
    }

    #[tokio::test]
    async fn create_if_not_exists_returns_existing() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|r: &Request| {
                r.method == Method::Get
                    && r.param("attributes.arc_display_name") == Some("door")
                    && r.param("page_size") == Some("2")
            })
            .times(1)
            .returning(|_| Ok(Response::json(json!({"assets": [{"identity": "assets/7"}]}))));

        let (asset, existed) = archivist(mock)
            .assets()
            .create_if_not_exists(
                json!({
                    "selector": [{"attributes": ["arc_display_name"]}],
                    "attributes": {"arc_display_name": "door", "colour": "red"}
                }),
                false,
            )
            .await
            .unwrap();

        assert!(existed);
        assert_eq!(asset.identity, "assets/7");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_confirmed_polls_pending_count() {
        let pending_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&pending_calls);

        let mut mock = MockTransport::new();
        mock.expect_send().returning(move |r: Request| {
            let count = match r.param("confirmation_status") {
                Some("FAILED") => 0,
                _ => {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    u64::from(n < 2)
                }
            };
            Ok(Response::json(json!({})).with_total_count(count))
        });

        archivist(mock)
            .assets()
            .wait_for_confirmed(&Criteria::new())
            .await
            .unwrap();
        assert_eq!(pending_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_confirmed_fails_on_failed_assets() {
        let mut mock = MockTransport::new();
        mock.expect_send().returning(|r: Request| {
            let count = u64::from(r.param("confirmation_status") == Some("FAILED"));
            Ok(Response::json(json!({})).with_total_count(count))
        });

        let err = archivist(mock)
            .assets()
            .wait_for_confirmed(&Criteria::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ArchivistError::Confirmation { .. }));
    }
}
