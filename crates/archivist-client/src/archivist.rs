//! Tenant handle
//!
//! An [`Archivist`] is bound to one service URL and one credential. Endpoint
//! clients borrow it and share its transport, fixtures and waiter.

use crate::config::ArchivistConfig;
use crate::confirmer::ConfirmationWaiter;
use crate::endpoints::{
    AccessPoliciesClient, AssetsClient, EventsClient, LocationsClient, SubjectsClient,
};
use crate::error::{ArchivistError, ArchivistResult};
use crate::http::HttpTransport;
use crate::params::{deep_merge, flatten_params};
use crate::transport::{Request, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Listing response key carrying the continuation token
const NEXT_PAGE_TOKEN: &str = "next_page_token";

/// Connection to one Archivist tenant
#[derive(Clone)]
pub struct Archivist {
    transport: Arc<dyn Transport>,
    config: ArchivistConfig,
    fixtures: Value,
    waiter: ConfirmationWaiter,
}

impl Archivist {
    /// Connect over HTTP with a bearer token
    ///
    /// # Errors
    /// Invalid configuration.
    pub fn new(config: ArchivistConfig, auth_token: impl Into<String>) -> ArchivistResult<Self> {
        let transport = HttpTransport::new(&config, auth_token)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Connect over HTTP, reading the token from `config.auth_token_file`
    ///
    /// # Errors
    /// Invalid configuration, or no readable token.
    pub fn from_config(config: ArchivistConfig) -> ArchivistResult<Self> {
        let token = config
            .load_auth_token()?
            .ok_or_else(|| ArchivistError::Config("auth_token_file is not set".into()))?;
        Self::new(config, token)
    }

    /// Use an explicit transport
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>, config: ArchivistConfig) -> Self {
        let waiter = ConfirmationWaiter::new(config.backoff.clone(), config.max_time());
        Self {
            transport,
            config,
            fixtures: Value::Object(serde_json::Map::new()),
            waiter,
        }
    }

    /// With per-label fixtures, e.g. `{"assets": {"attributes": {"arc_namespace": "x"}}}`
    #[inline]
    #[must_use]
    pub fn with_fixtures(mut self, fixtures: Value) -> Self {
        self.fixtures = fixtures;
        self
    }

    /// With a different waiter
    #[inline]
    #[must_use]
    pub fn with_waiter(mut self, waiter: ConfirmationWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    /// Service URL
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ArchivistConfig {
        &self.config
    }

    /// Fixtures
    #[inline]
    #[must_use]
    pub fn fixtures(&self) -> &Value {
        &self.fixtures
    }

    /// Confirmation waiter
    #[inline]
    #[must_use]
    pub fn waiter(&self) -> &ConfirmationWaiter {
        &self.waiter
    }

    /// Assets endpoint
    #[must_use]
    pub fn assets(&self) -> AssetsClient<'_> {
        AssetsClient::new(self)
    }

    /// Events endpoint
    #[must_use]
    pub fn events(&self) -> EventsClient<'_> {
        EventsClient::new(self, false)
    }

    /// Events endpoint for public assets
    #[must_use]
    pub fn public_events(&self) -> EventsClient<'_> {
        EventsClient::new(self, true)
    }

    /// Access policies endpoint
    #[must_use]
    pub fn access_policies(&self) -> AccessPoliciesClient<'_> {
        AccessPoliciesClient::new(self)
    }

    /// Subjects endpoint
    #[must_use]
    pub fn subjects(&self) -> SubjectsClient<'_> {
        SubjectsClient::new(self)
    }

    /// Locations endpoint
    #[must_use]
    pub fn locations(&self) -> LocationsClient<'_> {
        LocationsClient::new(self)
    }

    /// `body` with the fixture for `label` merged underneath
    pub(crate) fn with_fixture(&self, label: &str, body: Value) -> Value {
        deep_merge(self.fixtures.get(label), body)
    }

    pub(crate) async fn get(&self, path: &str) -> ArchivistResult<Value> {
        Ok(self.transport.send(Request::get(path)).await?.body)
    }

    pub(crate) async fn post(&self, path: &str, body: Value) -> ArchivistResult<Value> {
        Ok(self.transport.send(Request::post(path, body)).await?.body)
    }

    pub(crate) async fn patch(&self, path: &str, body: Value) -> ArchivistResult<Value> {
        Ok(self.transport.send(Request::patch(path, body)).await?.body)
    }

    pub(crate) async fn delete(&self, path: &str) -> ArchivistResult<Value> {
        Ok(self.transport.send(Request::delete(path)).await?.body)
    }

    /// All records under `label`, following `next_page_token` until exhausted
    pub(crate) async fn list(
        &self,
        path: &str,
        label: &str,
        query: &Value,
    ) -> ArchivistResult<Vec<Value>> {
        let params = flatten_params(query);
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = Request::get(path).with_query(params.clone());
            if let Some(size) = self.config.page_size {
                request = request.with_param("page_size", size.to_string());
            }
            if let Some(token) = page_token.take() {
                request = request.with_param("page_token", token);
            }

            let body = self.transport.send(request).await?.body;
            let page = page_items(&body, label)?;
            records.extend(page);

            match body.get(NEXT_PAGE_TOKEN).and_then(Value::as_str) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        tracing::debug!(path, count = records.len(), "listed");
        Ok(records)
    }

    /// Number of records matching `query`, from the total count header
    pub(crate) async fn count(&self, path: &str, query: &Value) -> ArchivistResult<u64> {
        let request = Request::get(path)
            .with_query(flatten_params(query))
            .with_param("page_size", "1")
            .counting();
        self.transport
            .send(request)
            .await?
            .total_count
            .ok_or_else(|| ArchivistError::invalid_response(format!("{path}: no total count")))
    }

    /// The single record matching `query`
    pub(crate) async fn get_by_signature(
        &self,
        path: &str,
        label: &str,
        query: &Value,
    ) -> ArchivistResult<Value> {
        let request = Request::get(path)
            .with_query(flatten_params(query))
            .with_param("page_size", "2");
        let body = self.transport.send(request).await?.body;
        let mut records = page_items(&body, label)?;

        match records.len() {
            0 => Err(ArchivistError::NotFound {
                label: label.to_string(),
                query: query.to_string(),
            }),
            1 => Ok(records.remove(0)),
            _ => Err(ArchivistError::Ambiguous {
                label: label.to_string(),
                query: query.to_string(),
            }),
        }
    }
}

impl fmt::Debug for Archivist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archivist")
            .field("url", &self.config.url)
            .field("transport", &self.transport.describe())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Archivist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Archivist({})", self.config.url)
    }
}

fn page_items(body: &Value, label: &str) -> ArchivistResult<Vec<Value>> {
    match body.get(label) {
        Some(Value::Array(items)) => Ok(items.clone()),
        None => Ok(Vec::new()),
        Some(_) => Err(ArchivistError::invalid_response(format!(
            "{label} is not a list"
        ))),
    }
}

/// Decode a response body into a typed record
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> ArchivistResult<T> {
    serde_json::from_value(value).map_err(|e| ArchivistError::invalid_response(e.to_string()))
}

/// Decode every record of a listing
pub(crate) fn decode_all<T: DeserializeOwned>(values: Vec<Value>) -> ArchivistResult<Vec<T>> {
    values.into_iter().map(decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, Response};
    use mockall::predicate::function;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn archivist(mock: MockTransport) -> Archivist {
        Archivist::with_transport(Arc::new(mock), ArchivistConfig::new("https://app.example.io"))
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let mut mock = MockTransport::new();
        let mut seq = Sequence::new();
        mock.expect_send()
            .with(function(|r: &Request| r.param("page_token").is_none()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(Response::json(json!({
                    "assets": [{"identity": "assets/1"}],
                    "next_page_token": "abc"
                })))
            });
        mock.expect_send()
            .with(function(|r: &Request| r.param("page_token") == Some("abc")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Response::json(json!({"assets": [{"identity": "assets/2"}]}))));

        let records = archivist(mock)
            .list("v2/assets", "assets", &json!({}))
            .await
            .unwrap();
        assert_eq!(
            records,
            vec![json!({"identity": "assets/1"}), json!({"identity": "assets/2"})]
        );
    }

    #[tokio::test]
    async fn count_reads_total_and_requires_it() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|r| r.count_only && r.param("page_size") == Some("1"))
            .times(1)
            .returning(|_| Ok(Response::json(json!({})).with_total_count(42)));
        assert_eq!(
            archivist(mock).count("v2/assets", &json!({})).await.unwrap(),
            42
        );

        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_| Ok(Response::json(json!({}))));
        let err = archivist(mock).count("v2/assets", &json!({})).await.unwrap_err();
        assert!(matches!(err, ArchivistError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn signature_read_requires_exactly_one() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_| Ok(Response::json(json!({"assets": []}))));
        let err = archivist(mock)
            .get_by_signature("v2/assets", "assets", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchivistError::NotFound { .. }));

        let mut mock = MockTransport::new();
        mock.expect_send().returning(|_| {
            Ok(Response::json(json!({"assets": [{"identity": "a"}, {"identity": "b"}]})))
        });
        let err = archivist(mock)
            .get_by_signature("v2/assets", "assets", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchivistError::Ambiguous { .. }));
    }

    #[tokio::test]
    async fn transport_errors_propagate_unchanged() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_| Err(crate::error::TransportError::Unauthorized));
        let err = archivist(mock).get("v2/assets/1").await.unwrap_err();
        assert!(matches!(
            err,
            ArchivistError::Transport(crate::error::TransportError::Unauthorized)
        ));
    }

    #[test]
    fn fixtures_merge_under_bodies() {
        let arch = archivist(MockTransport::new())
            .with_fixtures(json!({"assets": {"attributes": {"arc_namespace": "ns"}}}));
        assert_eq!(
            arch.with_fixture("assets", json!({"attributes": {"arc_display_name": "x"}})),
            json!({"attributes": {"arc_namespace": "ns", "arc_display_name": "x"}})
        );
        assert_eq!(arch.to_string(), "Archivist(https://app.example.io)");
    }
}
