//! Events endpoint
//!
//! Events live under their asset: `v2/assets/<uuid>/events`. The wildcard
//! asset `assets/-` addresses events of every asset. The public variant uses
//! `publicassets/` identities.

use super::{resource_path, V2};
use crate::archivist::{decode, decode_all, Archivist};
use crate::confirmer::ResourceReader;
use crate::error::ArchivistResult;
use crate::params::Criteria;
use archivist_model::{Attributes, Event};
use async_trait::async_trait;
use serde_json::{Map, Value};

const LABEL: &str = "events";
const ASSETS_WILDCARD: &str = "assets/-";
const PUBLIC_ASSETS_WILDCARD: &str = "publicassets/-";
const PUBLIC_PREFIX: &str = "public";

/// Body of an event create
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRequest {
    props: Map<String, Value>,
    event_attributes: Attributes,
    asset_attributes: Attributes,
}

impl EventRequest {
    /// Event with operation and behaviour, e.g. `Record` / `RecordEvidence`
    #[must_use]
    pub fn new(operation: impl Into<String>, behaviour: impl Into<String>) -> Self {
        Self::default()
            .prop("operation", operation.into())
            .prop("behaviour", behaviour.into())
    }

    /// With event attribute
    #[inline]
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.event_attributes.insert(key, value);
        self
    }

    /// With event attribute map
    #[inline]
    #[must_use]
    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.event_attributes = attributes;
        self
    }

    /// With an asset attribute change
    #[inline]
    #[must_use]
    pub fn asset_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.asset_attributes.insert(key, value);
        self
    }

    /// With asset attribute map
    #[inline]
    #[must_use]
    pub fn asset_attributes(mut self, attributes: Attributes) -> Self {
        self.asset_attributes = attributes;
        self
    }

    /// With any other top-level property, e.g. `timestamp_declared`
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
        body.insert(
            "event_attributes".into(),
            Value::Object(self.event_attributes.into_inner().into_iter().collect()),
        );
        if !self.asset_attributes.is_empty() {
            body.insert(
                "asset_attributes".into(),
                Value::Object(self.asset_attributes.into_inner().into_iter().collect()),
            );
        }
        Value::Object(body)
    }
}

/// Access to asset events
#[derive(Debug, Clone, Copy)]
pub struct EventsClient<'a> {
    archivist: &'a Archivist,
    public: bool,
}

impl<'a> EventsClient<'a> {
    pub(crate) fn new(archivist: &'a Archivist, public: bool) -> Self {
        Self { archivist, public }
    }

    /// Asset identity addressing every asset
    #[inline]
    #[must_use]
    pub fn wildcard(&self) -> &'static str {
        if self.public {
            PUBLIC_ASSETS_WILDCARD
        } else {
            ASSETS_WILDCARD
        }
    }

    /// Asset identity as this client addresses it
    fn asset_ref(&self, asset_id: &str) -> String {
        if self.public && !asset_id.starts_with(PUBLIC_PREFIX) {
            format!("{PUBLIC_PREFIX}{asset_id}")
        } else {
            asset_id.to_string()
        }
    }

    fn collection(&self, asset_id: &str) -> String {
        format!("{V2}/{}/{LABEL}", self.asset_ref(asset_id))
    }

    fn query(&self, criteria: &Criteria) -> Value {
        self.archivist.with_fixture(LABEL, criteria.to_value())
    }

    /// Record an event against `asset_id`, optionally waiting for confirmation
    pub async fn create(
        &self,
        asset_id: &str,
        request: EventRequest,
        confirm: bool,
    ) -> ArchivistResult<Event> {
        let body = self.archivist.with_fixture(LABEL, request.into_body());
        self.create_from_data(asset_id, body, confirm).await
    }

    /// Record an event from a complete request body
    pub async fn create_from_data(
        &self,
        asset_id: &str,
        data: Value,
        confirm: bool,
    ) -> ArchivistResult<Event> {
        let event: Event = decode(self.archivist.post(&self.collection(asset_id), data).await?)?;
        tracing::info!(identity = %event.identity, "event created");
        if confirm {
            return self.wait_for_confirmation(&event.identity).await;
        }
        Ok(event)
    }

    /// Read an event by its full identity
    pub async fn read(&self, identity: &str) -> ArchivistResult<Event> {
        let path = resource_path(V2, &self.asset_ref(identity));
        decode(self.archivist.get(&path).await?)
    }

    /// List events of `asset_id` (or [`wildcard`](Self::wildcard)) matching `criteria`
    pub async fn list(&self, asset_id: &str, criteria: &Criteria) -> ArchivistResult<Vec<Event>> {
        let records = self
            .archivist
            .list(&self.collection(asset_id), LABEL, &self.query(criteria))
            .await?;
        decode_all(records)
    }

    /// Count events of `asset_id` matching `criteria`
    pub async fn count(&self, asset_id: &str, criteria: &Criteria) -> ArchivistResult<u64> {
        self.archivist
            .count(&self.collection(asset_id), &self.query(criteria))
            .await
    }

    /// Wait for one event to be CONFIRMED
    pub async fn wait_for_confirmation(&self, identity: &str) -> ArchivistResult<Event> {
        self.archivist.waiter().wait(self, identity).await
    }
}

#[async_trait]
impl ResourceReader for EventsClient<'_> {
    type Resource = Event;

    async fn read_resource(&self, identity: &str) -> ArchivistResult<Event> {
        self.read(identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArchivistConfig;
    use crate::transport::{MockTransport, Request, Response};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn archivist(mock: MockTransport) -> Archivist {
        Archivist::with_transport(Arc::new(mock), ArchivistConfig::new("https://app.example.io"))
    }

    #[test]
    fn request_body_shape() {
        let body = EventRequest::new("Record", "RecordEvidence")
            .attr("arc_description", "inspection")
            .asset_attr("status", "ok")
            .into_body();

        assert_eq!(
            body,
            json!({
                "operation": "Record",
                "behaviour": "RecordEvidence",
                "event_attributes": {"arc_description": "inspection"},
                "asset_attributes": {"status": "ok"}
            })
        );
    }

    #[tokio::test]
    async fn public_events_use_public_asset_paths() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|r: &Request| r.path == "v2/publicassets/abc/events")
            .times(1)
            .returning(|_| Ok(Response::json(json!({"events": [{"identity": "publicassets/abc/events/1"}]}))));

        let arch = archivist(mock);
        let events = arch
            .public_events()
            .list("assets/abc", &Criteria::new())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(arch.public_events().wildcard(), "publicassets/-");
    }

    #[tokio::test]
    async fn count_over_all_assets() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|r: &Request| r.path == "v2/assets/-/events" && r.count_only)
            .times(1)
            .returning(|_| Ok(Response::json(json!({})).with_total_count(3)));

        let arch = archivist(mock);
        let events = arch.events();
        assert_eq!(events.count(events.wildcard(), &Criteria::new()).await.unwrap(), 3);
    }
}
