//! Events

use crate::attributes::Attributes;
use crate::confirmation::{Confirmable, ConfirmationStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Recorded change against an asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// `assets/<uuid>/events/<uuid>`
    #[serde(default)]
    pub identity: String,
    /// Owning asset
    #[serde(default)]
    pub asset_identity: String,
    /// Operation, e.g. `Record`
    #[serde(default)]
    pub operation: String,
    /// Behaviour, e.g. `RecordEvidence`
    #[serde(default)]
    pub behaviour: String,
    /// Attributes of the event itself
    #[serde(default)]
    pub event_attributes: Attributes,
    /// Asset attributes changed by the event
    #[serde(default)]
    pub asset_attributes: Attributes,
    /// Client-claimed time of the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_declared: Option<String>,
    /// Client-claimed identity of whoever performed the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_declared: Option<Value>,
    /// Settlement status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_status: Option<ConfirmationStatus>,
    /// Remaining service fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Confirmable for Event {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn confirmation_status(&self) -> Option<ConfirmationStatus> {
        self.confirmation_status
    }
}
