//! Locations

use crate::attributes::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Physical location assets can be associated with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// `locations/<uuid>`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identity: String,
    /// Display name
    #[serde(default)]
    pub display_name: String,
    /// Description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Latitude in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Location attributes
    #[serde(default)]
    pub attributes: Attributes,
    /// Remaining service fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Location {
    /// Display name, if non-empty
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        Some(self.display_name.as_str()).filter(|n| !n.is_empty())
    }
}
