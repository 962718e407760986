//! Assets

use crate::attributes::Attributes;
use crate::confirmation::{Confirmable, ConfirmationStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

/// Behaviours enabled on newly created assets unless the caller overrides them
pub const BEHAVIOURS: &[&str] = &[
    "Attachments",
    "Firmware",
    "LocationUpdate",
    "Maintenance",
    "RecordEvidence",
];

/// How the ledger proves an asset's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofMechanism {
    /// Periodic hash of the event stream
    #[default]
    SimpleHash,
    /// Per-event ledger commitment
    Khipu,
}

impl ProofMechanism {
    /// Wire representation
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimpleHash => "SIMPLE_HASH",
            Self::Khipu => "KHIPU",
        }
    }
}

impl Display for ProofMechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger-tracked record
///
/// Fields the model does not name are kept in `extra` so a read-modify-write
/// never drops data the service returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// `assets/<uuid>`; empty until created
    #[serde(default)]
    pub identity: String,
    /// Behaviours enabled for events on this asset
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub behaviours: Vec<String>,
    /// Asset attributes
    #[serde(default)]
    pub attributes: Attributes,
    /// Proof mechanism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_mechanism: Option<ProofMechanism>,
    /// Settlement status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_status: Option<ConfirmationStatus>,
    /// Tracking state, e.g. `TRACKED`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked: Option<String>,
    /// Publicly readable
    #[serde(default)]
    pub public: bool,
    /// Remaining service fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Asset {
    /// Create an asset record with no service-assigned fields
    #[must_use]
    pub fn new(identity: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            identity: identity.into(),
            behaviours: Vec::new(),
            attributes,
            proof_mechanism: None,
            confirmation_status: None,
            tracked: None,
            public: false,
            extra: Map::new(),
        }
    }

    /// With confirmation status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: ConfirmationStatus) -> Self {
        self.confirmation_status = Some(status);
        self
    }

    /// `arc_display_name`, if set
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attributes.display_name()
    }

    /// Top-level property rendered as a string for filter comparison
    ///
    /// Booleans render as `true`/`false`; non-scalar values have no string form.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "identity" => Some(Cow::Borrowed(&self.identity)),
            "public" => Some(Cow::Borrowed(if self.public { "true" } else { "false" })),
            "tracked" => self.tracked.as_deref().map(Cow::Borrowed),
            "proof_mechanism" => self.proof_mechanism.map(|p| Cow::Borrowed(p.as_str())),
            "confirmation_status" => self
                .confirmation_status
                .map(|s| Cow::Borrowed(s.as_str())),
            other => match self.extra.get(other)? {
                Value::String(s) => Some(Cow::Borrowed(s)),
                Value::Bool(b) => Some(Cow::Owned(b.to_string())),
                Value::Number(n) => Some(Cow::Owned(n.to_string())),
                _ => None,
            },
        }
    }
}

impl Confirmable for Asset {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn confirmation_status(&self) -> Option<ConfirmationStatus> {
        self.confirmation_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn asset_deserialize_keeps_unknown_fields() {
        let asset: Asset = serde_json::from_value(json!({
            "identity": "assets/1",
            "behaviours": ["RecordEvidence"],
            "attributes": {"arc_display_name": "door"},
            "proof_mechanism": "KHIPU",
            "confirmation_status": "PENDING",
            "tracked": "TRACKED",
            "owner": "0xabc",
        }))
        .unwrap();

        assert_eq!(asset.name(), Some("door"));
        assert_eq!(asset.proof_mechanism, Some(ProofMechanism::Khipu));
        assert_eq!(asset.confirmation_status, Some(ConfirmationStatus::Pending));
        assert_eq!(asset.extra.get("owner"), Some(&json!("0xabc")));
        assert!(!asset.public);
    }

    #[test]
    fn asset_property_lookup() {
        let mut asset = Asset::new("assets/1", Attributes::new());
        asset.public = true;
        asset.extra.insert("storage_integrity".into(), json!("LEDGER"));
        asset.extra.insert("at_time".into(), json!({"nested": true}));

        assert_eq!(asset.property("public").as_deref(), Some("true"));
        assert_eq!(asset.property("storage_integrity").as_deref(), Some("LEDGER"));
        assert_eq!(asset.property("at_time"), None);
        assert_eq!(asset.property("tracked"), None);
    }
}
