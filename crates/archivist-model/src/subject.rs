//! Subjects

use crate::confirmation::{Confirmable, ConfirmationStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of a tenant's own subject record
pub const SELF_SUBJECT_ID: &str = "subjects/00000000-0000-0000-0000-000000000000";

/// Identity record of a principal that can be granted access
///
/// A subject in tenant B may mirror tenant A's self subject; the mirror has its
/// own identity and lifecycle but carries A's key material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// `subjects/<uuid>`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identity: String,
    /// Display name
    #[serde(default)]
    pub display_name: String,
    /// Wallet public keys
    #[serde(default)]
    pub wallet_pub_key: Vec<String>,
    /// Wallet address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    /// Tessera public keys
    #[serde(default)]
    pub tessera_pub_key: Vec<String>,
    /// Settlement status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_status: Option<ConfirmationStatus>,
    /// Remaining service fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Subject {
    /// Subject with key material and no identity
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        wallet_pub_key: Vec<String>,
        tessera_pub_key: Vec<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            wallet_pub_key,
            tessera_pub_key,
            ..Self::default()
        }
    }

    /// Check for wallet key material
    #[inline]
    #[must_use]
    pub fn has_key_material(&self) -> bool {
        self.wallet_pub_key.iter().any(|k| !k.trim().is_empty())
    }

    /// Check whether both records carry the same wallet keys
    #[must_use]
    pub fn shares_keys_with(&self, other: &Subject) -> bool {
        self.has_key_material() && self.wallet_pub_key == other.wallet_pub_key
    }
}

impl Confirmable for Subject {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn confirmation_status(&self) -> Option<ConfirmationStatus> {
        self.confirmation_status
    }
}
