//! Access policies

use crate::filter::Filter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Group of user attribute claims (e.g. `group:maintainers`), any of which qualifies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttributeGroup {
    /// Claims
    pub or: Vec<String>,
}

/// Binds subjects to behaviours and to the attribute keys they may read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPermission {
    /// Subject identities, `subjects/<uuid>`
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Behaviours the subjects may use
    #[serde(default)]
    pub behaviours: Vec<String>,
    /// Attribute keys revealed to the subjects
    #[serde(default)]
    pub include_attributes: Vec<String>,
    /// Claims of users within the subjects' tenancies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_attributes: Vec<UserAttributeGroup>,
}

impl AccessPermission {
    /// Permission for the given subjects
    #[must_use]
    pub fn for_subjects(subjects: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            subjects: subjects.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// With behaviours
    #[must_use]
    pub fn with_behaviours(mut self, behaviours: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.behaviours = behaviours.into_iter().map(Into::into).collect();
        self
    }

    /// With include attributes
    #[must_use]
    pub fn with_include_attributes(
        mut self,
        keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.include_attributes = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Check whether the permission names `subject`
    #[inline]
    #[must_use]
    pub fn names_subject(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }
}

/// Rule set granting named subjects visibility into assets matching a filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// `access_policies/<uuid>`; empty until created
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identity: String,
    /// Display name
    #[serde(default)]
    pub display_name: String,
    /// Description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Asset filter
    #[serde(default)]
    pub filters: Filter,
    /// Permissions granted on matching assets
    #[serde(default)]
    pub access_permissions: Vec<AccessPermission>,
    /// Remaining service fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccessPolicy {
    /// Create a policy with no identity
    #[must_use]
    pub fn new(
        display_name: impl Into<String>,
        filters: Filter,
        access_permissions: Vec<AccessPermission>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            filters,
            access_permissions,
            ..Self::default()
        }
    }

    /// With identity
    #[inline]
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Permissions naming `subject`
    pub fn permissions_for<'a>(
        &'a self,
        subject: &'a str,
    ) -> impl Iterator<Item = &'a AccessPermission> + 'a {
        self.access_permissions
            .iter()
            .filter(move |p| p.names_subject(subject))
    }
}
