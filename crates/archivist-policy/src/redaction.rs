//! Attribute redaction
//!
//! A reader holding subjects `S` observes, on an asset, the intersection of the
//! asset's attributes with the union of `include_attributes` of every permission
//! that names a subject in `S` within a policy matching the asset. A reader with
//! no such permission observes no attributes at all.

use crate::matcher::matches;
use archivist_model::{AccessPolicy, Asset, Attributes};
use std::collections::HashSet;

/// What a reader may observe of an asset's attributes
#[derive(Debug, Clone, PartialEq)]
pub enum Visibility {
    /// Permitted attributes (possibly empty)
    Visible(Attributes),
    /// No matching policy grants the reader anything
    Redacted,
}

impl Visibility {
    /// Check if redacted
    #[inline]
    #[must_use]
    pub fn is_redacted(&self) -> bool {
        matches!(self, Self::Redacted)
    }

    /// Visible attributes, if any
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Self::Visible(attrs) => Some(attrs),
            Self::Redacted => None,
        }
    }
}

/// Attributes of `asset` visible to a reader holding `subjects`
#[must_use]
pub fn visible_attributes<'p, S: AsRef<str>>(
    asset: &Asset,
    policies: impl IntoIterator<Item = &'p AccessPolicy>,
    subjects: &[S],
) -> Visibility {
    let mut granted = false;
    let mut include: HashSet<&str> = HashSet::new();

    for policy in policies {
        if !matches(asset, &policy.filters) {
            continue;
        }
        for permission in &policy.access_permissions {
            if subjects.iter().any(|s| permission.names_subject(s.as_ref())) {
                granted = true;
                include.extend(permission.include_attributes.iter().map(String::as_str));
            }
        }
    }

    if granted {
        Visibility::Visible(asset.attributes.project(|k| include.contains(k)))
    } else {
        tracing::debug!(asset = %asset.identity, "no policy grants access, redacting");
        Visibility::Redacted
    }
}

/// Copy of `asset` as seen by a reader holding `subjects`
///
/// The record itself stays readable; a redacted reader gets it with an empty
/// attribute map. Returns the visibility alongside so callers can tell an
/// empty grant from no grant.
#[must_use]
pub fn redact<'p, S: AsRef<str>>(
    asset: &Asset,
    policies: impl IntoIterator<Item = &'p AccessPolicy>,
    subjects: &[S],
) -> (Asset, Visibility) {
    let visibility = visible_attributes(asset, policies, subjects);
    let mut view = asset.clone();
    view.attributes = visibility.attributes().cloned().unwrap_or_default();
    (view, visibility)
}
