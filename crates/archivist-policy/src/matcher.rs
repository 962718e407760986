//! Filter matching
//!
//! A filter matches a record iff every group has at least one predicate whose
//! target is present on the record with exactly the predicate's value. Missing
//! keys and non-string values never match. A filter with no groups matches
//! every record.

use archivist_model::{AccessPolicy, Asset, Attributes, Filter, Predicate, PredicateTarget};
use std::borrow::Cow;

/// Record a filter predicate can be evaluated against
pub trait Matchable {
    /// String value of an attribute
    fn attribute_str(&self, key: &str) -> Option<&str>;

    /// String form of a top-level property
    fn property(&self, _name: &str) -> Option<Cow<'_, str>> {
        None
    }
}

impl Matchable for Attributes {
    fn attribute_str(&self, key: &str) -> Option<&str> {
        self.get_str(key)
    }
}

impl Matchable for Asset {
    fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get_str(key)
    }

    fn property(&self, name: &str) -> Option<Cow<'_, str>> {
        Asset::property(self, name)
    }
}

/// Evaluate a single predicate
#[must_use]
pub fn predicate_holds<M: Matchable + ?Sized>(record: &M, predicate: &Predicate) -> bool {
    match predicate.target() {
        PredicateTarget::Attribute(key) => record.attribute_str(key) == Some(predicate.value()),
        PredicateTarget::Property(name) => {
            record.property(name).as_deref() == Some(predicate.value())
        }
    }
}

/// Evaluate a filter
#[must_use]
pub fn matches<M: Matchable + ?Sized>(record: &M, filter: &Filter) -> bool {
    filter
        .groups()
        .iter()
        .all(|group| group.or.iter().any(|p| predicate_holds(record, p)))
}

/// Snapshot of access policies
///
/// Answers both directions of the matching query with the same predicate:
/// policies matching an asset, and assets matching a policy.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicyMatcher {
    policies: Vec<AccessPolicy>,
}

impl AccessPolicyMatcher {
    /// Create from policies
    #[inline]
    #[must_use]
    pub fn new(policies: Vec<AccessPolicy>) -> Self {
        Self { policies }
    }

    /// Policies in insertion order
    #[inline]
    #[must_use]
    pub fn policies(&self) -> &[AccessPolicy] {
        &self.policies
    }

    /// Number of policies
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Insert a policy, replacing any with the same identity
    pub fn insert(&mut self, policy: AccessPolicy) {
        match self
            .policies
            .iter_mut()
            .find(|p| !policy.identity.is_empty() && p.identity == policy.identity)
        {
            Some(existing) => *existing = policy,
            None => self.policies.push(policy),
        }
    }

    /// Remove a policy by identity
    pub fn remove(&mut self, identity: &str) -> Option<AccessPolicy> {
        let idx = self.policies.iter().position(|p| p.identity == identity)?;
        Some(self.policies.remove(idx))
    }

    /// Look up a policy by identity
    #[must_use]
    pub fn get(&self, identity: &str) -> Option<&AccessPolicy> {
        self.policies.iter().find(|p| p.identity == identity)
    }

    /// Policies whose filter matches `asset`
    #[must_use]
    pub fn policies_matching<M: Matchable + ?Sized>(&self, asset: &M) -> Vec<&AccessPolicy> {
        let matched: Vec<_> = self
            .policies
            .iter()
            .filter(|p| matches(asset, &p.filters))
            .collect();
        tracing::trace!(
            policies = self.policies.len(),
            matched = matched.len(),
            "evaluated policies against asset"
        );
        matched
    }

    /// Count of policies whose filter matches `asset`
    #[must_use]
    pub fn count_policies_matching<M: Matchable + ?Sized>(&self, asset: &M) -> usize {
        self.policies
            .iter()
            .filter(|p| matches(asset, &p.filters))
            .count()
    }

    /// Assets matched by `policy`
    #[must_use]
    pub fn assets_matching<'a, M: Matchable + 'a>(
        policy: &AccessPolicy,
        assets: impl IntoIterator<Item = &'a M>,
    ) -> Vec<&'a M> {
        assets
            .into_iter()
            .filter(|a| matches(*a, &policy.filters))
            .collect()
    }
}

impl FromIterator<AccessPolicy> for AccessPolicyMatcher {
    fn from_iter<I: IntoIterator<Item = AccessPolicy>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
