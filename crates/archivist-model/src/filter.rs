//! Access policy filter grammar
//!
//! A filter is a sequence of OR-groups that are ANDed together. On the wire a
//! filter looks like:
//!
//! ```json
//! [
//!   {"or": ["attributes.arc_display_type=door", "attributes.arc_display_type=window"]},
//!   {"or": ["attributes.ext_vendor_name=acme"]}
//! ]
//! ```
//!
//! Predicates are parsed once into [`Predicate`] so matching never touches strings
//! beyond the final equality check.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path prefix selecting the attribute map of a record
pub const ATTRIBUTES_PREFIX: &str = "attributes.";

/// What a predicate compares against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredicateTarget {
    /// `attributes.<key>`
    Attribute(String),
    /// Top-level record property, e.g. `public`
    Property(String),
}

impl PredicateTarget {
    /// The key or property name
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Attribute(k) | Self::Property(k) => k,
        }
    }
}

/// Single `<path>=<value>` equality test
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Predicate {
    target: PredicateTarget,
    value: String,
}

impl Predicate {
    /// Predicate on an attribute
    #[inline]
    #[must_use]
    pub fn attribute(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            target: PredicateTarget::Attribute(key.into()),
            value: value.into(),
        }
    }

    /// Predicate on a top-level property
    #[inline]
    #[must_use]
    pub fn property(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            target: PredicateTarget::Property(name.into()),
            value: value.into(),
        }
    }

    /// Comparison target
    #[inline]
    #[must_use]
    pub fn target(&self) -> &PredicateTarget {
        &self.target
    }

    /// Expected value
    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for Predicate {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, value) = s
            .split_once('=')
            .ok_or_else(|| ModelError::invalid_predicate(s, "missing '='"))?;

        let target = match path.strip_prefix(ATTRIBUTES_PREFIX) {
            Some("") => return Err(ModelError::invalid_predicate(s, "empty attribute key")),
            Some(key) => PredicateTarget::Attribute(key.to_string()),
            None if path.is_empty() => {
                return Err(ModelError::invalid_predicate(s, "empty path"))
            }
            None => PredicateTarget::Property(path.to_string()),
        };

        Ok(Self {
            target,
            value: value.to_string(),
        })
    }
}

impl TryFrom<String> for Predicate {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Predicate> for String {
    fn from(p: Predicate) -> Self {
        p.to_string()
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.target {
            PredicateTarget::Attribute(k) => write!(f, "{ATTRIBUTES_PREFIX}{k}={}", self.value),
            PredicateTarget::Property(k) => write!(f, "{k}={}", self.value),
        }
    }
}

/// Disjunction of predicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    /// Predicates, any one of which satisfies the group
    pub or: Vec<Predicate>,
}

impl FilterGroup {
    /// Create group from predicates
    #[inline]
    #[must_use]
    pub fn any_of(predicates: impl IntoIterator<Item = Predicate>) -> Self {
        Self {
            or: predicates.into_iter().collect(),
        }
    }
}

/// Conjunction of [`FilterGroup`]s
///
/// A filter with no groups is open: it matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Vec<FilterGroup>);

impl Filter {
    /// Filter with no groups
    #[inline]
    #[must_use]
    pub fn open() -> Self {
        Self(Vec::new())
    }

    /// Create from groups
    #[inline]
    #[must_use]
    pub fn new(groups: Vec<FilterGroup>) -> Self {
        Self(groups)
    }

    /// Append a group requiring any of `predicates`
    #[inline]
    #[must_use]
    pub fn and_any_of(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.0.push(FilterGroup::any_of(predicates));
        self
    }

    /// Groups in order
    #[inline]
    #[must_use]
    pub fn groups(&self) -> &[FilterGroup] {
        &self.0
    }

    /// Check if the filter matches everything
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<FilterGroup>> for Filter {
    fn from(groups: Vec<FilterGroup>) -> Self {
        Self(groups)
    }
}
