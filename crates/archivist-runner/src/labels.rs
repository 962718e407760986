//! Story-local names for created entities
//!
//! Steps register the identities they create under a label; later steps name
//! the label instead of the identity. Inside keyword arguments a string of the
//! form `${label}` is replaced by the labelled identity.

use crate::error::{RunnerError, RunnerResult};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Display};

/// Kind of labelled entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// `assets/<uuid>`
    Asset,
    /// `access_policies/<uuid>`
    AccessPolicy,
    /// `subjects/<uuid>`
    Subject,
    /// `locations/<uuid>`
    Location,
}

impl EntityKind {
    /// Whether the service supports deleting this kind
    #[must_use]
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::AccessPolicy | Self::Subject)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asset => "asset",
            Self::AccessPolicy => "access policy",
            Self::Subject => "subject",
            Self::Location => "location",
        })
    }
}

#[derive(Debug, Clone)]
struct Entry {
    kind: EntityKind,
    identity: String,
}

/// Label to identity map
#[derive(Debug, Clone, Default)]
pub struct LabelRegistry {
    entries: HashMap<String, Entry>,
}

impl LabelRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `identity` under `label`, replacing any earlier entry
    pub fn register(&mut self, label: impl Into<String>, kind: EntityKind, identity: impl Into<String>) {
        let label = label.into();
        let identity = identity.into();
        tracing::debug!(%label, %kind, %identity, "label registered");
        if let Some(previous) = self.entries.insert(label.clone(), Entry { kind, identity }) {
            tracing::warn!(%label, previous = %previous.identity, "label reassigned");
        }
    }

    /// Identity under `label`, which must be of `kind`
    ///
    /// # Errors
    /// Unregistered label, or one of another kind.
    pub fn resolve(&self, label: &str, kind: EntityKind) -> RunnerResult<&str> {
        let entry = self
            .entries
            .get(label)
            .ok_or_else(|| RunnerError::UnknownLabel(label.to_string()))?;
        if entry.kind != kind {
            return Err(RunnerError::LabelKind {
                label: label.to_string(),
                expected: kind,
                actual: entry.kind,
            });
        }
        Ok(&entry.identity)
    }

    /// Replace every `${label}` string in `value` with its identity
    ///
    /// # Errors
    /// A referenced label is not registered.
    pub fn substitute(&self, value: Value) -> RunnerResult<Value> {
        Ok(match value {
            Value::String(s) => match reference(&s) {
                Some(label) => {
                    let entry = self
                        .entries
                        .get(label)
                        .ok_or_else(|| RunnerError::UnknownLabel(label.to_string()))?;
                    Value::String(entry.identity.clone())
                }
                None => Value::String(s),
            },
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.substitute(item))
                    .collect::<RunnerResult<_>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| Ok((k, self.substitute(v)?)))
                    .collect::<RunnerResult<_>>()?,
            ),
            other => other,
        })
    }

    /// Number of labels
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn reference(s: &str) -> Option<&str> {
    s.strip_prefix("${")?.strip_suffix('}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn resolve_checks_kind() {
        let mut labels = LabelRegistry::new();
        labels.register("door", EntityKind::Asset, "assets/1");

        assert_eq!(labels.resolve("door", EntityKind::Asset).unwrap(), "assets/1");
        assert!(matches!(
            labels.resolve("door", EntityKind::Subject),
            Err(RunnerError::LabelKind { expected: EntityKind::Subject, actual: EntityKind::Asset, .. })
        ));
        assert!(matches!(
            labels.resolve("gate", EntityKind::Asset),
            Err(RunnerError::UnknownLabel(label)) if label == "gate"
        ));
    }

    #[test]
    fn substitution_is_whole_string_and_nested() {
        let mut labels = LabelRegistry::new();
        labels.register("partner", EntityKind::Subject, "subjects/p");

        let args = json!({
            "access_permissions": [{"subjects": ["${partner}"], "behaviours": ["RecordEvidence"]}],
            "display_name": "for ${partner}"
        });
        assert_eq!(
            labels.substitute(args).unwrap(),
            json!({
                "access_permissions": [{"subjects": ["subjects/p"], "behaviours": ["RecordEvidence"]}],
                "display_name": "for ${partner}"
            })
        );
        assert!(labels.substitute(json!(["${nobody}"])).is_err());
    }
}
