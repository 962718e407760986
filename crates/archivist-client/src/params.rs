//! Request bodies and query criteria
//!
//! Fixtures are per-label JSON defaults deep-merged under every create body and
//! list filter of that label. Query criteria are flattened into dotted query
//! parameters (`attributes.arc_display_name=door`).

use crate::error::{ArchivistError, ArchivistResult};
use archivist_model::Attributes;
use serde_json::{Map, Value};

/// Merge `overlay` on top of `base`; objects merge recursively, anything else is replaced
#[must_use]
pub fn deep_merge(base: Option<&Value>, overlay: Value) -> Value {
    match (base, overlay) {
        (Some(Value::Object(base)), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let existing = merged.get(&key).cloned();
                merged.insert(key, deep_merge(existing.as_ref(), value));
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Flatten a JSON object into dotted query parameters
///
/// Arrays repeat the key; `null` is skipped.
#[must_use]
pub fn flatten_params(value: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    flatten_into("", value, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&key, value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_into(prefix, item, out);
            }
        }
        Value::Null => {}
        Value::String(s) => out.push((prefix.to_string(), s.clone())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}

/// Property and attribute criteria for list, count and signature reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    props: Map<String, Value>,
    attrs: Attributes,
}

impl Criteria {
    /// Criteria matching everything
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a top-level property
    #[inline]
    #[must_use]
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// With an attribute
    #[inline]
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key, value);
        self
    }

    /// With a whole attribute map
    #[inline]
    #[must_use]
    pub fn attrs(mut self, attrs: Attributes) -> Self {
        for (k, v) in attrs.iter() {
            self.attrs.insert(k, v.clone());
        }
        self
    }

    /// Build from a JSON object of properties, where an `attributes` key holds attributes
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let mut criteria = Self::new();
        if let Value::Object(map) = value {
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("attributes", Value::Object(attrs)) => {
                        for (k, v) in attrs {
                            criteria.attrs.insert(k.clone(), v.clone());
                        }
                    }
                    _ => {
                        criteria.props.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        criteria
    }

    /// Signature picked out of `data` by a selector
    ///
    /// Selector entries name top-level keys, or hold an `attributes` list
    /// naming attribute keys:
    ///
    /// ```yaml
    /// selector:
    ///   - display_name
    ///   - attributes:
    ///     - wavestone_ext
    /// ```
    ///
    /// # Errors
    /// A selector that is not a list, or names a key absent from `data`.
    pub fn from_selector(selector: &Value, data: &Value) -> ArchivistResult<Self> {
        let entries = selector
            .as_array()
            .ok_or_else(|| ArchivistError::invalid_request("selector must be a list"))?;

        let mut criteria = Self::new();
        for entry in entries {
            match entry {
                Value::String(key) => {
                    let value = data.get(key).ok_or_else(|| {
                        ArchivistError::invalid_request(format!("selector key {key} missing"))
                    })?;
                    criteria.props.insert(key.clone(), value.clone());
                }
                Value::Object(map) => {
                    let keys = map.get("attributes").and_then(Value::as_array);
                    for key in keys.into_iter().flatten().filter_map(Value::as_str) {
                        let value = data
                            .get("attributes")
                            .and_then(|attrs| attrs.get(key))
                            .ok_or_else(|| {
                                ArchivistError::invalid_request(format!(
                                    "selector attribute {key} missing"
                                ))
                            })?;
                        criteria.attrs.insert(key, value.clone());
                    }
                }
                other => {
                    return Err(ArchivistError::invalid_request(format!(
                        "unsupported selector entry {other}"
                    )))
                }
            }
        }
        Ok(criteria)
    }

    /// Check if no criteria are set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.props.is_empty() && self.attrs.is_empty()
    }

    /// JSON form: properties plus an `attributes` object
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = self.props.clone();
        if !self.attrs.is_empty() {
            map.insert(
                "attributes".to_string(),
                serde_json::to_value(&self.attrs).unwrap_or(Value::Null),
            );
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deep_merge_nested() {
        let base = json!({"behaviours": ["A"], "attributes": {"arc_namespace": "ns", "x": "1"}});
        let overlay = json!({"attributes": {"x": "2"}, "public": true});

        assert_eq!(
            deep_merge(Some(&base), overlay),
            json!({
                "behaviours": ["A"],
                "attributes": {"arc_namespace": "ns", "x": "2"},
                "public": true
            })
        );
    }

    #[test]
    fn deep_merge_without_base() {
        assert_eq!(deep_merge(None, json!({"a": 1})), json!({"a": 1}));
        assert_eq!(deep_merge(Some(&json!("scalar")), json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn flatten_nested_and_repeated() {
        let params = flatten_params(&json!({
            "display_name": "door",
            "attributes": {"arc_display_type": "lock", "size": 3},
            "behaviours": ["A", "B"],
            "skip": null
        }));

        assert_eq!(
            params,
            vec![
                ("attributes.arc_display_type".to_string(), "lock".to_string()),
                ("attributes.size".to_string(), "3".to_string()),
                ("behaviours".to_string(), "A".to_string()),
                ("behaviours".to_string(), "B".to_string()),
                ("display_name".to_string(), "door".to_string()),
            ]
        );
    }

    #[test]
    fn selector_picks_props_and_attributes() {
        let data = json!({
            "display_name": "Gare du Nord",
            "description": "ignored",
            "attributes": {"wavestone_ext": "managed", "address": "ignored"}
        });
        let selector = json!(["display_name", {"attributes": ["wavestone_ext"]}]);

        let criteria = Criteria::from_selector(&selector, &data).unwrap();
        assert_eq!(
            criteria,
            Criteria::new()
                .prop("display_name", "Gare du Nord")
                .attr("wavestone_ext", "managed")
        );

        let err = Criteria::from_selector(&json!(["missing"]), &data).unwrap_err();
        assert!(matches!(err, ArchivistError::InvalidRequest(_)));
    }

    #[test]
    fn criteria_round_trip_through_value() {
        let criteria = Criteria::new()
            .prop("confirmation_status", "PENDING")
            .attr("arc_display_type", "lock");
        let value = criteria.to_value();

        assert_eq!(
            value,
            json!({"confirmation_status": "PENDING", "attributes": {"arc_display_type": "lock"}})
        );
        assert_eq!(Criteria::from_value(&value), criteria);
        assert!(Criteria::new().is_empty());
    }
}
