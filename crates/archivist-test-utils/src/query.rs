//! Listing filters and paging as the service applies them

use archivist_client::Response;
use serde_json::{Map, Value};

/// Page size when the request does not set one
pub const DEFAULT_PAGE_SIZE: usize = 50;

const PAGING_PARAMS: &[&str] = &["page_size", "page_token"];

/// Check a record against every non-paging query parameter
///
/// Keys are dotted paths into the record; array fields match when any element
/// does.
pub(crate) fn matches_query(record: &Value, query: &[(String, String)]) -> bool {
    query
        .iter()
        .filter(|(key, _)| !PAGING_PARAMS.contains(&key.as_str()))
        .all(|(key, expected)| field_matches(record, key, expected))
}

fn field_matches(record: &Value, path: &str, expected: &str) -> bool {
    let mut current = record;
    for part in path.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return false,
        }
    }
    scalar_eq(current, expected)
}

fn scalar_eq(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Array(items) => items.iter().any(|item| scalar_eq(item, expected)),
        Value::Null | Value::Object(_) => false,
        other => other.to_string() == expected,
    }
}

fn param<'q>(query: &'q [(String, String)], key: &str) -> Option<&'q str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// One page of `records` under `label`, with a continuation token when more remain
pub(crate) fn page(
    records: Vec<Value>,
    label: &str,
    query: &[(String, String)],
    count_only: bool,
) -> Response {
    let total = records.len();
    let size = param(query, "page_size")
        .and_then(|s| s.parse().ok())
        .filter(|s: &usize| *s > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE);
    let offset: usize = param(query, "page_token")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let items: Vec<Value> = records.into_iter().skip(offset).take(size).collect();
    let mut body = Value::Object(Map::new());
    body[label] = Value::Array(items);
    if offset + size < total {
        body["next_page_token"] = Value::from((offset + size).to_string());
    }

    let response = Response::json(body);
    if count_only {
        response.with_total_count(total as u64)
    } else {
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn q(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn dotted_and_array_matching() {
        let record = json!({
            "public": false,
            "behaviours": ["Attachments", "RecordEvidence"],
            "attributes": {"arc_display_type": "door"}
        });

        assert!(matches_query(&record, &q(&[("attributes.arc_display_type", "door")])));
        assert!(matches_query(&record, &q(&[("behaviours", "RecordEvidence")])));
        assert!(matches_query(&record, &q(&[("public", "false"), ("page_size", "1")])));
        assert!(!matches_query(&record, &q(&[("attributes.missing", "x")])));
        assert!(!matches_query(&record, &q(&[("attributes", "door")])));
    }

    #[test]
    fn paging_hands_out_tokens() {
        let records: Vec<Value> = (0..5).map(|i| json!({"n": i})).collect();

        let first = page(records.clone(), "items", &q(&[("page_size", "2")]), true);
        assert_eq!(first.total_count, Some(5));
        assert_eq!(first.body["items"], json!([{"n": 0}, {"n": 1}]));
        assert_eq!(first.body["next_page_token"], json!("2"));

        let last = page(records, "items", &q(&[("page_size", "2"), ("page_token", "4")]), false);
        assert_eq!(last.body["items"], json!([{"n": 4}]));
        assert!(last.body.get("next_page_token").is_none());
        assert_eq!(last.total_count, None);
    }
}
