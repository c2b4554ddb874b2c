//! Deterministic cache keys for the two namespaces

use serde_json::{Map, Value};

pub const STRUCTURED_PREFIX: &str = "structured_query::";
pub const RESULT_PREFIX: &str = "search_result::";

/// Key of the structured-query namespace: raw query text only
pub fn structured_key(raw_query: &str) -> String {
    format!(
        "{}{}",
        STRUCTURED_PREFIX,
        blake3::hash(raw_query.as_bytes()).to_hex()
    )
}

/// Key of the result namespace.
///
/// Keyword parameters are collected into a sorted map before hashing, so the
/// order they are supplied in never changes the key.
pub fn result_key<I, K>(raw_query: &str, top_n: usize, kwargs: I) -> String
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let sorted: Map<String, Value> = kwargs.into_iter().map(|(k, v)| (k.into(), v)).collect();

    let canonical = canonicalize(&Value::Array(vec![
        Value::from(raw_query),
        Value::from(top_n),
        Value::Object(sorted),
    ]));

    format!(
        "{}{}",
        RESULT_PREFIX,
        blake3::hash(canonical.as_bytes()).to_hex()
    )
}

/// Serialize with object keys sorted at every depth
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::from(k.as_str()), canonicalize(v)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}
