//! Storage key formatting.
//!
//! A field's storage key is a pure function of its name and its non-null
//! arguments, sorted by argument name so that the same field always lands on
//! the same key regardless of argument order.

use crate::types::Variables;
use serde_json::Value;

/// Format the storage key for `name` with resolved `args`.
///
/// `name` alone when there are no non-null arguments, otherwise
/// `name(k1:v1,k2:v2)` with JSON-encoded values.
pub fn format_storage_key(name: &str, args: Option<&Variables>) -> String {
    let args = match args {
        Some(args) => args,
        None => return name.to_string(),
    };

    let mut pairs: Vec<(&String, &Value)> = args.iter().filter(|(_, v)| !v.is_null()).collect();
    if pairs.is_empty() {
        return name.to_string();
    }
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    let encoded: Vec<String> = pairs
        .into_iter()
        .map(|(key, value)| format!("{}:{}", key, stable_json(value)))
        .collect();
    format!("{}({})", name, encoded.join(","))
}

/// JSON encoding with object keys in sorted order at every depth.
fn stable_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), stable_json(&map[k])))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(stable_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}
