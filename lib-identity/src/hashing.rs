//! Canonical content hashing
//!
//! Actions are keyed by the SHA-1 hex digest of a canonical JSON encoding:
//! object keys sorted, no whitespace. Both sides of the wire must agree on
//! this byte-for-byte, so the encoding is produced here rather than left to
//! serializer defaults.

use serde_json::Value;
use sha1::{Digest, Sha1};

/// Canonical JSON encoding: recursively sorted object keys, compact
/// separators.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        Value::String(k.clone()),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let fields: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", fields.join(","))
        }
        other => other.to_string(),
    }
}

/// SHA-1 hex digest of the canonical encoding of `value`.
pub fn content_hash(value: &Value) -> String {
    let mut hasher = Sha1::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_sorts_keys() {
        let value = json!({"b": 1, "a": {"z": true, "y": [1, "two"]}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"y":[1,"two"],"z":true},"b":1}"#
        );
    }

    #[test]
    fn test_canonical_escapes_strings() {
        let value = json!({"k": "line\nbreak"});
        assert_eq!(canonical_json(&value), r#"{"k":"line\nbreak"}"#);
    }

    #[test]
    fn test_content_hash_stable() {
        let value = json!([{"x": "y"}, 0, "mick-and-bandit"]);
        let first = content_hash(&value);
        let second = content_hash(&value);
        assert_eq!(first, second);
        assert_eq!(first.len(), 40);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_content_hash_discriminates() {
        assert_ne!(
            content_hash(&json!({"x": "y"})),
            content_hash(&json!({"x": "z"}))
        );
    }
}
