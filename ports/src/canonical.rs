//! Canonical JSON encoding for signed payloads and hash chaining
//!
//! Sorted keys, no insignificant whitespace, decimal amounts as strings.
//! Any `Serialize` value can be canonicalized as long as it round-trips
//! through `serde_json::Value` (true of every type in this workspace).

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Recursively sort object keys and re-serialize with no whitespace.
pub fn canonicalize(value: &serde_json::Value) -> String {
    let sorted = sort_value(value);
    serde_json::to_string(&sorted).expect("canonical json serialization cannot fail")
}

fn sort_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_value(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_value).collect())
        }
        other => other.clone(),
    }
}

/// Canonicalize a serializable struct directly to bytes.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    let json = serde_json::to_value(value).expect("value must serialize to json");
    canonicalize(&json).into_bytes()
}

/// SHA-256 over arbitrary bytes.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash-chain link: `SHA256(canonical(fields) || prev_hash)`.
pub fn chained_hash<T: Serialize>(fields: &T, prev_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(fields));
    hasher.update(prev_hash);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let canonical = canonicalize(&value);
        assert_eq!(canonical, r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn chained_hash_depends_on_prev() {
        let fields = json!({"x": 1});
        let h1 = chained_hash(&fields, &[0u8; 32]);
        let h2 = chained_hash(&fields, &[1u8; 32]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn chained_hash_deterministic() {
        let fields = json!({"x": 1, "y": "two"});
        let prev = sha256(b"genesis");
        assert_eq!(chained_hash(&fields, &prev), chained_hash(&fields, &prev));
    }
}
