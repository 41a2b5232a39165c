//! Canonical JSON and SHA-256 digests for generated topologies.
//!
//! Two plans with the same inputs must render to the same bytes so that
//! repeated synchronization converges. The digest gives callers a single
//! value to compare.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::PlanResult;

/// Recursively rebuild objects with keys in sorted order. Array order is kept.
fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys(v));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_keys).collect())
        }
        other => other.clone(),
    }
}

/// Compact JSON with sorted object keys.
pub fn canonical_json<T: Serialize>(value: &T) -> PlanResult<String> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&sort_keys(&value))?)
}

/// SHA-256 hex digest of the canonical JSON form.
pub fn compute_digest<T: Serialize>(value: &T) -> PlanResult<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_field_order_invariant() {
        let a = json!({ "b": 1, "a": { "z": 1, "y": 2 } });
        let b = json!({ "a": { "y": 2, "z": 1 }, "b": 1 });
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
        assert_eq!(canonical_json(&a).unwrap(), r#"{"a":{"y":2,"z":1},"b":1}"#);
    }

    #[test]
    fn test_canonical_json_array_order_preserved() {
        let a = json!({ "regions": ["us-west-2", "us-east-1"] });
        let b = json!({ "regions": ["us-east-1", "us-west-2"] });
        assert_ne!(compute_digest(&a).unwrap(), compute_digest(&b).unwrap());
    }

    #[test]
    fn test_digest_is_hex_sha256() {
        let digest = compute_digest(&json!({ "k": "v" })).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
