//! Wire codec for request bodies and cache payloads.
//!
//! Everything this layer stores in the response cache is the same JSON the
//! wire speaks; a cached payload deserializes to exactly the value a fresh
//! fetch would have produced. Serialization is deterministic for identical
//! values, so a GET followed by a cache hit returns byte-identical bytes.
//!
//! Before a representation is cached its `model` bookkeeping key is
//! stripped — it is server-internal and would otherwise leak into
//! byte-for-byte payload comparisons.

use crate::error::{Error, Result};
use serde_json::Value;

/// Bookkeeping key stripped from representations before caching.
pub const BOOKKEEPING_KEY: &str = "model";

/// Serialize a JSON value into cache/request payload bytes.
///
/// # Errors
///
/// Returns `Error::SerializationError` if encoding fails.
pub fn to_payload(value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        error!("Payload serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize payload bytes back into a JSON value.
///
/// # Errors
///
/// Returns `Error::DeserializationError` for corrupted payloads; the
/// caller should evict the cache entry and re-fetch.
pub fn from_payload(bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|e| {
        error!("Payload deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })
}

/// Strip server bookkeeping keys from a representation in place.
///
/// Non-object values are left untouched.
pub fn strip_bookkeeping(value: &mut Value) {
    if let Value::Object(map) = value {
        map.remove(BOOKKEEPING_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip() {
        let value = json!({"id": 1, "source_item_id": "t-1@some.service"});
        let bytes = to_payload(&value).expect("Failed to serialize");
        let back = from_payload(&bytes).expect("Failed to deserialize");
        assert_eq!(value, back);
    }

    #[test]
    fn test_deterministic_serialization() {
        let value = json!({"a": 1, "b": [1, 2, 3], "c": null});
        let bytes1 = to_payload(&value).expect("Failed to serialize");
        let bytes2 = to_payload(&value).expect("Failed to serialize");
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let result = from_payload(b"{\"id\": 1");
        assert!(matches!(
            result.unwrap_err(),
            Error::DeserializationError(_)
        ));
    }

    #[test]
    fn test_strip_bookkeeping() {
        let mut value = json!({"id": 1, "model": "core.item", "name": "x"});
        strip_bookkeeping(&mut value);
        assert_eq!(value, json!({"id": 1, "name": "x"}));
    }

    #[test]
    fn test_strip_bookkeeping_non_object() {
        let mut value = json!([1, 2, 3]);
        strip_bookkeeping(&mut value);
        assert_eq!(value, json!([1, 2, 3]));
    }
}
