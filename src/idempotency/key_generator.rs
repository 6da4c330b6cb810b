use serde_json::Value;
use sha2::{Digest, Sha256};

/// Recursively sorts object keys so semantically identical JSON values
/// always serialize to the same byte string, regardless of the order
/// fields were inserted in. `serde_json::Value::Object` is backed by a
/// `Map` that (without the `preserve_order` feature, which this crate does
/// not enable) is already a `BTreeMap` and iterates in key order, but this
/// walks explicitly so the guarantee doesn't depend on that feature flag.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: std::collections::BTreeMap<String, Value> = std::collections::BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k.clone(), canonicalize(v));
            }
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Computes the stable hex digest of a request's business-relevant fields,
/// per the idempotency manager's `hash(request_fields)` contract: the same
/// fields, presented in any field order, hash identically.
pub fn hash_request(fields: &Value) -> String {
    let canonical = canonicalize(fields);
    let json = serde_json::to_vec(&canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&json);
    hex::encode(hasher.finalize())
}
