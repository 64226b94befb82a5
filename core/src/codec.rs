//! Canonical byte representation for anything that gets hashed or signed.
//!
//! A canonical JSON-shaped encoding: sorted object keys at every level, UTC
//! ISO-8601 timestamps with millisecond precision, lowercase-hex byte
//! arrays, and locale-free numbers. Every hash and signature in this crate
//! goes through this one function so the format never drifts.
//!
//! Timestamps and byte buffers get their canonical shape from their own
//! `Serialize` impls ([`crate::governance::types::Timestamp`],
//! [`crate::crypto::hash::Hash256`], etc.) — this module is responsible for
//! the structural rules: sorted keys and omitting absent fields.

use serde::Serialize;
use serde_json::Value;

/// Fields that must always be present (and may be serialized as `null`)
/// even though every other absent/`None` field is dropped. `previousHash`
/// is the only such field (spec.md §4.1 rule (e)).
const ALWAYS_PRESENT: &[&str] = &["previousHash"];

/// Serializes `value` to its canonical byte representation.
///
/// # Panics
///
/// Panics if `value` cannot be represented as JSON. This is a programming
/// error: every type that flows through this function is expected to be a
/// plain-data record with a `Serialize` impl.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    let raw = serde_json::to_value(value).expect("record must be representable as JSON");
    let canon = canonicalize(raw);
    serde_json::to_vec(&canon).expect("canonicalized value must re-serialize")
}

/// Same as [`to_canonical_bytes`] but returns a `String` for logging/tests.
pub fn to_canonical_string<T: Serialize>(value: &T) -> String {
    String::from_utf8(to_canonical_bytes(value)).expect("canonical bytes are valid UTF-8")
}

/// Recursively drops absent-equivalent (`null`) object fields except those
/// in [`ALWAYS_PRESENT`]. Object keys sort themselves because
/// `serde_json::Map` is backed by a `BTreeMap` in this crate (the
/// `preserve_order` feature is never enabled).
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if v.is_null() && !ALWAYS_PRESENT.contains(&k.as_str()) {
                    continue;
                }
                out.insert(k, canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Inner {
        z: u32,
        a: u32,
    }

    #[derive(Serialize)]
    struct Outer {
        beta: Inner,
        alpha: Option<u32>,
        #[serde(rename = "previousHash")]
        previous_hash: Option<String>,
    }

    #[test]
    fn object_keys_are_sorted_at_every_level() {
        let v = Outer {
            beta: Inner { z: 1, a: 2 },
            alpha: None,
            previous_hash: None,
        };
        let s = to_canonical_string(&v);
        // alpha is dropped (None, not in ALWAYS_PRESENT); previousHash stays as null.
        assert_eq!(s, r#"{"beta":{"a":2,"z":1},"previousHash":null}"#);
    }

    #[test]
    fn round_trip_identity_modulo_canonicalization() {
        #[derive(Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Rec {
            b: u32,
            a: u32,
        }
        let v = Rec { b: 1, a: 2 };
        let bytes = to_canonical_bytes(&v);
        let decoded: Rec = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn identical_records_hash_the_same_regardless_of_source_field_order() {
        let json_a = serde_json::json!({"a": 1, "b": 2});
        let json_b = serde_json::json!({"b": 2, "a": 1});
        let bytes_a = serde_json::to_vec(&canonicalize(json_a)).unwrap();
        let bytes_b = serde_json::to_vec(&canonicalize(json_b)).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }
}
