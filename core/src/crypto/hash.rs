//! SHA-256 digests, HMAC-SHA-256, and constant-time equality (C2).
//!
//! `Hash256` is a strongly-typed, fixed-size digest newtype, wrapped so raw
//! byte buffers never leak through public APIs.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::codec;

/// Length in bytes of a SHA-256 digest.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit SHA-256 digest.
///
/// Serializes as a lowercase-hex string (spec.md §4.1 rule (c)), so it is
/// safe to embed directly in any record that flows through the canonical
/// codec.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes the SHA-256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest);
        Hash256(out)
    }

    /// Computes the canonical-codec SHA-256 digest of any serializable
    /// record — the primitive behind `hash(record)` in spec.md §4.2.
    pub fn of_record<T: Serialize>(record: &T) -> Self {
        Self::compute(&codec::to_canonical_bytes(record))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let mut out = [0u8; HASH_LEN];
        if bytes.len() != HASH_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        out.copy_from_slice(&bytes);
        Ok(Hash256(out))
    }
}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash256::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// `hash(record)` from spec.md §4.2: the canonical-codec SHA-256 digest.
pub fn hash_record<T: Serialize>(record: &T) -> Hash256 {
    Hash256::of_record(record)
}

type HmacSha256 = Hmac<Sha256>;

/// `hmac(record, key)` from spec.md §4.2.
pub fn hmac_record<T: Serialize>(record: &T, key: &[u8]) -> [u8; HASH_LEN] {
    let bytes = codec::to_canonical_bytes(record);
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(&bytes);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&result);
    out
}

/// Constant-time comparison of two equal-length hex strings.
///
/// Returns `false` immediately (with no timing-variable branching past the
/// length check) if the strings differ in length, matching spec.md §4.2's
/// stated failure mode.
pub fn equals_ct(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn hash_is_deterministic_and_order_independent() {
        #[derive(Serialize)]
        struct A {
            b: u32,
            a: u32,
        }
        #[derive(Serialize)]
        struct B {
            a: u32,
            b: u32,
        }
        let h1 = hash_record(&A { b: 1, a: 2 });
        let h2 = hash_record(&B { a: 2, b: 1 });
        assert_eq!(h1.as_bytes(), h2.as_bytes());
    }

    #[test]
    fn hex_round_trip() {
        let h = Hash256::compute(b"hello");
        let hex = h.to_hex();
        let back = Hash256::from_hex(&hex).unwrap();
        assert_eq!(h.as_bytes(), back.as_bytes());
    }

    #[test]
    fn equals_ct_rejects_different_lengths_fast() {
        assert!(!equals_ct("abc", "abcd"));
        assert!(equals_ct("abcd", "abcd"));
        assert!(!equals_ct("abcd", "abce"));
    }

    #[test]
    fn equals_ct_timing_is_within_noise_of_equal_case() {
        // A loose statistical smoke test, not a hard timing guarantee:
        // comparing against a mismatch at the first byte should not be
        // dramatically faster than comparing against an identical string.
        let a = "f".repeat(4096);
        let b_same = a.clone();
        let mut b_diff = a.clone();
        b_diff.replace_range(0..1, "0");

        let iterations = 2000;
        let t0 = std::time::Instant::now();
        for _ in 0..iterations {
            std::hint::black_box(equals_ct(&a, &b_same));
        }
        let same_elapsed = t0.elapsed();

        let t1 = std::time::Instant::now();
        for _ in 0..iterations {
            std::hint::black_box(equals_ct(&a, &b_diff));
        }
        let diff_elapsed = t1.elapsed();

        let ratio = diff_elapsed.as_secs_f64() / same_elapsed.as_secs_f64().max(1e-9);
        assert!(ratio < 5.0 && ratio > 0.2, "suspicious timing ratio: {ratio}");
    }

    #[test]
    fn hmac_changes_with_key() {
        #[derive(Serialize)]
        struct Rec {
            v: u32,
        }
        let rec = Rec { v: 7 };
        let m1 = hmac_record(&rec, b"key-a");
        let m2 = hmac_record(&rec, b"key-b");
        assert_ne!(m1, m2);
    }
}
