//! ECC signing and verification over the secp256k1 curve (C3).
//!
//! Newtype wrappers over raw key/signature bytes, manual error enums, built
//! on the `secp256k1` crate with `features = ["recovery", "global-context"]`.

use std::fmt;
use std::time::Instant;

use hmac::{Hmac, Mac};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey as Secp256k1PublicKey, SECP256K1, SecretKey};
use sha2::Sha256;

use crate::crypto::hash::Hash256;

/// Errors raised by key generation, signing, and verification.
#[derive(Debug)]
pub enum SignatureError {
    /// The provided bytes do not form a valid scalar/point on the curve.
    InvalidKeyMaterial(String),
    /// Signing or verification failed at the curve-library level.
    Curve(secp256k1::Error),
    /// A signature's recovery id was outside the expected `0..=3` range.
    InvalidRecoveryId(i32),
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::InvalidKeyMaterial(msg) => write!(f, "invalid key material: {msg}"),
            SignatureError::Curve(e) => write!(f, "curve error: {e}"),
            SignatureError::InvalidRecoveryId(id) => write!(f, "invalid recovery id: {id}"),
        }
    }
}

impl std::error::Error for SignatureError {}

impl From<secp256k1::Error> for SignatureError {
    fn from(e: secp256k1::Error) -> Self {
        SignatureError::Curve(e)
    }
}

/// A 32-byte secp256k1 private key.
#[derive(Clone)]
pub struct PrivateKey(pub [u8; 32]);

/// A 33-byte compressed secp256k1 public key.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct PublicKeyBytes(pub [u8; 33]);

impl fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyBytes({})", hex::encode(self.0))
    }
}

/// A compact `(r, s, recovery)` signature, as produced by [`sign_message`].
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery: u8,
}

/// Generates a fresh, randomly sampled keypair.
pub fn generate_key_pair() -> (PrivateKey, PublicKeyBytes) {
    let mut rng = rand::thread_rng();
    let sk = SecretKey::new(&mut rng);
    keypair_from_secret(sk)
}

/// Derives the same keypair every time for the same `seed`, using an
/// HKDF-style expansion: `scalar_i = HMAC-SHA256(key = domain, data = seed
/// || counter)`, re-sampled with an incrementing counter until the result
/// is a valid secp256k1 scalar (rejection sampling — the chance of a
/// single candidate landing outside the valid scalar range is
/// astronomically small, but the loop keeps the function total).
pub fn generate_deterministic_key_pair(seed: &str) -> (PrivateKey, PublicKeyBytes) {
    const DOMAIN: &[u8] = b"gov-resilience/deterministic-keygen/v1";
    let mut counter: u32 = 0;
    loop {
        let mut mac = Hmac::<Sha256>::new_from_slice(DOMAIN).expect("HMAC accepts any key length");
        mac.update(seed.as_bytes());
        mac.update(&counter.to_be_bytes());
        let candidate = mac.finalize().into_bytes();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&candidate);

        if let Ok(sk) = SecretKey::from_slice(&bytes) {
            return keypair_from_secret(sk);
        }
        counter += 1;
    }
}

fn keypair_from_secret(sk: SecretKey) -> (PrivateKey, PublicKeyBytes) {
    let pk = Secp256k1PublicKey::from_secret_key(SECP256K1, &sk);
    (PrivateKey(sk.secret_bytes()), PublicKeyBytes(pk.serialize()))
}

fn message_from_bytes(msg: &[u8]) -> Message {
    let digest = Hash256::compute(msg);
    Message::from_digest(*digest.as_bytes())
}

/// Signs `msg` (hashed internally with SHA-256) with `sk`, returning a
/// recoverable compact signature.
pub fn sign_message(msg: &[u8], sk: &PrivateKey) -> Result<Signature, SignatureError> {
    let secret = SecretKey::from_slice(&sk.0)
        .map_err(|e| SignatureError::InvalidKeyMaterial(e.to_string()))?;
    let message = message_from_bytes(msg);
    let recoverable = SECP256K1.sign_ecdsa_recoverable(&message, &secret);
    let (recid, bytes) = recoverable.serialize_compact();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[0..32]);
    s.copy_from_slice(&bytes[32..64]);

    Ok(Signature {
        r,
        s,
        recovery: recid.to_i32() as u8,
    })
}

/// Result of [`verify_signature`]: whether the signature is valid, plus
/// how long verification took (spec.md §4.3).
#[derive(Debug, Clone, Copy)]
pub struct VerificationOutcome {
    pub is_valid: bool,
    pub verification_time_ms: f64,
}

/// Verifies `sig` over `msg` against `pk`.
///
/// A malformed public key or signature is treated as a failed verification
/// (`is_valid = false`) rather than propagated as an error, since "is this
/// signature valid" is the question callers actually want answered.
pub fn verify_signature(msg: &[u8], sig: &Signature, pk: &PublicKeyBytes) -> VerificationOutcome {
    let start = Instant::now();
    let is_valid = (|| -> Result<bool, SignatureError> {
        let recoverable = recoverable_from_parts(sig)?;
        let standard = recoverable.to_standard();
        let public_key = Secp256k1PublicKey::from_slice(&pk.0)?;
        let message = message_from_bytes(msg);
        Ok(SECP256K1.verify_ecdsa(&message, &standard, &public_key).is_ok())
    })()
    .unwrap_or(false);

    VerificationOutcome {
        is_valid,
        verification_time_ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}

/// Recovers the signer's compressed public key from a message + signature.
pub fn recover_public_key(
    msg: &[u8],
    sig: &Signature,
) -> Result<PublicKeyBytes, SignatureError> {
    let recoverable = recoverable_from_parts(sig)?;
    let message = message_from_bytes(msg);
    let pk = SECP256K1.recover_ecdsa(&message, &recoverable)?;
    Ok(PublicKeyBytes(pk.serialize()))
}

fn recoverable_from_parts(sig: &Signature) -> Result<RecoverableSignature, SignatureError> {
    let recid = RecoveryId::from_i32(sig.recovery as i32)
        .map_err(|_| SignatureError::InvalidRecoveryId(sig.recovery as i32))?;
    let mut compact = [0u8; 64];
    compact[0..32].copy_from_slice(&sig.r);
    compact[32..64].copy_from_slice(&sig.s);
    Ok(RecoverableSignature::from_compact(&compact, recid)?)
}

/// A `(bytes[64], recovery)` compact encoding, per spec.md §4.3.
pub struct CompactSignature {
    pub bytes: [u8; 64],
    pub recovery: u8,
}

pub fn to_compact(sig: &Signature) -> CompactSignature {
    let mut bytes = [0u8; 64];
    bytes[0..32].copy_from_slice(&sig.r);
    bytes[32..64].copy_from_slice(&sig.s);
    CompactSignature {
        bytes,
        recovery: sig.recovery,
    }
}

/// DER encoding of `(r, s)` per standard ASN.1 integer rules. The recovery
/// id is not representable in DER and is carried out-of-band by the
/// caller, as spec.md §4.3 specifies.
pub fn to_der(sig: &Signature) -> Result<Vec<u8>, SignatureError> {
    let recoverable = recoverable_from_parts(sig)?;
    let standard = recoverable.to_standard();
    Ok(standard.serialize_der().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_keygen_is_stable() {
        let (sk1, pk1) = generate_deterministic_key_pair("seed-a");
        let (sk2, pk2) = generate_deterministic_key_pair("seed-a");
        assert_eq!(sk1.0, sk2.0);
        assert_eq!(pk1.0, pk2.0);

        let (_, pk3) = generate_deterministic_key_pair("seed-b");
        assert_ne!(pk1.0, pk3.0);
    }

    #[test]
    fn sign_then_verify_round_trip() {
        let (sk, pk) = generate_deterministic_key_pair("round-trip-seed");
        let msg = b"vote-session-0003";
        let sig = sign_message(msg, &sk).expect("sign");

        let outcome = verify_signature(msg, &sig, &pk);
        assert!(outcome.is_valid);

        let tampered = b"vote-session-0004";
        let outcome2 = verify_signature(tampered, &sig, &pk);
        assert!(!outcome2.is_valid);
    }

    #[test]
    fn recover_public_key_matches_signer() {
        let (sk, pk) = generate_deterministic_key_pair("recovery-seed");
        let msg = b"finalize-bip-01";
        let sig = sign_message(msg, &sk).expect("sign");

        let recovered = recover_public_key(msg, &sig).expect("recover");
        assert_eq!(recovered.0, pk.0);
    }

    #[test]
    fn compact_and_der_encodings_round_trip_length() {
        let (sk, _) = generate_deterministic_key_pair("encoding-seed");
        let sig = sign_message(b"payload", &sk).expect("sign");

        let compact = to_compact(&sig);
        assert_eq!(compact.bytes.len(), 64);

        let der = to_der(&sig).expect("der encode");
        assert!(der.len() >= 8 && der.len() <= 72);
    }
}
