//! Cryptographic primitives shared by the resilience and governance halves
//! of the crate: SHA-256/HMAC hashing (C2) and secp256k1 signing (C3).

pub mod hash;
pub mod signature;

pub use hash::{Hash256, equals_ct, hash_record, hmac_record};
pub use signature::{
    CompactSignature, PrivateKey, PublicKeyBytes, Signature, SignatureError, VerificationOutcome,
    generate_deterministic_key_pair, generate_key_pair, recover_public_key, sign_message,
    to_compact, to_der, verify_signature,
};
