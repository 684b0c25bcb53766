//! Shared webhook signature primitives.
//!
//! Every local verification scheme is HMAC-SHA256 over some provider-specific
//! signed payload, compared in constant time against a hex-encoded digest.
//!
//! # Security
//!
//! - Length mismatches are rejected before any HMAC is computed; this leaks
//!   digest length but never content.
//! - Digest comparison never short-circuits on the first differing byte
//!   (`subtle::ConstantTimeEq` XOR-accumulates the full slices).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 digest length in bytes.
pub const DIGEST_LEN: usize = 32;

/// Compute HMAC-SHA256 of `message` under `secret`.
pub fn hmac_sha256(secret: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Compute HMAC-SHA256 of `message` under `secret`, hex-encoded.
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> String {
    hex::encode(hmac_sha256(secret, message))
}

/// Constant-time byte slice comparison.
///
/// Returns `false` immediately on length mismatch; otherwise the comparison
/// cost is independent of where the first differing byte occurs.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Verify a hex-encoded HMAC-SHA256 digest over `message`.
///
/// Malformed hex and wrong-length digests are rejected without computing the
/// expected HMAC.
pub fn verify_hex_digest(secret: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let provided = match hex::decode(signature_hex.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    if provided.len() != DIGEST_LEN {
        return false;
    }
    constant_time_eq(&hmac_sha256(secret, message), &provided)
}
