// crates/verdict-core/src/core/hashing.rs
// ============================================================================
// Module: Verdict Hashing
// Description: Canonical JSON hashing and stable digests.
// Purpose: Provide deterministic content hashes for rule sets and A/B bucketing.
// Dependencies: serde, serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! Hashing in Verdict serves two jobs: fingerprinting compiled rule sets so
//! identical inputs are cacheable by content, and bucketing A/B assignment
//! keys with a digest that is stable across processes and platforms. Both
//! use SHA-256 over canonical JSON bytes (RFC 8785 form).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Digest Type
// ============================================================================

/// Hex-encoded SHA-256 digest.
///
/// # Invariants
/// - Always 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashDigest(String);

impl HashDigest {
    /// Returns the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Hashing errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HashError {
    /// Value could not be rendered as canonical JSON.
    #[error("canonical json encoding failed: {0}")]
    Canonicalize(String),
}

// ============================================================================
// SECTION: Hash Functions
// ============================================================================

/// Renders a serializable value as canonical JSON bytes (RFC 8785).
///
/// # Errors
///
/// Returns [`HashError`] when the value cannot be serialized, for example a
/// map with non-string keys.
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalize(err.to_string()))
}

/// Hashes raw bytes into a hex-encoded SHA-256 digest.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> HashDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut rendered = String::with_capacity(64);
    for byte in digest {
        rendered.push_str(&format!("{byte:02x}"));
    }
    HashDigest(rendered)
}

/// Hashes a serializable value via its canonical JSON form.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<HashDigest, HashError> {
    Ok(hash_bytes(&canonical_json_bytes(value)?))
}

/// Buckets a key into `0..100` using the first 16 digest bytes as a `u128`.
///
/// The digest input is the UTF-8 form of `key`; the bucket is stable across
/// processes, platforms, and releases.
#[must_use]
pub fn stable_bucket(key: &str) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0_u8; 16];
    prefix.copy_from_slice(&digest[.. 16]);
    let value = u128::from_be_bytes(prefix);
    #[allow(clippy::cast_possible_truncation, reason = "Modulo 100 always fits in u8.")]
    let bucket = (value % 100) as u8;
    bucket
}

/// Derives a fallback A/B assignment key from an arbitrary JSON value.
///
/// The key is the first 16 hex characters of the canonical-JSON hash,
/// matching the stability guarantees of [`stable_bucket`].
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn derived_assignment_key(value: &Value) -> Result<String, HashError> {
    let digest = hash_canonical(value)?;
    Ok(digest.as_str().chars().take(16).collect())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn hash_bytes_is_stable() {
        let digest = hash_bytes(b"verdict");
        assert_eq!(digest.as_str().len(), 64);
        assert_eq!(digest, hash_bytes(b"verdict"));
    }

    #[test]
    fn canonical_hash_ignores_key_order() {
        let left = json!({"a": 1, "b": 2});
        let right = json!({"b": 2, "a": 1});
        let left_hash = hash_canonical(&left).map(|digest| digest.as_str().to_string());
        let right_hash = hash_canonical(&right).map(|digest| digest.as_str().to_string());
        assert_eq!(left_hash.ok(), right_hash.ok());
    }

    #[test]
    fn stable_bucket_is_below_one_hundred() {
        for key in ["t1:user42", "t1:user43", "t2:session-9"] {
            assert!(stable_bucket(key) < 100);
        }
    }
}
