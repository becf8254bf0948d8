//! Password hashing seam
//!
//! Credential hashing is an external collaborator; the voting system only
//! depends on [`PasswordHasher`]. [`SaltedBlake3Hasher`] is the built-in
//! implementation. It is not a memory-hard KDF; deployments that need one
//! plug their own hasher in.

use crate::auth::SecretUtils;
use crate::{Error, Result};
use rand::RngCore;
use std::fmt;

const DERIVE_CONTEXT: &str = "ballotbox 2025 password hashing v1";

pub trait PasswordHasher: Send + Sync + fmt::Debug {
    /// Encode `password` for storage
    fn hash(&self, password: &str) -> Result<String>;

    /// Check `password` against a value produced by [`PasswordHasher::hash`]
    fn verify(&self, password: &str, encoded: &str) -> bool;
}

/// `hex(salt)$hex(blake3_keyed(derive_key(salt), password))`
#[derive(Debug, Clone, Copy, Default)]
pub struct SaltedBlake3Hasher;

impl SaltedBlake3Hasher {
    fn digest(salt: &[u8], password: &str) -> [u8; 32] {
        let key = blake3::derive_key(DERIVE_CONTEXT, salt);
        blake3::keyed_hash(&key, password.as_bytes()).into()
    }
}

impl PasswordHasher for SaltedBlake3Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        if password.is_empty() {
            return Err(Error::validation("password", "must not be empty"));
        }

        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = Self::digest(&salt, password);

        Ok(format!("{}${}", hex::encode(salt), hex::encode(digest)))
    }

    fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some((salt_hex, digest_hex)) = encoded.split_once('$') else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
            return false;
        };

        let actual = Self::digest(&salt, password);
        SecretUtils::constant_time_eq(&actual, &expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = SaltedBlake3Hasher;
        let encoded = hasher.hash("correct horse").unwrap();

        assert!(hasher.verify("correct horse", &encoded));
        assert!(!hasher.verify("battery staple", &encoded));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = SaltedBlake3Hasher;
        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("same", &a) && hasher.verify("same", &b));
    }

    #[test]
    fn test_malformed_encoding_never_verifies() {
        let hasher = SaltedBlake3Hasher;
        assert!(!hasher.verify("x", ""));
        assert!(!hasher.verify("x", "nodollar"));
        assert!(!hasher.verify("x", "zz$zz"));
        assert!(hasher.hash("").is_err());
    }
}
