//! Credentials: one-time codes, bearer tokens and password hashing

pub mod otp;
pub mod password;
pub mod token;

use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

pub use otp::{IssuedOtp, OtpKind, OtpPurpose, OtpRecord, OtpService};
pub use password::{PasswordHasher, SaltedBlake3Hasher};
pub use token::{TokenKind, TokenPair, TokenService, TokenServiceStats};

/// Secret helpers shared by the credential services
pub struct SecretUtils;

impl SecretUtils {
    /// `N` random bytes, hex encoded
    pub fn random_hex<const N: usize>() -> Zeroizing<String> {
        let mut bytes = Zeroizing::new([0u8; N]);
        rand::thread_rng().fill_bytes(&mut bytes[..]);
        Zeroizing::new(hex::encode(&bytes[..]))
    }

    /// Compare two secrets in constant time
    pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
        a.ct_eq(b).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_hex() {
        let a = SecretUtils::random_hex::<32>();
        let b = SecretUtils::random_hex::<32>();
        assert_eq!(a.len(), 64);
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(SecretUtils::constant_time_eq(b"123456", b"123456"));
        assert!(!SecretUtils::constant_time_eq(b"123456", b"123457"));
        assert!(!SecretUtils::constant_time_eq(b"123456", b"12345"));
    }
}
