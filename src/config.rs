//! Configuration management for the voting backend
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present) with validation.

use crate::{Error, Result};
use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default phone format: Uzbek mobile numbers, `+998` followed by nine digits
pub const DEFAULT_PHONE_PATTERN: &str = r"^\+998\d{9}$";

/// Longest accepted lifetime for one-time codes and bearer tokens (one year)
pub const MAX_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Convert a configured lifetime into a [`Duration`]
///
/// Zero and anything above [`MAX_TTL_SECONDS`] is rejected, so adding the
/// result to a timestamp can never leave chrono's range.
pub fn ttl_duration(seconds: u64, name: &str) -> Result<Duration> {
    if seconds == 0 || seconds > MAX_TTL_SECONDS {
        return Err(Error::internal(format!("Invalid {name}")));
    }
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| Error::internal(format!("Invalid {name}")))
}

/// Credential configuration for bearer tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Key used to hash bearer tokens at rest (base64 encoded, minimum 32 bytes)
    pub token_salt: String,

    /// Access token lifetime in seconds (default: 1 hour)
    pub access_token_ttl_seconds: u64,

    /// Refresh token lifetime in seconds (default: 7 days)
    pub refresh_token_ttl_seconds: u64,
}

impl AuthConfig {
    /// Load auth configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let token_salt = std::env::var("AUTH_TOKEN_SALT")
            .map_err(|_| Error::internal("AUTH_TOKEN_SALT environment variable required"))?;

        Self::validate_salt(&token_salt, "AUTH_TOKEN_SALT")?;

        let access_token_ttl_seconds = std::env::var("AUTH_ACCESS_TOKEN_TTL_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map_err(|_| Error::internal("Invalid AUTH_ACCESS_TOKEN_TTL_SECONDS"))?;

        let refresh_token_ttl_seconds = std::env::var("AUTH_REFRESH_TOKEN_TTL_SECONDS")
            .unwrap_or_else(|_| "604800".to_string())
            .parse()
            .map_err(|_| Error::internal("Invalid AUTH_REFRESH_TOKEN_TTL_SECONDS"))?;

        let config = Self {
            token_salt,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check both token lifetimes are in range
    pub fn validate(&self) -> Result<()> {
        ttl_duration(self.access_token_ttl_seconds, "AUTH_ACCESS_TOKEN_TTL_SECONDS")?;
        ttl_duration(self.refresh_token_ttl_seconds, "AUTH_REFRESH_TOKEN_TTL_SECONDS")?;
        Ok(())
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        use base64::Engine;
        let token_salt =
            base64::engine::general_purpose::STANDARD.encode(rand::random::<[u8; 32]>());

        Self {
            token_salt,
            access_token_ttl_seconds: 300,
            refresh_token_ttl_seconds: 3600,
        }
    }

    /// Validate a base64-encoded salt
    fn validate_salt(salt: &str, name: &str) -> Result<()> {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(salt)
            .map_err(|_| Error::internal(format!("{name} must be valid base64")))?;

        if decoded.len() < 32 {
            return Err(Error::internal(format!(
                "{name} must be at least 32 bytes when decoded"
            )));
        }

        Ok(())
    }

    /// First 32 bytes of the decoded salt, usable as a blake3 key
    pub fn token_key(&self) -> Result<[u8; 32]> {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&self.token_salt)
            .map_err(|_| Error::internal("Invalid token salt"))?;

        decoded
            .get(..32)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| Error::internal("Token salt shorter than 32 bytes"))
    }
}

/// One-time code configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    /// How long an issued code stays valid, in seconds (default: 5 minutes)
    pub ttl_seconds: u64,

    /// Failed verifications tolerated before the code is discarded
    pub max_attempts: u32,
}

impl OtpConfig {
    /// Code lifetime as a [`Duration`]
    pub fn ttl(&self) -> Result<Duration> {
        ttl_duration(self.ttl_seconds, "OTP_TTL_SECONDS")
    }

    /// Check the lifetime is in range and at least one attempt is allowed
    pub fn validate(&self) -> Result<()> {
        self.ttl()?;
        if self.max_attempts == 0 {
            return Err(Error::internal("Invalid OTP_MAX_ATTEMPTS"));
        }
        Ok(())
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_attempts: 5,
        }
    }
}

/// Registration rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Regular expression every phone number must match
    pub phone_pattern: String,

    /// Whether a registration request may ask for the staff role
    pub allow_staff_registration: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            phone_pattern: DEFAULT_PHONE_PATTERN.to_string(),
            allow_staff_registration: false,
        }
    }
}

impl RegistrationConfig {
    /// Compile the phone pattern
    pub fn phone_regex(&self) -> Result<Regex> {
        Regex::new(&self.phone_pattern)
            .map_err(|e| Error::internal(format!("Invalid PHONE_PATTERN: {e}")))
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    pub otp: OtpConfig,
    pub registration: RegistrationConfig,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let auth = AuthConfig::from_env()?;

        let otp = OtpConfig {
            ttl_seconds: std::env::var("OTP_TTL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| Error::internal("Invalid OTP_TTL_SECONDS"))?,
            max_attempts: std::env::var("OTP_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| Error::internal("Invalid OTP_MAX_ATTEMPTS"))?,
        };
        otp.validate()?;

        let registration = RegistrationConfig {
            phone_pattern: std::env::var("PHONE_PATTERN")
                .unwrap_or_else(|_| DEFAULT_PHONE_PATTERN.to_string()),
            allow_staff_registration: std::env::var("ALLOW_STAFF_REGISTRATION")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };
        registration.phone_regex()?;

        let logging = LoggingConfig {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
        };

        Ok(Self {
            auth,
            otp,
            registration,
            logging,
        })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        Self {
            auth: AuthConfig::for_testing(),
            otp: OtpConfig {
                ttl_seconds: 120,
                max_attempts: 3,
            },
            registration: RegistrationConfig {
                phone_pattern: DEFAULT_PHONE_PATTERN.to_string(),
                allow_staff_registration: true,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_for_testing() {
        let config = AuthConfig::for_testing();
        assert!(AuthConfig::validate_salt(&config.token_salt, "TEST").is_ok());
        assert_eq!(config.token_key().unwrap().len(), 32);
        assert!(config.access_token_ttl_seconds < config.refresh_token_ttl_seconds);
    }

    #[test]
    fn test_salt_validation() {
        use base64::Engine;
        let valid_salt = base64::engine::general_purpose::STANDARD.encode([0u8; 32]);
        assert!(AuthConfig::validate_salt(&valid_salt, "TEST").is_ok());

        let short_salt = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        assert!(AuthConfig::validate_salt(&short_salt, "TEST").is_err());

        assert!(AuthConfig::validate_salt("invalid_base64!", "TEST").is_err());
    }

    #[test]
    fn test_ttl_bounds() {
        assert_eq!(ttl_duration(300, "TEST").unwrap(), Duration::minutes(5));
        assert_eq!(
            ttl_duration(MAX_TTL_SECONDS, "TEST").unwrap(),
            Duration::days(365)
        );
        assert!(ttl_duration(0, "TEST").is_err());
        assert!(ttl_duration(MAX_TTL_SECONDS + 1, "TEST").is_err());
        assert!(ttl_duration(u64::MAX, "TEST").is_err());

        let err = ttl_duration(10_000_000_000_000_000, "OTP_TTL_SECONDS").unwrap_err();
        assert!(err.to_string().contains("Invalid OTP_TTL_SECONDS"));
    }

    #[test]
    fn test_oversized_lifetimes_rejected() {
        let otp = OtpConfig {
            ttl_seconds: 10_000_000_000_000_000,
            max_attempts: 5,
        };
        assert!(otp.validate().is_err());
        assert!(OtpConfig::default().validate().is_ok());
        let no_attempts = OtpConfig {
            max_attempts: 0,
            ..OtpConfig::default()
        };
        assert!(no_attempts.validate().is_err());

        let mut auth = AuthConfig::for_testing();
        assert!(auth.validate().is_ok());
        auth.refresh_token_ttl_seconds = u64::MAX;
        assert!(auth.validate().is_err());
    }

    #[test]
    fn test_phone_pattern() {
        let regex = RegistrationConfig::default().phone_regex().unwrap();
        assert!(regex.is_match("+998901234567"));
        assert!(!regex.is_match("+99890123456"));
        assert!(!regex.is_match("998901234567"));
        assert!(!regex.is_match("+9989012345678"));

        let broken = RegistrationConfig {
            phone_pattern: "([".to_string(),
            allow_staff_registration: false,
        };
        assert!(broken.phone_regex().is_err());
    }
}
