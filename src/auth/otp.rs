//! One-time codes for phone verification, password reset and phone change
//!
//! Each code is a short-lived credential record keyed by voter id, kept
//! apart from the voter record itself:
//! 1. Issuing replaces whatever record the voter had before
//! 2. Records expire after the configured TTL
//! 3. Verification is purpose-checked and constant-time
//! 4. Too many wrong guesses discard the record
//! 5. A successful verification consumes the record

use crate::auth::SecretUtils;
use crate::config::OtpConfig;
use crate::types::VoterId;
use crate::{Error, Result, internal_error};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::RwLock;
use zeroize::Zeroizing;

/// What a code authorizes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpPurpose {
    VerifyPhone,
    ResetPassword,
    /// Pending phone change; the new number is applied on verification
    ChangePhone { new_phone: String },
}

/// Purpose without its payload, used to ask for a specific kind of code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpKind {
    VerifyPhone,
    ResetPassword,
    ChangePhone,
}

impl OtpPurpose {
    pub fn kind(&self) -> OtpKind {
        match self {
            OtpPurpose::VerifyPhone => OtpKind::VerifyPhone,
            OtpPurpose::ResetPassword => OtpKind::ResetPassword,
            OtpPurpose::ChangePhone { .. } => OtpKind::ChangePhone,
        }
    }
}

/// Stored one-time code
#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub voter_id: VoterId,
    pub purpose: OtpPurpose,
    code: Zeroizing<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// A freshly issued code, to be handed to the notifier
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub code: Zeroizing<String>,
    pub expires_at: DateTime<Utc>,
}

const INVALID_CODE: &str = "code is invalid or has expired";

/// In-memory one-time code service
pub struct OtpService {
    config: OtpConfig,
    ttl: Duration,
    records: RwLock<HashMap<VoterId, OtpRecord>>,
}

impl OtpService {
    pub fn new(config: OtpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ttl: config.ttl()?,
            config,
            records: RwLock::new(HashMap::new()),
        })
    }

    /// Issue a new six-digit code, replacing any pending one
    pub fn issue(
        &self,
        voter_id: VoterId,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<IssuedOtp> {
        let code = Zeroizing::new(rand::thread_rng().gen_range(100_000..=999_999u32).to_string());
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| internal_error!("OTP expiry out of range"))?;
        let kind = purpose.kind();

        let record = OtpRecord {
            voter_id,
            purpose,
            code: code.clone(),
            issued_at: now,
            expires_at,
            attempts: 0,
        };

        self.records
            .write()
            .map_err(|_| internal_error!("OTP service write error"))?
            .insert(voter_id, record);

        tracing::info!("🔑 OTP issued: voter={}, purpose={:?}", voter_id, kind);

        Ok(IssuedOtp { code, expires_at })
    }

    /// Check `code` against the voter's pending record of kind `expected`
    ///
    /// On success the record is consumed and its purpose returned. Every
    /// failure reports the same validation error on field `otp`.
    pub fn verify(
        &self,
        voter_id: VoterId,
        expected: OtpKind,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpPurpose> {
        let mut records = self
            .records
            .write()
            .map_err(|_| internal_error!("OTP service write error"))?;

        let Some(record) = records.get_mut(&voter_id) else {
            return Err(Error::validation("otp", INVALID_CODE));
        };

        if record.is_expired(now) {
            records.remove(&voter_id);
            return Err(Error::validation("otp", INVALID_CODE));
        }

        if record.purpose.kind() != expected {
            return Err(Error::validation("otp", INVALID_CODE));
        }

        if !SecretUtils::constant_time_eq(record.code.as_bytes(), code.as_bytes()) {
            record.attempts += 1;
            tracing::warn!(
                "OTP mismatch: voter={}, attempts={}/{}",
                voter_id,
                record.attempts,
                self.config.max_attempts
            );
            if record.attempts >= self.config.max_attempts {
                records.remove(&voter_id);
            }
            return Err(Error::validation("otp", INVALID_CODE));
        }

        let purpose = record.purpose.clone();
        records.remove(&voter_id);
        tracing::info!("✅ OTP verified: voter={}, purpose={:?}", voter_id, expected);

        Ok(purpose)
    }

    /// Kind of the voter's pending, unexpired code
    pub fn pending(&self, voter_id: VoterId, now: DateTime<Utc>) -> Result<Option<OtpKind>> {
        let records = self
            .records
            .read()
            .map_err(|_| internal_error!("OTP service read error"))?;

        Ok(records
            .get(&voter_id)
            .filter(|r| !r.is_expired(now))
            .map(|r| r.purpose.kind()))
    }

    /// Drop any pending code for the voter
    pub fn discard(&self, voter_id: VoterId) -> Result<bool> {
        Ok(self
            .records
            .write()
            .map_err(|_| internal_error!("OTP service write error"))?
            .remove(&voter_id)
            .is_some())
    }

    /// Remove expired records
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<u32> {
        let mut records = self
            .records
            .write()
            .map_err(|_| internal_error!("OTP service write error"))?;

        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok((before - records.len()) as u32)
    }
}
