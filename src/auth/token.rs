//! Bearer token service
//!
//! Issues access/refresh token pairs after login and resolves bearer
//! credentials back to a voter id:
//! 1. Raw tokens are 32 random bytes, hex encoded, shown to the client once
//! 2. Only a blake3 keyed hash of each token is stored
//! 3. Access and refresh tokens carry separate lifetimes
//! 4. Logout, password change and account deletion revoke every token of a voter
//! 5. Expired tokens are rejected and purged by `cleanup_expired`

use crate::auth::SecretUtils;
use crate::config::{AuthConfig, ttl_duration};
use crate::types::VoterId;
use crate::{Error, Result, internal_error};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

type TokenHash = [u8; 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenState {
    Active,
    Revoked { revoked_at: DateTime<Utc> },
}

#[derive(Debug, Clone)]
struct StoredToken {
    voter_id: VoterId,
    kind: TokenKind,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    state: TokenState,
}

impl StoredToken {
    fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.state == TokenState::Active && now <= self.expires_at
    }
}

/// Tokens returned by a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Counters for monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenServiceStats {
    pub total_tokens: usize,
    pub active_access: usize,
    pub active_refresh: usize,
    pub revoked: usize,
    pub expired: usize,
}

pub struct TokenService {
    access_ttl: Duration,
    refresh_ttl: Duration,
    key: [u8; 32],
    /// token hash -> token
    tokens: RwLock<HashMap<TokenHash, StoredToken>>,
    /// voter id -> token hashes
    voter_tokens: RwLock<HashMap<VoterId, Vec<TokenHash>>>,
}

impl TokenService {
    pub fn new(auth: &AuthConfig) -> Result<Self> {
        Ok(Self {
            access_ttl: ttl_duration(
                auth.access_token_ttl_seconds,
                "AUTH_ACCESS_TOKEN_TTL_SECONDS",
            )?,
            refresh_ttl: ttl_duration(
                auth.refresh_token_ttl_seconds,
                "AUTH_REFRESH_TOKEN_TTL_SECONDS",
            )?,
            key: auth.token_key()?,
            tokens: RwLock::new(HashMap::new()),
            voter_tokens: RwLock::new(HashMap::new()),
        })
    }

    pub fn for_testing() -> Result<Self> {
        Self::new(&AuthConfig::for_testing())
    }

    fn hash(&self, raw: &str) -> TokenHash {
        blake3::keyed_hash(&self.key, raw.as_bytes()).into()
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn issue(
        &self,
        voter_id: VoterId,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>)> {
        let raw = SecretUtils::random_hex::<32>();
        let hash = self.hash(&raw);
        let expires_at = now
            .checked_add_signed(self.ttl(kind))
            .ok_or_else(|| internal_error!("Token expiry out of range"))?;

        let token = StoredToken {
            voter_id,
            kind,
            issued_at: now,
            expires_at,
            state: TokenState::Active,
        };

        {
            let mut tokens = self
                .tokens
                .write()
                .map_err(|_| internal_error!("Token service write error"))?;
            let mut voter_tokens = self
                .voter_tokens
                .write()
                .map_err(|_| internal_error!("Token service write error"))?;

            tokens.insert(hash, token);
            voter_tokens.entry(voter_id).or_default().push(hash);
        }

        Ok((raw.as_str().to_owned(), expires_at))
    }

    /// Issue an access/refresh pair (login)
    pub fn issue_pair(&self, voter_id: VoterId, now: DateTime<Utc>) -> Result<TokenPair> {
        let (access, access_expires_at) = self.issue(voter_id, TokenKind::Access, now)?;
        let (refresh, refresh_expires_at) = self.issue(voter_id, TokenKind::Refresh, now)?;

        tracing::info!("🎫 Token pair issued: voter={}", voter_id);

        Ok(TokenPair {
            access,
            refresh,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Resolve a raw token of `kind` to its voter
    pub fn validate(&self, raw: &str, kind: TokenKind, now: DateTime<Utc>) -> Result<VoterId> {
        let hash = self.hash(raw);

        let tokens = self
            .tokens
            .read()
            .map_err(|_| internal_error!("Token service read error"))?;

        match tokens.get(&hash) {
            Some(token) if token.kind == kind && token.is_usable(now) => Ok(token.voter_id),
            Some(token) if token.kind != kind => Err(Error::unauthorized("wrong token type")),
            Some(token) => {
                if let TokenState::Revoked { revoked_at } = token.state {
                    tracing::debug!("Rejected token revoked at {}", revoked_at);
                }
                Err(Error::unauthorized("token expired or revoked"))
            }
            None => Err(Error::unauthorized("token not recognized")),
        }
    }

    /// Exchange a refresh token for a fresh access token
    pub fn refresh(
        &self,
        raw_refresh: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>)> {
        let voter_id = self.validate(raw_refresh, TokenKind::Refresh, now)?;
        self.issue(voter_id, TokenKind::Access, now)
    }

    /// Revoke every token of a voter
    pub fn revoke_voter(&self, voter_id: VoterId, now: DateTime<Utc>) -> Result<u32> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| internal_error!("Token service write error"))?;
        let mut voter_tokens = self
            .voter_tokens
            .write()
            .map_err(|_| internal_error!("Token service write error"))?;

        let mut revoked = 0;
        for hash in voter_tokens.remove(&voter_id).unwrap_or_default() {
            if let Some(token) = tokens.get_mut(&hash) {
                if token.state == TokenState::Active {
                    token.state = TokenState::Revoked { revoked_at: now };
                    revoked += 1;
                }
            }
        }

        tracing::info!("👋 Tokens revoked: voter={}, count={}", voter_id, revoked);
        Ok(revoked)
    }

    /// Drop expired and revoked tokens
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u32> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| internal_error!("Token service write error"))?;
        let mut voter_tokens = self
            .voter_tokens
            .write()
            .map_err(|_| internal_error!("Token service write error"))?;

        let before = tokens.len();
        tokens.retain(|_, token| token.is_usable(now));
        voter_tokens.retain(|_, hashes| {
            hashes.retain(|h| tokens.contains_key(h));
            !hashes.is_empty()
        });

        Ok((before - tokens.len()) as u32)
    }

    pub fn get_stats(&self, now: DateTime<Utc>) -> Result<TokenServiceStats> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| internal_error!("Token service read error"))?;

        let mut stats = TokenServiceStats {
            total_tokens: tokens.len(),
            ..Default::default()
        };
        for token in tokens.values() {
            match (&token.state, token.kind) {
                (TokenState::Revoked { .. }, _) => stats.revoked += 1,
                (TokenState::Active, _) if now > token.expires_at => stats.expired += 1,
                (TokenState::Active, TokenKind::Access) => stats.active_access += 1,
                (TokenState::Active, TokenKind::Refresh) => stats.active_refresh += 1,
            }
        }

        tracing::debug!(
            "Token stats: total={}, oldest issued at {:?}",
            stats.total_tokens,
            tokens.values().map(|t| t.issued_at).min()
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_issue_and_validate_pair() {
        let service = TokenService::for_testing().unwrap();
        let voter = Uuid::new_v4();
        let now = Utc::now();

        let pair = service.issue_pair(voter, now).unwrap();
        assert_eq!(pair.access.len(), 64);
        assert_ne!(pair.access, pair.refresh);
        assert!(pair.access_expires_at < pair.refresh_expires_at);

        assert_eq!(service.validate(&pair.access, TokenKind::Access, now).unwrap(), voter);
        assert_eq!(service.validate(&pair.refresh, TokenKind::Refresh, now).unwrap(), voter);
    }

    #[test]
    fn test_out_of_range_lifetimes() {
        let mut auth = AuthConfig::for_testing();
        auth.access_token_ttl_seconds = 10_000_000_000_000_000;
        assert!(matches!(TokenService::new(&auth), Err(Error::Internal { .. })));

        // Issuing near the end of chrono's range fails instead of overflowing
        let service = TokenService::for_testing().unwrap();
        let result = service.issue_pair(Uuid::new_v4(), DateTime::<Utc>::MAX_UTC);
        assert!(matches!(result, Err(Error::Internal { .. })));
        assert_eq!(service.get_stats(Utc::now()).unwrap().total_tokens, 0);
    }

    #[test]
    fn test_kind_is_enforced() {
        let service = TokenService::for_testing().unwrap();
        let now = Utc::now();
        let pair = service.issue_pair(Uuid::new_v4(), now).unwrap();

        assert!(matches!(
            service.validate(&pair.refresh, TokenKind::Access, now),
            Err(Error::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_expiry_and_refresh() {
        let service = TokenService::for_testing().unwrap();
        let voter = Uuid::new_v4();
        let now = Utc::now();
        let pair = service.issue_pair(voter, now).unwrap();

        // access ttl is 300s in the testing config, refresh 3600s
        let later = now + Duration::seconds(301);
        assert!(service.validate(&pair.access, TokenKind::Access, later).is_err());

        let (fresh, _) = service.refresh(&pair.refresh, later).unwrap();
        assert_eq!(service.validate(&fresh, TokenKind::Access, later).unwrap(), voter);
    }

    #[test]
    fn test_revoke_voter() {
        let service = TokenService::for_testing().unwrap();
        let voter = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();

        let first = service.issue_pair(voter, now).unwrap();
        let _second = service.issue_pair(voter, now).unwrap();
        let kept = service.issue_pair(other, now).unwrap();

        assert_eq!(service.revoke_voter(voter, now).unwrap(), 4);
        assert!(service.validate(&first.access, TokenKind::Access, now).is_err());
        assert!(service.validate(&kept.access, TokenKind::Access, now).is_ok());

        let stats = service.get_stats(now).unwrap();
        assert_eq!(stats.revoked, 4);
        assert_eq!(stats.active_access, 1);

        assert_eq!(service.cleanup_expired(now).unwrap(), 4);
        assert_eq!(service.get_stats(now).unwrap().total_tokens, 2);
    }

    #[test]
    fn test_unknown_token() {
        let service = TokenService::for_testing().unwrap();
        assert!(matches!(
            service.validate("deadbeef", TokenKind::Access, Utc::now()),
            Err(Error::Unauthorized { .. })
        ));
    }
}
