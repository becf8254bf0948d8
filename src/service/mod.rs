//! Voting system facade
//!
//! [`VotingSystem`] owns the collaborators (store, clock, notifier, password
//! hasher) and the credential services, and exposes one method per endpoint.
//! A router only has to authenticate the bearer, decode the body into the
//! matching [`crate::api`] schema and call the method.

mod accounts;
mod polls;
mod voting;

use crate::auth::{OtpService, PasswordHasher, SaltedBlake3Hasher, TokenService};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::notify::{OtpNotifier, TracingNotifier};
use crate::store::{MemoryStore, Store};
use crate::types::{Voter, VoterId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::Arc;

pub struct VotingSystem<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn OtpNotifier>,
    hasher: Arc<dyn PasswordHasher>,
    otp: OtpService,
    tokens: TokenService,
    phone_pattern: Regex,
    config: Config,
}

impl<S: Store> VotingSystem<S> {
    pub fn new(
        config: Config,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn OtpNotifier>,
    ) -> Result<Self> {
        let phone_pattern = config.registration.phone_regex()?;
        let tokens = TokenService::new(&config.auth)?;
        let otp = OtpService::new(config.otp.clone())?;

        tracing::info!(
            "🗳️  Voting system ready: otp_ttl={}s, staff_registration={}",
            config.otp.ttl_seconds,
            config.registration.allow_staff_registration
        );

        Ok(Self {
            store,
            clock,
            notifier,
            hasher: Arc::new(SaltedBlake3Hasher),
            otp,
            tokens,
            phone_pattern,
            config,
        })
    }

    /// Production wiring: system clock and log-only OTP delivery
    pub fn with_defaults(config: Config, store: Arc<S>) -> Result<Self> {
        Self::new(config, store, Arc::new(SystemClock), Arc::new(TracingNotifier))
    }

    /// Replace the password hasher
    pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Staff-only operations call this first
    pub fn require_staff(&self, voter: &Voter) -> Result<()> {
        if !voter.is_staff() {
            tracing::warn!("Staff operation refused: voter={}", voter.id);
            return Err(Error::forbidden("staff role required"));
        }
        Ok(())
    }

    /// Current stored state of `id`
    fn load_voter(&self, id: VoterId) -> Result<Voter> {
        self.store
            .voter(id)?
            .ok_or_else(|| Error::not_found("voter", id))
    }

    /// Drop expired one-time codes and bearer tokens
    pub fn purge_expired_credentials(&self) -> Result<(u32, u32)> {
        let now = self.now();
        let codes = self.otp.purge_expired(now)?;
        let tokens = self.tokens.cleanup_expired(now)?;
        tracing::debug!("Purged {} codes and {} tokens", codes, tokens);
        Ok((codes, tokens))
    }
}

impl VotingSystem<MemoryStore> {
    /// In-memory system with the testing configuration
    pub fn for_testing(clock: Arc<dyn Clock>, notifier: Arc<dyn OtpNotifier>) -> Result<Self> {
        Self::new(
            Config::for_testing(),
            Arc::new(MemoryStore::new()),
            clock,
            notifier,
        )
    }
}
