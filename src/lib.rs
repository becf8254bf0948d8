//! Online voting backend
//!
//! Voters register with a phone number, confirm it with a one-time code and
//! cast at most one ballot per poll. Staff manage polls and their candidate
//! rosters; anyone can read live and finished results.
//!
//! The correctness-critical pieces are the [`eligibility`] gate, the
//! [`tally`] engine with its deterministic tie-break, the computed poll
//! [`lifecycle`] and the atomic one-ballot-per-poll constraint of the
//! [`store`]. [`service::VotingSystem`] wires them to the credential
//! services and exposes one method per endpoint.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod eligibility;
pub mod errors;
pub mod lifecycle;
pub mod notify;
pub mod service;
pub mod store;
pub mod tally;
pub mod types;

// Re-export commonly used types
pub use errors::{Error, Result};
pub use eligibility::{Eligibility, Ineligibility};
pub use lifecycle::PollState;
pub use service::VotingSystem;
pub use tally::{Tally, TallyEngine};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging from `RUST_LOG`, defaulting to `ballotbox=info`
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ballotbox=info".into()),
        )
        .try_init()
        .map_err(|e| Error::internal(format!("Failed to install subscriber: {e}")))?;

    tracing::info!("🗳️  Ballotbox v{} initialized", VERSION);
    Ok(())
}

/// Initialize logging from [`config::LoggingConfig`]
pub fn init_with(logging: &config::LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(&logging.level)
        .map_err(|e| Error::internal(format!("Invalid LOG_LEVEL: {e}")))?;

    let installed = match logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    installed.map_err(|e| Error::internal(format!("Failed to install subscriber: {e}")))?;

    tracing::info!(
        "🗳️  Ballotbox v{} initialized (format={})",
        VERSION,
        logging.format
    );
    Ok(())
}
