//! # Core Types for the Voting Backend
//!
//! This module defines the records the rest of the crate passes around:
//! voters, polls with their optional scheduling window, candidates and
//! ballots. Storage owns these records; the lifecycle, eligibility and tally
//! modules only read them.
//!
//! ## Entities
//!
//! - [`Voter`]: phone-identified account with a role
//! - [`Poll`]: a named contest with an optional [`PollWindow`]
//! - [`Candidate`]: a choice belonging to exactly one poll
//! - [`Ballot`]: one (voter, poll, candidate) vote with a server timestamp
//!
//! ## Usage Examples
//!
//! ```rust
//! use ballotbox::types::{Poll, PollWindow};
//! use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
//!
//! let window = PollWindow {
//!     start_date: NaiveDate::from_ymd_opt(2025, 6, 1),
//!     start_time: NaiveTime::from_hms_opt(9, 0, 0),
//!     end_date: NaiveDate::from_ymd_opt(2025, 6, 30),
//!     end_time: None, // half missing: the end bound is absent
//! };
//!
//! assert_eq!(window.start(), Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()));
//! assert_eq!(window.end(), None);
//!
//! let poll = Poll::new("Board Election", "Annual board member election", window, Utc::now());
//! assert_eq!(poll.title, "Board Election");
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type VoterId = Uuid;
pub type PollId = Uuid;
pub type CandidateId = Uuid;
pub type BallotId = Uuid;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Ordinary voter
    #[default]
    Voter,
    /// Staff may manage polls and candidates
    Staff,
}

impl Role {
    /// Display label used in profile payloads
    pub fn label(&self) -> &'static str {
        match self {
            Role::Voter => "Voter",
            Role::Staff => "Staff",
        }
    }
}

/// A registered account
///
/// Created unverified at registration. Pending one-time codes and pending
/// phone changes are deliberately not stored here; they live in
/// [`crate::auth::OtpService`] with their own expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Voter {
    pub id: VoterId,
    pub first_name: String,
    pub last_name: String,
    /// Unique across all voters
    pub phone: String,
    pub phone_verified: bool,
    pub role: Role,
    pub is_active: bool,
    /// Encoded by a [`crate::auth::PasswordHasher`]; never serialized out
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Voter {
    /// Create a new, unverified voter
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone: impl Into<String>,
        password_hash: String,
        role: Role,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: phone.into(),
            phone_verified: false,
            role,
            is_active: true,
            password_hash,
            created_at,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

/// Optional scheduling window of a poll
///
/// Each bound is a date plus a time-of-day, both optional independently. A
/// bound only exists when both of its halves are present; otherwise that
/// side of the window is unbounded. Halves are interpreted as UTC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PollWindow {
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
}

impl PollWindow {
    /// A window with no bounds: always open with respect to timing
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Window built from two complete instants
    pub fn between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            start_date: start.map(|s| s.date_naive()),
            start_time: start.map(|s| s.time()),
            end_date: end.map(|e| e.date_naive()),
            end_time: end.map(|e| e.time()),
        }
    }

    /// Resolved start instant, if both halves are set
    pub fn start(&self) -> Option<DateTime<Utc>> {
        combine(self.start_date, self.start_time)
    }

    /// Resolved end instant, if both halves are set
    pub fn end(&self) -> Option<DateTime<Utc>> {
        combine(self.end_date, self.end_time)
    }
}

fn combine(date: Option<NaiveDate>, time: Option<NaiveTime>) -> Option<DateTime<Utc>> {
    Some(date?.and_time(time?).and_utc())
}

/// A named contest
///
/// There is no stored status field: whether a poll is scheduled, open or
/// closed is always recomputed from the window by [`crate::lifecycle`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Poll {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub window: PollWindow,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        window: PollWindow,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            window,
            created_at,
        }
    }
}

/// A choice in exactly one poll; `name` is unique within that poll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: CandidateId,
    pub poll_id: PollId,
    pub name: String,
    pub info: String,
}

impl Candidate {
    pub fn new(poll_id: PollId, name: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            poll_id,
            name: name.into(),
            info: info.into(),
        }
    }
}

/// One recorded vote
///
/// At most one ballot exists per (voter, poll). Ballots are immutable and
/// disappear only through cascading deletion of their poll, candidate or
/// voter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ballot {
    pub id: BallotId,
    pub voter_id: VoterId,
    pub poll_id: PollId,
    pub candidate_id: CandidateId,
    /// Server-assigned cast time
    pub cast_at: DateTime<Utc>,
    /// Store-assigned insertion sequence; orders ballots sharing a timestamp
    pub sequence: u64,
}

impl Ballot {
    /// Total order used for every ballot listing: cast time, then insertion
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.cast_at, self.sequence)
    }
}
