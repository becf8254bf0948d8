//! Storage collaborator interfaces
//!
//! The backend treats persistence as an external relational store with
//! foreign keys, cascading deletes and unique constraints. These traits are
//! the seam; [`MemoryStore`] implements all of them in-process.
//!
//! Unique constraints are reported as [`crate::Error::Conflict`] carrying one
//! of the constraint names below.

pub mod memory;

use crate::Result;
use crate::types::{Ballot, Candidate, CandidateId, Poll, PollId, Voter, VoterId};
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;

/// Unique phone number per voter
pub const VOTER_PHONE_UNIQUE: &str = "voter(phone)";

/// Unique candidate name within a poll
pub const CANDIDATE_NAME_UNIQUE: &str = "candidate(poll_id, name)";

/// At most one ballot per (voter, poll)
pub const BALLOT_UNIQUE: &str = "ballot(voter_id, poll_id)";

pub trait VoterStore: Send + Sync {
    /// Insert a voter; `Conflict(VOTER_PHONE_UNIQUE)` if the phone is taken
    fn insert_voter(&self, voter: Voter) -> Result<Voter>;

    fn voter(&self, id: VoterId) -> Result<Option<Voter>>;

    fn voter_by_phone(&self, phone: &str) -> Result<Option<Voter>>;

    /// Replace a stored voter; `NotFound` if absent, `Conflict` on phone reuse
    fn update_voter(&self, voter: &Voter) -> Result<()>;

    /// Delete a voter and cascade to their ballots
    fn delete_voter(&self, id: VoterId) -> Result<bool>;
}

pub trait PollStore: Send + Sync {
    fn insert_poll(&self, poll: Poll) -> Result<Poll>;

    fn poll(&self, id: PollId) -> Result<Option<Poll>>;

    /// All polls in creation order
    fn list_polls(&self) -> Result<Vec<Poll>>;

    fn update_poll(&self, poll: &Poll) -> Result<()>;

    /// Delete a poll and cascade to its candidates and ballots
    fn delete_poll(&self, id: PollId) -> Result<bool>;
}

pub trait CandidateStore: Send + Sync {
    /// Insert a candidate; `NotFound` if the poll is missing,
    /// `Conflict(CANDIDATE_NAME_UNIQUE)` on a duplicate name
    fn insert_candidate(&self, candidate: Candidate) -> Result<Candidate>;

    fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>>;

    /// Roster of a poll in creation order
    fn list_candidates(&self, poll_id: PollId) -> Result<Vec<Candidate>>;

    fn update_candidate(&self, candidate: &Candidate) -> Result<()>;

    /// Delete a candidate and cascade to its ballots
    fn delete_candidate(&self, id: CandidateId) -> Result<bool>;
}

pub trait BallotStore: Send + Sync {
    /// Atomically check-and-insert a ballot
    ///
    /// Implementations must enforce `BALLOT_UNIQUE` inside the same atomic
    /// step as the insert, never through a separate prior read. A lost race
    /// yields `Conflict(BALLOT_UNIQUE)`.
    fn cast(
        &self,
        voter_id: VoterId,
        poll_id: PollId,
        candidate_id: CandidateId,
        cast_at: DateTime<Utc>,
    ) -> Result<Ballot>;

    fn has_voted(&self, voter_id: VoterId, poll_id: PollId) -> Result<bool>;

    /// Ballots of a poll ordered by cast time ascending
    fn list_by_poll(&self, poll_id: PollId) -> Result<Vec<Ballot>>;

    /// Ballots of a voter ordered by cast time ascending
    fn list_by_voter(&self, voter_id: VoterId) -> Result<Vec<Ballot>>;
}

/// Everything the voting system needs from storage
pub trait Store: VoterStore + PollStore + CandidateStore + BallotStore {}

impl<T> Store for T where T: VoterStore + PollStore + CandidateStore + BallotStore {}
