//! Eligibility gate for casting a ballot
//!
//! Rules are evaluated in a fixed order and the first failing rule wins:
//! 1. the candidate belongs to the poll
//! 2. the poll has started
//! 3. the poll has not ended
//! 4. the voter has no ballot in the poll yet
//!
//! Rule 4 is only a fast path for a friendly error. The ballot store's
//! uniqueness constraint is what actually guarantees one ballot per voter
//! per poll; see [`crate::store::BallotStore::cast`].

use crate::Result;
use crate::store::BallotStore;
use crate::types::{Candidate, Poll, VoterId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a cast attempt was refused
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ineligibility {
    #[error("Candidate does not belong to this poll")]
    CandidateNotInPoll,

    #[error("Voting for this poll has not started yet")]
    NotYetOpen,

    #[error("Voting for this poll has ended")]
    Closed,

    #[error("You have already voted in this poll")]
    AlreadyVoted,
}

/// Outcome of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Denied(Ineligibility),
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }

    /// `Ok(())` when allowed, the refusal reason as an error otherwise
    pub fn into_result(self) -> Result<()> {
        match self {
            Eligibility::Allowed => Ok(()),
            Eligibility::Denied(reason) => Err(reason.into()),
        }
    }
}

/// Rules 1-3: roster membership and the poll window
pub fn check_window(poll: &Poll, candidate: &Candidate, now: DateTime<Utc>) -> Eligibility {
    if candidate.poll_id != poll.id {
        return Eligibility::Denied(Ineligibility::CandidateNotInPoll);
    }

    if poll.window.start().is_some_and(|start| now < start) {
        return Eligibility::Denied(Ineligibility::NotYetOpen);
    }

    if poll.window.end().is_some_and(|end| now > end) {
        return Eligibility::Denied(Ineligibility::Closed);
    }

    Eligibility::Allowed
}

/// Full gate: rules 1-3, then the prior-ballot lookup
///
/// The store is only consulted when the window allows the vote.
pub fn can_vote<S>(
    ballots: &S,
    poll: &Poll,
    candidate: &Candidate,
    voter_id: VoterId,
    now: DateTime<Utc>,
) -> Result<Eligibility>
where
    S: BallotStore + ?Sized,
{
    let timing = check_window(poll, candidate, now);
    if !timing.is_allowed() {
        return Ok(timing);
    }

    if ballots.has_voted(voter_id, poll.id)? {
        return Ok(Eligibility::Denied(Ineligibility::AlreadyVoted));
    }

    Ok(Eligibility::Allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::store::{CandidateStore, MemoryStore, PollStore, VoterStore};
    use crate::types::{PollWindow, Role, Voter};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    struct Fixture {
        store: MemoryStore,
        poll: Poll,
        candidate: Candidate,
        voter: Voter,
    }

    fn fixture(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Fixture {
        let store = MemoryStore::new();
        let poll = store
            .insert_poll(Poll::new("Poll", "", PollWindow::between(start, end), now()))
            .unwrap();
        let candidate = store
            .insert_candidate(Candidate::new(poll.id, "Alice", ""))
            .unwrap();
        let voter = store
            .insert_voter(Voter::new("A", "B", "+998900000001", String::new(), Role::Voter, now()))
            .unwrap();
        Fixture {
            store,
            poll,
            candidate,
            voter,
        }
    }

    #[test]
    fn test_unbounded_poll_only_checks_prior_ballot() {
        let f = fixture(None, None);
        let first = can_vote(&f.store, &f.poll, &f.candidate, f.voter.id, now()).unwrap();
        assert_eq!(first, Eligibility::Allowed);

        f.store
            .cast(f.voter.id, f.poll.id, f.candidate.id, now())
            .unwrap();

        let second = can_vote(&f.store, &f.poll, &f.candidate, f.voter.id, now()).unwrap();
        assert_eq!(second, Eligibility::Denied(Ineligibility::AlreadyVoted));
    }

    #[test]
    fn test_window_rules() {
        let f = fixture(Some(now() + Duration::hours(1)), None);
        assert_eq!(
            check_window(&f.poll, &f.candidate, now()),
            Eligibility::Denied(Ineligibility::NotYetOpen)
        );

        let f = fixture(None, Some(now() - Duration::seconds(1)));
        assert_eq!(
            check_window(&f.poll, &f.candidate, now()),
            Eligibility::Denied(Ineligibility::Closed)
        );
    }

    #[test]
    fn test_candidate_membership_is_checked_first() {
        // Closed poll and a foreign candidate: membership is reported
        let f = fixture(None, Some(now() - Duration::hours(1)));
        let foreign = Candidate::new(uuid::Uuid::new_v4(), "Mallory", "");
        assert_eq!(
            check_window(&f.poll, &foreign, now()),
            Eligibility::Denied(Ineligibility::CandidateNotInPoll)
        );
    }

    #[test]
    fn test_timing_checked_before_prior_ballot() {
        let f = fixture(None, Some(now() + Duration::hours(1)));
        f.store
            .cast(f.voter.id, f.poll.id, f.candidate.id, now())
            .unwrap();

        let later = now() + Duration::hours(2);
        let verdict = can_vote(&f.store, &f.poll, &f.candidate, f.voter.id, later).unwrap();
        assert_eq!(verdict, Eligibility::Denied(Ineligibility::Closed));
    }

    #[test]
    fn test_into_result() {
        assert!(Eligibility::Allowed.into_result().is_ok());
        let err = Eligibility::Denied(Ineligibility::NotYetOpen)
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::Ineligible(Ineligibility::NotYetOpen)));
        assert_eq!(err.status_code(), 400);
    }
}
