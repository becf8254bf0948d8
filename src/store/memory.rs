//! In-process store
//!
//! All tables sit behind one `RwLock` so that constraint checks, inserts and
//! cascades happen inside a single critical section, as they would inside
//! one transaction of a relational store.

use super::{
    BALLOT_UNIQUE, BallotStore, CANDIDATE_NAME_UNIQUE, CandidateStore, PollStore,
    VOTER_PHONE_UNIQUE, VoterStore,
};
use crate::eligibility::Ineligibility;
use crate::types::{Ballot, Candidate, CandidateId, Poll, PollId, Voter, VoterId};
use crate::{Error, Result, internal_error};
use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    voters: HashMap<VoterId, Voter>,
    voters_by_phone: HashMap<String, VoterId>,

    /// poll id -> (insertion sequence, poll)
    polls: HashMap<PollId, (u64, Poll)>,

    /// candidate id -> (insertion sequence, candidate)
    candidates: HashMap<CandidateId, (u64, Candidate)>,
    candidate_names: HashSet<(PollId, String)>,

    ballots: HashMap<Uuid, Ballot>,
    ballots_by_voter_poll: HashMap<(VoterId, PollId), Uuid>,

    next_sequence: u64,
}

impl Tables {
    fn sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn remove_ballots_where(&mut self, pred: impl Fn(&Ballot) -> bool) -> usize {
        let doomed: Vec<Uuid> = self
            .ballots
            .values()
            .filter(|b| pred(b))
            .map(|b| b.id)
            .collect();

        for id in &doomed {
            if let Some(ballot) = self.ballots.remove(id) {
                self.ballots_by_voter_poll
                    .remove(&(ballot.voter_id, ballot.poll_id));
            }
        }

        doomed.len()
    }

    fn sorted_ballots(&self, pred: impl Fn(&Ballot) -> bool) -> Vec<Ballot> {
        let mut ballots: Vec<Ballot> = self.ballots.values().filter(|b| pred(b)).cloned().collect();
        ballots.sort_by_key(Ballot::order_key);
        ballots
    }
}

/// Store keeping every table in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| internal_error!("Store read error"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| internal_error!("Store write error"))
    }

    /// Number of ballots across all polls
    pub fn ballot_count(&self) -> Result<usize> {
        Ok(self.read()?.ballots.len())
    }
}

impl VoterStore for MemoryStore {
    fn insert_voter(&self, voter: Voter) -> Result<Voter> {
        let mut tables = self.write()?;

        match tables.voters_by_phone.entry(voter.phone.clone()) {
            Entry::Occupied(_) => return Err(Error::conflict(VOTER_PHONE_UNIQUE)),
            Entry::Vacant(slot) => {
                slot.insert(voter.id);
            }
        }
        tables.voters.insert(voter.id, voter.clone());

        Ok(voter)
    }

    fn voter(&self, id: VoterId) -> Result<Option<Voter>> {
        Ok(self.read()?.voters.get(&id).cloned())
    }

    fn voter_by_phone(&self, phone: &str) -> Result<Option<Voter>> {
        let tables = self.read()?;
        Ok(tables
            .voters_by_phone
            .get(phone)
            .and_then(|id| tables.voters.get(id))
            .cloned())
    }

    fn update_voter(&self, voter: &Voter) -> Result<()> {
        let mut tables = self.write()?;

        let old_phone = tables
            .voters
            .get(&voter.id)
            .map(|existing| existing.phone.clone())
            .ok_or_else(|| Error::not_found("voter", voter.id))?;

        if old_phone != voter.phone {
            if tables.voters_by_phone.contains_key(&voter.phone) {
                return Err(Error::conflict(VOTER_PHONE_UNIQUE));
            }
            tables.voters_by_phone.remove(&old_phone);
            tables.voters_by_phone.insert(voter.phone.clone(), voter.id);
        }

        tables.voters.insert(voter.id, voter.clone());
        Ok(())
    }

    fn delete_voter(&self, id: VoterId) -> Result<bool> {
        let mut tables = self.write()?;

        let Some(voter) = tables.voters.remove(&id) else {
            return Ok(false);
        };
        tables.voters_by_phone.remove(&voter.phone);
        tables.remove_ballots_where(|b| b.voter_id == id);

        Ok(true)
    }
}

impl PollStore for MemoryStore {
    fn insert_poll(&self, poll: Poll) -> Result<Poll> {
        let mut tables = self.write()?;
        let seq = tables.sequence();
        tables.polls.insert(poll.id, (seq, poll.clone()));
        Ok(poll)
    }

    fn poll(&self, id: PollId) -> Result<Option<Poll>> {
        Ok(self.read()?.polls.get(&id).map(|(_, poll)| poll.clone()))
    }

    fn list_polls(&self) -> Result<Vec<Poll>> {
        let tables = self.read()?;
        let mut rows: Vec<&(u64, Poll)> = tables.polls.values().collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, poll)| poll.clone()).collect())
    }

    fn update_poll(&self, poll: &Poll) -> Result<()> {
        let mut tables = self.write()?;
        let row = tables
            .polls
            .get_mut(&poll.id)
            .ok_or_else(|| Error::not_found("poll", poll.id))?;
        row.1 = poll.clone();
        Ok(())
    }

    fn delete_poll(&self, id: PollId) -> Result<bool> {
        let mut tables = self.write()?;

        if tables.polls.remove(&id).is_none() {
            return Ok(false);
        }

        tables.candidates.retain(|_, (_, c)| c.poll_id != id);
        tables.candidate_names.retain(|(poll_id, _)| *poll_id != id);
        tables.remove_ballots_where(|b| b.poll_id == id);

        Ok(true)
    }
}

impl CandidateStore for MemoryStore {
    fn insert_candidate(&self, candidate: Candidate) -> Result<Candidate> {
        let mut tables = self.write()?;

        if !tables.polls.contains_key(&candidate.poll_id) {
            return Err(Error::not_found("poll", candidate.poll_id));
        }

        if !tables
            .candidate_names
            .insert((candidate.poll_id, candidate.name.clone()))
        {
            return Err(Error::conflict(CANDIDATE_NAME_UNIQUE));
        }

        let seq = tables.sequence();
        tables
            .candidates
            .insert(candidate.id, (seq, candidate.clone()));

        Ok(candidate)
    }

    fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>> {
        Ok(self.read()?.candidates.get(&id).map(|(_, c)| c.clone()))
    }

    fn list_candidates(&self, poll_id: PollId) -> Result<Vec<Candidate>> {
        let tables = self.read()?;
        let mut rows: Vec<&(u64, Candidate)> = tables
            .candidates
            .values()
            .filter(|(_, c)| c.poll_id == poll_id)
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, c)| c.clone()).collect())
    }

    fn update_candidate(&self, candidate: &Candidate) -> Result<()> {
        let mut tables = self.write()?;

        let existing = tables
            .candidates
            .get(&candidate.id)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| Error::not_found("candidate", candidate.id))?;

        if existing.poll_id != candidate.poll_id {
            return Err(Error::validation("poll_id", "a candidate cannot move between polls"));
        }

        if existing.name != candidate.name {
            let key = (candidate.poll_id, candidate.name.clone());
            if tables.candidate_names.contains(&key) {
                return Err(Error::conflict(CANDIDATE_NAME_UNIQUE));
            }
            tables
                .candidate_names
                .remove(&(existing.poll_id, existing.name.clone()));
            tables.candidate_names.insert(key);
        }

        if let Some(row) = tables.candidates.get_mut(&candidate.id) {
            row.1 = candidate.clone();
        }
        Ok(())
    }

    fn delete_candidate(&self, id: CandidateId) -> Result<bool> {
        let mut tables = self.write()?;

        let Some((_, candidate)) = tables.candidates.remove(&id) else {
            return Ok(false);
        };
        tables
            .candidate_names
            .remove(&(candidate.poll_id, candidate.name));
        tables.remove_ballots_where(|b| b.candidate_id == id);

        Ok(true)
    }
}

impl BallotStore for MemoryStore {
    fn cast(
        &self,
        voter_id: VoterId,
        poll_id: PollId,
        candidate_id: CandidateId,
        cast_at: DateTime<Utc>,
    ) -> Result<Ballot> {
        let mut tables = self.write()?;

        if !tables.voters.contains_key(&voter_id) {
            return Err(Error::not_found("voter", voter_id));
        }
        if !tables.polls.contains_key(&poll_id) {
            return Err(Error::not_found("poll", poll_id));
        }
        match tables.candidates.get(&candidate_id) {
            None => return Err(Error::not_found("candidate", candidate_id)),
            Some((_, c)) if c.poll_id != poll_id => {
                return Err(Ineligibility::CandidateNotInPoll.into());
            }
            Some(_) => {}
        }

        let ballot_id = Uuid::new_v4();
        match tables.ballots_by_voter_poll.entry((voter_id, poll_id)) {
            Entry::Occupied(_) => return Err(Error::conflict(BALLOT_UNIQUE)),
            Entry::Vacant(slot) => {
                slot.insert(ballot_id);
            }
        }

        let ballot = Ballot {
            id: ballot_id,
            voter_id,
            poll_id,
            candidate_id,
            cast_at,
            sequence: tables.sequence(),
        };
        tables.ballots.insert(ballot_id, ballot.clone());

        Ok(ballot)
    }

    fn has_voted(&self, voter_id: VoterId, poll_id: PollId) -> Result<bool> {
        Ok(self
            .read()?
            .ballots_by_voter_poll
            .contains_key(&(voter_id, poll_id)))
    }

    fn list_by_poll(&self, poll_id: PollId) -> Result<Vec<Ballot>> {
        Ok(self.read()?.sorted_ballots(|b| b.poll_id == poll_id))
    }

    fn list_by_voter(&self, voter_id: VoterId) -> Result<Vec<Ballot>> {
        Ok(self.read()?.sorted_ballots(|b| b.voter_id == voter_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PollWindow, Role};
    use chrono::Duration;

    fn seed() -> (MemoryStore, Poll, Candidate, Candidate) {
        let store = MemoryStore::new();
        let poll = store
            .insert_poll(Poll::new("Mayor", "", PollWindow::unbounded(), Utc::now()))
            .unwrap();
        let alice = store
            .insert_candidate(Candidate::new(poll.id, "Alice", "incumbent"))
            .unwrap();
        let bob = store
            .insert_candidate(Candidate::new(poll.id, "Bob", "challenger"))
            .unwrap();
        (store, poll, alice, bob)
    }

    fn voter(store: &MemoryStore, phone: &str) -> Voter {
        store
            .insert_voter(Voter::new("V", "V", phone, String::new(), Role::Voter, Utc::now()))
            .unwrap()
    }

    #[test]
    fn test_phone_uniqueness() {
        let store = MemoryStore::new();
        voter(&store, "+998900000001");
        let dup = store.insert_voter(Voter::new(
            "X",
            "Y",
            "+998900000001",
            String::new(),
            Role::Voter,
            Utc::now(),
        ));
        assert!(dup.unwrap_err().is_conflict_on(VOTER_PHONE_UNIQUE));
    }

    #[test]
    fn test_phone_change_updates_index() {
        let store = MemoryStore::new();
        let mut v = voter(&store, "+998900000001");
        let other = voter(&store, "+998900000002");

        v.phone = other.phone.clone();
        assert!(store.update_voter(&v).unwrap_err().is_conflict_on(VOTER_PHONE_UNIQUE));

        v.phone = "+998900000003".to_string();
        store.update_voter(&v).unwrap();
        assert!(store.voter_by_phone("+998900000001").unwrap().is_none());
        assert_eq!(store.voter_by_phone("+998900000003").unwrap().unwrap().id, v.id);
    }

    #[test]
    fn test_candidate_name_unique_per_poll() {
        let (store, poll, _, _) = seed();
        let dup = store.insert_candidate(Candidate::new(poll.id, "Alice", ""));
        assert!(dup.unwrap_err().is_conflict_on(CANDIDATE_NAME_UNIQUE));

        let other = store
            .insert_poll(Poll::new("Council", "", PollWindow::unbounded(), Utc::now()))
            .unwrap();
        assert!(store.insert_candidate(Candidate::new(other.id, "Alice", "")).is_ok());
    }

    #[test]
    fn test_roster_keeps_creation_order() {
        let (store, poll, alice, bob) = seed();
        let names: Vec<_> = store
            .list_candidates(poll.id)
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(names, vec![alice.id, bob.id]);
    }

    #[test]
    fn test_cast_enforces_uniqueness() {
        let (store, poll, alice, bob) = seed();
        let v = voter(&store, "+998900000001");

        store.cast(v.id, poll.id, alice.id, Utc::now()).unwrap();
        let second = store.cast(v.id, poll.id, bob.id, Utc::now());
        assert!(second.unwrap_err().is_conflict_on(BALLOT_UNIQUE));
        assert_eq!(store.list_by_poll(poll.id).unwrap().len(), 1);
    }

    #[test]
    fn test_cast_checks_foreign_keys() {
        let (store, poll, alice, _) = seed();
        let v = voter(&store, "+998900000001");

        assert!(matches!(
            store.cast(Uuid::new_v4(), poll.id, alice.id, Utc::now()),
            Err(Error::NotFound { entity: "voter", .. })
        ));
        assert!(matches!(
            store.cast(v.id, poll.id, Uuid::new_v4(), Utc::now()),
            Err(Error::NotFound { entity: "candidate", .. })
        ));

        let other = store
            .insert_poll(Poll::new("Other", "", PollWindow::unbounded(), Utc::now()))
            .unwrap();
        assert!(matches!(
            store.cast(v.id, other.id, alice.id, Utc::now()),
            Err(Error::Ineligible(Ineligibility::CandidateNotInPoll))
        ));
    }

    #[test]
    fn test_listing_orders_by_cast_time() {
        let (store, poll, alice, bob) = seed();
        let t0 = Utc::now();
        let a = voter(&store, "+998900000001");
        let b = voter(&store, "+998900000002");

        store.cast(a.id, poll.id, alice.id, t0 + Duration::seconds(10)).unwrap();
        store.cast(b.id, poll.id, bob.id, t0).unwrap();

        let ballots = store.list_by_poll(poll.id).unwrap();
        assert_eq!(ballots[0].voter_id, b.id);
        assert_eq!(ballots[1].voter_id, a.id);
    }

    #[test]
    fn test_cascading_deletes() {
        let (store, poll, alice, bob) = seed();
        let a = voter(&store, "+998900000001");
        let b = voter(&store, "+998900000002");
        store.cast(a.id, poll.id, alice.id, Utc::now()).unwrap();
        store.cast(b.id, poll.id, bob.id, Utc::now()).unwrap();

        assert!(store.delete_candidate(alice.id).unwrap());
        assert_eq!(store.list_by_poll(poll.id).unwrap().len(), 1);
        assert!(!store.has_voted(a.id, poll.id).unwrap());

        assert!(store.delete_voter(b.id).unwrap());
        assert_eq!(store.ballot_count().unwrap(), 0);

        store.cast(a.id, poll.id, bob.id, Utc::now()).unwrap();
        assert!(store.delete_poll(poll.id).unwrap());
        assert_eq!(store.ballot_count().unwrap(), 0);
        assert!(store.candidate(bob.id).unwrap().is_none());
        assert!(!store.delete_poll(poll.id).unwrap());
    }

    #[test]
    fn test_candidate_rename_and_no_move() {
        let (store, poll, mut alice, _) = seed();

        alice.name = "Bob".to_string();
        assert!(store.update_candidate(&alice).unwrap_err().is_conflict_on(CANDIDATE_NAME_UNIQUE));

        alice.name = "Alicia".to_string();
        store.update_candidate(&alice).unwrap();
        assert!(store.insert_candidate(Candidate::new(poll.id, "Alice", "")).is_ok());

        alice.poll_id = Uuid::new_v4();
        assert!(matches!(
            store.update_candidate(&alice),
            Err(Error::Validation { .. })
        ));
    }
}
