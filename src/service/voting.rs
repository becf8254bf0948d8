//! Casting ballots and reading a voter's own history

use super::VotingSystem;
use crate::api::{MyVote, VoteRequest};
use crate::eligibility::{self, Ineligibility};
use crate::store::{BALLOT_UNIQUE, Store};
use crate::tally::{Tally, TallyEngine};
use crate::types::{Ballot, PollId, Voter};
use crate::{Error, Result};
use std::collections::HashMap;

impl<S: Store> VotingSystem<S> {
    /// Record `voter`'s ballot
    ///
    /// The eligibility gate catches the ordinary refusals. A concurrent
    /// request that slips past the prior-ballot check loses at the store's
    /// uniqueness constraint and is reported as `AlreadyVoted` as well.
    pub fn cast_vote(&self, voter: &Voter, req: &VoteRequest) -> Result<Ballot> {
        let (poll_id, candidate_id) = req.validate()?;
        let now = self.now();

        let poll = self
            .store
            .poll(poll_id)?
            .ok_or_else(|| Error::not_found("poll", poll_id))?;
        let candidate = self
            .store
            .candidate(candidate_id)?
            .ok_or_else(|| Error::not_found("candidate", candidate_id))?;

        let verdict =
            eligibility::can_vote(self.store.as_ref(), &poll, &candidate, voter.id, now)?;
        if let Err(e) = verdict.into_result() {
            tracing::warn!("Vote refused: voter={}, poll={}: {}", voter.id, poll.id, e);
            return Err(e);
        }

        let ballot = self
            .store
            .cast(voter.id, poll.id, candidate.id, now)
            .map_err(|e| {
                if e.is_conflict_on(BALLOT_UNIQUE) {
                    tracing::warn!(
                        "Duplicate ballot lost the race: voter={}, poll={}",
                        voter.id,
                        poll.id
                    );
                    Error::Ineligible(Ineligibility::AlreadyVoted)
                } else {
                    e
                }
            })?;

        tracing::info!(
            "🗳️  Ballot recorded: poll={}, candidate={}, seq={}",
            ballot.poll_id,
            ballot.candidate_id,
            ballot.sequence
        );

        Ok(ballot)
    }

    /// The voter's ballots, oldest first, with poll and candidate names
    pub fn my_votes(&self, voter: &Voter) -> Result<Vec<MyVote>> {
        let ballots = self.store.list_by_voter(voter.id)?;
        let mut titles: HashMap<PollId, String> = HashMap::new();
        let mut votes = Vec::with_capacity(ballots.len());

        for ballot in ballots {
            let poll = match titles.get(&ballot.poll_id) {
                Some(title) => title.clone(),
                None => {
                    let title = self
                        .store
                        .poll(ballot.poll_id)?
                        .map(|p| p.title)
                        .unwrap_or_default();
                    titles.insert(ballot.poll_id, title.clone());
                    title
                }
            };
            let candidate = self
                .store
                .candidate(ballot.candidate_id)?
                .map(|c| c.name)
                .unwrap_or_default();

            votes.push(MyVote {
                poll,
                candidate,
                voted_at: ballot.cast_at,
            });
        }

        Ok(votes)
    }

    /// Aggregated counts and winner of one poll
    pub fn tally(&self, poll_id: PollId) -> Result<Tally> {
        TallyEngine::new(self.store.as_ref()).tally(poll_id)
    }
}
