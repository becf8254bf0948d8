//! Tally engine
//!
//! Aggregates the ballots of one poll into per-candidate counts and
//! percentages and picks a winner. Both result views (the live vote
//! breakdown and the finished-poll summary) are rendered from the same
//! [`Tally`], so they can never disagree on who won.
//!
//! Winner rule: the candidates holding the maximum vote count form the tie
//! set; the member whose most recent ballot is latest wins. Ballots sharing
//! a timestamp are ordered by the store's insertion sequence. No ballots, no
//! winner.

use crate::store::{BallotStore, CandidateStore, PollStore};
use crate::types::{Ballot, Candidate, CandidateId, Poll, PollId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Accumulated votes for one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub candidate_id: CandidateId,
    pub votes: u64,
    /// Order key of this candidate's most recent ballot
    pub latest: (DateTime<Utc>, u64),
}

/// Result of scanning all ballots of a poll
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    pub poll_id: PollId,
    pub total_votes: u64,
    /// Only candidates with at least one ballot, in order of their first ballot
    pub standings: Vec<Standing>,
    roster: Vec<Candidate>,
}

impl Tally {
    /// Scan `ballots` (any order) against `roster`
    ///
    /// Ballots for other polls or for candidates missing from the roster are
    /// ignored; with cascading deletes in the store neither can occur.
    pub fn compute(poll_id: PollId, roster: &[Candidate], ballots: &[Ballot]) -> Self {
        let mut ordered: Vec<&Ballot> = ballots.iter().filter(|b| b.poll_id == poll_id).collect();
        ordered.sort_by_key(|b| b.order_key());

        let on_roster: HashMap<CandidateId, &Candidate> =
            roster.iter().map(|c| (c.id, c)).collect();

        let mut standings: Vec<Standing> = Vec::new();
        let mut index: HashMap<CandidateId, usize> = HashMap::new();
        let mut total_votes = 0u64;

        for ballot in ordered {
            if !on_roster.contains_key(&ballot.candidate_id) {
                tracing::warn!(
                    "Ignoring ballot {} for unknown candidate {}",
                    ballot.id,
                    ballot.candidate_id
                );
                continue;
            }

            total_votes += 1;
            let slot = *index.entry(ballot.candidate_id).or_insert_with(|| {
                standings.push(Standing {
                    candidate_id: ballot.candidate_id,
                    votes: 0,
                    latest: ballot.order_key(),
                });
                standings.len() - 1
            });

            let standing = &mut standings[slot];
            standing.votes += 1;
            // Ascending scan: the last ballot seen is the latest one
            standing.latest = ballot.order_key();
        }

        tracing::debug!(
            "Tallied poll={} total_votes={} candidates_with_votes={}",
            poll_id,
            total_votes,
            standings.len()
        );

        Self {
            poll_id,
            total_votes,
            standings,
            roster: roster.to_vec(),
        }
    }

    /// Votes received by `candidate_id` (zero when absent)
    pub fn votes_for(&self, candidate_id: CandidateId) -> u64 {
        self.standings
            .iter()
            .find(|s| s.candidate_id == candidate_id)
            .map_or(0, |s| s.votes)
    }

    /// Highest vote count, absent when there are no ballots
    pub fn max_votes(&self) -> Option<u64> {
        self.standings.iter().map(|s| s.votes).max()
    }

    /// Id of the winning candidate
    pub fn winner_id(&self) -> Option<CandidateId> {
        let max_votes = self.max_votes()?;
        self.standings
            .iter()
            .filter(|s| s.votes == max_votes)
            .max_by_key(|s| s.latest)
            .map(|s| s.candidate_id)
    }

    /// The winning candidate
    pub fn winner(&self) -> Option<&Candidate> {
        let id = self.winner_id()?;
        self.roster.iter().find(|c| c.id == id)
    }

    /// Live breakdown: zero-vote candidates omitted, first-ballot order
    pub fn breakdown(&self) -> VoteBreakdown {
        let candidates = self
            .standings
            .iter()
            .filter_map(|s| {
                let candidate = self.roster.iter().find(|c| c.id == s.candidate_id)?;
                Some(CandidateStats {
                    id: candidate.id,
                    name: candidate.name.clone(),
                    info: candidate.info.clone(),
                    votes: s.votes,
                    percent: percent(s.votes, self.total_votes),
                })
            })
            .collect();

        VoteBreakdown {
            total_votes: self.total_votes,
            candidates,
            winner: self.winner().map(CandidateRef::from),
        }
    }

    /// Finished-poll summary: whole roster in roster order, winner marked inline
    pub fn finished_summary(&self, poll: &Poll) -> FinishedPoll {
        let winner = self.winner_id();
        let candidates = self
            .roster
            .iter()
            .map(|candidate| {
                let votes = self.votes_for(candidate.id);
                FinishedCandidate {
                    id: candidate.id,
                    name: candidate.name.clone(),
                    info: candidate.info.clone(),
                    votes,
                    percentage: format_percentage(percent(votes, self.total_votes)),
                    winner: winner == Some(candidate.id),
                }
            })
            .collect();

        FinishedPoll {
            id: poll.id,
            title: poll.title.clone(),
            description: poll.description.clone(),
            end: poll.window.end(),
            total_votes: self.total_votes,
            candidates,
        }
    }
}

/// `votes / total * 100` rounded to two decimals; `0` when `total == 0`
pub fn percent(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = votes as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Two-decimal percentage string, e.g. `"75.00%"`
pub fn format_percentage(percent: f64) -> String {
    format!("{percent:.2}%")
}

/// Tally engine over a store
pub struct TallyEngine<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> TallyEngine<'a, S>
where
    S: PollStore + CandidateStore + BallotStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Tally one poll
    pub fn tally(&self, poll_id: PollId) -> Result<Tally> {
        if self.store.poll(poll_id)?.is_none() {
            return Err(Error::not_found("poll", poll_id));
        }
        self.tally_known(poll_id)
    }

    /// Tally a poll already known to exist
    pub fn tally_known(&self, poll_id: PollId) -> Result<Tally> {
        let roster = self.store.list_candidates(poll_id)?;
        let ballots = self.store.list_by_poll(poll_id)?;
        Ok(Tally::compute(poll_id, &roster, &ballots))
    }
}

/// Candidate identity as embedded in result payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRef {
    pub id: CandidateId,
    pub name: String,
    pub info: String,
}

impl From<&Candidate> for CandidateRef {
    fn from(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name.clone(),
            info: candidate.info.clone(),
        }
    }
}

/// Per-candidate line of the live breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStats {
    pub id: CandidateId,
    pub name: String,
    pub info: String,
    pub votes: u64,
    pub percent: f64,
}

/// Live vote breakdown of a poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteBreakdown {
    pub total_votes: u64,
    pub candidates: Vec<CandidateStats>,
    pub winner: Option<CandidateRef>,
}

/// Per-candidate line of a finished poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedCandidate {
    pub id: CandidateId,
    pub name: String,
    pub info: String,
    pub votes: u64,
    pub percentage: String,
    pub winner: bool,
}

/// Summary of a closed poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedPoll {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub end: Option<DateTime<Utc>>,
    pub total_votes: u64,
    pub candidates: Vec<FinishedCandidate>,
}
