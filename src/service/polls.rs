//! Staff poll management and public poll reads

use super::VotingSystem;
use crate::api::{
    CandidateRef, CandidateVotes, CreateCandidateRequest, CreatePollRequest, FinishedPoll,
    MessageResponse, PollDetail, PollSummary, UpdateCandidateRequest, UpdatePollRequest,
    VoteBreakdown,
};
use crate::lifecycle::{self, PollState};
use crate::store::Store;
use crate::tally::{Tally, TallyEngine};
use crate::types::{Candidate, CandidateId, Poll, PollId, Voter};
use crate::{Error, Result};

impl<S: Store> VotingSystem<S> {
    fn load_poll(&self, id: PollId) -> Result<Poll> {
        self.store.poll(id)?.ok_or_else(|| Error::not_found("poll", id))
    }

    fn load_candidate(&self, id: CandidateId) -> Result<Candidate> {
        self.store
            .candidate(id)?
            .ok_or_else(|| Error::not_found("candidate", id))
    }

    fn tally_of(&self, poll_id: PollId) -> Result<Tally> {
        TallyEngine::new(self.store.as_ref()).tally_known(poll_id)
    }

    pub fn create_poll(&self, staff: &Voter, req: &CreatePollRequest) -> Result<Poll> {
        self.require_staff(staff)?;
        req.validate()?;

        let poll = self.store.insert_poll(Poll::new(
            req.title.trim(),
            req.description.trim(),
            req.window(),
            self.now(),
        ))?;

        tracing::info!("📋 Poll created: poll={}, by={}", poll.id, staff.id);
        Ok(poll)
    }

    /// Partial update; refused once the poll has closed
    pub fn update_poll(
        &self,
        staff: &Voter,
        poll_id: PollId,
        req: &UpdatePollRequest,
    ) -> Result<Poll> {
        self.require_staff(staff)?;
        req.validate()?;

        let mut poll = self.load_poll(poll_id)?;
        if poll.is_closed(self.now()) {
            return Err(Error::PollClosed);
        }

        let window = req.apply_window(&poll.window);
        lifecycle::validate_window(&window)?;

        if let Some(title) = &req.title {
            poll.title = title.trim().to_string();
        }
        if let Some(description) = &req.description {
            poll.description = description.trim().to_string();
        }
        poll.window = window;
        self.store.update_poll(&poll)?;

        tracing::info!("📋 Poll updated: poll={}, by={}", poll.id, staff.id);
        Ok(poll)
    }

    /// Delete a poll with its roster and ballots, in any state
    pub fn delete_poll(&self, staff: &Voter, poll_id: PollId) -> Result<MessageResponse> {
        self.require_staff(staff)?;
        if !self.store.delete_poll(poll_id)? {
            return Err(Error::not_found("poll", poll_id));
        }

        tracing::info!("🗑️  Poll deleted: poll={}, by={}", poll_id, staff.id);
        Ok(MessageResponse::new("Poll deleted"))
    }

    pub fn create_candidate(
        &self,
        staff: &Voter,
        req: &CreateCandidateRequest,
    ) -> Result<Candidate> {
        self.require_staff(staff)?;
        let poll_id = req.validate()?;

        let poll = self.load_poll(poll_id)?;
        lifecycle::ensure_roster_mutable(&poll, self.now())?;

        let candidate = self
            .store
            .insert_candidate(Candidate::new(poll.id, req.name.trim(), req.info.trim()))?;

        tracing::info!(
            "👤 Candidate added: candidate={}, poll={}, by={}",
            candidate.id,
            poll.id,
            staff.id
        );
        Ok(candidate)
    }

    pub fn update_candidate(
        &self,
        staff: &Voter,
        candidate_id: CandidateId,
        req: &UpdateCandidateRequest,
    ) -> Result<Candidate> {
        self.require_staff(staff)?;
        req.validate()?;

        let mut candidate = self.load_candidate(candidate_id)?;
        let poll = self.load_poll(candidate.poll_id)?;
        lifecycle::ensure_roster_mutable(&poll, self.now())?;

        if let Some(name) = &req.name {
            candidate.name = name.trim().to_string();
        }
        if let Some(info) = &req.info {
            candidate.info = info.trim().to_string();
        }
        self.store.update_candidate(&candidate)?;

        tracing::info!(
            "👤 Candidate updated: candidate={}, poll={}, by={}",
            candidate.id,
            poll.id,
            staff.id
        );
        Ok(candidate)
    }

    pub fn delete_candidate(
        &self,
        staff: &Voter,
        candidate_id: CandidateId,
    ) -> Result<MessageResponse> {
        self.require_staff(staff)?;

        let candidate = self.load_candidate(candidate_id)?;
        let poll = self.load_poll(candidate.poll_id)?;
        lifecycle::ensure_roster_mutable(&poll, self.now())?;

        self.store.delete_candidate(candidate_id)?;

        tracing::info!(
            "🗑️  Candidate deleted: candidate={}, poll={}, by={}",
            candidate_id,
            poll.id,
            staff.id
        );
        Ok(MessageResponse::new("Candidate deleted"))
    }

    /// Every poll with its computed state and roster
    pub fn list_polls(&self) -> Result<Vec<PollSummary>> {
        let now = self.now();
        self.store
            .list_polls()?
            .into_iter()
            .map(|poll| -> Result<PollSummary> {
                let candidates = self
                    .store
                    .list_candidates(poll.id)?
                    .iter()
                    .map(CandidateRef::from)
                    .collect();
                Ok(PollSummary {
                    id: poll.id,
                    title: poll.title,
                    description: poll.description,
                    start: poll.window.start(),
                    end: poll.window.end(),
                    state: PollState::at(&poll.window, now),
                    candidates,
                })
            })
            .collect()
    }

    /// Live results: the whole roster with current vote counts
    pub fn poll_detail(&self, poll_id: PollId) -> Result<PollDetail> {
        let poll = self.load_poll(poll_id)?;
        let candidates = self.candidate_votes(&poll)?;

        Ok(PollDetail {
            id: poll.id,
            title: poll.title,
            description: poll.description,
            start: poll.window.start(),
            end: poll.window.end(),
            candidates,
        })
    }

    /// Roster of a poll with vote counts
    pub fn poll_candidates(&self, poll_id: PollId) -> Result<Vec<CandidateVotes>> {
        let poll = self.load_poll(poll_id)?;
        self.candidate_votes(&poll)
    }

    fn candidate_votes(&self, poll: &Poll) -> Result<Vec<CandidateVotes>> {
        let tally = self.tally_of(poll.id)?;
        Ok(self
            .store
            .list_candidates(poll.id)?
            .into_iter()
            .map(|c| CandidateVotes {
                votes: tally.votes_for(c.id),
                id: c.id,
                name: c.name,
                info: c.info,
            })
            .collect())
    }

    pub fn poll_votes(&self, poll_id: PollId) -> Result<VoteBreakdown> {
        Ok(TallyEngine::new(self.store.as_ref()).tally(poll_id)?.breakdown())
    }

    /// Summaries of every poll whose window has ended
    pub fn finished_polls(&self) -> Result<Vec<FinishedPoll>> {
        let polls = self.store.list_polls()?;
        lifecycle::finished(&polls, self.now())
            .into_iter()
            .map(|poll| -> Result<FinishedPoll> {
                Ok(self.tally_of(poll.id)?.finished_summary(poll))
            })
            .collect()
    }
}
