//! Request and response schemas
//!
//! Every endpoint payload has an explicit schema. Required text fields
//! deserialize leniently (missing becomes empty) so that `validate` can
//! report a typed [`Error::Validation`] naming the offending field instead of
//! a generic decoding error.

use crate::lifecycle::PollState;
use crate::types::{CandidateId, PollId, PollWindow, Role, Voter, VoterId};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use crate::tally::{
    CandidateRef, CandidateStats, FinishedCandidate, FinishedPoll, VoteBreakdown,
};

/// Decode a JSON request body
pub fn parse<T: DeserializeOwned>(body: &str) -> Result<T> {
    Ok(serde_json::from_str(body)?)
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "this field is required"));
    }
    Ok(trimmed)
}

fn required_id(field: &str, value: Option<uuid::Uuid>) -> Result<uuid::Uuid> {
    value.ok_or_else(|| Error::validation(field, "this field is required"))
}

/// Check `phone` against the configured pattern
pub fn validate_phone(field: &str, phone: &str, pattern: &Regex) -> Result<String> {
    let phone = required(field, phone)?;
    if !pattern.is_match(phone) {
        return Err(Error::validation(
            field,
            "phone must start with +998 followed by 9 digits, e.g. +998901234567",
        ));
    }
    Ok(phone.to_string())
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl RegisterRequest {
    pub fn validate(&self, phone_pattern: &Regex) -> Result<()> {
        required("first_name", &self.first_name)?;
        required("last_name", &self.last_name)?;
        required("phone", &self.phone)?;
        required("password", &self.password)?;
        validate_phone("phone", &self.phone, phone_pattern)?;
        Ok(())
    }
}

/// Whether registration created an account or re-sent a code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    Resent,
}

impl RegisterOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            RegisterOutcome::Created => 201,
            RegisterOutcome::Resent => 200,
        }
    }

    pub fn message(&self) -> MessageResponse {
        match self {
            RegisterOutcome::Created => {
                MessageResponse::new("Registration successful. A verification code has been sent.")
            }
            RegisterOutcome::Resent => {
                MessageResponse::new("Phone number is not verified yet. A new code has been sent.")
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub otp: String,
}

impl VerifyOtpRequest {
    pub fn validate(&self) -> Result<()> {
        required("phone", &self.phone)?;
        required("otp", &self.otp)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhoneRequest {
    #[serde(default)]
    pub phone: String,
}

impl PhoneRequest {
    pub fn validate(&self) -> Result<()> {
        required("phone", &self.phone).map(|_| ())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        required("phone", &self.phone)?;
        required("password", &self.password)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub msg: String,
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<()> {
        required("old_password", &self.old_password)?;
        required("new_password", &self.new_password)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgotPasswordConfirmRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub otp: String,
    #[serde(default)]
    pub new_password: String,
}

impl ForgotPasswordConfirmRequest {
    pub fn validate(&self) -> Result<()> {
        required("phone", &self.phone)?;
        required("otp", &self.otp)?;
        required("new_password", &self.new_password)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeNameRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ChangeNameRequest {
    pub fn validate(&self) -> Result<()> {
        if self.first_name.is_none() && self.last_name.is_none() {
            return Err(Error::validation("first_name", "nothing to update"));
        }
        if let Some(first) = &self.first_name {
            required("first_name", first)?;
        }
        if let Some(last) = &self.last_name {
            required("last_name", last)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyNewPhoneRequest {
    #[serde(default)]
    pub otp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterProfile {
    pub id: VoterId,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: String,
    pub is_phone_verified: bool,
    pub is_active: bool,
    pub is_staff: bool,
}

impl From<&Voter> for VoterProfile {
    fn from(voter: &Voter) -> Self {
        Self {
            id: voter.id,
            first_name: voter.first_name.clone(),
            last_name: voter.last_name.clone(),
            phone: voter.phone.clone(),
            role: voter.role.label().to_string(),
            is_phone_verified: voter.phone_verified,
            is_active: voter.is_active,
            is_staff: voter.is_staff(),
        }
    }
}

// ---------------------------------------------------------------------------
// Polls and candidates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePollRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
}

impl CreatePollRequest {
    pub fn validate(&self) -> Result<()> {
        required("title", &self.title)?;
        required("description", &self.description)?;
        crate::lifecycle::validate_window(&self.window())
    }

    pub fn window(&self) -> PollWindow {
        PollWindow {
            start_date: self.start_date,
            start_time: self.start_time,
            end_date: self.end_date,
            end_time: self.end_time,
        }
    }
}

/// Partial poll update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePollRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
}

impl UpdatePollRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            required("title", title)?;
        }
        Ok(())
    }

    /// Overlay the present fields onto `window`
    pub fn apply_window(&self, window: &PollWindow) -> PollWindow {
        PollWindow {
            start_date: self.start_date.or(window.start_date),
            start_time: self.start_time.or(window.start_time),
            end_date: self.end_date.or(window.end_date),
            end_time: self.end_time.or(window.end_time),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCandidateRequest {
    pub poll_id: Option<PollId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub info: String,
}

impl CreateCandidateRequest {
    pub fn validate(&self) -> Result<PollId> {
        let poll_id = required_id("poll_id", self.poll_id)?;
        required("name", &self.name)?;
        Ok(poll_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCandidateRequest {
    pub name: Option<String>,
    pub info: Option<String>,
}

impl UpdateCandidateRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            required("name", name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSummary {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub state: PollState,
    pub candidates: Vec<CandidateRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateVotes {
    pub id: CandidateId,
    pub name: String,
    pub info: String,
    pub votes: u64,
}

/// Live per-poll results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollDetail {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub candidates: Vec<CandidateVotes>,
}

// ---------------------------------------------------------------------------
// Voting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteRequest {
    pub poll_id: Option<PollId>,
    pub candidate_id: Option<CandidateId>,
}

impl VoteRequest {
    pub fn validate(&self) -> Result<(PollId, CandidateId)> {
        Ok((
            required_id("poll_id", self.poll_id)?,
            required_id("candidate_id", self.candidate_id)?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyVote {
    pub poll: String,
    pub candidate: String,
    pub voted_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Structured error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        match err {
            Error::Validation { field, message } => Self {
                error: message.clone(),
                field: Some(field.clone()),
            },
            // A lost uniqueness race on ballots reads exactly like the pre-check
            Error::Conflict { constraint } if constraint == crate::store::BALLOT_UNIQUE => Self {
                error: crate::eligibility::Ineligibility::AlreadyVoted.to_string(),
                field: None,
            },
            Error::Internal { .. } => Self {
                error: "Internal server error".to_string(),
                field: None,
            },
            other => Self {
                error: other.to_string(),
                field: None,
            },
        }
    }
}

/// Status code and body for a failed request
pub fn error_response(err: &Error) -> (u16, ErrorBody) {
    (err.status_code(), ErrorBody::from(err))
}
