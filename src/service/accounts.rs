//! Registration, verification, login and profile management

use super::VotingSystem;
use crate::api::{
    AccessTokenResponse, ChangeNameRequest, ForgotPasswordConfirmRequest, LoginRequest,
    MessageResponse, PhoneRequest, RegisterOutcome, RegisterRequest, ResetPasswordRequest,
    VerifyNewPhoneRequest, VerifyOtpRequest, VoterProfile, validate_phone,
};
use crate::auth::{OtpKind, OtpPurpose, TokenKind, TokenPair};
use crate::notify;
use crate::store::{Store, VOTER_PHONE_UNIQUE};
use crate::types::{Role, Voter};
use crate::{Error, Result};

const BAD_CREDENTIALS: &str = "invalid phone number or password";

impl<S: Store> VotingSystem<S> {
    fn voter_for_phone(&self, phone: &str) -> Result<Voter> {
        self.store
            .voter_by_phone(phone.trim())?
            .ok_or_else(|| Error::not_found("voter", phone.trim()))
    }

    /// Issue a code for `purpose` and hand it to the notifier
    fn send_code(&self, voter: &Voter, to_phone: &str, purpose: OtpPurpose) -> Result<()> {
        let issued = self.otp.issue(voter.id, purpose, self.now())?;
        notify::dispatch(self.notifier.as_ref(), to_phone, &issued.code);
        Ok(())
    }

    /// Create an unverified account, or refresh a pending one
    pub fn register(&self, req: &RegisterRequest) -> Result<RegisterOutcome> {
        req.validate(&self.phone_pattern)?;

        let role = req.role.unwrap_or_default();
        if role == Role::Staff && !self.config.registration.allow_staff_registration {
            return Err(Error::forbidden("staff accounts cannot self-register"));
        }

        let phone = req.phone.trim();
        let password_hash = self.hasher.hash(&req.password)?;

        let (voter, outcome) = match self.store.voter_by_phone(phone)? {
            Some(existing) if existing.phone_verified => {
                return Err(Error::conflict(VOTER_PHONE_UNIQUE));
            }
            Some(mut pending) => {
                pending.first_name = req.first_name.trim().to_string();
                pending.last_name = req.last_name.trim().to_string();
                pending.password_hash = password_hash;
                pending.role = role;
                self.store.update_voter(&pending)?;
                (pending, RegisterOutcome::Resent)
            }
            None => {
                let voter = self.store.insert_voter(Voter::new(
                    req.first_name.trim(),
                    req.last_name.trim(),
                    phone,
                    password_hash,
                    role,
                    self.now(),
                ))?;
                (voter, RegisterOutcome::Created)
            }
        };

        self.send_code(&voter, &voter.phone, OtpPurpose::VerifyPhone)?;
        tracing::info!("📝 Registration {:?}: voter={}", outcome, voter.id);

        Ok(outcome)
    }

    /// Confirm phone ownership with the registration code
    pub fn verify_otp(&self, req: &VerifyOtpRequest) -> Result<MessageResponse> {
        req.validate()?;
        let mut voter = self.voter_for_phone(&req.phone)?;
        if voter.phone_verified {
            return Err(Error::validation("phone", "phone number is already verified"));
        }

        self.otp
            .verify(voter.id, OtpKind::VerifyPhone, req.otp.trim(), self.now())?;
        voter.phone_verified = true;
        self.store.update_voter(&voter)?;

        Ok(MessageResponse::new("Phone number verified successfully"))
    }

    pub fn resend_otp(&self, req: &PhoneRequest) -> Result<MessageResponse> {
        req.validate()?;
        let voter = self.voter_for_phone(&req.phone)?;
        if voter.phone_verified {
            return Err(Error::validation("phone", "phone number is already verified"));
        }

        self.send_code(&voter, &voter.phone, OtpPurpose::VerifyPhone)?;
        Ok(MessageResponse::new("A new verification code has been sent"))
    }

    /// Exchange phone and password for a token pair
    ///
    /// Unknown phone, wrong password, unverified phone and inactive account
    /// all produce the same error.
    pub fn login(&self, req: &LoginRequest) -> Result<TokenPair> {
        req.validate()?;

        let voter = self
            .store
            .voter_by_phone(req.phone.trim())?
            .filter(|v| v.is_active && v.phone_verified)
            .filter(|v| self.hasher.verify(&req.password, &v.password_hash))
            .ok_or_else(|| {
                tracing::warn!("Login refused for {}", notify::mask_phone(req.phone.trim()));
                Error::unauthorized(BAD_CREDENTIALS)
            })?;

        self.tokens.issue_pair(voter.id, self.now())
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<AccessTokenResponse> {
        let (access, expires_at) = self.tokens.refresh(refresh_token.trim(), self.now())?;
        Ok(AccessTokenResponse { access, expires_at })
    }

    /// Resolve an `Authorization` value (with or without the `Bearer ` prefix)
    pub fn authenticate(&self, bearer: &str) -> Result<Voter> {
        let raw = bearer.trim();
        let raw = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
        if raw.is_empty() {
            return Err(Error::unauthorized("missing bearer token"));
        }

        let voter_id = self.tokens.validate(raw, TokenKind::Access, self.now())?;
        self.store
            .voter(voter_id)?
            .filter(|v| v.is_active)
            .ok_or_else(|| Error::unauthorized("account no longer exists"))
    }

    /// Revoke every token of the bearer's account
    pub fn logout(&self, bearer: &str) -> Result<MessageResponse> {
        let voter = self.authenticate(bearer)?;
        self.tokens.revoke_voter(voter.id, self.now())?;
        Ok(MessageResponse::new("Logged out"))
    }

    pub fn reset_password(
        &self,
        voter: &Voter,
        req: &ResetPasswordRequest,
    ) -> Result<MessageResponse> {
        req.validate()?;
        let mut voter = self.load_voter(voter.id)?;

        if !self.hasher.verify(&req.old_password, &voter.password_hash) {
            return Err(Error::validation("old_password", "old password is incorrect"));
        }

        voter.password_hash = self.hasher.hash(&req.new_password)?;
        self.store.update_voter(&voter)?;
        self.tokens.revoke_voter(voter.id, self.now())?;

        Ok(MessageResponse::new("Password changed successfully"))
    }

    pub fn forgot_password(&self, req: &PhoneRequest) -> Result<MessageResponse> {
        req.validate()?;
        let voter = self.voter_for_phone(&req.phone)?;
        self.send_code(&voter, &voter.phone, OtpPurpose::ResetPassword)?;
        Ok(MessageResponse::new("A password reset code has been sent"))
    }

    pub fn forgot_password_confirm(
        &self,
        req: &ForgotPasswordConfirmRequest,
    ) -> Result<MessageResponse> {
        req.validate()?;
        let mut voter = self.voter_for_phone(&req.phone)?;

        self.otp
            .verify(voter.id, OtpKind::ResetPassword, req.otp.trim(), self.now())?;
        voter.password_hash = self.hasher.hash(&req.new_password)?;
        self.store.update_voter(&voter)?;
        self.tokens.revoke_voter(voter.id, self.now())?;

        Ok(MessageResponse::new("Password has been reset"))
    }

    pub fn user_info(&self, voter: &Voter) -> Result<VoterProfile> {
        Ok(VoterProfile::from(&self.load_voter(voter.id)?))
    }

    pub fn change_name(&self, voter: &Voter, req: &ChangeNameRequest) -> Result<VoterProfile> {
        req.validate()?;
        let mut voter = self.load_voter(voter.id)?;

        if let Some(first) = &req.first_name {
            voter.first_name = first.trim().to_string();
        }
        if let Some(last) = &req.last_name {
            voter.last_name = last.trim().to_string();
        }
        self.store.update_voter(&voter)?;

        Ok(VoterProfile::from(&voter))
    }

    /// Start a phone change; the code goes to the new number
    pub fn change_phone(&self, voter: &Voter, req: &PhoneRequest) -> Result<MessageResponse> {
        let new_phone = validate_phone("phone", &req.phone, &self.phone_pattern)?;
        let voter = self.load_voter(voter.id)?;

        if new_phone == voter.phone {
            return Err(Error::validation("phone", "this is already your phone number"));
        }
        if self.store.voter_by_phone(&new_phone)?.is_some() {
            return Err(Error::conflict(VOTER_PHONE_UNIQUE));
        }

        self.send_code(
            &voter,
            &new_phone,
            OtpPurpose::ChangePhone {
                new_phone: new_phone.clone(),
            },
        )?;
        Ok(MessageResponse::new("A verification code has been sent to the new number"))
    }

    /// Apply the pending phone change
    pub fn verify_new_phone(
        &self,
        voter: &Voter,
        req: &VerifyNewPhoneRequest,
    ) -> Result<VoterProfile> {
        if req.otp.trim().is_empty() {
            return Err(Error::validation("otp", "this field is required"));
        }

        let purpose = self
            .otp
            .verify(voter.id, OtpKind::ChangePhone, req.otp.trim(), self.now())?;
        let OtpPurpose::ChangePhone { new_phone } = purpose else {
            return Err(Error::validation("otp", "code is invalid or has expired"));
        };

        let mut voter = self.load_voter(voter.id)?;
        voter.phone = new_phone;
        voter.phone_verified = true;
        // The store rejects the number if someone claimed it meanwhile
        self.store.update_voter(&voter)?;

        tracing::info!("📱 Phone changed: voter={}", voter.id);
        Ok(VoterProfile::from(&voter))
    }

    /// Delete the account with its ballots, tokens and pending codes
    pub fn delete_account(&self, voter: &Voter) -> Result<MessageResponse> {
        if !self.store.delete_voter(voter.id)? {
            return Err(Error::not_found("voter", voter.id));
        }
        self.tokens.revoke_voter(voter.id, self.now())?;
        self.otp.discard(voter.id)?;

        tracing::info!("🗑️  Account deleted: voter={}", voter.id);
        Ok(MessageResponse::new("Account deleted"))
    }
}
