//! Error handling for the voting backend

use crate::eligibility::Ineligibility;

/// Result type alias for the voting backend
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the voting backend
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or missing input
    #[error("Validation failed on `{field}`: {message}")]
    Validation { field: String, message: String },

    /// A poll, candidate or voter id did not resolve
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A cast attempt was refused by the eligibility gate
    #[error(transparent)]
    Ineligible(#[from] Ineligibility),

    /// Candidate roster mutation on a poll whose window has ended
    #[error("Poll is closed; its candidates can no longer be changed")]
    PollClosed,

    /// Missing or invalid credential
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Authenticated, but lacking the required role
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// A storage-level uniqueness constraint rejected the write
    #[error("Conflict on unique constraint {constraint}")]
    Conflict { constraint: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new validation error for one request field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a new unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a new forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a new uniqueness conflict
    pub fn conflict(constraint: impl Into<String>) -> Self {
        Self::Conflict {
            constraint: constraint.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code a router should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Ineligible(_) => 400,
            Self::PollClosed => 400,
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::Conflict { .. } => 400,
            Self::Serialization(_) => 400,
            Self::Internal { .. } => 500,
        }
    }

    /// True when the error is the storage constraint on `constraint`
    pub fn is_conflict_on(&self, constraint: &str) -> bool {
        matches!(self, Self::Conflict { constraint: c } if c == constraint)
    }
}

/// Convenience macros for creating specific error types
#[macro_export]
macro_rules! validation_error {
    ($field:expr, $msg:expr) => {
        $crate::Error::validation($field, $msg)
    };
    ($field:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::Error::validation($field, format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::Error::internal($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::internal(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::validation("phone", "required");
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.to_string(), "Validation failed on `phone`: required");

        let err = Error::not_found("poll", 42);
        assert!(matches!(err, Error::NotFound { entity: "poll", .. }));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::validation("x", "y").status_code(), 400);
        assert_eq!(Error::not_found("poll", 1).status_code(), 404);
        assert_eq!(Error::Ineligible(Ineligibility::Closed).status_code(), 400);
        assert_eq!(Error::PollClosed.status_code(), 400);
        assert_eq!(Error::unauthorized("token").status_code(), 401);
        assert_eq!(Error::forbidden("staff").status_code(), 403);
        assert_eq!(Error::conflict("voter(phone)").status_code(), 400);
        assert_eq!(Error::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_error_macros() {
        let err = validation_error!("title", "must not be blank");
        assert!(matches!(err, Error::Validation { .. }));

        let err = internal_error!("lock poisoned: {}", "polls");
        assert_eq!(err.to_string(), "Internal error: lock poisoned: polls");
    }

    #[test]
    fn test_conflict_matching() {
        let err = Error::conflict("ballot(voter_id, poll_id)");
        assert!(err.is_conflict_on("ballot(voter_id, poll_id)"));
        assert!(!err.is_conflict_on("voter(phone)"));
    }
}
