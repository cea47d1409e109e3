//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is recoverable by the caller: retry with fresh state or
/// surface the failure to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("not found")]
    NotFound,

    /// Stale aggregate version (optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The user already has an active suggestion session.
    #[error("session conflict: {0}")]
    SessionConflict(String),

    /// A transition was attempted out of a terminal session state.
    #[error("invalid state transition: cannot {attempted} a session that is {from}")]
    InvalidStateTransition { from: String, attempted: String },

    /// A decision arrived after the session timed out.
    #[error("stale suggestion: {0}")]
    StaleSuggestion(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn session_conflict(msg: impl Into<String>) -> Self {
        Self::SessionConflict(msg.into())
    }

    pub fn invalid_transition(from: impl Into<String>, attempted: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            from: from.into(),
            attempted: attempted.into(),
        }
    }

    pub fn stale(msg: impl Into<String>) -> Self {
        Self::StaleSuggestion(msg.into())
    }
}
