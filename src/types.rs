//! Error types for Passage

use std::fmt;
use thiserror::Error;

/// Errors surfaced by the release and access-control pipeline
#[derive(Error, Debug)]
pub enum PassageError {
    /// Persistence failures (MongoDB or the in-memory store)
    #[error("Database error: {0}")]
    Database(String),

    /// Lock configuration and credential-handling failures
    #[error("Auth error: {0}")]
    Auth(String),

    /// A well-formed access request that failed verification
    #[error("Access denied: {0}")]
    Denied(DenialReason),

    /// Record lookup failures
    #[error("Not found: {0}")]
    NotFound(String),

    /// Outbound letter delivery failures
    #[error("Notify error: {0}")]
    Notify(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why an access request was denied.
///
/// Checks run in a fixed order: executor relationship, release lock state,
/// unlock code, designated-executor match. The first failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// Requester has no accepted executor relationship with the owner
    NotAnExecutor,
    /// The owner has no locked release configured
    NotLocked,
    /// The unlock code did not match
    InvalidCode,
    /// The code matched but the requester is not the designated executor
    WrongExecutor,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::NotAnExecutor => write!(f, "requester is not an accepted executor"),
            DenialReason::NotLocked => write!(f, "no locked release is configured"),
            DenialReason::InvalidCode => write!(f, "unlock code does not match"),
            DenialReason::WrongExecutor => write!(f, "requester is not the designated executor"),
        }
    }
}

impl PassageError {
    /// The denial reason, when this error is a verification denial
    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            PassageError::Denied(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Convenience result type
pub type Result<T> = std::result::Result<T, PassageError>;
