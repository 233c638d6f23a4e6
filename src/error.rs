//! Repository error surface
//!
//! Every failure a lifecycle operation can raise towards the LDP layer.
//! Any of these occurring inside a transaction triggers a rollback: no
//! partial state persists and no event is emitted.

use thiserror::Error;

/// Which position of a payload carried a forbidden server-managed term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermPosition {
    Subject,
    Predicate,
    RdfType,
}

impl std::fmt::Display for TermPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TermPosition::Subject => write!(f, "subject"),
            TermPosition::Predicate => write!(f, "predicate"),
            TermPosition::RdfType => write!(f, "type"),
        }
    }
}

/// Repository errors
#[derive(Error, Debug)]
pub enum RepoError {
    /// Strict read of an absent resource
    #[error("Resource not found: /{uid}")]
    NotFound { uid: String },

    /// Access to a tombstoned resource or one under a tombstoned ancestor
    #[error("Resource /{uid} is a tombstone (buried {created:?})")]
    Tombstone { uid: String, created: Option<String> },

    /// Payload carries subjects other than the resource URN
    #[error("Provided graph for /{uid} has offending subject {subject}")]
    SingleSubject { subject: String, uid: String },

    /// Strict referential integrity failed
    #[error("Object {0} does not exist in the repository")]
    RefIntViolation(String),

    /// Payload uses forbidden server-managed terms under strict handling
    #[error("Payload uses server-managed {position} terms: {terms:?}")]
    ServerManagedTerm {
        terms: Vec<String>,
        position: TermPosition,
    },

    /// Operation not applicable to the resource in its current state
    #[error("Invalid resource: /{uid}: {reason}")]
    InvalidResource { uid: String, reason: String },

    /// Malformed triple in a payload
    #[error("Invalid triple: {0}")]
    InvalidTriple(String),

    /// Underlying triple store failure; aborts the enclosing transaction
    #[error("Store error: {0}")]
    Store(String),

    /// Payload parse error
    #[error("Parse error: {0}")]
    Parse(String),
}

impl RepoError {
    pub fn not_found(uid: impl Into<String>) -> Self {
        RepoError::NotFound { uid: uid.into() }
    }

    pub fn invalid_resource(uid: impl Into<String>, reason: impl Into<String>) -> Self {
        RepoError::InvalidResource {
            uid: uid.into(),
            reason: reason.into(),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
