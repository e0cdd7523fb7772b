//! Error types for the record store subsystem.
//!
//! Each variant maps to one failure class a caller can meaningfully react
//! to; everything carries enough context (uid, kind, timestamp) to log
//! without a second lookup.

use shared_types::{DatedName, RecordKind, TypeError, Uid};
use thiserror::Error;

/// Errors surfaced by the store, the transition controller and the
/// history reader.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The kind has never been written (or its pointer is gone) for this
    /// user. Distinguishes "never happened yet" from real failures.
    #[error("no current '{kind}' record for uid {uid}")]
    NotFound { uid: Uid, kind: RecordKind },

    /// A specific historical record is missing.
    #[error("no dated record {name} for uid {uid}")]
    DatedNotFound { uid: Uid, name: DatedName },

    /// The uid has no directory in the store.
    #[error("unknown user: {uid}")]
    UserNotFound { uid: Uid },

    /// Registration attempted for an e-mail that already has a directory.
    #[error("user already registered: {uid}")]
    UserExists { uid: Uid },

    /// A root-scoped record (outside any user directory) is missing.
    #[error("root record not found: {name}")]
    RootRecordNotFound { name: &'static str },

    /// Fatal startup misconfiguration. Never recovered silently: a salt
    /// change would re-derive every uid and orphan all user directories.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The caller's transition body failed; staged records were rolled
    /// back and no pointer was repointed.
    #[error("transition of uid {uid} aborted: {source}")]
    TransitionAborted {
        uid: Uid,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Rejected before any I/O was performed.
    #[error("precondition violated: {reason}")]
    Precondition { reason: String },

    /// A persisted record could not be decoded.
    #[error("malformed record {name} for uid {uid}: {message}")]
    Malformed {
        uid: Uid,
        name: DatedName,
        message: String,
    },

    /// A record body could not be encoded.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Failure in the storage medium.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    pub(crate) fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition {
            reason: reason.into(),
        }
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        Self::Precondition {
            reason: err.to_string(),
        }
    }
}

/// Errors produced by a [`RecordBackend`](crate::ports::outbound::RecordBackend)
/// implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The addressed entry does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Writing would overwrite an existing immutable entry.
    #[error("already exists: {what}")]
    AlreadyExists { what: String },

    /// An entry read back from the medium has a name the store cannot
    /// interpret.
    #[error("unreadable entry name: {source}")]
    BadName {
        #[from]
        source: TypeError,
    },

    /// I/O error in the medium.
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}

impl BackendError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    pub fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
