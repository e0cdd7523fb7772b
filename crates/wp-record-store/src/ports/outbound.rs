//! Outbound ports (driven side): the storage medium and the wall clock.
//!
//! The record backend treats the "current" pointer as an abstract
//! reference from a kind to one dated record. The filesystem adapter
//! realizes it as a relative symlink; a key-value adapter would store a
//! small reference entry instead. Nothing above this trait knows which.

use shared_types::{DatedName, RecordKind, Timestamp, Uid};

use crate::domain::errors::BackendError;

/// Storage medium for one installation: per-user dated records, per-kind
/// current pointers, and a handful of root-scoped entries (salt marker,
/// schedule record).
///
/// Implementations must keep dated records immutable: `put_dated` fails
/// on an existing name and nothing ever rewrites one in place. Pointer
/// repointing is the only mutation, and its crash-atomicity is *not*
/// required here: the transition protocol in the service layer stages
/// and reveals records in an order that keeps readers consistent.
pub trait RecordBackend: Send + Sync {
    /// Create the directory for a new user. Fails if the uid already
    /// exists.
    fn create_user(&mut self, uid: &Uid) -> Result<(), BackendError>;

    fn user_exists(&self, uid: &Uid) -> bool;

    /// Enumerate user directories. The shared upload area and root
    /// entries are not users and must not appear here.
    fn list_users(&self) -> Result<Vec<Uid>, BackendError>;

    /// Write one immutable dated record. Fails with `AlreadyExists` if
    /// the name is taken; the service relies on that to detect
    /// same-second collisions.
    fn put_dated(&mut self, uid: &Uid, name: &DatedName, bytes: &[u8])
        -> Result<(), BackendError>;

    fn read_dated(&self, uid: &Uid, name: &DatedName) -> Result<Vec<u8>, BackendError>;

    fn dated_exists(&self, uid: &Uid, name: &DatedName) -> bool;

    /// Remove one dated record. Only the transition rollback and nothing
    /// else may call this; committed records are never removed.
    fn remove_dated(&mut self, uid: &Uid, name: &DatedName) -> Result<(), BackendError>;

    /// Every dated record of every kind for this user, in no particular
    /// order.
    fn list_dated(&self, uid: &Uid) -> Result<Vec<DatedName>, BackendError>;

    /// Repoint the current pointer of `name.kind` to `name`. The target
    /// record must already exist.
    fn set_current(&mut self, uid: &Uid, name: &DatedName) -> Result<(), BackendError>;

    /// Resolve the current pointer for a kind to its dated record.
    fn resolve_current(&self, uid: &Uid, kind: &RecordKind) -> Result<DatedName, BackendError>;

    /// Resolve every current pointer for this user.
    fn list_current(&self, uid: &Uid) -> Result<Vec<DatedName>, BackendError>;

    /// Rewrite pointer targets into their canonical relative form after a
    /// storage-directory relocation. Returns the kinds touched. Media
    /// without a path notion have nothing to do.
    fn normalize_pointers(&mut self, _uid: &Uid) -> Result<Vec<RecordKind>, BackendError> {
        Ok(Vec::new())
    }

    /// Read a root-scoped entry (outside any user directory).
    fn read_root(&self, name: &str) -> Result<Vec<u8>, BackendError>;

    /// Atomically replace a root-scoped entry.
    fn write_root(&mut self, name: &str, bytes: &[u8]) -> Result<(), BackendError>;

    fn root_exists(&self, name: &str) -> bool;
}

/// Wall clock, abstracted so tests can pin and advance time.
pub trait TimeSource: Send + Sync {
    /// Current time at second resolution.
    fn now(&self) -> Timestamp;
}

/// Root-scoped entry names.
pub mod root_entries {
    /// Fingerprint of the installation salt.
    pub const SALT_MARKER: &str = ".salt";
    /// The host's scheduled-mail ledger.
    pub const SCHEDULE: &str = "cron.json";
}
