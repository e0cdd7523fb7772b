//! The workflow store service.
//!
//! One service struct implements the three inbound APIs (record store,
//! state transitions, history) over an injected backend and time source.
//! All I/O is synchronous and bounded; concurrency across users needs no
//! coordination (separate directories), while transitions for the *same*
//! user must be serialized by the caller.

mod history;
mod store;
mod transition;

use std::num::NonZeroUsize;

use shared_types::{DatedName, Email, RecordKind, Timestamp, Uid};

use crate::domain::errors::{BackendError, StoreError};
use crate::domain::identity::IdentityHasher;
use crate::domain::record::{Record, StateRecord};
use crate::ports::outbound::{root_entries, RecordBackend, TimeSource};

/// Configuration for the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Per-installation salt for the identity hasher. Changing it would
    /// re-derive every uid, so the persisted fingerprint is checked on
    /// startup.
    pub salt: String,

    /// PBKDF2 iteration count (default: 100 000).
    pub hash_iterations: u32,

    /// Capacity of the digest memo inside the identity hasher
    /// (default: 512 entries).
    pub memo_capacity: usize,
}

impl StoreConfig {
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            hash_iterations: 100_000,
            memo_capacity: 512,
        }
    }

    pub fn with_hash_iterations(mut self, iterations: u32) -> Self {
        self.hash_iterations = iterations;
        self
    }

    pub fn with_memo_capacity(mut self, capacity: usize) -> Self {
        self.memo_capacity = capacity;
        self
    }
}

/// Dependencies for [`WorkflowStore`].
pub struct Dependencies<B, T> {
    pub backend: B,
    pub time_source: T,
}

/// The record store, transition controller and history reader in one
/// service.
pub struct WorkflowStore<B, T>
where
    B: RecordBackend,
    T: TimeSource,
{
    pub(crate) backend: B,
    pub(crate) time_source: T,
    pub(crate) hasher: IdentityHasher,
}

impl<B, T> WorkflowStore<B, T>
where
    B: RecordBackend,
    T: TimeSource,
{
    /// Create the service and verify the installation salt.
    ///
    /// On first use the salt fingerprint is persisted at the storage
    /// root; afterwards a mismatch is fatal. Silently continuing with a
    /// different salt would derive a fresh uid for every e-mail and
    /// orphan all existing user directories.
    pub fn new(deps: Dependencies<B, T>, config: StoreConfig) -> Result<Self, StoreError> {
        if config.salt.is_empty() {
            return Err(StoreError::Configuration {
                message: "installation salt must not be empty".to_owned(),
            });
        }
        let memo_capacity =
            NonZeroUsize::new(config.memo_capacity).ok_or_else(|| StoreError::Configuration {
                message: "memo capacity must be at least 1".to_owned(),
            })?;

        let hasher = IdentityHasher::new(
            config.salt.into_bytes(),
            config.hash_iterations,
            memo_capacity,
        );
        let fingerprint = hasher.salt_fingerprint();

        let mut backend = deps.backend;
        match backend.read_root(root_entries::SALT_MARKER) {
            Ok(bytes) => {
                let persisted = String::from_utf8_lossy(&bytes);
                if persisted.trim() != fingerprint {
                    return Err(StoreError::Configuration {
                        message: format!(
                            "persisted salt fingerprint {} does not match the configured salt",
                            persisted.trim()
                        ),
                    });
                }
            }
            Err(err) if err.is_not_found() => {
                backend.write_root(root_entries::SALT_MARKER, fingerprint.as_bytes())?;
                tracing::info!("[wp-store] first use, persisted salt fingerprint");
            }
            Err(err) => return Err(err.into()),
        }

        Ok(Self {
            backend,
            time_source: deps.time_source,
            hasher,
        })
    }

    /// The identity hasher, for hosts that need to resolve e-mails or
    /// validate capability tokens outside a store call.
    pub fn hasher(&self) -> &IdentityHasher {
        &self.hasher
    }

    /// Derive the uid for an e-mail without touching storage.
    pub fn uid_for(&self, email: &Email) -> Uid {
        self.hasher.uid_for(email)
    }

    // ------------------------------------------------------------------
    // Shared internals
    // ------------------------------------------------------------------

    /// A dated name for `kind` at the current wall-clock second,
    /// advanced second-by-second past any existing record of the same
    /// kind. Keeps names unique and lexicographically ordered without a
    /// sub-second suffix.
    pub(crate) fn fresh_dated(&self, uid: &Uid, kind: &RecordKind) -> DatedName {
        let mut name = DatedName::new(kind.clone(), self.time_source.now());
        let mut bumped = 0u32;
        while self.backend.dated_exists(uid, &name) {
            name.timestamp = name.timestamp.next_second();
            bumped += 1;
        }
        if bumped > 0 {
            tracing::debug!(
                "[wp-store] advanced '{}' timestamp by {}s for uid {} to avoid a collision",
                kind,
                bumped,
                uid
            );
        }
        name
    }

    /// Serialize and write one dated record, optionally committing the
    /// kind's current pointer to it.
    pub(crate) fn write_record(
        &mut self,
        uid: &Uid,
        kind: &RecordKind,
        body: &impl serde::Serialize,
        make_current: bool,
    ) -> Result<DatedName, StoreError> {
        if !self.backend.user_exists(uid) {
            return Err(StoreError::UserNotFound { uid: uid.clone() });
        }
        let bytes = serde_json::to_vec(body).map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })?;
        let name = self.fresh_dated(uid, kind);
        self.backend.put_dated(uid, &name, &bytes)?;
        if make_current {
            self.backend.set_current(uid, &name)?;
        }
        Ok(name)
    }

    /// Read and decode one dated record, attaching its provenance.
    pub(crate) fn read_record(&self, uid: &Uid, name: &DatedName) -> Result<Record, StoreError> {
        let bytes = self
            .backend
            .read_dated(uid, name)
            .map_err(|err| missing_dated(err, uid, name))?;
        let data = serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed {
            uid: uid.clone(),
            name: name.clone(),
            message: e.to_string(),
        })?;
        Ok(Record::new(name.clone(), data))
    }

    /// Resolve and decode the current `_state` record.
    pub(crate) fn read_state(&self, uid: &Uid) -> Result<(StateRecord, Timestamp), StoreError> {
        let kind = RecordKind::state();
        let name = self
            .backend
            .resolve_current(uid, &kind)
            .map_err(|err| self.missing_current(err, uid, &kind))?;
        let bytes = self
            .backend
            .read_dated(uid, &name)
            .map_err(|err| missing_dated(err, uid, &name))?;
        let record = serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed {
            uid: uid.clone(),
            name: name.clone(),
            message: e.to_string(),
        })?;
        Ok((record, name.timestamp))
    }

    /// Translate a backend `NotFound` on a pointer into the caller-facing
    /// error: unknown user, or known user without that kind.
    pub(crate) fn missing_current(
        &self,
        err: BackendError,
        uid: &Uid,
        kind: &RecordKind,
    ) -> StoreError {
        if err.is_not_found() {
            if !self.backend.user_exists(uid) {
                return StoreError::UserNotFound { uid: uid.clone() };
            }
            return StoreError::NotFound {
                uid: uid.clone(),
                kind: kind.clone(),
            };
        }
        err.into()
    }
}

fn missing_dated(err: BackendError, uid: &Uid, name: &DatedName) -> StoreError {
    if err.is_not_found() {
        return StoreError::DatedNotFound {
            uid: uid.clone(),
            name: name.clone(),
        };
    }
    err.into()
}
