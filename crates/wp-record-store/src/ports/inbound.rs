//! Inbound ports (driving side): the API the host application programs
//! against.
//!
//! Three facets of one service: the generic record store, the state
//! transition controller, and the read-only history views. The host's
//! HTTP layer is expected to resolve e-mails to uids once (via
//! registration or the identity hasher) and address everything else by
//! uid.

use std::collections::BTreeMap;

use shared_types::{DatedName, Email, RecordKind, StateName, Timestamp, Uid};

use crate::domain::errors::StoreError;
use crate::domain::identity::CapabilityToken;
use crate::domain::record::{
    Record, RecordData, StateRecord, StoreReceipt, TransitionReceipt,
};
use crate::domain::repair::RepairReport;

/// Generic per-user, per-kind record access.
pub trait RecordStoreApi {
    /// Persist `data` as a new immutable dated record of `kind` and, if
    /// `make_current`, repoint the kind's current pointer to it.
    ///
    /// `kind` must be a caller-owned form kind; system streams are
    /// written only through registration and transitions.
    fn store(
        &mut self,
        uid: &Uid,
        kind: &RecordKind,
        data: RecordData,
        make_current: bool,
    ) -> Result<StoreReceipt, StoreError>;

    /// Read the current record for a kind. The result carries the kind
    /// and the resolved timestamp alongside the stored body.
    fn retrieve(&self, uid: &Uid, kind: &RecordKind) -> Result<Record, StoreError>;

    /// Read one specific historical record, bypassing the current
    /// pointer.
    fn retrieve_dated(&self, uid: &Uid, name: &DatedName) -> Result<Record, StoreError>;

    /// Resolve every non-system current pointer in one pass, minus the
    /// caller's exclusions. Used to assemble everything known about a
    /// user for templating.
    fn retrieve_all_current(
        &self,
        uid: &Uid,
        exclude: &[RecordKind],
    ) -> Result<BTreeMap<RecordKind, Record>, StoreError>;

    /// Enumerate all registered uids.
    fn list_uids(&self) -> Result<Vec<Uid>, StoreError>;

    /// The e-mail address behind a uid (from the `_email` system stream).
    fn retrieve_email(&self, uid: &Uid) -> Result<Email, StoreError>;

    /// Persist the root-scoped schedule record.
    fn store_schedule(&mut self, data: &RecordData) -> Result<(), StoreError>;

    /// Read the root-scoped schedule record.
    fn retrieve_schedule(&self) -> Result<RecordData, StoreError>;
}

/// State lifecycle: registration and all-or-nothing transitions.
pub trait StateTransitionApi {
    /// Register an e-mail: create the user directory, persist the
    /// `_email` record, then the first `_state` record with the
    /// registration sentinel as origin. Returns the derived uid.
    fn register(&mut self, email: &Email, first_state: &StateName) -> Result<Uid, StoreError>;

    fn is_registered(&self, email: &Email) -> bool;

    /// The current state record plus the timestamp it was written at.
    fn current_state(&self, uid: &Uid) -> Result<(StateRecord, Timestamp), StoreError>;

    /// Capability token for the current state pointer, for validating
    /// action links outside any transition.
    fn current_capability(&self, uid: &Uid) -> Result<CapabilityToken, StoreError>;

    /// Perform an all-or-nothing transition to `next_state`, optionally
    /// persisting a form submission as part of it.
    ///
    /// The records are staged invisibly, then `body` runs with the
    /// capability token that will become valid on commit (so the host
    /// can embed it in outgoing mail). If `body` returns `Ok`, the form
    /// pointer and then the state pointer are repointed; if it errors,
    /// the staged records are removed and nothing visible changes.
    fn transition<F, E>(
        &mut self,
        uid: &Uid,
        next_state: &StateName,
        form: Option<(RecordKind, RecordData)>,
        body: F,
    ) -> Result<TransitionReceipt, StoreError>
    where
        F: FnOnce(&CapabilityToken) -> Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>;

    /// Reconcile a user after a crash: complete half-committed form
    /// pointers, normalize relocated pointer targets, report orphans.
    fn repair_user(&mut self, uid: &Uid) -> Result<RepairReport, StoreError>;
}

/// One row of the admin user overview.
#[derive(Debug, Clone, PartialEq)]
pub struct UserOverview {
    pub uid: Uid,
    pub email: Email,
    pub state: StateName,
    pub timestamp: Timestamp,
}

/// The current state plus its provenance, for audit views.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentOrigin {
    pub state: StateName,
    pub timestamp: Timestamp,
    pub origin: crate::domain::record::Origin,
}

/// Read-only reconstruction of a user's chronology.
pub trait HistoryApi {
    /// Every state transition ever recorded, keyed by timestamp.
    fn state_history(&self, uid: &Uid) -> Result<BTreeMap<Timestamp, StateRecord>, StoreError>;

    /// All non-system dated records, ordered by timestamp ascending.
    fn form_index(&self, uid: &Uid) -> Result<Vec<(Timestamp, RecordKind)>, StoreError>;

    /// The live state record plus its origin. State records written
    /// before provenance tracking lack an origin; for those the
    /// immediately preceding history entry is substituted, best-effort.
    fn current_origin(&self, uid: &Uid) -> Result<CurrentOrigin, StoreError>;

    /// Every user with e-mail, current state and state timestamp.
    /// Users whose records cannot be read are skipped with a warning.
    fn users_with_state(&self) -> Result<Vec<UserOverview>, StoreError>;
}
