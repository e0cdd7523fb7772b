//! Registration, state transitions and crash reconciliation.
//!
//! A transition is a multi-record write on a medium without multi-file
//! transactions. The protocol is write-invisible, then reveal in fixed
//! order, else delete the invisible writes:
//!
//! 1. read the origin `(state, timestamp)` from the live state record;
//! 2. stage the form record, if any (`make_current = false`);
//! 3. stage the new `_state` record embedding the origin and the form
//!    reference;
//! 4. hand the caller's body the capability token of the staged state
//!    record;
//! 5. on `Ok`, repoint the form pointer and then the state pointer; on
//!    `Err`, remove the staged records and re-raise.
//!
//! A reader can therefore never observe a committed state that points at
//! an uncommitted form record. The crash window between the two repoints
//! of step 5 is reconciled by [`repair_user`](StateTransitionApi::repair_user).

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use shared_types::{DatedName, Email, RecordKind, StateName, Timestamp, Uid};

use super::WorkflowStore;
use crate::domain::errors::StoreError;
use crate::domain::identity::CapabilityToken;
use crate::domain::record::{Origin, RecordData, StateRecord, TransitionReceipt};
use crate::domain::repair::{orphan_scan, RepairReport};
use crate::ports::inbound::StateTransitionApi;
use crate::ports::outbound::{RecordBackend, TimeSource};

impl<B, T> StateTransitionApi for WorkflowStore<B, T>
where
    B: RecordBackend,
    T: TimeSource,
{
    fn register(&mut self, email: &Email, first_state: &StateName) -> Result<Uid, StoreError> {
        let uid = self.hasher.uid_for(email);
        if self.backend.user_exists(&uid) {
            return Err(StoreError::UserExists { uid });
        }
        self.backend.create_user(&uid)?;

        let mut email_body = RecordData::new();
        email_body.insert("email".to_owned(), json!(email.as_str()));
        self.write_record(&uid, &RecordKind::email(), &email_body, true)?;

        let record = StateRecord::new(
            first_state.clone(),
            Origin::register(self.time_source.now()),
            None,
        );
        self.write_record(&uid, &RecordKind::state(), &record, true)?;

        tracing::info!(
            "[wp-store] 📥 registered uid {} in state '{}'",
            uid,
            first_state
        );
        Ok(uid)
    }

    fn is_registered(&self, email: &Email) -> bool {
        self.backend.user_exists(&self.hasher.uid_for(email))
    }

    fn current_state(&self, uid: &Uid) -> Result<(StateRecord, Timestamp), StoreError> {
        self.read_state(uid)
    }

    fn current_capability(&self, uid: &Uid) -> Result<CapabilityToken, StoreError> {
        let kind = RecordKind::state();
        let name = self
            .backend
            .resolve_current(uid, &kind)
            .map_err(|err| self.missing_current(err, uid, &kind))?;
        Ok(self.hasher.capability_token(uid, &name))
    }

    fn transition<F, E>(
        &mut self,
        uid: &Uid,
        next_state: &StateName,
        form: Option<(RecordKind, RecordData)>,
        body: F,
    ) -> Result<TransitionReceipt, StoreError>
    where
        F: FnOnce(&CapabilityToken) -> Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        // Origin is read strictly before any write of this transition.
        let (previous, previous_timestamp) = self.read_state(uid)?;
        let origin = Origin(previous.state, previous_timestamp);

        // Stage the form submission, invisible to readers.
        let form_name = match form {
            Some((kind, data)) => {
                if kind.is_system() {
                    return Err(StoreError::precondition(format!(
                        "kind '{kind}' is system-owned; forms may not use the '_' prefix"
                    )));
                }
                Some(self.write_record(uid, &kind, &data, false)?)
            }
            None => None,
        };

        // Stage the new state record, also invisible.
        let record = StateRecord::new(next_state.clone(), origin, form_name.clone());
        let state_name = match self.write_record(uid, &RecordKind::state(), &record, false) {
            Ok(name) => name,
            Err(err) => {
                self.discard_staged(uid, None, form_name.as_ref());
                return Err(err);
            }
        };

        // The token the body embeds in outgoing links; it becomes valid
        // exactly when the state pointer lands on the staged record.
        let token = self.hasher.capability_token(uid, &state_name);

        match body(&token) {
            Ok(()) => {
                // Reveal in fixed order: form first, state last.
                if let Some(name) = &form_name {
                    self.backend.set_current(uid, name)?;
                }
                self.backend.set_current(uid, &state_name)?;
                tracing::info!(
                    "[wp-store] ✓ uid {} advanced to '{}' at {}",
                    uid,
                    next_state,
                    state_name.timestamp
                );
                Ok(TransitionReceipt {
                    state: state_name,
                    form: form_name,
                })
            }
            Err(err) => {
                self.discard_staged(uid, Some(&state_name), form_name.as_ref());
                Err(StoreError::TransitionAborted {
                    uid: uid.clone(),
                    source: err.into(),
                })
            }
        }
    }

    fn repair_user(&mut self, uid: &Uid) -> Result<RepairReport, StoreError> {
        if !self.backend.user_exists(uid) {
            return Err(StoreError::UserNotFound { uid: uid.clone() });
        }
        let mut report = RepairReport::clean(uid.clone());
        report.normalized_pointers = self.backend.normalize_pointers(uid)?;

        // Complete a half-committed transition: the state pointer landed
        // but the crash came before (or between) the form repoint.
        if let Ok((state, _)) = self.read_state(uid) {
            if let Some(form_ref) = state.form_dated_tuple {
                if self.backend.dated_exists(uid, &form_ref) {
                    let stale = match self.backend.resolve_current(uid, &form_ref.kind) {
                        Ok(current) => current.timestamp < form_ref.timestamp,
                        Err(err) if err.is_not_found() => true,
                        Err(err) => return Err(err.into()),
                    };
                    if stale {
                        self.backend.set_current(uid, &form_ref)?;
                        tracing::warn!(
                            "[wp-store] 🔧 completed form pointer {} for uid {}",
                            form_ref,
                            uid
                        );
                        report.completed_pointers.push(form_ref);
                    }
                }
            }
        }

        // Staged records no committed state accounts for.
        let dated = self.backend.list_dated(uid)?;
        let pointers: BTreeMap<RecordKind, Timestamp> = self
            .backend
            .list_current(uid)?
            .into_iter()
            .map(|name| (name.kind.clone(), name.timestamp))
            .collect();

        let state_kind = RecordKind::state();
        let committed_state_ts = pointers.get(&state_kind).copied();
        let mut referenced = BTreeSet::new();
        for name in dated.iter().filter(|n| n.kind == state_kind) {
            let committed = committed_state_ts.is_some_and(|ts| name.timestamp <= ts);
            if !committed {
                continue;
            }
            let record = self.read_record(uid, name)?;
            if let Some(form_ref) = record
                .get("form_dated_tuple")
                .and_then(|v| serde_json::from_value::<DatedName>(v.clone()).ok())
            {
                referenced.insert(form_ref);
            }
        }
        report.orphans = orphan_scan(&dated, &pointers, &referenced);

        if report.is_clean() {
            tracing::debug!("[wp-store] uid {} needed no repair", uid);
        } else {
            tracing::warn!(
                "[wp-store] repair for uid {}: {} pointer(s) completed, {} normalized, {} orphan(s)",
                uid,
                report.completed_pointers.len(),
                report.normalized_pointers.len(),
                report.orphans.len()
            );
        }
        Ok(report)
    }
}

impl<B, T> WorkflowStore<B, T>
where
    B: RecordBackend,
    T: TimeSource,
{
    /// Best-effort removal of staged records, newest first. Failures are
    /// logged and swallowed: the caller's error is the one worth
    /// surfacing, and anything left behind is found by the repair pass.
    fn discard_staged(&mut self, uid: &Uid, state: Option<&DatedName>, form: Option<&DatedName>) {
        for name in state.into_iter().chain(form) {
            if let Err(err) = self.backend.remove_dated(uid, name) {
                tracing::warn!(
                    "[wp-store] rollback could not remove staged {} for uid {}: {}",
                    name,
                    uid,
                    err
                );
            }
        }
    }
}
