//! Read-only history reconstruction for audit and admin views.
//!
//! Everything here scans dated records directly; the current pointers
//! are consulted only to know which record is live. History is never an
//! input to a transition decision.

use std::collections::BTreeMap;

use shared_types::{RecordKind, Timestamp, Uid};

use super::WorkflowStore;
use crate::domain::errors::StoreError;
use crate::domain::record::{Origin, StateRecord};
use crate::ports::inbound::{CurrentOrigin, HistoryApi, RecordStoreApi, UserOverview};
use crate::ports::outbound::{RecordBackend, TimeSource};

impl<B, T> HistoryApi for WorkflowStore<B, T>
where
    B: RecordBackend,
    T: TimeSource,
{
    fn state_history(&self, uid: &Uid) -> Result<BTreeMap<Timestamp, StateRecord>, StoreError> {
        let state_kind = RecordKind::state();
        let mut history = BTreeMap::new();
        for name in self.list_dated_for(uid)? {
            if name.kind != state_kind {
                continue;
            }
            let bytes = self.backend.read_dated(uid, &name)?;
            let record: StateRecord =
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed {
                    uid: uid.clone(),
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            history.insert(name.timestamp, record);
        }
        Ok(history)
    }

    fn form_index(&self, uid: &Uid) -> Result<Vec<(Timestamp, RecordKind)>, StoreError> {
        let mut index: Vec<(Timestamp, RecordKind)> = self
            .list_dated_for(uid)?
            .into_iter()
            .filter(|name| !name.kind.is_system())
            .map(|name| (name.timestamp, name.kind))
            .collect();
        // Chronological, with the kind as tie-breaker; the order records
        // were stored in is irrelevant.
        index.sort();
        Ok(index)
    }

    fn current_origin(&self, uid: &Uid) -> Result<CurrentOrigin, StoreError> {
        let (record, timestamp) = self.read_state(uid)?;
        let origin = match record.origin {
            Some(origin) => origin,
            None => {
                // Record written before provenance tracking: substitute
                // the immediately preceding history entry, best-effort.
                tracing::warn!(
                    "[wp-store] state record at {} for uid {} lacks an origin, reconstructing",
                    timestamp,
                    uid
                );
                let history = self.state_history(uid)?;
                match history.range(..timestamp).next_back() {
                    Some((prior_ts, prior)) => Origin(prior.state.clone(), *prior_ts),
                    None => Origin::register(timestamp),
                }
            }
        };
        Ok(CurrentOrigin {
            state: record.state,
            timestamp,
            origin,
        })
    }

    fn users_with_state(&self) -> Result<Vec<UserOverview>, StoreError> {
        let mut overview = Vec::new();
        for uid in self.list_uids()? {
            let row = self
                .retrieve_email(&uid)
                .and_then(|email| {
                    let (record, timestamp) = self.read_state(&uid)?;
                    Ok(UserOverview {
                        uid: uid.clone(),
                        email,
                        state: record.state,
                        timestamp,
                    })
                });
            match row {
                Ok(row) => overview.push(row),
                // One broken user must not take down the whole admin
                // listing.
                Err(err) => {
                    tracing::warn!("[wp-store] skipping uid {} in overview: {}", uid, err)
                }
            }
        }
        Ok(overview)
    }
}

impl<B, T> WorkflowStore<B, T>
where
    B: RecordBackend,
    T: TimeSource,
{
    fn list_dated_for(
        &self,
        uid: &Uid,
    ) -> Result<Vec<shared_types::DatedName>, StoreError> {
        self.backend.list_dated(uid).map_err(|err| {
            if err.is_not_found() {
                StoreError::UserNotFound { uid: uid.clone() }
            } else {
                err.into()
            }
        })
    }
}
