//! Generic record store operations.

use std::collections::BTreeMap;

use shared_types::{DatedName, Email, RecordKind, Uid};

use super::WorkflowStore;
use crate::domain::errors::StoreError;
use crate::domain::record::{Record, RecordData, StoreReceipt};
use crate::ports::inbound::RecordStoreApi;
use crate::ports::outbound::{root_entries, RecordBackend, TimeSource};

impl<B, T> RecordStoreApi for WorkflowStore<B, T>
where
    B: RecordBackend,
    T: TimeSource,
{
    fn store(
        &mut self,
        uid: &Uid,
        kind: &RecordKind,
        data: RecordData,
        make_current: bool,
    ) -> Result<StoreReceipt, StoreError> {
        if kind.is_system() {
            return Err(StoreError::precondition(format!(
                "kind '{kind}' is system-owned; forms may not use the '_' prefix"
            )));
        }
        let dated = self.write_record(uid, kind, &data, make_current)?;
        tracing::debug!("[wp-store] stored {} for uid {}", dated, uid);
        Ok(StoreReceipt {
            dated,
            made_current: make_current,
        })
    }

    fn retrieve(&self, uid: &Uid, kind: &RecordKind) -> Result<Record, StoreError> {
        let name = self
            .backend
            .resolve_current(uid, kind)
            .map_err(|err| self.missing_current(err, uid, kind))?;
        self.read_record(uid, &name)
    }

    fn retrieve_dated(&self, uid: &Uid, name: &DatedName) -> Result<Record, StoreError> {
        self.read_record(uid, name)
    }

    fn retrieve_all_current(
        &self,
        uid: &Uid,
        exclude: &[RecordKind],
    ) -> Result<BTreeMap<RecordKind, Record>, StoreError> {
        let pointers = self
            .backend
            .list_current(uid)
            .map_err(|err| self.missing_current(err, uid, &RecordKind::state()))?;
        let mut out = BTreeMap::new();
        for name in pointers {
            if name.kind.is_system() || exclude.contains(&name.kind) {
                continue;
            }
            let record = self.read_record(uid, &name)?;
            out.insert(name.kind, record);
        }
        Ok(out)
    }

    fn list_uids(&self) -> Result<Vec<Uid>, StoreError> {
        Ok(self.backend.list_users()?)
    }

    fn retrieve_email(&self, uid: &Uid) -> Result<Email, StoreError> {
        let record = self.retrieve(uid, &RecordKind::email())?;
        let address = record
            .get("email")
            .and_then(|v| v.as_str())
            .ok_or_else(|| StoreError::Malformed {
                uid: uid.clone(),
                name: record.dated_name(),
                message: "missing 'email' field".to_owned(),
            })?;
        Email::new(address).map_err(|e| StoreError::Malformed {
            uid: uid.clone(),
            name: record.dated_name(),
            message: e.to_string(),
        })
    }

    fn store_schedule(&mut self, data: &RecordData) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(data).map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })?;
        self.backend.write_root(root_entries::SCHEDULE, &bytes)?;
        Ok(())
    }

    fn retrieve_schedule(&self) -> Result<RecordData, StoreError> {
        let bytes = self
            .backend
            .read_root(root_entries::SCHEDULE)
            .map_err(|err| {
                if err.is_not_found() {
                    StoreError::RootRecordNotFound {
                        name: root_entries::SCHEDULE,
                    }
                } else {
                    err.into()
                }
            })?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
            message: e.to_string(),
        })
    }
}
