//! In-memory record backend for unit tests.
//!
//! Same contract as the filesystem backend, minus durability: dated
//! records refuse overwrites, pointers are per-kind references, and the
//! root map holds the salt marker and schedule entries.

use std::collections::{BTreeMap, HashMap};

use shared_types::{DatedName, RecordKind, Uid};

use crate::domain::errors::BackendError;
use crate::ports::outbound::RecordBackend;

#[derive(Default)]
struct UserBucket {
    dated: BTreeMap<DatedName, Vec<u8>>,
    current: BTreeMap<RecordKind, DatedName>,
}

/// Map-backed store with the same visible behavior as the filesystem
/// adapter.
#[derive(Default)]
pub struct InMemoryBackend {
    users: BTreeMap<Uid, UserBucket>,
    root: HashMap<String, Vec<u8>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn user(&self, uid: &Uid) -> Result<&UserBucket, BackendError> {
        self.users
            .get(uid)
            .ok_or_else(|| BackendError::not_found(format!("user directory {uid}")))
    }

    fn user_mut(&mut self, uid: &Uid) -> Result<&mut UserBucket, BackendError> {
        self.users
            .get_mut(uid)
            .ok_or_else(|| BackendError::not_found(format!("user directory {uid}")))
    }
}

impl RecordBackend for InMemoryBackend {
    fn create_user(&mut self, uid: &Uid) -> Result<(), BackendError> {
        if self.users.contains_key(uid) {
            return Err(BackendError::already_exists(format!("user {uid}")));
        }
        self.users.insert(uid.clone(), UserBucket::default());
        Ok(())
    }

    fn user_exists(&self, uid: &Uid) -> bool {
        self.users.contains_key(uid)
    }

    fn list_users(&self) -> Result<Vec<Uid>, BackendError> {
        Ok(self.users.keys().cloned().collect())
    }

    fn put_dated(
        &mut self,
        uid: &Uid,
        name: &DatedName,
        bytes: &[u8],
    ) -> Result<(), BackendError> {
        let bucket = self.user_mut(uid)?;
        if bucket.dated.contains_key(name) {
            return Err(BackendError::already_exists(format!(
                "dated record {name} for uid {uid}"
            )));
        }
        bucket.dated.insert(name.clone(), bytes.to_vec());
        Ok(())
    }

    fn read_dated(&self, uid: &Uid, name: &DatedName) -> Result<Vec<u8>, BackendError> {
        self.user(uid)?
            .dated
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("dated record {name} for uid {uid}")))
    }

    fn dated_exists(&self, uid: &Uid, name: &DatedName) -> bool {
        self.users
            .get(uid)
            .is_some_and(|bucket| bucket.dated.contains_key(name))
    }

    fn remove_dated(&mut self, uid: &Uid, name: &DatedName) -> Result<(), BackendError> {
        let bucket = self.user_mut(uid)?;
        bucket
            .dated
            .remove(name)
            .map(drop)
            .ok_or_else(|| BackendError::not_found(format!("dated record {name} for uid {uid}")))
    }

    fn list_dated(&self, uid: &Uid) -> Result<Vec<DatedName>, BackendError> {
        Ok(self.user(uid)?.dated.keys().cloned().collect())
    }

    fn set_current(&mut self, uid: &Uid, name: &DatedName) -> Result<(), BackendError> {
        let bucket = self.user_mut(uid)?;
        if !bucket.dated.contains_key(name) {
            return Err(BackendError::not_found(format!(
                "dated record {name} for uid {uid}"
            )));
        }
        bucket.current.insert(name.kind.clone(), name.clone());
        Ok(())
    }

    fn resolve_current(&self, uid: &Uid, kind: &RecordKind) -> Result<DatedName, BackendError> {
        self.user(uid)?
            .current
            .get(kind)
            .cloned()
            .ok_or_else(|| {
                BackendError::not_found(format!("current pointer '{kind}' for uid {uid}"))
            })
    }

    fn list_current(&self, uid: &Uid) -> Result<Vec<DatedName>, BackendError> {
        Ok(self.user(uid)?.current.values().cloned().collect())
    }

    fn read_root(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        self.root
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("root entry '{name}'")))
    }

    fn write_root(&mut self, name: &str, bytes: &[u8]) -> Result<(), BackendError> {
        self.root.insert(name.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn root_exists(&self, name: &str) -> bool {
        self.root.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Timestamp;

    fn uid() -> Uid {
        Uid::new("ef".repeat(32)).unwrap()
    }

    fn dated(kind: &str, ts: &str) -> DatedName {
        DatedName::new(RecordKind::new(kind).unwrap(), Timestamp::parse(ts).unwrap())
    }

    #[test]
    fn test_put_refuses_overwrite() {
        let mut backend = InMemoryBackend::new();
        let uid = uid();
        backend.create_user(&uid).unwrap();
        let name = dated("profile", "20260807_120000");
        backend.put_dated(&uid, &name, b"{}").unwrap();
        assert!(matches!(
            backend.put_dated(&uid, &name, b"{}"),
            Err(BackendError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_pointer_roundtrip() {
        let mut backend = InMemoryBackend::new();
        let uid = uid();
        backend.create_user(&uid).unwrap();
        let name = dated("profile", "20260807_120000");
        backend.put_dated(&uid, &name, b"{}").unwrap();
        backend.set_current(&uid, &name).unwrap();
        assert_eq!(backend.resolve_current(&uid, &name.kind).unwrap(), name);
    }

    #[test]
    fn test_unknown_user_is_not_found() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.list_dated(&uid()),
            Err(BackendError::NotFound { .. })
        ));
    }
}
