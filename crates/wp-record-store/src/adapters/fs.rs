//! Filesystem record backend.
//!
//! On-disk layout, one directory per uid under the storage root:
//!
//! ```text
//! <root>/
//! ├── .salt                          # salt fingerprint marker
//! ├── cron.json                      # root-scoped schedule record
//! ├── ok                             # writeability probe
//! ├── uploads/                       # shared upload area (not a user)
//! │   └── ok
//! └── <uid>/
//!     ├── _email_20260807_120000.json
//!     ├── _email.json -> _email_20260807_120000.json
//!     ├── _state_20260807_120104.json
//!     ├── _state.json -> _state_20260807_120104.json
//!     ├── profile_20260807_120104.json
//!     └── profile.json -> profile_20260807_120104.json
//! ```
//!
//! Dated records are written with `O_EXCL` and never touched again.
//! Current pointers are relative symlinks, repointed by remove-then-create;
//! the service's transition protocol is what makes the visible effect
//! atomic.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use shared_types::{DatedName, RecordKind, Uid};

use crate::domain::errors::BackendError;
use crate::ports::outbound::RecordBackend;

/// Shared upload area, excluded from uid enumeration.
const UPLOADS_DIR: &str = "uploads";

/// Empty probe file proving the volume is writable.
const PROBE_FILE: &str = "ok";

/// File-per-record backend rooted at one storage directory.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Open (creating if needed) a storage root. Creates the upload area
    /// and touches a probe file in both directories so a read-only
    /// volume fails here instead of halfway through a transition.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let root = root.into();
        let uploads = root.join(UPLOADS_DIR);
        fs::create_dir_all(&root).map_err(|e| BackendError::io(root.display().to_string(), e))?;
        fs::create_dir_all(&uploads)
            .map_err(|e| BackendError::io(uploads.display().to_string(), e))?;
        touch(&root.join(PROBE_FILE))?;
        touch(&uploads.join(PROBE_FILE))?;
        tracing::info!("[wp-store] opened storage root at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, uid: &Uid) -> PathBuf {
        self.root.join(uid.as_str())
    }

    fn dated_path(&self, uid: &Uid, name: &DatedName) -> PathBuf {
        self.user_dir(uid).join(name.file_name())
    }

    fn pointer_path(&self, uid: &Uid, kind: &RecordKind) -> PathBuf {
        self.user_dir(uid).join(format!("{kind}.json"))
    }
}

fn touch(path: &Path) -> Result<(), BackendError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(drop)
        .map_err(|e| BackendError::io(path.display().to_string(), e))
}

fn io_err(path: &Path, err: std::io::Error) -> BackendError {
    BackendError::io(path.display().to_string(), err)
}

/// The final path component of a pointer target, tolerating legacy
/// absolute targets left behind by a directory relocation.
fn target_file_name(link: &Path, target: &Path) -> Result<String, BackendError> {
    target
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| BackendError::Io {
            path: link.display().to_string(),
            message: "pointer target has no file name".to_owned(),
        })
}

impl RecordBackend for FilesystemBackend {
    fn create_user(&mut self, uid: &Uid) -> Result<(), BackendError> {
        let dir = self.user_dir(uid);
        fs::create_dir(&dir).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => BackendError::already_exists(format!("user {uid}")),
            _ => io_err(&dir, e),
        })
    }

    fn user_exists(&self, uid: &Uid) -> bool {
        self.user_dir(uid).is_dir()
    }

    fn list_users(&self) -> Result<Vec<Uid>, BackendError> {
        let entries = fs::read_dir(&self.root).map_err(|e| io_err(&self.root, e))?;
        let mut uids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name == UPLOADS_DIR {
                continue;
            }
            match Uid::new(name) {
                Ok(uid) => uids.push(uid),
                // Foreign directories (backups, editor droppings) are not
                // users; leave them alone.
                Err(_) => tracing::debug!("[wp-store] skipping non-uid directory '{name}'"),
            }
        }
        uids.sort();
        Ok(uids)
    }

    fn put_dated(
        &mut self,
        uid: &Uid,
        name: &DatedName,
        bytes: &[u8],
    ) -> Result<(), BackendError> {
        let path = self.dated_path(uid, name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    BackendError::already_exists(format!("dated record {name} for uid {uid}"))
                }
                ErrorKind::NotFound => BackendError::not_found(format!("user directory {uid}")),
                _ => io_err(&path, e),
            })?;
        file.write_all(bytes).map_err(|e| io_err(&path, e))?;
        file.sync_all().map_err(|e| io_err(&path, e))
    }

    fn read_dated(&self, uid: &Uid, name: &DatedName) -> Result<Vec<u8>, BackendError> {
        let path = self.dated_path(uid, name);
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                BackendError::not_found(format!("dated record {name} for uid {uid}"))
            }
            _ => io_err(&path, e),
        })
    }

    fn dated_exists(&self, uid: &Uid, name: &DatedName) -> bool {
        self.dated_path(uid, name).is_file()
    }

    fn remove_dated(&mut self, uid: &Uid, name: &DatedName) -> Result<(), BackendError> {
        let path = self.dated_path(uid, name);
        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                BackendError::not_found(format!("dated record {name} for uid {uid}"))
            }
            _ => io_err(&path, e),
        })
    }

    fn list_dated(&self, uid: &Uid) -> Result<Vec<DatedName>, BackendError> {
        let dir = self.user_dir(uid);
        let entries = fs::read_dir(&dir).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackendError::not_found(format!("user directory {uid}")),
            _ => io_err(&dir, e),
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let file_type = entry.file_type().map_err(|e| io_err(&dir, e))?;
            // Pointers are symlinks; only plain files are dated records.
            if !file_type.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Ok(dated) = DatedName::parse(name) {
                names.push(dated);
            }
        }
        Ok(names)
    }

    fn set_current(&mut self, uid: &Uid, name: &DatedName) -> Result<(), BackendError> {
        if !self.dated_exists(uid, name) {
            return Err(BackendError::not_found(format!(
                "dated record {name} for uid {uid}"
            )));
        }
        let link = self.pointer_path(uid, &name.kind);
        match fs::symlink_metadata(&link) {
            Ok(_) => fs::remove_file(&link).map_err(|e| io_err(&link, e))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&link, e)),
        }
        std::os::unix::fs::symlink(name.file_name(), &link).map_err(|e| io_err(&link, e))
    }

    fn resolve_current(&self, uid: &Uid, kind: &RecordKind) -> Result<DatedName, BackendError> {
        let link = self.pointer_path(uid, kind);
        let target = fs::read_link(&link).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                BackendError::not_found(format!("current pointer '{kind}' for uid {uid}"))
            }
            _ => io_err(&link, e),
        })?;
        let file_name = target_file_name(&link, &target)?;
        Ok(DatedName::parse(&file_name)?)
    }

    fn list_current(&self, uid: &Uid) -> Result<Vec<DatedName>, BackendError> {
        let dir = self.user_dir(uid);
        let entries = fs::read_dir(&dir).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackendError::not_found(format!("user directory {uid}")),
            _ => io_err(&dir, e),
        })?;
        let mut resolved = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let file_type = entry.file_type().map_err(|e| io_err(&dir, e))?;
            if !file_type.is_symlink() {
                continue;
            }
            let link = entry.path();
            let target = fs::read_link(&link).map_err(|e| io_err(&link, e))?;
            let file_name = target_file_name(&link, &target)?;
            resolved.push(DatedName::parse(&file_name)?);
        }
        Ok(resolved)
    }

    fn normalize_pointers(&mut self, uid: &Uid) -> Result<Vec<RecordKind>, BackendError> {
        let dir = self.user_dir(uid);
        let entries = fs::read_dir(&dir).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackendError::not_found(format!("user directory {uid}")),
            _ => io_err(&dir, e),
        })?;
        let mut touched = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let file_type = entry.file_type().map_err(|e| io_err(&dir, e))?;
            if !file_type.is_symlink() {
                continue;
            }
            let link = entry.path();
            let target = fs::read_link(&link).map_err(|e| io_err(&link, e))?;
            // Canonical form is a bare file name in the same directory.
            if target.components().count() == 1 && !target.is_absolute() {
                continue;
            }
            let file_name = target_file_name(&link, &target)?;
            let dated = DatedName::parse(&file_name)?;
            fs::remove_file(&link).map_err(|e| io_err(&link, e))?;
            std::os::unix::fs::symlink(&file_name, &link).map_err(|e| io_err(&link, e))?;
            touched.push(dated.kind);
        }
        Ok(touched)
    }

    fn read_root(&self, name: &str) -> Result<Vec<u8>, BackendError> {
        let path = self.root.join(name);
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackendError::not_found(format!("root entry '{name}'")),
            _ => io_err(&path, e),
        })
    }

    fn write_root(&mut self, name: &str, bytes: &[u8]) -> Result<(), BackendError> {
        // Root entries are the only rewritable files; replace atomically
        // via temp file so readers never observe a torn write.
        let path = self.root.join(name);
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| io_err(&temp_path, e))?;
        file.write_all(bytes).map_err(|e| io_err(&temp_path, e))?;
        file.sync_all().map_err(|e| io_err(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| io_err(&path, e))
    }

    fn root_exists(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Timestamp;

    fn uid() -> Uid {
        Uid::new("cd".repeat(32)).unwrap()
    }

    fn dated(kind: &str, ts: &str) -> DatedName {
        DatedName::new(RecordKind::new(kind).unwrap(), Timestamp::parse(ts).unwrap())
    }

    fn open_backend() -> (tempfile::TempDir, FilesystemBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::open(dir.path().join("store")).unwrap();
        (dir, backend)
    }

    #[test]
    fn test_open_creates_layout() {
        let (_dir, backend) = open_backend();
        assert!(backend.root().join(UPLOADS_DIR).is_dir());
        assert!(backend.root().join(PROBE_FILE).is_file());
        assert!(backend.root().join(UPLOADS_DIR).join(PROBE_FILE).is_file());
    }

    #[test]
    fn test_dated_records_are_immutable() {
        let (_dir, mut backend) = open_backend();
        let uid = uid();
        backend.create_user(&uid).unwrap();
        let name = dated("profile", "20260807_120000");

        backend.put_dated(&uid, &name, b"{\"a\":1}").unwrap();
        let second = backend.put_dated(&uid, &name, b"{\"a\":2}");
        assert!(matches!(second, Err(BackendError::AlreadyExists { .. })));
        assert_eq!(backend.read_dated(&uid, &name).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_pointer_is_relative_symlink() {
        let (_dir, mut backend) = open_backend();
        let uid = uid();
        backend.create_user(&uid).unwrap();
        let name = dated("profile", "20260807_120000");
        backend.put_dated(&uid, &name, b"{}").unwrap();
        backend.set_current(&uid, &name).unwrap();

        let link = backend.root().join(uid.as_str()).join("profile.json");
        let target = fs::read_link(&link).unwrap();
        assert_eq!(target, PathBuf::from("profile_20260807_120000.json"));
        assert_eq!(backend.resolve_current(&uid, &name.kind).unwrap(), name);
    }

    #[test]
    fn test_repoint_replaces_previous_pointer() {
        let (_dir, mut backend) = open_backend();
        let uid = uid();
        backend.create_user(&uid).unwrap();
        let old = dated("profile", "20260807_120000");
        let new = dated("profile", "20260807_120001");
        backend.put_dated(&uid, &old, b"{}").unwrap();
        backend.put_dated(&uid, &new, b"{}").unwrap();

        backend.set_current(&uid, &old).unwrap();
        backend.set_current(&uid, &new).unwrap();
        assert_eq!(backend.resolve_current(&uid, &new.kind).unwrap(), new);
    }

    #[test]
    fn test_set_current_requires_existing_target() {
        let (_dir, mut backend) = open_backend();
        let uid = uid();
        backend.create_user(&uid).unwrap();
        let missing = dated("profile", "20260807_120000");
        assert!(matches!(
            backend.set_current(&uid, &missing),
            Err(BackendError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_dated_excludes_pointers_and_probe() {
        let (_dir, mut backend) = open_backend();
        let uid = uid();
        backend.create_user(&uid).unwrap();
        let name = dated("profile", "20260807_120000");
        backend.put_dated(&uid, &name, b"{}").unwrap();
        backend.set_current(&uid, &name).unwrap();

        assert_eq!(backend.list_dated(&uid).unwrap(), vec![name.clone()]);
        assert_eq!(backend.list_current(&uid).unwrap(), vec![name]);
    }

    #[test]
    fn test_list_users_skips_uploads() {
        let (_dir, mut backend) = open_backend();
        let uid = uid();
        backend.create_user(&uid).unwrap();
        assert_eq!(backend.list_users().unwrap(), vec![uid]);
    }

    #[test]
    fn test_normalize_rewrites_absolute_pointer() {
        let (_dir, mut backend) = open_backend();
        let uid = uid();
        backend.create_user(&uid).unwrap();
        let name = dated("profile", "20260807_120000");
        backend.put_dated(&uid, &name, b"{}").unwrap();

        // Absolute target, as left behind by a pre-relocation deployment.
        let link = backend.root().join(uid.as_str()).join("profile.json");
        let absolute = backend.root().join(uid.as_str()).join(name.file_name());
        std::os::unix::fs::symlink(&absolute, &link).unwrap();

        let touched = backend.normalize_pointers(&uid).unwrap();
        assert_eq!(touched, vec![name.kind.clone()]);
        assert_eq!(
            fs::read_link(&link).unwrap(),
            PathBuf::from(name.file_name())
        );
        assert_eq!(backend.resolve_current(&uid, &name.kind).unwrap(), name);
    }

    #[test]
    fn test_root_entries_roundtrip() {
        let (_dir, mut backend) = open_backend();
        assert!(!backend.root_exists("cron.json"));
        backend.write_root("cron.json", b"{\"jobs\":[]}").unwrap();
        assert!(backend.root_exists("cron.json"));
        assert_eq!(backend.read_root("cron.json").unwrap(), b"{\"jobs\":[]}");
        // Rewrite replaces, atomically.
        backend.write_root("cron.json", b"{}").unwrap();
        assert_eq!(backend.read_root("cron.json").unwrap(), b"{}");
    }
}
