//! Identifier newtypes: `Uid`, `Email`, `RecordKind`, `StateName`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::TypeError;

/// Reserved first character of system-owned record kinds.
pub const SYSTEM_KIND_MARKER: char = '_';

/// Sentinel origin state recorded for a user's very first state record.
pub const REGISTER_SENTINEL: &str = "register";

/// Opaque per-user identifier, derived from the user's e-mail by the
/// identity hasher. Not reversible without the installation salt.
///
/// Wire form: 64 lowercase hex characters (a SHA-256-sized digest).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid(String);

impl Uid {
    /// Parse a uid from its hex form.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.len() != 64 {
            return Err(TypeError::InvalidUid {
                value,
                reason: "expected 64 hex characters",
            });
        }
        if !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(TypeError::InvalidUid {
                value,
                reason: "expected lowercase hex",
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Uid {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.0
    }
}

/// A user's e-mail address, normalized to its canonical form
/// (trimmed, lowercased) so that hashing is deterministic.
///
/// Structural validation of the address is the host's concern; the core
/// only requires a non-empty value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn new(value: impl AsRef<str>) -> Result<Self, TypeError> {
        let normalized = value.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(TypeError::InvalidEmail {
                reason: "empty address",
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// Logical name of a record stream: a form name, or a system stream such
/// as `_state` / `_email`.
///
/// Kinds are embedded in file names, so the accepted alphabet is
/// restricted to ASCII alphanumerics, `-` and `_`. Kinds starting with
/// `_` are system-owned and cannot be created through the public store
/// API.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordKind(String);

impl RecordKind {
    /// Parse any record kind, system streams included. Used when reading
    /// names back from the storage medium.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TypeError::InvalidKind {
                value,
                reason: "empty kind",
            });
        }
        if value.len() > 64 {
            return Err(TypeError::InvalidKind {
                value,
                reason: "kind longer than 64 characters",
            });
        }
        let mut bytes = value.bytes();
        let first = bytes.next().unwrap_or(b'\0');
        if !(first.is_ascii_alphabetic() || first == b'_') {
            return Err(TypeError::InvalidKind {
                value,
                reason: "kind must start with a letter or '_'",
            });
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(TypeError::InvalidKind {
                value,
                reason: "kind may only contain ASCII alphanumerics, '-' and '_'",
            });
        }
        Ok(Self(value))
    }

    /// Parse a caller-owned form kind. Rejects the reserved system prefix.
    pub fn form(value: impl Into<String>) -> Result<Self, TypeError> {
        let kind = Self::new(value)?;
        if kind.is_system() {
            return Err(TypeError::InvalidKind {
                value: kind.0,
                reason: "the '_' prefix is reserved for system streams",
            });
        }
        Ok(kind)
    }

    /// The `_state` system stream (current workflow state per user).
    pub fn state() -> Self {
        Self("_state".to_owned())
    }

    /// The `_email` system stream (e-mail address behind a uid).
    pub fn email() -> Self {
        Self("_email".to_owned())
    }

    pub fn is_system(&self) -> bool {
        self.0.starts_with(SYSTEM_KIND_MARKER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RecordKind {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecordKind> for String {
    fn from(kind: RecordKind) -> Self {
        kind.0
    }
}

/// Name of a workflow state.
///
/// The core is agnostic about which states exist (the workflow schema is
/// the host's concern); it only refuses empty names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateName(String);

impl StateName {
    pub fn new(value: impl AsRef<str>) -> Result<Self, TypeError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypeError::InvalidState {
                reason: "empty state name",
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The sentinel origin recorded for a freshly registered user.
    pub fn register_sentinel() -> Self {
        Self(REGISTER_SENTINEL.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StateName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StateName> for String {
    fn from(state: StateName) -> Self {
        state.0
    }
}
