//! Identity hashing: e-mail → uid, and the state capability tokens
//! embedded in action links.
//!
//! Both digests go through PBKDF2-HMAC-SHA256 with the per-installation
//! salt. The iteration count makes uid enumeration from a leaked storage
//! directory expensive; it also makes memoization mandatory, so the
//! hasher keeps a bounded LRU of computed digests (inputs are immutable
//! for the process lifetime, so entries never need invalidation).

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use shared_types::{DatedName, Email, Uid};

/// Token derived from a uid and the resolved name of a `_state` dated
/// record. Repointing the state pointer changes the token, which is what
/// invalidates stale action links.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapabilityToken(String);

impl CapabilityToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic, salted, one-way mapping from e-mails to uids.
pub struct IdentityHasher {
    salt: Vec<u8>,
    iterations: u32,
    memo: Mutex<LruCache<String, String>>,
}

impl IdentityHasher {
    pub fn new(salt: impl Into<Vec<u8>>, iterations: u32, memo_capacity: NonZeroUsize) -> Self {
        Self {
            salt: salt.into(),
            iterations,
            memo: Mutex::new(LruCache::new(memo_capacity)),
        }
    }

    /// Derive the uid for an e-mail address. Pure function of the
    /// (normalized) address; repeated calls return byte-identical output.
    pub fn uid_for(&self, email: &Email) -> Uid {
        let digest = self.digest(email.as_str());
        Uid::new(digest).expect("a hex-encoded 32-byte digest is a valid uid")
    }

    /// Derive the capability token for one concrete `_state` dated
    /// record. The digest input is the uid concatenated with the record's
    /// file stem, so the token changes exactly when the state pointer is
    /// repointed.
    pub fn capability_token(&self, uid: &Uid, state_record: &DatedName) -> CapabilityToken {
        let input = format!("{}{}", uid, state_record.stem());
        CapabilityToken(self.digest(&input))
    }

    /// Fingerprint of the configured salt, persisted in the storage root
    /// to detect salt changes across restarts. The raw salt itself never
    /// touches disk.
    pub fn salt_fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.salt))
    }

    fn digest(&self, input: &str) -> String {
        if let Ok(mut memo) = self.memo.lock() {
            if let Some(hit) = memo.get(input) {
                return hit.clone();
            }
        }

        let mut out = [0u8; 32];
        pbkdf2_hmac::<Sha256>(input.as_bytes(), &self.salt, self.iterations, &mut out);
        let encoded = hex::encode(out);

        if let Ok(mut memo) = self.memo.lock() {
            memo.put(input.to_owned(), encoded.clone());
        }
        encoded
    }
}
