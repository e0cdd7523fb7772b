//! Pure domain logic: record entities, identity hashing, errors and the
//! reconciliation rules for interrupted transitions.

pub mod errors;
pub mod identity;
pub mod record;
pub mod repair;

pub use errors::{BackendError, StoreError};
pub use identity::{CapabilityToken, IdentityHasher};
pub use record::{Origin, Record, RecordData, StateRecord, StoreReceipt, TransitionReceipt};
pub use repair::RepairReport;
