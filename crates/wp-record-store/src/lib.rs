//! # Waypoint Record Store (wp-record-store)
//!
//! The per-user record store and state-transition engine behind the
//! Waypoint workflow router. It is the authoritative persistence layer
//! for everything a user ever submitted and every state they ever held.
//!
//! ## Architecture
//!
//! ```text
//! host (HTTP, templating, mail) ──┐
//!                                 │  uid = hash(email)
//!                                 ▼
//!                    ┌──────────────────────────┐
//!                    │  WorkflowStore service   │
//!                    │  store / transition /    │
//!                    │  history facets          │
//!                    └───────┬──────────┬───────┘
//!                            │          │
//!                   RecordBackend   TimeSource
//!                            │          │
//!                  filesystem / memory  wall clock
//! ```
//!
//! Every write is an immutable dated record; a per-kind current pointer
//! is the only mutable reference. Transitions stage their records
//! invisibly and reveal them in fixed order, which is what substitutes
//! for multi-file transactions on a plain filesystem.
//!
//! ## Domain Invariants
//!
//! | # | Invariant | Description |
//! |---|-----------|-------------|
//! | 1 | Immutable records | A dated record, once written, is never rewritten |
//! | 2 | One current pointer per kind | All normal reads go through it |
//! | 3 | Ordered reveal | Form pointer commits before state pointer |
//! | 4 | No advance on failure | An aborted transition leaves visible state untouched |
//! | 5 | Provenance | Every state records the `(state, timestamp)` it came from |
//! | 6 | Salt stability | A salt change is fatal at startup, never silent |
//! | 7 | Distinct timestamps | Same-second writes of one kind are advanced, not clobbered |
//! | 8 | Single writer per user | Caller serializes transitions per uid |
//!
//! ## Usage
//!
//! ```ignore
//! use wp_record_store::{
//!     Dependencies, FilesystemBackend, StateTransitionApi, StoreConfig,
//!     SystemClock, WorkflowStore,
//! };
//!
//! let deps = Dependencies {
//!     backend: FilesystemBackend::open("/var/lib/waypoint")?,
//!     time_source: SystemClock,
//! };
//! let mut store = WorkflowStore::new(deps, StoreConfig::new(salt))?;
//!
//! let uid = store.register(&email, &first_state)?;
//! store.transition(&uid, &next_state, Some((form_kind, data)), |token| {
//!     mailer.send_action_link(&email, token)
//! })?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::{FilesystemBackend, FixedClock, InMemoryBackend, SystemClock};
pub use domain::errors::{BackendError, StoreError};
pub use domain::identity::{CapabilityToken, IdentityHasher};
pub use domain::record::{
    Origin, Record, RecordData, StateRecord, StoreReceipt, TransitionReceipt,
};
pub use domain::repair::RepairReport;
pub use ports::inbound::{
    CurrentOrigin, HistoryApi, RecordStoreApi, StateTransitionApi, UserOverview,
};
pub use ports::outbound::{RecordBackend, TimeSource};
pub use service::{Dependencies, StoreConfig, WorkflowStore};
