//! Port traits: inbound (the API the host calls) and outbound (the
//! dependencies the host provides).

pub mod inbound;
pub mod outbound;

pub use inbound::{CurrentOrigin, HistoryApi, RecordStoreApi, StateTransitionApi, UserOverview};
pub use outbound::{RecordBackend, TimeSource};
