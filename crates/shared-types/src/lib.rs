//! # Shared Types Crate
//!
//! This crate contains the primitive types exchanged between the storage
//! core and its host application: user identifiers, record kinds, state
//! names, and the fixed-width record timestamps.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every identifier that crosses the core's
//!   boundary is defined here, once.
//! - **Parse, don't validate twice**: all constructors reject malformed
//!   input, so downstream code can treat a held value as well-formed.
//! - **Stable wire form**: serde impls round-trip through the exact string
//!   forms used in persisted file names and record bodies.

pub mod errors;
pub mod ids;
pub mod timestamp;

pub use errors::TypeError;
pub use ids::{Email, RecordKind, StateName, Uid};
pub use timestamp::{DatedName, Timestamp};
