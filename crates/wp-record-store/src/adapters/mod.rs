//! Adapter implementations of the outbound ports.
//!
//! Production: [`FilesystemBackend`] + [`SystemClock`].
//! Testing: [`InMemoryBackend`] + [`FixedClock`].

pub mod clock;
pub mod fs;
pub mod memory;

pub use clock::{FixedClock, SystemClock};
pub use fs::FilesystemBackend;
pub use memory::InMemoryBackend;
