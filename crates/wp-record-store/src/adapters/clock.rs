//! Time source adapters.

use std::sync::{Arc, Mutex};

use shared_types::Timestamp;
use time::OffsetDateTime;

use crate::ports::outbound::TimeSource;

/// Wall clock in the installation's local timezone, falling back to UTC
/// when the local offset cannot be determined (multi-threaded processes
/// on some platforms).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        Timestamp::from_datetime(now)
    }
}

/// Controllable clock for tests. Clones share the same instant, so a
/// test can keep a handle while the service owns another.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<Timestamp>>,
}

impl FixedClock {
    pub fn at(now: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock().expect("clock lock poisoned") = now;
    }

    pub fn advance_secs(&self, seconds: u32) {
        let mut guard = self.now.lock().expect("clock lock poisoned");
        let mut next = *guard;
        for _ in 0..seconds {
            next = next.next_second();
        }
        *guard = next;
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_shares_instant_across_clones() {
        let clock = FixedClock::at(Timestamp::parse("20260807_120000").unwrap());
        let handle = clock.clone();
        handle.advance_secs(61);
        assert_eq!(clock.now().compact(), "20260807_120101");
    }

    #[test]
    fn test_system_clock_produces_parsable_timestamps() {
        let now = SystemClock.now();
        assert!(Timestamp::parse(&now.compact()).is_ok());
    }
}
