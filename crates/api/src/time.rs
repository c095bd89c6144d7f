// Path: crates/api/src/time.rs

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock time in milliseconds since the UNIX epoch.
///
/// Round computation is a pure function of durable state plus this value, so
/// injecting the clock is what makes the scheduler reproducible in tests.
pub trait Clock: Send + Sync {
    /// Current time, in milliseconds.
    fn now_millis(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let first = clock.now_millis();
        // 2020-01-01T00:00:00Z
        assert!(first > 1_577_836_800_000);
        assert!(clock.now_millis() >= first);
    }
}
