//! Deterministic [`dlq_core::clock::Clock`] for tests.

use chrono::{DateTime, Utc};
use dlq_core::clock::Clock;

/// A clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a fixed clock at `time`.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }

    /// `2026-01-01T00:00:00Z`, a convenient default for tests that don't
    /// care about the exact instant.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn test_time() -> Self {
        Self::new(
            DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_returns_the_same_time() {
        let clock = FixedClock::test_time();
        assert_eq!(clock.now(), clock.now());
    }
}
