//! Clock trait — abstracts time operations for testability.

use chrono::{DateTime, Utc};

/// Abstracts "now" so decision logic (TTL checks, cache-hit windows,
/// backoff scheduling) can be driven by a fixed clock in tests.
///
/// # Examples
///
/// ```
/// use dlq_core::clock::Clock;
/// use chrono::{DateTime, Utc};
///
/// struct SystemClock;
/// impl Clock for SystemClock {
///     fn now(&self) -> DateTime<Utc> {
///         Utc::now()
///     }
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production [`Clock`] backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_a_recent_timestamp() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
