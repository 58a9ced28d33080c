//! Time source abstraction
//!
//! Expiry deadlines are computed against a [`Clock`] so that tests can
//! replace the monotonic system clock with a [`MockClock`] and move time
//! forward explicitly.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use omnicache_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_millis(250));
//! assert_eq!(clock.now().duration_since(start), Duration::from_millis(250));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of monotonic time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current monotonic instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually driven clock.
///
/// Clones share the same elapsed counter, so a scheduler and a test can
/// hold the same clock and observe each other's advances.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Move the clock forward to `instant`. Instants in the past are ignored.
    pub fn advance_to(&self, instant: Instant) {
        let mut elapsed = self.elapsed.lock();
        let target = instant.saturating_duration_since(self.start);
        if target > *elapsed {
            *elapsed = target;
        }
    }

    /// Time simulated since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}
