//! Time sources for the rate limiter.

use std::fmt::Debug;
use std::time::Instant;

/// Source of monotonic time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same underlying time, so advancing one advances all.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: std::sync::Arc<std::sync::Mutex<Instant>>,
}

#[cfg(test)]
impl MockClock {
    pub fn new(start: Instant) -> Self {
        Self {
            current_time: std::sync::Arc::new(std::sync::Mutex::new(start)),
        }
    }

    pub fn advance(&self, duration: std::time::Duration) {
        let mut time = self.current_time.lock().expect("MockClock mutex poisoned");
        *time += duration;
    }
}

#[cfg(test)]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current_time.lock().expect("MockClock mutex poisoned")
    }
}
