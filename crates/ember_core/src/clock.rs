//! Time sources for the frame driver.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic time in seconds.
///
/// The driver keeps its own restart-relative origin, so implementations
/// only need a monotonically non-decreasing reading. Non-monotonic sources
/// are not handled.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall clock backed by `std::time::Instant`.
#[derive(Debug)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for deterministic tests.
///
/// Clones share the same underlying time, so a test can keep one handle
/// while the driver owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    seconds: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        self.seconds.set(seconds);
    }

    pub fn advance(&self, delta: f64) {
        self.seconds.set(self.seconds.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.seconds.get()
    }
}
