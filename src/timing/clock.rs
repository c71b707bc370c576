// Clock - Millisecond time sources for pacing decisions
//
// All pacing arithmetic is done in f64 milliseconds. The monotonic clock is
// used by real hosts; the manual clock lets tests and simulations drive time
// explicitly.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A source of monotonically non-decreasing time in milliseconds
pub trait Clock {
    /// Current time in milliseconds since an arbitrary origin
    fn now_ms(&self) -> f64;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Instant corresponding to `ms` on this clock
    pub fn instant_at(&self, ms: f64) -> Instant {
        self.origin + Duration::from_secs_f64(ms.max(0.0) / 1000.0)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Manually advanced clock
///
/// Clones share the same time value, so one handle can be given to the
/// scheduler while the test keeps another to advance it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    /// Create a clock starting at 0 ms
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the absolute time
    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    /// Advance time by `ms`
    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}
