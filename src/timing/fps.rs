// FPS monitor - Counts completed frames in one-second windows
//
// The monitor reports a new rate only when it changed since the last report,
// so an idle or paused scheduler does not produce a stream of identical
// notifications.

/// Length of one measurement window in milliseconds
pub const FPS_WINDOW_MS: f64 = 1000.0;

/// Floating-point summation slack when deciding that a window has elapsed
const WINDOW_TOLERANCE_MS: f64 = 1e-6;

/// Frame-rate monitor
#[derive(Debug, Clone, Default)]
pub struct FpsMonitor {
    count: u32,
    previous_reported: u32,
    window_elapsed: f64,
    last_update: Option<f64>,
}

impl FpsMonitor {
    /// Create a monitor with an empty window
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed frame at time `now`
    ///
    /// Returns `Some(rate)` when the window rolled over and the rate differs
    /// from the previous report.
    pub fn update(&mut self, now: f64) -> Option<u32> {
        let delta = self.last_update.map_or(0.0, |last| (now - last).max(0.0));
        self.last_update = Some(now);
        self.count += 1;
        self.window_elapsed += delta;

        if self.window_elapsed + WINDOW_TOLERANCE_MS < FPS_WINDOW_MS {
            return None;
        }

        let count = self.count;
        self.count = 0;
        // Keep the sub-window remainder instead of zeroing it
        self.window_elapsed = (self.window_elapsed - FPS_WINDOW_MS).max(0.0);

        if count != self.previous_reported {
            self.previous_reported = count;
            Some(count)
        } else {
            None
        }
    }

    /// Re-anchor the time reference after a pause
    ///
    /// The frame count of the current window is kept.
    pub fn resume(&mut self, now: f64) {
        self.last_update = Some(now);
    }

    /// Clear all state, including the last reported rate
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Frames counted in the current window
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Last rate that was reported
    pub fn last_reported(&self) -> u32 {
        self.previous_reported
    }

    /// Milliseconds accumulated in the current window
    pub fn window_elapsed(&self) -> f64 {
        self.window_elapsed
    }
}
