// Pacing - Drift-corrected step decisions for both heartbeat kinds
//
// Display-synchronized heartbeats arrive at the host's refresh cadence, so
// pacing decides how many core steps fit into the time since the last step
// (possibly zero). Interval-timer heartbeats are self-scheduled, so pacing
// instead decides how long to wait before the next one.
//
// In both cases `drift` carries the signed sub-frame error from one decision
// to the next. It is always derived from measured time and never exceeds one
// frame interval in magnitude, so a stall can never turn into an unbounded
// catch-up burst.

/// Default host refresh cadence in Hz
pub const DEFAULT_NATIVE_RATE: f64 = 60.0;

/// Default jitter tolerance for display-synchronized heartbeats (ms)
pub const DEFAULT_SLACK_MS: f64 = 2.0;

/// Default maximum number of core steps per heartbeat
pub const DEFAULT_MAX_BURST: u32 = 5;

/// Default feedback factor for interval-timer drift correction
pub const DEFAULT_DRIFT_DAMPING: f64 = 0.5;

/// Rates closer than this to the native cadence run 1:1
const NATIVE_RATE_EPSILON: f64 = 0.01;

/// Tunable pacing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingParams {
    /// Host refresh cadence in Hz
    pub native_rate: f64,
    /// Early-heartbeat tolerance in milliseconds
    pub slack_ms: f64,
    /// Upper bound on steps per heartbeat
    pub max_burst: u32,
    /// Fraction of accumulated drift corrected per interval-timer tick (0..=1)
    pub drift_damping: f64,
}

impl Default for PacingParams {
    fn default() -> Self {
        Self {
            native_rate: DEFAULT_NATIVE_RATE,
            slack_ms: DEFAULT_SLACK_MS,
            max_burst: DEFAULT_MAX_BURST,
            drift_damping: DEFAULT_DRIFT_DAMPING,
        }
    }
}

impl PacingParams {
    /// Replace non-finite or out-of-range values with their defaults
    ///
    /// `native_rate` must be positive, `slack_ms` non-negative,
    /// `max_burst` at least 1 and `drift_damping` within 0..=1.
    pub fn validated(self) -> Self {
        let defaults = Self::default();
        let mut params = self;

        if !(params.native_rate.is_finite() && params.native_rate > 0.0) {
            tracing::warn!(value = params.native_rate, "Invalid native_rate, using default");
            params.native_rate = defaults.native_rate;
        }
        if !(params.slack_ms.is_finite() && params.slack_ms >= 0.0) {
            tracing::warn!(value = params.slack_ms, "Invalid slack_ms, using default");
            params.slack_ms = defaults.slack_ms;
        }
        if params.max_burst == 0 {
            tracing::warn!("Invalid max_burst 0, using default");
            params.max_burst = defaults.max_burst;
        }
        if !(0.0..=1.0).contains(&params.drift_damping) {
            tracing::warn!(value = params.drift_damping, "Invalid drift_damping, using default");
            params.drift_damping = defaults.drift_damping;
        }

        params
    }
}

/// Next interval-timer registration computed by `PacingClock::plan_interval`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalPlan {
    /// Whole milliseconds to wait before the next heartbeat
    pub delay_ms: f64,
}

/// Per-scheduler pacing state
#[derive(Debug, Clone)]
pub struct PacingClock {
    target_rate: f64,
    last_tick: Option<f64>,
    drift: f64,
    paused_at: Option<f64>,
    expected_at: Option<f64>,
}

impl PacingClock {
    /// Create a pacing clock for `target_rate` frames per second
    pub fn new(target_rate: f64) -> Self {
        Self {
            target_rate,
            last_tick: None,
            drift: 0.0,
            paused_at: None,
            expected_at: None,
        }
    }

    /// Target rate in frames per second
    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }

    /// Change the target rate, discarding accumulated drift
    pub fn set_target_rate(&mut self, rate: f64) {
        self.target_rate = rate;
        self.drift = 0.0;
    }

    /// Milliseconds per frame at the target rate
    pub fn frame_interval(&self) -> f64 {
        1000.0 / self.target_rate
    }

    /// Signed residual carried to the next decision (ms)
    pub fn drift(&self) -> f64 {
        self.drift
    }

    /// Time of the last step decision
    pub fn last_tick(&self) -> Option<f64> {
        self.last_tick
    }

    /// Start pacing from scratch at `now`
    pub fn reset(&mut self, now: f64) {
        self.last_tick = Some(now);
        self.drift = 0.0;
        self.paused_at = None;
        self.expected_at = None;
    }

    /// Move the time reference to `now`, keeping drift
    pub fn rebase(&mut self, now: f64) {
        self.last_tick = Some(now);
    }

    /// Zero the carried residual
    pub fn discard_drift(&mut self) {
        self.drift = 0.0;
    }

    /// Remember when a pause began
    pub fn suspend(&mut self, now: f64) {
        self.paused_at.get_or_insert(now);
    }

    /// Exclude the paused span from elapsed-time accounting
    pub fn unsuspend(&mut self, now: f64) {
        if let Some(paused_at) = self.paused_at.take() {
            let paused_for = (now - paused_at).max(0.0);
            if let Some(last) = self.last_tick.as_mut() {
                *last += paused_for;
            }
        }
    }

    /// Check whether the target rate matches the host cadence
    pub fn is_native(&self, params: &PacingParams) -> bool {
        (self.target_rate - params.native_rate).abs() < NATIVE_RATE_EPSILON
    }

    /// Decide how many steps a display-synchronized heartbeat at `now` runs
    ///
    /// Returns 0 when the heartbeat arrived too early; drift and the time
    /// reference are then left untouched.
    pub fn display_steps(&mut self, now: f64, params: &PacingParams) -> u32 {
        let interval = self.frame_interval();
        let last = *self.last_tick.get_or_insert(now);
        let elapsed = now - last + self.drift;

        if elapsed < interval - params.slack_ms {
            return 0;
        }

        let max_burst = params.max_burst.max(1);
        let steps = (elapsed / interval).floor().clamp(1.0, max_burst as f64) as u32;
        self.drift = (elapsed - steps as f64 * interval).clamp(-interval, interval);
        self.last_tick = Some(now);
        steps
    }

    /// Account for the lateness of an interval-timer heartbeat firing at `now`
    pub fn observe_timer(&mut self, now: f64) {
        if let Some(expected) = self.expected_at.take() {
            let interval = self.frame_interval();
            self.drift = (self.drift + (now - expected)).clamp(-interval, interval);
        }
        self.last_tick = Some(now);
    }

    /// Compute the delay until the next interval-timer heartbeat
    ///
    /// `now` is the time the current cycle finished; the time spent since the
    /// heartbeat fired counts against the next interval.
    pub fn plan_interval(&mut self, now: f64, params: &PacingParams) -> IntervalPlan {
        let interval = self.frame_interval();
        let started = self.last_tick.unwrap_or(now);
        let work = (now - started).max(0.0);
        let damping = params.drift_damping.clamp(0.0, 1.0);

        let raw = interval - work - self.drift * damping;
        let delay = raw.max(0.0).floor();
        // Whatever the timer cannot express (fraction, negative wait) becomes
        // part of the error observed on the next tick.
        self.drift = (self.drift * (1.0 - damping) + (delay - raw)).clamp(-interval, interval);
        self.expected_at = Some(now + delay);

        IntervalPlan { delay_ms: delay }
    }

    /// Plan a heartbeat without touching drift (paused or fast-forward)
    pub fn plan_fixed(&mut self, now: f64, delay_ms: f64) -> IntervalPlan {
        let delay = delay_ms.max(0.0).floor();
        self.expected_at = Some(now + delay);
        IntervalPlan { delay_ms: delay }
    }

    /// Forget the pending timer expectation
    pub fn clear_expectation(&mut self) {
        self.expected_at = None;
    }
}

/// Frame-skip counter
///
/// Counts successful steps; a render is due once more than
/// `configured_skip` steps happened since the last one.
#[derive(Debug, Clone, Default)]
pub struct FrameSkipCounter {
    configured_skip: u32,
    current_count: u32,
}

impl FrameSkipCounter {
    /// Create a counter skipping `configured_skip` frames between renders
    pub fn new(configured_skip: u32) -> Self {
        Self {
            configured_skip,
            current_count: 0,
        }
    }

    /// Frames skipped between presentations
    pub fn configured_skip(&self) -> u32 {
        self.configured_skip
    }

    /// Change the skip amount; the running count is kept
    pub fn set_configured_skip(&mut self, skip: u32) {
        self.configured_skip = skip;
    }

    /// Record `steps` successful core steps
    pub fn record_steps(&mut self, steps: u32) {
        self.current_count = self.current_count.saturating_add(steps);
    }

    /// Check whether a render is due, consuming the count if so
    pub fn take_render(&mut self) -> bool {
        if self.current_count > self.configured_skip {
            self.current_count = 0;
            true
        } else {
            false
        }
    }

    /// Restart counting
    pub fn reset(&mut self) {
        self.current_count = 0;
    }
}
