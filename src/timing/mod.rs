// Timing module - Clocks, frame-rate measurement and pacing arithmetic
//
// This module provides:
// - Millisecond clocks (monotonic for hosts, manual for simulations)
// - The FPS monitor (one-second windows, change-only reporting)
// - Drift-corrected pacing for display-synchronized and timer heartbeats
// - The frame-skip counter

pub mod clock;
pub mod fps;
pub mod pacing;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use fps::{FpsMonitor, FPS_WINDOW_MS};
pub use pacing::{FrameSkipCounter, IntervalPlan, PacingClock, PacingParams};
