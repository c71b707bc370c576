// Common test utilities for pacing integration tests
//
// This module provides a minimal instrumented core and drivers that play
// the role of a host: delivering display-synchronized heartbeats at a
// jittered refresh cadence, or firing interval timers late or early.

#![allow(dead_code)]

use emu_pacer::core::{CoreError, EmulationCore, VideoFrame};
use emu_pacer::scheduler::{FrameScheduler, PolledHeartbeat, SchedulerConfig};
use emu_pacer::timing::{Clock, ManualClock};
use emu_pacer::CoreSlot;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Host refresh cadence used by the simulations (Hz)
pub const HOST_REFRESH_HZ: f64 = 60.0;

/// Simulated run length (ms)
pub const SIMULATED_MS: f64 = 10_000.0;

/// Maximum heartbeat jitter (ms)
pub const JITTER_MS: f64 = 3.0;

/// Seed for reproducible jitter
pub const SEED: u64 = 0x5EED;

const PIXEL: [u8; 4] = [0x20, 0x40, 0x60, 0xFF];

/// Core that counts steps and can burn simulated time per step
pub struct CountingCore {
    pub steps: u64,
    pub resets: u32,
    clock: Option<ManualClock>,
    work_ms: f64,
}

impl CountingCore {
    /// Core whose steps take no time
    pub fn new() -> Self {
        Self {
            steps: 0,
            resets: 0,
            clock: None,
            work_ms: 0.0,
        }
    }

    /// Core whose every step advances `clock` by `work_ms`
    pub fn with_work(clock: ManualClock, work_ms: f64) -> Self {
        Self {
            clock: Some(clock),
            work_ms,
            ..Self::new()
        }
    }
}

impl EmulationCore for CountingCore {
    fn step(&mut self) {
        self.steps += 1;
        if let Some(clock) = &self.clock {
            clock.advance(self.work_ms);
        }
    }

    fn video_frame(&self) -> VideoFrame<'_> {
        VideoFrame {
            width: 1,
            height: 1,
            pixels: &PIXEL,
        }
    }

    fn read_audio(&mut self, _out: &mut [i16]) -> usize {
        0
    }

    fn reset(&mut self) {
        self.steps = 0;
        self.resets += 1;
    }

    fn load_state(&mut self, _path: &Path) -> Result<(), CoreError> {
        Ok(())
    }

    fn save_state(&self, _path: &Path) -> Result<(), CoreError> {
        Ok(())
    }
}

pub type TestScheduler = FrameScheduler<CountingCore, PolledHeartbeat>;

/// Build a scheduler around a counting core driven by a manual clock
pub fn counting_scheduler(
    config: SchedulerConfig,
    work_ms: f64,
) -> (TestScheduler, ManualClock, CoreSlot<CountingCore>) {
    let clock = ManualClock::new();
    let core = CoreSlot::ready(CountingCore::with_work(clock.clone(), work_ms));
    let heartbeat = PolledHeartbeat::new(clock.clone());
    let scheduler = FrameScheduler::new(core.clone(), heartbeat, clock.clone(), config);
    (scheduler, clock, core)
}

/// Steps performed so far
pub fn steps(core: &CoreSlot<CountingCore>) -> u64 {
    core.with(|c| c.steps).unwrap_or(0)
}

/// Seeded jitter source
pub fn jitter_rng() -> StdRng {
    StdRng::seed_from_u64(SEED)
}

/// Deliver display refreshes from the current time until `until_ms`
///
/// Refreshes fall on the host cadence grid with uniform jitter of
/// `±jitter_ms`. Returns the number of heartbeats delivered.
pub fn run_display(
    scheduler: &mut TestScheduler,
    clock: &ManualClock,
    until_ms: f64,
    jitter_ms: f64,
    rng: &mut StdRng,
) -> u32 {
    let period = 1000.0 / HOST_REFRESH_HZ;
    let start = clock.now_ms();
    let mut delivered = 0;

    for k in 1.. {
        let nominal = start + period * k as f64;
        if nominal > until_ms {
            break;
        }
        let jitter = if jitter_ms > 0.0 {
            rng.random_range(-jitter_ms..=jitter_ms)
        } else {
            0.0
        };
        let at = (nominal + jitter).max(clock.now_ms());
        clock.set(at);

        if let Some(handle) = scheduler.heartbeat_source().display_handle() {
            scheduler.heartbeat(handle).expect("heartbeat");
            delivered += 1;
        }
    }

    delivered
}

/// Fire interval timers until `until_ms`
///
/// Each timer fires at its deadline shifted by uniform jitter of
/// `±jitter_ms`, never before the current time. Returns the number of
/// heartbeats delivered.
pub fn run_interval(
    scheduler: &mut TestScheduler,
    clock: &ManualClock,
    until_ms: f64,
    jitter_ms: f64,
    rng: &mut StdRng,
) -> u32 {
    let mut delivered = 0;

    while let Some(deadline) = scheduler.heartbeat_source().next_deadline() {
        let jitter = if jitter_ms > 0.0 {
            rng.random_range(-jitter_ms..=jitter_ms)
        } else {
            0.0
        };
        let at = (deadline + jitter).max(clock.now_ms());
        if at > until_ms {
            break;
        }
        clock.set(at);

        let handle = scheduler
            .heartbeat_source_mut()
            .trigger()
            .expect("armed timer");
        scheduler.heartbeat(handle).expect("heartbeat");
        delivered += 1;
    }

    clock.set(clock.now_ms().max(until_ms));
    delivered
}
