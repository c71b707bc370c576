// Scheduler module - Run/pause/stop state machine and frame pacing
//
// The frame scheduler decides, on every heartbeat, whether to step the
// emulation core, how many times, and whether to present the result. It
// owns the pacing clock, the frame-skip counter and the FPS monitor, and
// talks to the host only through a `HeartbeatSource` (when to wake up) and
// a `Surface` (where frames go).
//
// # Usage
//
// ```
// use emu_pacer::core::{CoreSlot, TestPatternCore};
// use emu_pacer::scheduler::{FrameScheduler, PolledHeartbeat, SchedulerConfig};
// use emu_pacer::timing::ManualClock;
//
// let clock = ManualClock::new();
// let core = CoreSlot::ready(TestPatternCore::new(44100));
// let heartbeat = PolledHeartbeat::new(clock.clone());
// let mut scheduler =
//     FrameScheduler::new(core, heartbeat, clock.clone(), SchedulerConfig::default());
//
// scheduler.start().unwrap();
// clock.advance(1000.0 / 60.0);
// let handle = scheduler.heartbeat_source().display_handle().unwrap();
// let tick = scheduler.heartbeat(handle).unwrap();
// assert_eq!(tick.steps, 1);
// ```

mod heartbeat;

pub use heartbeat::{Beat, HeartbeatError, HeartbeatHandle, HeartbeatSource, PolledHeartbeat};

use crate::core::{CoreSlot, EmulationCore, VideoFrame};
use crate::timing::{Clock, FpsMonitor, FrameSkipCounter, PacingClock, PacingParams};
use serde::{Deserialize, Serialize};

/// Scheduler run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// No heartbeat registered
    Stopped,
    /// Stepping and presenting
    Running,
    /// Heartbeats arrive but only the tick callbacks run
    Paused,
}

/// Which heartbeat kind drives the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingMode {
    /// Host display refresh callback
    DisplaySynchronized,
    /// Self-scheduled one-shot timer
    IntervalTimer,
}

/// Presentation target for rendered frames
pub trait Surface {
    /// Copy `frame` to the presentation target
    fn present(&mut self, frame: VideoFrame<'_>);

    /// Blank the presentation target
    fn clear(&mut self) {}
}

/// Outcome of one delivered heartbeat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tick {
    /// Core steps performed
    pub steps: u32,
    /// Whether a frame was presented
    pub rendered: bool,
}

/// Errors raised by the scheduler
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The host refused to register a heartbeat; the scheduler is stopped
    #[error("heartbeat registration failed: {0}")]
    Heartbeat(#[from] HeartbeatError),
}

/// Scheduler settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Target emulation rate in frames per second
    pub target_rate: f64,
    /// Frames skipped between presentations
    pub frame_skip: u32,
    /// Heartbeat kind
    pub mode: TimingMode,
    /// Pacing tunables
    pub pacing: PacingParams,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            target_rate: 60.0,
            frame_skip: 0,
            mode: TimingMode::DisplaySynchronized,
            pacing: PacingParams::default(),
        }
    }
}

/// Frame scheduler
///
/// Generic over the emulation core and the heartbeat source. Lives on the
/// host's event-loop thread; the subscriber callbacks are plain `FnMut`.
pub struct FrameScheduler<C, H> {
    core: CoreSlot<C>,
    heartbeat: H,
    clock: Box<dyn Clock>,
    surface: Option<Box<dyn Surface>>,

    state: ScheduleState,
    mode: TimingMode,
    params: PacingParams,
    pacing: PacingClock,
    skip: FrameSkipCounter,
    fps: FpsMonitor,
    fast_forward: bool,
    active: Option<HeartbeatHandle>,

    tick_hooks: Vec<Box<dyn FnMut()>>,
    rate_hooks: Vec<Box<dyn FnMut(u32)>>,
    rendered_hooks: Vec<Box<dyn FnMut()>>,

    total_steps: u64,
    total_renders: u64,
}

impl<C: EmulationCore, H: HeartbeatSource> FrameScheduler<C, H> {
    /// Create a stopped scheduler
    pub fn new(
        core: CoreSlot<C>,
        heartbeat: H,
        clock: impl Clock + 'static,
        config: SchedulerConfig,
    ) -> Self {
        let params = config.pacing.validated();
        let target_rate = if config.target_rate.is_finite() && config.target_rate > 0.0 {
            config.target_rate
        } else {
            tracing::warn!(rate = config.target_rate, "Invalid target rate, using native rate");
            params.native_rate
        };

        Self {
            core,
            heartbeat,
            clock: Box::new(clock),
            surface: None,
            state: ScheduleState::Stopped,
            mode: config.mode,
            params,
            pacing: PacingClock::new(target_rate),
            skip: FrameSkipCounter::new(config.frame_skip),
            fps: FpsMonitor::new(),
            fast_forward: false,
            active: None,
            tick_hooks: Vec::new(),
            rate_hooks: Vec::new(),
            rendered_hooks: Vec::new(),
            total_steps: 0,
            total_renders: 0,
        }
    }

    /// Set the presentation surface
    pub fn set_surface(&mut self, surface: impl Surface + 'static) {
        self.surface = Some(Box::new(surface));
    }

    /// Blank the presentation surface, if any
    pub fn clear_surface(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
    }

    /// Subscribe to every delivered heartbeat, paused or not
    pub fn on_tick(&mut self, hook: impl FnMut() + 'static) {
        self.tick_hooks.push(Box::new(hook));
    }

    /// Subscribe to frame-rate changes
    pub fn on_rate_changed(&mut self, hook: impl FnMut(u32) + 'static) {
        self.rate_hooks.push(Box::new(hook));
    }

    /// Subscribe to presented frames
    pub fn on_frame_rendered(&mut self, hook: impl FnMut() + 'static) {
        self.rendered_hooks.push(Box::new(hook));
    }

    /// Start the scheduler
    ///
    /// Does nothing if already running or paused. On a refused heartbeat the
    /// scheduler stays stopped and the error is returned.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.state != ScheduleState::Stopped {
            return Ok(());
        }

        let now = self.clock.now_ms();
        self.skip.reset();
        self.pacing.reset(now);
        self.fps.reset();
        self.fps.resume(now);
        self.state = ScheduleState::Running;

        let beat = match self.mode {
            TimingMode::DisplaySynchronized => Beat::DisplaySync,
            TimingMode::IntervalTimer => Beat::After(self.pacing.plan_fixed(now, 0.0).delay_ms),
        };
        self.arm(beat)?;

        tracing::info!(
            mode = ?self.mode,
            target_rate = self.pacing.target_rate(),
            "Scheduler started"
        );
        Ok(())
    }

    /// Stop the scheduler, cancelling the active heartbeat
    pub fn stop(&mut self) {
        if self.state == ScheduleState::Stopped {
            return;
        }
        if let Some(handle) = self.active.take() {
            self.heartbeat.cancel(handle);
        }
        self.pacing.clear_expectation();
        self.state = ScheduleState::Stopped;
        tracing::info!(steps = self.total_steps, "Scheduler stopped");
    }

    /// Pause stepping; tick callbacks keep firing
    pub fn pause(&mut self) {
        if self.state != ScheduleState::Running {
            return;
        }
        let now = self.clock.now_ms();
        self.pacing.suspend(now);
        self.state = ScheduleState::Paused;
        tracing::debug!("Scheduler paused");
    }

    /// Resume stepping without a catch-up burst
    pub fn resume(&mut self) {
        if self.state != ScheduleState::Paused {
            return;
        }
        let now = self.clock.now_ms();
        self.pacing.unsuspend(now);
        self.fps.resume(now);
        self.state = ScheduleState::Running;
        tracing::debug!("Scheduler resumed");
    }

    /// Toggle between running and paused
    pub fn toggle_pause(&mut self) {
        match self.state {
            ScheduleState::Running => self.pause(),
            ScheduleState::Paused => self.resume(),
            ScheduleState::Stopped => {}
        }
    }

    /// Change the target rate, discarding accumulated drift
    ///
    /// Non-finite or non-positive rates are ignored.
    pub fn set_target_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            tracing::warn!(rate, "Ignoring invalid target rate");
            return;
        }
        self.pacing.set_target_rate(rate);
    }

    /// Change the number of frames skipped between presentations
    pub fn set_frame_skip(&mut self, skip: u32) {
        self.skip.set_configured_skip(skip);
    }

    /// Enable or disable fast-forward
    pub fn set_fast_forward(&mut self, enabled: bool) {
        if self.fast_forward == enabled {
            return;
        }
        self.fast_forward = enabled;
        if !enabled {
            // Normal pacing restarts from here instead of catching up
            let now = self.clock.now_ms();
            self.pacing.rebase(now);
            self.pacing.discard_drift();
        }
        tracing::debug!(enabled, "Fast-forward changed");
    }

    /// Switch the heartbeat kind
    ///
    /// When active, the current heartbeat is cancelled and the new one
    /// registered; state and drift are preserved. A refused registration
    /// stops the scheduler.
    pub fn set_timing_mode(&mut self, mode: TimingMode) -> Result<(), SchedulerError> {
        if self.mode == mode {
            return Ok(());
        }
        self.mode = mode;
        if self.state == ScheduleState::Stopped {
            return Ok(());
        }

        if let Some(handle) = self.active.take() {
            self.heartbeat.cancel(handle);
        }

        let now = self.clock.now_ms();
        let beat = match mode {
            TimingMode::DisplaySynchronized => {
                self.pacing.clear_expectation();
                Beat::DisplaySync
            }
            TimingMode::IntervalTimer => {
                let since_last = self.pacing.last_tick().map_or(0.0, |last| now - last);
                let remaining = self.pacing.frame_interval() - since_last;
                Beat::After(self.pacing.plan_fixed(now, remaining).delay_ms)
            }
        };
        self.arm(beat)?;
        tracing::info!(?mode, "Timing mode changed");
        Ok(())
    }

    /// Deliver a heartbeat
    ///
    /// Stale handles and heartbeats arriving while stopped are ignored. In
    /// interval-timer mode the next heartbeat is registered before
    /// returning; if the host refuses it the scheduler stops and the error
    /// is returned.
    pub fn heartbeat(&mut self, handle: HeartbeatHandle) -> Result<Tick, SchedulerError> {
        if self.state == ScheduleState::Stopped || self.active != Some(handle) {
            tracing::trace!(handle = handle.id(), "Ignoring stale heartbeat");
            return Ok(Tick::default());
        }

        for hook in self.tick_hooks.iter_mut() {
            hook();
        }

        let now = self.clock.now_ms();
        match self.mode {
            TimingMode::DisplaySynchronized => Ok(self.display_tick(now)),
            TimingMode::IntervalTimer => self.interval_tick(now),
        }
    }

    fn display_tick(&mut self, now: f64) -> Tick {
        if self.state == ScheduleState::Paused {
            return Tick::default();
        }

        let steps = if self.fast_forward {
            self.pacing.rebase(now);
            self.params.max_burst.max(1)
        } else if self.pacing.is_native(&self.params) {
            self.pacing.rebase(now);
            1
        } else {
            self.pacing.display_steps(now, &self.params)
        };

        self.run_steps(steps, now)
    }

    fn interval_tick(&mut self, now: f64) -> Result<Tick, SchedulerError> {
        // One-shot: this handle is spent
        self.active = None;

        let tick = if self.state == ScheduleState::Paused {
            self.pacing.clear_expectation();
            Tick::default()
        } else if self.fast_forward {
            self.pacing.clear_expectation();
            self.pacing.rebase(now);
            self.run_steps(self.params.max_burst.max(1), now)
        } else {
            self.pacing.observe_timer(now);
            self.run_steps(1, now)
        };

        let end = self.clock.now_ms();
        let plan = if self.state == ScheduleState::Paused {
            let interval = self.pacing.frame_interval();
            self.pacing.plan_fixed(end, interval)
        } else if self.fast_forward {
            self.pacing.plan_fixed(end, 0.0)
        } else {
            self.pacing.plan_interval(end, &self.params)
        };

        self.arm(Beat::After(plan.delay_ms))?;
        Ok(tick)
    }

    fn arm(&mut self, beat: Beat) -> Result<(), SchedulerError> {
        match self.heartbeat.register(beat) {
            Ok(handle) => {
                self.active = Some(handle);
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, ?beat, "Heartbeat registration refused, stopping");
                self.active = None;
                self.pacing.clear_expectation();
                self.state = ScheduleState::Stopped;
                Err(err.into())
            }
        }
    }

    fn run_steps(&mut self, steps: u32, now: f64) -> Tick {
        if steps == 0 {
            return Tick::default();
        }

        let stepped = self.core.with(|core| {
            for _ in 0..steps {
                core.step();
            }
        });
        if stepped.is_none() {
            return Tick::default();
        }
        self.total_steps += u64::from(steps);

        let rendered = if self.fast_forward {
            self.skip.reset();
            self.render()
        } else {
            self.skip.record_steps(steps);
            self.skip.take_render() && self.render()
        };

        for _ in 0..steps {
            if let Some(rate) = self.fps.update(now) {
                tracing::debug!(rate, "Frame rate changed");
                for hook in self.rate_hooks.iter_mut() {
                    hook(rate);
                }
            }
        }

        Tick { steps, rendered }
    }

    fn render(&mut self) -> bool {
        if let Some(surface) = self.surface.as_mut() {
            self.core.with(|core| surface.present(core.video_frame()));
        }
        self.total_renders += 1;
        for hook in self.rendered_hooks.iter_mut() {
            hook();
        }
        true
    }

    /// Current run state
    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// Check whether the scheduler is paused
    pub fn is_paused(&self) -> bool {
        self.state == ScheduleState::Paused
    }

    /// Current heartbeat kind
    pub fn timing_mode(&self) -> TimingMode {
        self.mode
    }

    /// Target rate in frames per second
    pub fn target_rate(&self) -> f64 {
        self.pacing.target_rate()
    }

    /// Frames skipped between presentations
    pub fn frame_skip(&self) -> u32 {
        self.skip.configured_skip()
    }

    /// Check whether fast-forward is enabled
    pub fn is_fast_forward(&self) -> bool {
        self.fast_forward
    }

    /// Drift carried to the next pacing decision (ms)
    pub fn drift_ms(&self) -> f64 {
        self.pacing.drift()
    }

    /// Pacing tunables
    pub fn params(&self) -> &PacingParams {
        &self.params
    }

    /// Handle of the armed heartbeat
    pub fn active_heartbeat(&self) -> Option<HeartbeatHandle> {
        self.active
    }

    /// Core steps performed since creation
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Frames presented since creation
    pub fn total_renders(&self) -> u64 {
        self.total_renders
    }

    /// Last reported frame rate
    pub fn reported_fps(&self) -> u32 {
        self.fps.last_reported()
    }

    /// Shared core handle
    pub fn core(&self) -> &CoreSlot<C> {
        &self.core
    }

    /// Heartbeat source
    pub fn heartbeat_source(&self) -> &H {
        &self.heartbeat
    }

    /// Mutable heartbeat source
    pub fn heartbeat_source_mut(&mut self) -> &mut H {
        &mut self.heartbeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CoreError, SoundOptions};
    use crate::timing::ManualClock;
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use std::rc::Rc;

    const FRAME: [u8; 4] = [1, 2, 3, 4];

    #[derive(Default)]
    struct CountingCore {
        steps: u32,
    }

    impl EmulationCore for CountingCore {
        fn step(&mut self) {
            self.steps += 1;
        }

        fn video_frame(&self) -> VideoFrame<'_> {
            VideoFrame {
                width: 1,
                height: 1,
                pixels: &FRAME,
            }
        }

        fn read_audio(&mut self, _out: &mut [i16]) -> usize {
            0
        }

        fn reset(&mut self) {
            self.steps = 0;
        }

        fn load_state(&mut self, _path: &Path) -> Result<(), CoreError> {
            Ok(())
        }

        fn save_state(&self, _path: &Path) -> Result<(), CoreError> {
            Ok(())
        }

        fn configure_sound(&mut self, _options: &SoundOptions) {}
    }

    struct RecordingSurface {
        presented: Rc<RefCell<Vec<Vec<u8>>>>,
    }

    impl Surface for RecordingSurface {
        fn present(&mut self, frame: VideoFrame<'_>) {
            self.presented.borrow_mut().push(frame.pixels.to_vec());
        }
    }

    fn scheduler(
        config: SchedulerConfig,
    ) -> (
        FrameScheduler<CountingCore, PolledHeartbeat>,
        ManualClock,
        CoreSlot<CountingCore>,
    ) {
        let clock = ManualClock::new();
        let core = CoreSlot::ready(CountingCore::default());
        let heartbeat = PolledHeartbeat::new(clock.clone());
        let scheduler = FrameScheduler::new(core.clone(), heartbeat, clock.clone(), config);
        (scheduler, clock, core)
    }

    fn fire(scheduler: &mut FrameScheduler<CountingCore, PolledHeartbeat>) -> Tick {
        let handle = scheduler
            .heartbeat_source_mut()
            .trigger()
            .expect("armed heartbeat");
        scheduler.heartbeat(handle).expect("heartbeat")
    }

    #[test]
    fn test_new_scheduler_is_stopped() {
        let (scheduler, _, _) = scheduler(SchedulerConfig::default());
        assert_eq!(scheduler.state(), ScheduleState::Stopped);
        assert!(scheduler.active_heartbeat().is_none());
    }

    #[test]
    fn test_start_registers_heartbeat() {
        let (mut scheduler, _, _) = scheduler(SchedulerConfig::default());
        scheduler.start().expect("start");

        assert_eq!(scheduler.state(), ScheduleState::Running);
        let (_, beat) = scheduler.heartbeat_source().armed().expect("armed");
        assert_eq!(beat, Beat::DisplaySync);
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (mut scheduler, _, _) = scheduler(SchedulerConfig::default());
        scheduler.start().expect("start");
        let handle = scheduler.active_heartbeat();

        scheduler.start().expect("start again");
        assert_eq!(scheduler.active_heartbeat(), handle);
    }

    #[test]
    fn test_stop_is_idempotent_and_cancels() {
        let (mut scheduler, _, _) = scheduler(SchedulerConfig::default());
        scheduler.start().expect("start");
        scheduler.stop();
        scheduler.stop();

        assert_eq!(scheduler.state(), ScheduleState::Stopped);
        assert!(scheduler.heartbeat_source().armed().is_none());
    }

    #[test]
    fn test_stop_from_paused() {
        let (mut scheduler, _, _) = scheduler(SchedulerConfig::default());
        scheduler.start().expect("start");
        scheduler.pause();
        scheduler.stop();
        assert_eq!(scheduler.state(), ScheduleState::Stopped);
    }

    #[test]
    fn test_native_rate_steps_every_heartbeat() {
        let (mut scheduler, clock, core) = scheduler(SchedulerConfig::default());
        scheduler.start().expect("start");

        for _ in 0..10 {
            clock.advance(1000.0 / 60.0);
            let tick = fire(&mut scheduler);
            assert_eq!(tick, Tick { steps: 1, rendered: true });
        }
        assert_eq!(core.with(|c| c.steps), Some(10));
    }

    #[test]
    fn test_half_rate_steps_every_other_heartbeat() {
        let config = SchedulerConfig {
            target_rate: 30.0,
            ..SchedulerConfig::default()
        };
        let (mut scheduler, clock, core) = scheduler(config);
        scheduler.start().expect("start");

        for _ in 0..60 {
            clock.advance(1000.0 / 60.0);
            fire(&mut scheduler);
        }
        assert_eq!(core.with(|c| c.steps), Some(30));
    }

    #[test]
    fn test_paused_runs_tick_hooks_only() {
        let (mut scheduler, clock, core) = scheduler(SchedulerConfig::default());
        let ticks = Rc::new(Cell::new(0));
        let counter = Rc::clone(&ticks);
        scheduler.on_tick(move || counter.set(counter.get() + 1));

        scheduler.start().expect("start");
        scheduler.pause();
        for _ in 0..5 {
            clock.advance(1000.0 / 60.0);
            assert_eq!(fire(&mut scheduler), Tick::default());
        }

        assert_eq!(ticks.get(), 5);
        assert_eq!(core.with(|c| c.steps), Some(0));
    }

    #[test]
    fn test_resume_after_long_pause_has_no_burst() {
        let config = SchedulerConfig {
            target_rate: 30.0,
            ..SchedulerConfig::default()
        };
        let (mut scheduler, clock, _) = scheduler(config);
        scheduler.start().expect("start");

        clock.advance(1000.0 / 30.0);
        assert_eq!(fire(&mut scheduler).steps, 1);

        scheduler.pause();
        clock.advance(5000.0);
        scheduler.resume();

        clock.advance(1000.0 / 30.0);
        assert_eq!(fire(&mut scheduler).steps, 1);
    }

    #[test]
    fn test_frame_skip_renders_every_third_step() {
        let config = SchedulerConfig {
            frame_skip: 2,
            ..SchedulerConfig::default()
        };
        let (mut scheduler, clock, _) = scheduler(config);
        let presented = Rc::new(RefCell::new(Vec::new()));
        scheduler.set_surface(RecordingSurface {
            presented: Rc::clone(&presented),
        });
        scheduler.start().expect("start");

        let rendered_on: Vec<u32> = (1..=9)
            .filter(|_| {
                clock.advance(1000.0 / 60.0);
                fire(&mut scheduler).rendered
            })
            .collect();

        assert_eq!(rendered_on, vec![3, 6, 9]);
        assert_eq!(presented.borrow().len(), 3);
        assert_eq!(presented.borrow()[0], FRAME.to_vec());
    }

    #[test]
    fn test_fast_forward_bursts_and_ignores_skip() {
        let config = SchedulerConfig {
            target_rate: 30.0,
            frame_skip: 3,
            ..SchedulerConfig::default()
        };
        let (mut scheduler, clock, core) = scheduler(config);
        scheduler.start().expect("start");
        scheduler.set_fast_forward(true);

        clock.advance(1000.0 / 60.0);
        let tick = fire(&mut scheduler);
        assert_eq!(tick.steps, scheduler.params().max_burst);
        assert!(tick.rendered);
        assert_eq!(core.with(|c| c.steps), Some(5));
    }

    #[test]
    fn test_leaving_fast_forward_does_not_catch_up() {
        let config = SchedulerConfig {
            target_rate: 30.0,
            ..SchedulerConfig::default()
        };
        let (mut scheduler, clock, _) = scheduler(config);
        scheduler.start().expect("start");
        scheduler.set_fast_forward(true);
        clock.advance(500.0);
        fire(&mut scheduler);

        clock.advance(500.0);
        scheduler.set_fast_forward(false);
        assert_eq!(scheduler.drift_ms(), 0.0);

        clock.advance(1000.0 / 60.0);
        assert_eq!(fire(&mut scheduler).steps, 0);
    }

    #[test]
    fn test_set_target_rate_rejects_invalid() {
        let (mut scheduler, _, _) = scheduler(SchedulerConfig::default());
        scheduler.set_target_rate(0.0);
        scheduler.set_target_rate(f64::NAN);
        assert_eq!(scheduler.target_rate(), 60.0);

        scheduler.set_target_rate(50.0);
        assert_eq!(scheduler.target_rate(), 50.0);
    }

    #[test]
    fn test_stale_heartbeat_is_ignored() {
        let (mut scheduler, clock, core) = scheduler(SchedulerConfig::default());
        scheduler.start().expect("start");
        let old = scheduler.active_heartbeat().expect("armed");

        scheduler
            .set_timing_mode(TimingMode::IntervalTimer)
            .expect("switch");
        clock.advance(20.0);
        assert_eq!(scheduler.heartbeat(old).expect("heartbeat"), Tick::default());
        assert_eq!(core.with(|c| c.steps), Some(0));
    }

    #[test]
    fn test_interval_mode_rearms_after_each_tick() {
        let config = SchedulerConfig {
            mode: TimingMode::IntervalTimer,
            ..SchedulerConfig::default()
        };
        let (mut scheduler, clock, core) = scheduler(config);
        scheduler.start().expect("start");

        let first = scheduler.heartbeat_source_mut().poll_due(clock.now_ms());
        let tick = scheduler.heartbeat(first.expect("due")).expect("heartbeat");
        assert_eq!(tick.steps, 1);

        let (_, beat) = scheduler.heartbeat_source().armed().expect("re-armed");
        assert_eq!(beat, Beat::After(16.0));
        assert_eq!(core.with(|c| c.steps), Some(1));
    }

    #[test]
    fn test_switch_mode_while_running_preserves_state() {
        let (mut scheduler, _, _) = scheduler(SchedulerConfig::default());
        scheduler.start().expect("start");
        scheduler.pause();

        scheduler
            .set_timing_mode(TimingMode::IntervalTimer)
            .expect("switch");
        assert_eq!(scheduler.state(), ScheduleState::Paused);
        assert!(matches!(
            scheduler.heartbeat_source().armed(),
            Some((_, Beat::After(_)))
        ));
    }

    #[test]
    fn test_refused_heartbeat_stops_scheduler() {
        let clock = ManualClock::new();
        let heartbeat = PolledHeartbeat::new(clock.clone()).with_display_sync(false);
        let mut scheduler = FrameScheduler::new(
            CoreSlot::ready(CountingCore::default()),
            heartbeat,
            clock,
            SchedulerConfig::default(),
        );

        let result = scheduler.start();
        assert!(matches!(
            result,
            Err(SchedulerError::Heartbeat(HeartbeatError::DisplaySyncUnavailable))
        ));
        assert_eq!(scheduler.state(), ScheduleState::Stopped);
    }

    #[test]
    fn test_refused_rearm_stops_scheduler() {
        let config = SchedulerConfig {
            mode: TimingMode::IntervalTimer,
            ..SchedulerConfig::default()
        };
        let (mut scheduler, _, _) = scheduler(config);
        scheduler.start().expect("start");

        let handle = scheduler.heartbeat_source_mut().trigger().expect("armed");
        scheduler.heartbeat_source_mut().close();
        assert!(scheduler.heartbeat(handle).is_err());
        assert_eq!(scheduler.state(), ScheduleState::Stopped);
    }

    #[test]
    fn test_uninitialized_core_does_not_render() {
        let clock = ManualClock::new();
        let heartbeat = PolledHeartbeat::new(clock.clone());
        let mut scheduler: FrameScheduler<CountingCore, _> = FrameScheduler::new(
            CoreSlot::uninitialized(),
            heartbeat,
            clock.clone(),
            SchedulerConfig::default(),
        );
        scheduler.start().expect("start");

        clock.advance(1000.0 / 60.0);
        let handle = scheduler.heartbeat_source().display_handle().expect("armed");
        assert_eq!(scheduler.heartbeat(handle).expect("heartbeat"), Tick::default());
        assert_eq!(scheduler.total_renders(), 0);
    }

    #[test]
    fn test_rate_changed_notification() {
        let (mut scheduler, clock, _) = scheduler(SchedulerConfig::default());
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&reports);
        scheduler.on_rate_changed(move |rate| sink.borrow_mut().push(rate));
        scheduler.start().expect("start");

        for _ in 0..120 {
            clock.advance(1000.0 / 60.0);
            fire(&mut scheduler);
        }
        assert_eq!(*reports.borrow(), vec![60]);
    }
}
