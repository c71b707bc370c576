// Session - Shell-facing coordinator
//
// Ties one emulation core to its frame scheduler and audio pipeline, and
// implements the quality-of-life features a front-end needs on top of
// them: save-state slots, audio capture, and applying speed and sound
// settings.

use crate::audio::{capture_file_name, lock_pipeline, AudioPipeline, CaptureError, SharedPipeline};
use crate::config::{PacerConfig, SoundConfig, SpeedConfig};
use crate::core::{CoreError, CoreSlot, EmulationCore};
use crate::scheduler::{
    FrameScheduler, HeartbeatHandle, HeartbeatSource, ScheduleState, SchedulerError, Surface,
    Tick, TimingMode,
};
use crate::timing::Clock;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Number of save-state slots
pub const SAVE_SLOTS: u8 = 10;

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Scheduler failure (heartbeat refused)
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The core failed to save or restore its state
    #[error("save state error: {0}")]
    Core(#[from] CoreError),

    /// Audio capture failure
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Slot number outside 0-9
    #[error("invalid save slot {0} (expected 0-{max})", max = SAVE_SLOTS - 1)]
    InvalidSlot(u8),

    /// Creating an output directory failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A running emulation session
///
/// # Example
///
/// ```
/// use emu_pacer::core::TestPatternCore;
/// use emu_pacer::scheduler::PolledHeartbeat;
/// use emu_pacer::timing::MonotonicClock;
/// use emu_pacer::{PacerConfig, Session};
///
/// let clock = MonotonicClock::new();
/// let mut session = Session::new(
///     TestPatternCore::new(44100),
///     "demo",
///     PolledHeartbeat::new(clock),
///     clock,
///     PacerConfig::default(),
/// );
/// session.start().unwrap();
/// session.toggle_pause();
/// assert!(session.is_paused());
/// ```
pub struct Session<C, H> {
    title: String,
    config: PacerConfig,
    core: CoreSlot<C>,
    scheduler: FrameScheduler<C, H>,
    pipeline: SharedPipeline<C>,
}

impl<C: EmulationCore, H: HeartbeatSource> Session<C, H> {
    /// Create a stopped session around `core`
    ///
    /// `title` names the save-state files of this session.
    pub fn new(
        core: C,
        title: impl Into<String>,
        heartbeat: H,
        clock: impl Clock + 'static,
        config: PacerConfig,
    ) -> Self {
        let core = CoreSlot::ready(core);
        let scheduler =
            FrameScheduler::new(core.clone(), heartbeat, clock, config.scheduler_config());
        let pipeline = AudioPipeline::new(
            core.clone(),
            config.sound.buffer_frames as usize,
            config.sound.sample_rate,
        )
        .into_shared();

        let mut session = Self {
            title: title.into(),
            config,
            core,
            scheduler,
            pipeline,
        };
        let sound = session.config.sound.clone();
        session.apply_sound(&sound);
        session
    }

    /// Start pacing and audio
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.scheduler.start()?;
        let mut pipeline = lock_pipeline(&self.pipeline);
        pipeline.set_paused(false);
        pipeline.start_stream();
        Ok(())
    }

    /// Stop pacing and audio, close any capture and blank the surface
    pub fn stop(&mut self) {
        self.scheduler.stop();
        lock_pipeline(&self.pipeline).stop_stream();
        self.scheduler.clear_surface();
    }

    /// Pause pacing and audio
    pub fn pause(&mut self) {
        self.scheduler.pause();
        self.sync_audio_pause();
    }

    /// Resume pacing and audio
    pub fn resume(&mut self) {
        self.scheduler.resume();
        self.sync_audio_pause();
    }

    /// Toggle between running and paused
    pub fn toggle_pause(&mut self) {
        self.scheduler.toggle_pause();
        self.sync_audio_pause();
    }

    fn sync_audio_pause(&self) {
        let paused = self.scheduler.state() == ScheduleState::Paused;
        lock_pipeline(&self.pipeline).set_paused(paused);
    }

    /// Check whether the session is paused
    pub fn is_paused(&self) -> bool {
        self.scheduler.is_paused()
    }

    /// Reset the core and leave pause
    pub fn reset(&mut self) {
        self.core.with(|core| core.reset());
        if self.is_paused() {
            self.resume();
        }
        tracing::info!(title = %self.title, "Core reset");
    }

    /// Deliver a heartbeat to the scheduler
    pub fn heartbeat(&mut self, handle: HeartbeatHandle) -> Result<Tick, SessionError> {
        Ok(self.scheduler.heartbeat(handle)?)
    }

    /// Enable or disable fast-forward
    pub fn set_fast_forward(&mut self, enabled: bool) {
        self.scheduler.set_fast_forward(enabled);
    }

    /// Switch the heartbeat kind
    pub fn set_timing_mode(&mut self, mode: TimingMode) -> Result<(), SessionError> {
        self.scheduler.set_timing_mode(mode)?;
        self.config.timing.mode = mode;
        Ok(())
    }

    /// Set the presentation surface
    pub fn set_surface(&mut self, surface: impl Surface + 'static) {
        self.scheduler.set_surface(surface);
    }

    /// Apply speed settings to the scheduler
    pub fn apply_speed(&mut self, speed: &SpeedConfig) {
        self.scheduler.set_target_rate(speed.fps);
        self.scheduler.set_frame_skip(speed.frame_skip);
        self.config.speed = speed.clone();
    }

    /// Apply sound settings to the pipeline and the core
    ///
    /// The master switch mutes output; channel and filter switches go to
    /// the core.
    pub fn apply_sound(&mut self, sound: &SoundConfig) {
        {
            let mut pipeline = lock_pipeline(&self.pipeline);
            pipeline.set_muted(!sound.master);
            pipeline.set_volume(sound.volume);
        }
        let options = sound.options();
        self.core.with(|core| core.configure_sound(&options));
        self.config.sound = sound.clone();
    }

    /// Mute or unmute output
    pub fn set_muted(&mut self, muted: bool) {
        lock_pipeline(&self.pipeline).set_muted(muted);
        self.config.sound.master = !muted;
    }

    /// Toggle mute, returning the new state
    pub fn toggle_mute(&mut self) -> bool {
        let muted = !lock_pipeline(&self.pipeline).is_muted();
        self.set_muted(muted);
        muted
    }

    /// Path of the state file for `slot`
    pub fn state_path(&self, slot: u8) -> Result<PathBuf, SessionError> {
        if slot >= SAVE_SLOTS {
            return Err(SessionError::InvalidSlot(slot));
        }
        Ok(self
            .config
            .paths
            .save_states
            .join(format!("{}.sv{}", self.title, slot)))
    }

    /// Save the core state to `slot` (0-9)
    pub fn save_state(&self, slot: u8) -> Result<PathBuf, SessionError> {
        let path = self.state_path(slot)?;
        fs::create_dir_all(&self.config.paths.save_states)?;

        self.core
            .with(|core| core.save_state(&path))
            .ok_or(CoreError::NotReady)??;

        tracing::info!(slot, path = %path.display(), "State saved");
        Ok(path)
    }

    /// Restore the core state from `slot` (0-9)
    pub fn load_state(&mut self, slot: u8) -> Result<PathBuf, SessionError> {
        let path = self.state_path(slot)?;

        self.core
            .with(|core| core.load_state(&path))
            .ok_or(CoreError::NotReady)??;

        tracing::info!(slot, path = %path.display(), "State loaded");
        Ok(path)
    }

    /// Start capturing audio to `path`
    pub fn start_capture(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        lock_pipeline(&self.pipeline).start_capture(path)?;
        Ok(())
    }

    /// Start capturing into the captures directory with a timestamped name
    pub fn start_capture_timestamped(&mut self) -> Result<PathBuf, SessionError> {
        fs::create_dir_all(&self.config.paths.captures)?;
        let path = self
            .config
            .paths
            .captures
            .join(capture_file_name(&chrono::Local::now()));
        self.start_capture(&path)?;
        Ok(path)
    }

    /// Finish the active capture
    pub fn stop_capture(&mut self) -> Result<(), SessionError> {
        lock_pipeline(&self.pipeline).stop_capture()?;
        Ok(())
    }

    /// Check whether a capture is in progress
    pub fn is_capturing(&self) -> bool {
        lock_pipeline(&self.pipeline).is_capturing()
    }

    /// Error that ended the last capture during playback
    pub fn take_capture_error(&self) -> Option<CaptureError> {
        lock_pipeline(&self.pipeline).take_capture_error()
    }

    /// Session title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Current settings
    pub fn config(&self) -> &PacerConfig {
        &self.config
    }

    /// Shared core handle
    pub fn core(&self) -> &CoreSlot<C> {
        &self.core
    }

    /// Shared audio pipeline, for attaching an output device
    pub fn pipeline(&self) -> SharedPipeline<C> {
        Arc::clone(&self.pipeline)
    }

    /// Frame scheduler
    pub fn scheduler(&self) -> &FrameScheduler<C, H> {
        &self.scheduler
    }

    /// Mutable frame scheduler
    pub fn scheduler_mut(&mut self) -> &mut FrameScheduler<C, H> {
        &mut self.scheduler
    }
}
