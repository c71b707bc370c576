// Emulator Pacer Library
// Real-time frame pacing and audio streaming for emulator front-ends

// Public modules
pub mod audio;
pub mod config;
pub mod core;
pub mod display;
pub mod scheduler;
pub mod session;
pub mod timing;

// Re-export main types for convenience
#[cfg(feature = "audio")]
pub use audio::{AudioConfig, AudioError, AudioOutput};
pub use audio::{AudioPipeline, AudioStats, CaptureError, CaptureSink, SharedPipeline};
pub use config::{ConfigError, PacerConfig};
pub use crate::core::{
    CoreError, CoreSlot, EmulationCore, SoundOptions, TestPatternCore, VideoFrame,
};
pub use display::{FrameBuffer, WindowConfig};
pub use scheduler::{
    Beat, FrameScheduler, HeartbeatError, HeartbeatHandle, HeartbeatSource, PolledHeartbeat,
    ScheduleState, SchedulerConfig, SchedulerError, Surface, Tick, TimingMode,
};
pub use session::{Session, SessionError};
pub use timing::{Clock, FpsMonitor, ManualClock, MonotonicClock};
