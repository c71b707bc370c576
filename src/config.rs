// Configuration management
//
// Handles pacing, sound and path settings and their persistence as TOML.

use crate::core::SoundOptions;
use crate::scheduler::{SchedulerConfig, TimingMode};
use crate::timing::pacing::{
    PacingParams, DEFAULT_DRIFT_DAMPING, DEFAULT_MAX_BURST, DEFAULT_NATIVE_RATE, DEFAULT_SLACK_MS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default configuration file path
pub const CONFIG_FILE: &str = "emu_pacer.toml";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is not valid configuration TOML
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be serialized
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Pacer configuration
///
/// Stores all user-configurable settings. Missing sections and fields fall
/// back to their defaults when loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PacerConfig {
    /// Emulation speed settings
    pub speed: SpeedConfig,

    /// Pacing tunables
    pub timing: TimingConfig,

    /// Sound settings
    pub sound: SoundConfig,

    /// File locations
    pub paths: PathsConfig,
}

/// Speed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Target emulation rate in frames per second
    pub fps: f64,

    /// Frames skipped between presentations
    pub frame_skip: u32,

    /// Show the measured rate in the window title
    pub show_fps: bool,
}

/// Timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Heartbeat kind
    pub mode: TimingMode,

    /// Host refresh cadence in Hz
    pub native_rate: f64,

    /// Maximum steps per heartbeat
    pub max_burst: u32,

    /// Early-heartbeat tolerance in milliseconds
    pub slack_ms: f64,

    /// Interval-timer drift correction factor (0.0-1.0)
    pub drift_damping: f64,
}

/// Sound configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Master enable; disabling mutes output
    pub master: bool,
    /// First square channel enabled
    pub square1: bool,
    /// Second square channel enabled
    pub square2: bool,
    /// Wave channel enabled
    pub wave: bool,
    /// Noise channel enabled
    pub noise: bool,
    /// Echo filter enabled
    pub echo: bool,
    /// Low-pass filter enabled
    pub low_pass: bool,

    /// Volume (0.0-1.0)
    pub volume: f32,

    /// Output sample rate in Hz
    pub sample_rate: u32,

    /// Device buffer size in stereo frames
    pub buffer_frames: u32,
}

/// Path configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Save state directory
    pub save_states: PathBuf,

    /// Audio capture directory
    pub captures: PathBuf,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            fps: 60.0,
            frame_skip: 0,
            show_fps: false,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            mode: TimingMode::DisplaySynchronized,
            native_rate: DEFAULT_NATIVE_RATE,
            max_burst: DEFAULT_MAX_BURST,
            slack_ms: DEFAULT_SLACK_MS,
            drift_damping: DEFAULT_DRIFT_DAMPING,
        }
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            master: true,
            square1: true,
            square2: true,
            wave: true,
            noise: true,
            echo: true,
            low_pass: true,
            volume: 1.0,
            sample_rate: 44100,
            buffer_frames: 1024,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            save_states: PathBuf::from("saves"),
            captures: PathBuf::from("captures"),
        }
    }
}

impl SoundConfig {
    /// Channel and filter switches for the core
    pub fn options(&self) -> SoundOptions {
        SoundOptions {
            square1: self.square1,
            square2: self.square2,
            wave: self.wave,
            noise: self.noise,
            echo: self.echo,
            low_pass: self.low_pass,
        }
    }
}

impl TimingConfig {
    /// Pacing tunables for the scheduler
    pub fn params(&self) -> PacingParams {
        PacingParams {
            native_rate: self.native_rate,
            slack_ms: self.slack_ms,
            max_burst: self.max_burst,
            drift_damping: self.drift_damping,
        }
    }
}

impl PacerConfig {
    /// Scheduler settings derived from the speed and timing sections
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            target_rate: self.speed.fps,
            frame_skip: self.speed.frame_skip,
            mode: self.timing.mode,
            pacing: self.timing.params(),
        }
    }

    /// Load configuration from `path` or fall back to defaults
    ///
    /// A missing file is created with the default configuration on a
    /// best-effort basis. Any other failure, such as a parse error, returns
    /// the defaults and leaves the file untouched.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use emu_pacer::PacerConfig;
    ///
    /// let config = PacerConfig::load_or_default("emu_pacer.toml");
    /// ```
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No configuration file, writing defaults");
                let config = Self::default();
                if let Err(err) = config.save(path) {
                    tracing::debug!(error = %err, "Could not write default configuration");
                }
                config
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Configuration unreadable, using defaults for this run"
                );
                Self::default()
            }
        }
    }

    /// Load configuration from `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
