// Core module - Boundary to the emulation core
//
// The emulation core is opaque to this crate: it is stepped one frame at a
// time, exposes a read-only RGBA frame, hands out interleaved stereo PCM on
// request, and persists its own state. Everything else (CPU, video, sound
// hardware) lives behind the `EmulationCore` trait.
//
// The core is shared between the frame scheduler (step path) and the audio
// pipeline (sample path), which run on different threads once a real audio
// device is attached. `CoreSlot` is the single lock covering both paths and
// also carries the two-state lifecycle (`Uninitialized` / `Ready`).

mod test_pattern;

pub use test_pattern::{TestPatternCore, TEST_PATTERN_HEIGHT, TEST_PATTERN_WIDTH};

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Errors reported by an emulation core's persistence operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// I/O error while reading or writing a state file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The state file could not be interpreted by the core
    #[error("invalid state data: {0}")]
    InvalidState(String),

    /// No core has been installed yet
    #[error("emulation core is not ready")]
    NotReady,
}

/// Read-only view of the core's current video frame
///
/// Pixels are RGBA8, row-major, `width * height * 4` bytes. The view is valid
/// until the next `step()`.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    /// Frame width in pixels
    pub width: usize,
    /// Frame height in pixels
    pub height: usize,
    /// RGBA8 pixel data
    pub pixels: &'a [u8],
}

impl VideoFrame<'_> {
    /// Number of bytes a well-formed frame of this size occupies
    pub fn expected_len(&self) -> usize {
        self.width * self.height * 4
    }
}

/// Sound channel and filter switches forwarded to the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundOptions {
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
}

impl Default for SoundOptions {
    fn default() -> Self {
        Self {
            square1: true,
            square2: true,
            wave: true,
            noise: true,
            echo: true,
            low_pass: true,
        }
    }
}

/// The opaque emulation core
pub trait EmulationCore {
    /// Advance one discrete simulation frame
    fn step(&mut self);

    /// Current video frame
    fn video_frame(&self) -> VideoFrame<'_>;

    /// Read interleaved stereo i16 frames into `out`
    ///
    /// `out.len() / 2` frames are requested. Returns the number of frames
    /// actually written; 0 means the core has nothing ready (underrun).
    fn read_audio(&mut self, out: &mut [i16]) -> usize;

    /// Reset the core to its power-on state
    fn reset(&mut self);

    /// Restore state previously written by `save_state`
    fn load_state(&mut self, path: &Path) -> Result<(), CoreError>;

    /// Persist the current state
    fn save_state(&self, path: &Path) -> Result<(), CoreError>;

    /// Apply channel and filter switches; cores without them ignore this
    fn configure_sound(&mut self, _options: &SoundOptions) {}
}

/// Lifecycle of the shared core
pub enum Lifecycle<C> {
    /// No core installed; every access is a no-op
    Uninitialized,
    /// Core installed and usable
    Ready(C),
}

/// Shared, lock-protected handle to the emulation core
///
/// Cloning the slot clones the handle, not the core.
pub struct CoreSlot<C> {
    inner: Arc<Mutex<Lifecycle<C>>>,
}

impl<C> CoreSlot<C> {
    /// Create an empty slot
    pub fn uninitialized() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Lifecycle::Uninitialized)),
        }
    }

    /// Create a slot that already holds a core
    pub fn ready(core: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Lifecycle::Ready(core))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a core, replacing any previous one
    pub fn install(&self, core: C) {
        *self.lock() = Lifecycle::Ready(core);
    }

    /// Remove the core, returning the slot to `Uninitialized`
    pub fn take(&self) -> Option<C> {
        match std::mem::replace(&mut *self.lock(), Lifecycle::Uninitialized) {
            Lifecycle::Ready(core) => Some(core),
            Lifecycle::Uninitialized => None,
        }
    }

    /// Check whether a core is installed
    pub fn is_ready(&self) -> bool {
        matches!(*self.lock(), Lifecycle::Ready(_))
    }

    /// Run `f` against the core while holding the lock
    ///
    /// Returns `None` when the slot is uninitialized.
    pub fn with<R>(&self, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        match &mut *self.lock() {
            Lifecycle::Ready(core) => Some(f(core)),
            Lifecycle::Uninitialized => None,
        }
    }
}

impl<C> Clone for CoreSlot<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> Default for CoreSlot<C> {
    fn default() -> Self {
        Self::uninitialized()
    }
}
