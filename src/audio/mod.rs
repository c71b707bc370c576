// Audio module - Pull-based streaming from the core to the sound device
//
// This module provides:
// - The streaming pipeline (device pull -> core audio read -> f32 output)
// - WAV capture of the raw core samples
// - Cross-platform audio output using cpal (feature `audio`)
//
// The device drives the pipeline: each callback asks for a block of
// interleaved stereo f32 samples and the pipeline produces it in chunks of
// the negotiated buffer size. Whatever the core cannot deliver in time is
// played as silence.
//
// # Usage
//
// ```
// use emu_pacer::audio::AudioPipeline;
// use emu_pacer::core::{CoreSlot, TestPatternCore};
//
// let core = CoreSlot::ready(TestPatternCore::new(44100));
// let mut pipeline = AudioPipeline::new(core.clone(), 1024, 44100);
// pipeline.start_stream();
//
// // Called from the audio device callback:
// let mut out = vec![0.0f32; 2048];
// pipeline.fill(&mut out);
// ```

pub mod capture;
#[cfg(feature = "audio")]
pub mod output;

pub use capture::{capture_file_name, CaptureError, CaptureSink, WAV_HEADER_LEN};
#[cfg(feature = "audio")]
pub use output::{AudioConfig, AudioError, AudioOutput};

use crate::core::{CoreSlot, EmulationCore};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default device buffer size in stereo frames
pub const DEFAULT_BUFFER_FRAMES: usize = 1024;

/// Default output sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Scale from i16 samples to f32 in [-1.0, 1.0)
const SAMPLE_SCALE: f32 = 1.0 / 32768.0;

/// Pipeline shared between the shell and the audio device thread
pub type SharedPipeline<C> = Arc<Mutex<AudioPipeline<C>>>;

/// Lock a shared pipeline, recovering from a poisoned lock
pub fn lock_pipeline<C>(pipeline: &SharedPipeline<C>) -> MutexGuard<'_, AudioPipeline<C>> {
    pipeline.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pull-based audio streaming pipeline
pub struct AudioPipeline<C> {
    core: CoreSlot<C>,
    buffer_frames: usize,
    sample_rate: u32,

    started: bool,
    paused: bool,
    muted: bool,
    volume: f32,

    /// Interleaved i16 read buffer, `buffer_frames * 2` samples
    scratch: Vec<i16>,
    /// Little-endian bytes for the capture sink
    capture_bytes: Vec<u8>,
    capture: CaptureSink,
    capture_error: Option<CaptureError>,

    stats: AudioStats,
    in_underrun: bool,
}

impl<C: EmulationCore> AudioPipeline<C> {
    /// Create a stopped pipeline pulling `buffer_frames` stereo frames at a time
    pub fn new(core: CoreSlot<C>, buffer_frames: usize, sample_rate: u32) -> Self {
        let buffer_frames = buffer_frames.max(1);
        Self {
            core,
            buffer_frames,
            sample_rate,
            started: false,
            paused: false,
            muted: false,
            volume: 1.0,
            scratch: vec![0; buffer_frames * 2],
            capture_bytes: Vec::with_capacity(buffer_frames * 4),
            capture: CaptureSink::new(sample_rate),
            capture_error: None,
            stats: AudioStats::default(),
            in_underrun: false,
        }
    }

    /// Wrap the pipeline for sharing with the device callback
    pub fn into_shared(self) -> SharedPipeline<C> {
        Arc::new(Mutex::new(self))
    }

    /// Produce interleaved stereo samples into `out`
    ///
    /// Called from the audio device callback. Never blocks on anything but
    /// the core lock.
    pub fn fill(&mut self, out: &mut [f32]) {
        let chunk_len = self.buffer_frames * 2;
        for chunk in out.chunks_mut(chunk_len) {
            self.fill_chunk(chunk);
        }
    }

    fn fill_chunk(&mut self, chunk: &mut [f32]) {
        self.stats.pulls += 1;

        if !self.started || self.paused {
            chunk.fill(0.0);
            return;
        }

        let capturing = self.capture.is_active();
        if self.muted && !capturing {
            chunk.fill(0.0);
            return;
        }

        let frames = chunk.len() / 2;
        let scratch = &mut self.scratch[..frames * 2];
        let read = self
            .core
            .with(|core| core.read_audio(scratch))
            .unwrap_or(0)
            .min(frames);

        if read == 0 {
            self.stats.underruns += 1;
            if !self.in_underrun {
                self.in_underrun = true;
                tracing::debug!(frames, "Audio underrun");
            }
            chunk.fill(0.0);
            return;
        }
        if self.in_underrun {
            self.in_underrun = false;
            tracing::trace!("Audio underrun ended");
        }

        let samples = &self.scratch[..read * 2];

        if capturing {
            self.capture_bytes.clear();
            self.capture_bytes
                .extend(samples.iter().flat_map(|sample| sample.to_le_bytes()));
            if let Err(err) = self.capture.write(&self.capture_bytes) {
                tracing::error!(error = %err, "Capture write failed, stopping capture");
                self.capture.abort();
                self.capture_error = Some(err);
            }
        }

        if self.muted {
            chunk.fill(0.0);
            return;
        }

        let scale = SAMPLE_SCALE * self.volume;
        for (out, &sample) in chunk.iter_mut().zip(samples) {
            *out = f32::from(sample) * scale;
        }
        // Short read: the rest of the chunk plays silence
        chunk[samples.len()..].fill(0.0);
    }

    /// Begin producing samples
    pub fn start_stream(&mut self) {
        if !self.started {
            self.started = true;
            self.in_underrun = false;
            tracing::info!(
                buffer_frames = self.buffer_frames,
                sample_rate = self.sample_rate,
                "Audio stream started"
            );
        }
    }

    /// Stop producing samples and close any active capture
    pub fn stop_stream(&mut self) {
        if let Err(err) = self.capture.close() {
            tracing::error!(error = %err, "Failed to close capture");
            self.capture_error = Some(err);
        }
        if self.started {
            self.started = false;
            tracing::info!("Audio stream stopped");
        }
    }

    /// Pause or resume output; paused pulls produce silence
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Set the output volume, clamped to 0.0..=1.0
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            tracing::warn!("Ignoring NaN volume");
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Mute or unmute output; capture keeps recording while muted
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Start recording raw core samples to `path`
    pub fn start_capture(&mut self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        self.capture_error = None;
        self.capture.start(path)
    }

    /// Finish the active capture
    pub fn stop_capture(&mut self) -> Result<(), CaptureError> {
        self.capture.close()
    }

    /// Error that ended the last capture, if it failed during playback
    pub fn take_capture_error(&mut self) -> Option<CaptureError> {
        self.capture_error.take()
    }

    /// Check whether a capture is in progress
    pub fn is_capturing(&self) -> bool {
        self.capture.is_active()
    }

    /// Capture sink
    pub fn capture(&self) -> &CaptureSink {
        &self.capture
    }

    /// Check whether the stream has been started
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Check whether output is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Check whether output is muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Current volume (0.0 - 1.0)
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Negotiated buffer size in stereo frames
    pub fn buffer_frames(&self) -> usize {
        self.buffer_frames
    }

    /// Output sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Pull statistics
    pub fn stats(&self) -> AudioStats {
        AudioStats {
            captured_bytes: self.capture.bytes_written(),
            ..self.stats
        }
    }

    /// Reset pull statistics
    pub fn reset_stats(&mut self) {
        self.stats = AudioStats::default();
    }
}

/// Audio statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioStats {
    /// Chunks requested by the device
    pub pulls: u64,

    /// Chunks for which the core had no audio
    pub underruns: u64,

    /// Bytes in the current (or last) capture, header included
    pub captured_bytes: u64,
}

impl AudioStats {
    /// Fraction of pulls that underran (0.0 - 1.0)
    pub fn underrun_ratio(&self) -> f32 {
        if self.pulls == 0 {
            0.0
        } else {
            self.underruns as f32 / self.pulls as f32
        }
    }
}
