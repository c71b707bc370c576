// Audio output - Drives the streaming pipeline from a cpal device
//
// The device callback runs on cpal's own thread and pulls samples straight
// out of the shared pipeline. The stream is stereo f32 with a fixed buffer
// size matching the pipeline's chunk size.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, Stream, StreamConfig};

use super::{lock_pipeline, SharedPipeline, DEFAULT_BUFFER_FRAMES, DEFAULT_SAMPLE_RATE};
use crate::core::EmulationCore;

/// Output channel count (interleaved stereo)
const CHANNELS: u16 = 2;

/// Audio output errors
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// The host has no default output device
    #[error("no audio output device available")]
    NoDevice,

    /// The device rejected the stream configuration
    #[error("failed to build audio stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    /// The stream could not be started or resumed
    #[error("failed to start audio stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    /// The stream could not be paused
    #[error("failed to pause audio stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),
}

/// Audio output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Device buffer size in stereo frames
    pub buffer_frames: u32,
}

impl AudioConfig {
    /// Create default audio configuration
    ///
    /// - Sample rate: 44.1 kHz
    /// - Buffer: 1024 frames
    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_frames: DEFAULT_BUFFER_FRAMES as u32,
        }
    }

    /// Set the sample rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the buffer size in frames
    pub fn with_buffer_frames(mut self, buffer_frames: u32) -> Self {
        self.buffer_frames = buffer_frames;
        self
    }

    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: BufferSize::Fixed(self.buffer_frames),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Audio output handle
///
/// Keeps the device stream alive; dropping it stops playback.
pub struct AudioOutput {
    config: AudioConfig,
    _device: Device,
    stream: Stream,
}

impl AudioOutput {
    /// Open the default output device and start pulling from `pipeline`
    pub fn new<C>(config: AudioConfig, pipeline: SharedPipeline<C>) -> Result<Self, AudioError>
    where
        C: EmulationCore + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            "Using audio device"
        );

        let stream = device.build_output_stream(
            &config.stream_config(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                lock_pipeline(&pipeline).fill(data);
            },
            move |err| {
                tracing::error!(error = %err, "Audio stream error");
            },
            None,
        )?;

        stream.play()?;

        tracing::info!(
            sample_rate = config.sample_rate,
            buffer_frames = config.buffer_frames,
            "Audio output initialized"
        );

        Ok(Self {
            config,
            _device: device,
            stream,
        })
    }

    /// Get the audio configuration
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Pause the device stream
    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream.pause()?;
        Ok(())
    }

    /// Resume the device stream
    pub fn resume(&self) -> Result<(), AudioError> {
        self.stream.play()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_config_defaults() {
        let config = AudioConfig::new();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.buffer_frames, 1024);
    }

    #[test]
    fn test_stream_config_is_fixed_stereo() {
        let config = AudioConfig::new()
            .with_sample_rate(48000)
            .with_buffer_frames(512);
        let stream = config.stream_config();

        assert_eq!(stream.channels, 2);
        assert_eq!(stream.sample_rate, cpal::SampleRate(48000));
        assert_eq!(stream.buffer_size, BufferSize::Fixed(512));
    }

    // Opening a stream needs audio hardware and is left to manual testing
}
