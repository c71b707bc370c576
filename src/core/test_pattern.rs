// Test pattern core - A tiny self-contained emulation core
//
// Produces scrolling colour bars and a steady tone so the pacing and audio
// paths can be exercised (and heard) without a real emulator attached.
// Screen size matches a handheld LCD (160×144); audio is generated at
// 60 frames per emulated second.

use super::{CoreError, EmulationCore, SoundOptions, VideoFrame};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

/// Test pattern width in pixels
pub const TEST_PATTERN_WIDTH: usize = 160;

/// Test pattern height in pixels
pub const TEST_PATTERN_HEIGHT: usize = 144;

/// Emulated frames per second the audio generator assumes
const CORE_FRAME_RATE: f64 = 60.0;

/// Tone frequency in Hz
const TONE_HZ: f64 = 440.0;

/// Tone amplitude (i16 scale)
const TONE_AMPLITUDE: f64 = 6000.0;

/// Audio queued beyond this many frames is dropped (oldest first)
const MAX_QUEUED_FRAMES: usize = 8192;

/// Colour bars cycled through by the pattern
const BARS: [[u8; 3]; 8] = [
    [0xFF, 0xFF, 0xFF],
    [0xFF, 0xFF, 0x00],
    [0x00, 0xFF, 0xFF],
    [0x00, 0xFF, 0x00],
    [0xFF, 0x00, 0xFF],
    [0xFF, 0x00, 0x00],
    [0x00, 0x00, 0xFF],
    [0x00, 0x00, 0x00],
];

/// Persisted portion of the test pattern state
#[derive(Debug, Serialize, Deserialize)]
struct PatternState {
    frame: u64,
    phase: f64,
}

/// Built-in core that renders colour bars and a sine tone
pub struct TestPatternCore {
    frame: u64,
    pixels: Vec<u8>,
    sample_rate: u32,
    phase: f64,
    sample_carry: f64,
    queue: VecDeque<i16>,
    options: SoundOptions,
}

impl TestPatternCore {
    /// Create a new test pattern core generating audio at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        let mut core = Self {
            frame: 0,
            pixels: vec![0; TEST_PATTERN_WIDTH * TEST_PATTERN_HEIGHT * 4],
            sample_rate: sample_rate.max(1),
            phase: 0.0,
            sample_carry: 0.0,
            queue: VecDeque::new(),
            options: SoundOptions::default(),
        };
        core.draw();
        core
    }

    /// Number of frames stepped since power-on
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Number of stereo frames waiting to be read
    pub fn queued_audio_frames(&self) -> usize {
        self.queue.len() / 2
    }

    fn draw(&mut self) {
        let offset = self.frame as usize;
        let bar_width = TEST_PATTERN_WIDTH / BARS.len();
        for y in 0..TEST_PATTERN_HEIGHT {
            for x in 0..TEST_PATTERN_WIDTH {
                let bar = ((x + offset) / bar_width) % BARS.len();
                let [r, g, b] = BARS[bar];
                let shade = (y * 255 / TEST_PATTERN_HEIGHT) as u8;
                let i = (y * TEST_PATTERN_WIDTH + x) * 4;
                self.pixels[i] = r.saturating_sub(shade / 2);
                self.pixels[i + 1] = g.saturating_sub(shade / 2);
                self.pixels[i + 2] = b.saturating_sub(shade / 2);
                self.pixels[i + 3] = 0xFF;
            }
        }
    }

    fn generate_audio(&mut self) {
        self.sample_carry += self.sample_rate as f64 / CORE_FRAME_RATE;
        let count = self.sample_carry.floor() as usize;
        self.sample_carry -= count as f64;

        let step = TONE_HZ / self.sample_rate as f64;
        let audible = self.options.square1 || self.options.wave;
        for _ in 0..count {
            let value = if audible {
                ((self.phase * std::f64::consts::TAU).sin() * TONE_AMPLITUDE) as i16
            } else {
                0
            };
            self.queue.push_back(value);
            self.queue.push_back(value);
            self.phase = (self.phase + step).fract();
        }

        let excess = self.queue.len().saturating_sub(MAX_QUEUED_FRAMES * 2);
        self.queue.drain(..excess);
    }
}

impl EmulationCore for TestPatternCore {
    fn step(&mut self) {
        self.frame += 1;
        self.draw();
        self.generate_audio();
    }

    fn video_frame(&self) -> VideoFrame<'_> {
        VideoFrame {
            width: TEST_PATTERN_WIDTH,
            height: TEST_PATTERN_HEIGHT,
            pixels: &self.pixels,
        }
    }

    fn read_audio(&mut self, out: &mut [i16]) -> usize {
        let wanted = out.len() / 2;
        if wanted == 0 || self.queue.len() < wanted * 2 {
            return 0;
        }
        for (dst, src) in out.iter_mut().zip(self.queue.drain(..wanted * 2)) {
            *dst = src;
        }
        wanted
    }

    fn reset(&mut self) {
        self.frame = 0;
        self.phase = 0.0;
        self.sample_carry = 0.0;
        self.queue.clear();
        self.draw();
    }

    fn load_state(&mut self, path: &Path) -> Result<(), CoreError> {
        let contents = fs::read_to_string(path)?;
        let state: PatternState = serde_json::from_str(&contents)
            .map_err(|e| CoreError::InvalidState(e.to_string()))?;
        self.frame = state.frame;
        self.phase = state.phase.fract();
        self.queue.clear();
        self.draw();
        Ok(())
    }

    fn save_state(&self, path: &Path) -> Result<(), CoreError> {
        let state = PatternState {
            frame: self.frame,
            phase: self.phase,
        };
        let contents =
            serde_json::to_string(&state).map_err(|e| CoreError::InvalidState(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn configure_sound(&mut self, options: &SoundOptions) {
        self.options = *options;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_has_expected_size() {
        let core = TestPatternCore::new(44100);
        let frame = core.video_frame();
        assert_eq!(frame.pixels.len(), frame.expected_len());
        assert_eq!(frame.width, TEST_PATTERN_WIDTH);
        assert_eq!(frame.height, TEST_PATTERN_HEIGHT);
    }

    #[test]
    fn test_step_generates_one_frame_of_audio() {
        let mut core = TestPatternCore::new(44100);
        core.step();
        assert_eq!(core.queued_audio_frames(), 735);
    }

    #[test]
    fn test_read_audio_underrun_returns_zero() {
        let mut core = TestPatternCore::new(44100);
        let mut out = vec![0i16; 2048];
        assert_eq!(core.read_audio(&mut out), 0);

        core.step();
        // 735 frames queued, 1024 requested
        assert_eq!(core.read_audio(&mut out), 0);

        core.step();
        assert_eq!(core.read_audio(&mut out), 1024);
        assert_eq!(core.queued_audio_frames(), 1470 - 1024);
    }

    #[test]
    fn test_disabled_channels_produce_silence() {
        let mut core = TestPatternCore::new(44100);
        core.configure_sound(&SoundOptions {
            square1: false,
            wave: false,
            ..SoundOptions::default()
        });
        core.step();

        let mut out = vec![1i16; 200];
        assert_eq!(core.read_audio(&mut out), 100);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_reset_clears_progress() {
        let mut core = TestPatternCore::new(44100);
        core.step();
        core.step();
        core.reset();
        assert_eq!(core.frame_count(), 0);
        assert_eq!(core.queued_audio_frames(), 0);
    }

    #[test]
    fn test_save_and_load_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("pattern.sv0");

        let mut core = TestPatternCore::new(44100);
        for _ in 0..5 {
            core.step();
        }
        core.save_state(&path).expect("save");

        core.step();
        core.load_state(&path).expect("load");
        assert_eq!(core.frame_count(), 5);
    }

    #[test]
    fn test_load_state_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.sv0");
        fs::write(&path, "not json").expect("write");

        let mut core = TestPatternCore::new(44100);
        assert!(matches!(
            core.load_state(&path),
            Err(CoreError::InvalidState(_))
        ));
    }
}
