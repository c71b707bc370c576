// Capture sink - Streams raw PCM into a WAV file
//
// The header is written up front with zero size fields; `close` seeks back
// and patches the RIFF and data chunk sizes once the final length is known.
// Samples are 16-bit little-endian stereo, exactly as read from the core.

use chrono::{DateTime, TimeZone};
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Size of the canonical PCM WAV header in bytes
pub const WAV_HEADER_LEN: u64 = 44;

/// Default capture sample rate in Hz
pub const DEFAULT_CAPTURE_RATE: u32 = 44100;

const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;

/// Offset of the RIFF chunk size field
const RIFF_SIZE_OFFSET: u64 = 4;
/// Offset of the data chunk size field
const DATA_SIZE_OFFSET: u64 = 40;

/// Capture sink errors
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Opening, writing or patching the file failed
    #[error("capture I/O error: {0}")]
    Io(#[from] io::Error),

    /// The RIFF size fields cannot describe a file this large
    #[error("capture exceeds the 4 GiB WAV size limit")]
    TooLarge,

    /// The byte rate for this sample rate does not fit the header
    #[error("unsupported capture sample rate: {0} Hz")]
    UnsupportedRate(u32),
}

/// Build the 44-byte header for a stereo 16-bit PCM stream
fn wav_header(
    sample_rate: u32,
    riff_size: u32,
    data_size: u32,
) -> Result<Vec<u8>, CaptureError> {
    let byte_rate = sample_rate
        .checked_mul(u32::from(BLOCK_ALIGN))
        .ok_or(CaptureError::UnsupportedRate(sample_rate))?;
    let mut header = Vec::with_capacity(WAV_HEADER_LEN as usize);

    // RIFF header
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&riff_size.to_le_bytes());
    header.extend_from_slice(b"WAVE");

    // fmt chunk
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM
    header.extend_from_slice(&CHANNELS.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&BLOCK_ALIGN.to_le_bytes());
    header.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());

    Ok(header)
}

/// Default file name for a capture started at `now`
///
/// Produces `capture_YYYYmmdd_HHMMSS.wav`.
pub fn capture_file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("capture_{}.wav", now.format("%Y%m%d_%H%M%S"))
}

/// WAV capture sink
#[derive(Debug)]
pub struct CaptureSink {
    sample_rate: u32,
    file: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    bytes_written: u64,
}

impl CaptureSink {
    /// Create an inactive sink recording at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            file: None,
            path: None,
            bytes_written: 0,
        }
    }

    /// Open `path` and write a header with zero size fields
    ///
    /// An already active capture is closed first.
    pub fn start(&mut self, path: impl AsRef<Path>) -> Result<(), CaptureError> {
        if self.is_active() {
            self.close()?;
        }

        let path = path.as_ref();
        let header = wav_header(self.sample_rate, 0, 0)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&header)?;

        self.file = Some(writer);
        self.path = Some(path.to_path_buf());
        self.bytes_written = WAV_HEADER_LEN;

        tracing::info!(path = %path.display(), rate = self.sample_rate, "Capture started");
        Ok(())
    }

    /// Append raw PCM bytes
    ///
    /// Does nothing when inactive.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        let Some(writer) = self.file.as_mut() else {
            return Ok(());
        };

        let total = self.bytes_written + bytes.len() as u64;
        if total > u64::from(u32::MAX) {
            return Err(CaptureError::TooLarge);
        }

        writer.write_all(bytes)?;
        self.bytes_written = total;
        Ok(())
    }

    /// Patch the size fields and close the file
    ///
    /// Does nothing when inactive.
    pub fn close(&mut self) -> Result<(), CaptureError> {
        let Some(mut writer) = self.file.take() else {
            return Ok(());
        };

        let riff_size = (self.bytes_written - 8) as u32;
        let data_size = (self.bytes_written - WAV_HEADER_LEN) as u32;

        writer.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        writer.write_all(&riff_size.to_le_bytes())?;
        writer.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        writer.write_all(&data_size.to_le_bytes())?;
        writer.flush()?;

        tracing::info!(
            path = ?self.path,
            bytes = self.bytes_written,
            "Capture closed"
        );
        Ok(())
    }

    /// Drop the file without patching the header
    pub fn abort(&mut self) {
        if self.file.take().is_some() {
            tracing::warn!(path = ?self.path, "Capture aborted");
        }
    }

    /// Check whether a capture is in progress
    pub fn is_active(&self) -> bool {
        self.file.is_some()
    }

    /// Bytes written to the current (or last) capture, header included
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Path of the current (or last) capture
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Sample rate written into the header
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Default for CaptureSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_RATE)
    }
}

impl Drop for CaptureSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::error!(error = %err, "Failed to finalize capture on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn test_header_layout() {
        let header = wav_header(44100, 0, 0).expect("header");
        assert_eq!(header.len(), 44);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..16], b"WAVEfmt ");
        assert_eq!(read_u32(&header, 24), 44100);
        assert_eq!(read_u32(&header, 28), 44100 * 4);
        assert_eq!(u16::from_le_bytes([header[22], header[23]]), 2);
        assert_eq!(u16::from_le_bytes([header[32], header[33]]), 4);
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn test_close_patches_sizes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.wav");

        let mut sink = CaptureSink::default();
        sink.start(&path).expect("start");
        for _ in 0..3 {
            sink.write(&[0u8; 1024]).expect("write");
        }
        assert_eq!(sink.bytes_written(), 44 + 3072);
        sink.close().expect("close");

        let bytes = std::fs::read(&path).expect("read");
        assert_eq!(bytes.len(), 3116);
        assert_eq!(read_u32(&bytes, 4), 3108);
        assert_eq!(read_u32(&bytes, 40), 3072);
    }

    #[test]
    fn test_start_header_has_zero_sizes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("open.wav");

        let mut sink = CaptureSink::default();
        sink.start(&path).expect("start");
        sink.abort();

        let bytes = std::fs::read(&path).expect("read");
        assert_eq!(bytes.len(), 44);
        assert_eq!(read_u32(&bytes, 4), 0);
        assert_eq!(read_u32(&bytes, 40), 0);
    }

    #[test]
    fn test_restart_closes_previous_capture() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("first.wav");
        let second = dir.path().join("second.wav");

        let mut sink = CaptureSink::default();
        sink.start(&first).expect("start");
        sink.write(&[1u8; 8]).expect("write");
        sink.start(&second).expect("restart");
        assert_eq!(sink.path(), Some(second.as_path()));
        assert_eq!(sink.bytes_written(), 44);

        let bytes = std::fs::read(&first).expect("read");
        assert_eq!(read_u32(&bytes, 40), 8);
    }

    #[test]
    fn test_oversized_sample_rate_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fast.wav");

        let mut sink = CaptureSink::new(u32::MAX / 2);
        assert!(matches!(
            sink.start(&path),
            Err(CaptureError::UnsupportedRate(_))
        ));
        assert!(!sink.is_active());
        assert!(!path.exists());
    }

    #[test]
    fn test_inactive_sink_ignores_calls() {
        let mut sink = CaptureSink::default();
        assert!(!sink.is_active());
        sink.write(&[0u8; 16]).expect("write");
        sink.close().expect("close");
        assert_eq!(sink.bytes_written(), 0);
    }

    #[test]
    fn test_capture_file_name_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(capture_file_name(&now), "capture_20240309_070501.wav");
    }
}
