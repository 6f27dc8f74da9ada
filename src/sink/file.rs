//! WAV file sink implementation.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::device::{CHANNELS, SAMPLE_RATE_HZ};
use crate::sink::Sink;
use crate::SinkError;

// WAV file format constants
// See: http://soundfile.sapp.org/doc/WaveFormat/

/// Byte offset of the file size field in WAV header (RIFF chunk size).
const WAV_FILE_SIZE_OFFSET: u64 = 4;

/// Byte offset of the data chunk size field in WAV header.
const WAV_DATA_SIZE_OFFSET: u64 = 40;

/// Size of the WAV header in bytes (RIFF + fmt + data chunk headers).
const WAV_HEADER_SIZE: usize = 44;

/// Size of the fmt chunk data (16 bytes for PCM).
const WAV_FMT_CHUNK_SIZE: u32 = 16;

/// Audio format code for PCM (uncompressed).
const WAV_FORMAT_PCM: u16 = 1;

/// Bits per sample for 16-bit audio.
const WAV_BITS_PER_SAMPLE: u16 = 16;

/// A sink that writes captured audio to a WAV file.
///
/// The file is created on first write with a placeholder header; the header
/// size fields are patched when the sink is closed. Defaults to the crate's
/// fixed capture format (16kHz mono PCM16); use [`with_format`] to record a
/// different format.
///
/// [`with_format`]: WavSink::with_format
///
/// # Example
///
/// ```no_run
/// use mic_fanout::WavSink;
///
/// let sink = WavSink::new("recording.wav");
/// // Register with a CaptureMultiplexer...
/// ```
pub struct WavSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    closed: bool,
    bytes_written: u64,
    sample_rate: u32,
    channels: u16,
}

impl WavSink {
    /// Creates a new WAV sink at the given path, using the capture format.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_format(path, SAMPLE_RATE_HZ, CHANNELS)
    }

    /// Creates a new WAV sink with an explicit sample rate and channel count.
    pub fn with_format(path: impl AsRef<Path>, sample_rate: u32, channels: u16) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            closed: false,
            bytes_written: 0,
            sample_rate,
            channels,
        }
    }

    /// Writes a complete WAV header with the given data size.
    ///
    /// The header includes RIFF, fmt, and data chunk headers (44 bytes total).
    fn write_wav_header(
        writer: &mut BufWriter<File>,
        sample_rate: u32,
        channels: u16,
        data_size: u32,
    ) -> std::io::Result<()> {
        // RIFF container header
        writer.write_all(b"RIFF")?;
        let file_size = (WAV_HEADER_SIZE as u32 - 8).saturating_add(data_size);
        writer.write_all(&file_size.to_le_bytes())?;
        writer.write_all(b"WAVE")?;

        // fmt subchunk (format specification)
        writer.write_all(b"fmt ")?;
        writer.write_all(&WAV_FMT_CHUNK_SIZE.to_le_bytes())?;
        writer.write_all(&WAV_FORMAT_PCM.to_le_bytes())?;
        writer.write_all(&channels.to_le_bytes())?;
        writer.write_all(&sample_rate.to_le_bytes())?;

        let bytes_per_sample = WAV_BITS_PER_SAMPLE / 8;
        let byte_rate = sample_rate * u32::from(channels) * u32::from(bytes_per_sample);
        writer.write_all(&byte_rate.to_le_bytes())?;

        let block_align = channels * bytes_per_sample;
        writer.write_all(&block_align.to_le_bytes())?;
        writer.write_all(&WAV_BITS_PER_SAMPLE.to_le_bytes())?;

        // data subchunk header
        writer.write_all(b"data")?;
        writer.write_all(&data_size.to_le_bytes())?;

        Ok(())
    }

    /// Patches the WAV header with the final data size after recording.
    fn update_wav_header(writer: &mut BufWriter<File>, data_size: u32) -> std::io::Result<()> {
        // Update RIFF chunk size (file size - 8)
        let file_size = (WAV_HEADER_SIZE as u32 - 8).saturating_add(data_size);
        writer.seek(SeekFrom::Start(WAV_FILE_SIZE_OFFSET))?;
        writer.write_all(&file_size.to_le_bytes())?;

        // Update data chunk size
        writer.seek(SeekFrom::Start(WAV_DATA_SIZE_OFFSET))?;
        writer.write_all(&data_size.to_le_bytes())?;

        writer.seek(SeekFrom::End(0))?;

        Ok(())
    }
}

impl Sink for WavSink {
    fn write(&mut self, buf: &[u8]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::write_failed("sink closed"));
        }

        // Initialize on first write
        if self.writer.is_none() {
            let file =
                File::create(&self.path).map_err(|e| SinkError::file_error(&self.path, e))?;
            let mut writer = BufWriter::new(file);

            // Placeholder header, patched on close
            Self::write_wav_header(&mut writer, self.sample_rate, self.channels, 0)
                .map_err(|e| SinkError::file_error(&self.path, e))?;

            self.writer = Some(writer);
        }

        if let Some(ref mut writer) = self.writer {
            writer
                .write_all(buf)
                .map_err(|e| SinkError::file_error(&self.path, e))?;
            self.bytes_written += buf.len() as u64;
        }

        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed = true;
        let data_size = u32::try_from(self.bytes_written).unwrap_or_else(|_| {
            tracing::warn!(
                path = %self.path.display(),
                bytes_written = self.bytes_written,
                "recording exceeds the 32-bit WAV size limit; header sizes saturated"
            );
            u32::MAX
        });

        if let Some(ref mut writer) = self.writer {
            Self::update_wav_header(writer, data_size)
                .map_err(|e| SinkError::file_error(&self.path, e))?;
            writer
                .flush()
                .map_err(|e| SinkError::file_error(&self.path, e))?;
        }

        self.writer = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_wav_sink_creates_valid_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");

        let mut sink = WavSink::new(&path);
        sink.write(&[0x34, 0x12, 0x78, 0x56]).unwrap();
        sink.close().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WAVE");
        assert_eq!(&data[12..16], b"fmt ");

        // Payload bytes land after the header, unmodified
        assert_eq!(&data[WAV_HEADER_SIZE..], &[0x34, 0x12, 0x78, 0x56]);
    }

    #[test]
    fn test_wav_sink_header_sizes_patched_on_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");

        let mut sink = WavSink::new(&path);
        sink.write(&[0; 100]).unwrap();
        sink.write(&[0; 60]).unwrap();
        sink.close().unwrap();

        let data = std::fs::read(&path).unwrap();

        let data_size = u32::from_le_bytes([data[40], data[41], data[42], data[43]]);
        assert_eq!(data_size, 160);

        let file_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        assert_eq!(file_size, WAV_HEADER_SIZE as u32 - 8 + 160);
    }

    #[test]
    fn test_wav_sink_records_capture_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");

        let mut sink = WavSink::new(&path);
        sink.write(&[0, 0]).unwrap();
        sink.close().unwrap();

        let data = std::fs::read(&path).unwrap();

        let channels = u16::from_le_bytes([data[22], data[23]]);
        assert_eq!(channels, 1);

        let sample_rate = u32::from_le_bytes([data[24], data[25], data[26], data[27]]);
        assert_eq!(sample_rate, 16000);

        // byte rate = sample_rate * channels * bytes_per_sample
        let byte_rate = u32::from_le_bytes([data[28], data[29], data[30], data[31]]);
        assert_eq!(byte_rate, 16000 * 2);
    }

    #[test]
    fn test_wav_sink_custom_format_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let mut sink = WavSink::with_format(&path, 44100, 2);
        sink.write(&[0; 8]).unwrap();
        sink.close().unwrap();

        let data = std::fs::read(&path).unwrap();

        let channels = u16::from_le_bytes([data[22], data[23]]);
        assert_eq!(channels, 2);

        let sample_rate = u32::from_le_bytes([data[24], data[25], data[26], data[27]]);
        assert_eq!(sample_rate, 44100);

        let block_align = u16::from_le_bytes([data[32], data[33]]);
        assert_eq!(block_align, 4);
    }

    #[test]
    fn test_wav_sink_invalid_path_error() {
        let mut sink = WavSink::new("/nonexistent/directory/test.wav");

        let result = sink.write(&[1, 2]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("nonexistent"));
    }

    #[test]
    fn test_wav_sink_close_before_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");

        let mut sink = WavSink::new(&path);
        sink.close().unwrap();

        // No write happened, so no file was created
        assert!(!path.exists());
    }

    #[test]
    fn test_wav_sink_header_saturates_at_u32_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.wav");

        let mut sink = WavSink::new(&path);
        sink.write(&[0, 0]).unwrap();
        // Simulate a recording longer than the 32-bit WAV size fields can
        // represent
        sink.bytes_written = u64::from(u32::MAX) + 2;
        sink.close().unwrap();

        let data = std::fs::read(&path).unwrap();

        let data_size = u32::from_le_bytes([data[40], data[41], data[42], data[43]]);
        assert_eq!(data_size, u32::MAX);

        let file_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        assert_eq!(file_size, u32::MAX);
    }

    #[test]
    fn test_wav_sink_write_after_close_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("done.wav");

        let mut sink = WavSink::new(&path);
        sink.write(&[0, 0]).unwrap();
        sink.close().unwrap();

        // A straggler write from an in-flight fan-out pass must not
        // recreate or grow the file
        assert!(sink.write(&[1, 1]).is_err());
        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), WAV_HEADER_SIZE + 2);
    }
}
