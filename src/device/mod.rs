//! Capture device abstraction and implementations.
//!
//! [`CaptureDevice`] is the seam between the multiplexer and the audio
//! hardware. The crate provides two implementations:
//!
//! - [`CpalCaptureDevice`]: real microphone capture via CPAL
//! - [`MockCaptureDevice`]: hardware-free device for tests and CI

mod cpal_input;
mod mock;

pub use cpal_input::CpalCaptureDevice;
pub use mock::{MockCaptureDevice, MockHandle};

use crate::CaptureError;

/// Fixed capture sample rate in Hz.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Fixed channel count (mono).
pub const CHANNELS: u16 = 1;

/// Bytes per PCM16 sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Samples collected per read cycle (10ms at 16kHz).
pub const SAMPLES_PER_READ: usize = 160;

/// Callback invoked with each captured buffer of little-endian PCM16 bytes.
///
/// Runs on the device's read-loop thread, never on the caller's.
pub type DataCallback = Box<dyn FnMut(&[u8]) + Send>;

/// An audio input device running a dedicated read loop.
///
/// Implementations own the physical or logical input resource and know
/// nothing about consumers: `start` is handed a single callback, and every
/// captured buffer is delivered through it synchronously from the read
/// loop's own thread.
pub trait CaptureDevice: Send {
    /// Starts capturing and delivering buffers to `on_data`.
    ///
    /// `is_capturing()` is true before the loop begins delivering.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::AlreadyCapturing`] if a session is already running
    /// - [`CaptureError::NoDefaultDevice`] / [`CaptureError::DeviceUnavailable`]
    ///   if the device cannot be opened; capture does not begin
    fn start(&mut self, on_data: DataCallback) -> Result<(), CaptureError>;

    /// Signals the read loop to exit after its current blocking read returns.
    ///
    /// No hard cancellation, and no join: safe to call from any thread,
    /// including the read loop itself. Idempotent.
    fn stop(&mut self);

    /// Returns whether a capture session is currently running.
    ///
    /// Safe to query from any thread. Read errors that terminate the loop
    /// flip this to false; the device does not auto-retry.
    fn is_capturing(&self) -> bool;
}

/// Configuration for microphone capture.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Input device name, or `None` for the system default.
    pub device_name: Option<String>,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels (1 = mono).
    pub channels: u16,
    /// Samples pulled from the device per read cycle.
    pub read_chunk: usize,
    /// Ring buffer capacity in samples between the audio callback and the
    /// read loop.
    pub ring_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            sample_rate: SAMPLE_RATE_HZ,
            channels: CHANNELS,
            read_chunk: SAMPLES_PER_READ,
            // 1 second at 16kHz mono
            ring_capacity: SAMPLE_RATE_HZ as usize,
        }
    }
}
