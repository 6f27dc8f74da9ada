//! CPAL microphone capture with a dedicated read-loop thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig as CpalStreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;

use crate::device::{CaptureDevice, DataCallback, DeviceConfig, BYTES_PER_SAMPLE};
use crate::CaptureError;

/// Symmetric i16 max for f32 conversion (avoids asymmetric clipping).
const I16_MAX_SYMMETRIC: f32 = i16::MAX as f32;
/// Minimum i16 as f32 for clamping.
const I16_MIN_F32: f32 = i16::MIN as f32;
/// Maximum i16 as f32 for clamping.
const I16_MAX_F32: f32 = i16::MAX as f32;

/// Microphone input device backed by CPAL.
///
/// `start` spawns a dedicated capture thread. The thread owns the CPAL
/// stream (whose high-priority callback only pushes samples into a lock-free
/// ring buffer) and runs the read loop: pull up to one chunk of samples from
/// the ring, convert to little-endian bytes, and invoke the data callback.
///
/// # Example
///
/// ```no_run
/// use mic_fanout::{CaptureDevice, CpalCaptureDevice, DeviceConfig};
///
/// let mut device = CpalCaptureDevice::new(DeviceConfig::default());
/// device.start(Box::new(|buf| println!("captured {} bytes", buf.len())))?;
/// // ...
/// device.stop();
/// # Ok::<(), mic_fanout::CaptureError>(())
/// ```
pub struct CpalCaptureDevice {
    config: DeviceConfig,
    session: Option<Arc<SessionFlags>>,
}

/// Flags shared between the device handle and one read-loop thread.
///
/// Each `start` creates a fresh pair so a winding-down thread from a
/// previous session can never flip the flags of the current one.
struct SessionFlags {
    running: AtomicBool,
    capturing: AtomicBool,
}

impl CpalCaptureDevice {
    /// Creates a new device with the given configuration.
    ///
    /// The underlying device is not opened until [`start`](CaptureDevice::start).
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
}

impl CaptureDevice for CpalCaptureDevice {
    fn start(&mut self, on_data: DataCallback) -> Result<(), CaptureError> {
        if self.is_capturing() {
            return Err(CaptureError::AlreadyCapturing);
        }

        let flags = Arc::new(SessionFlags {
            running: AtomicBool::new(true),
            capturing: AtomicBool::new(false),
        });

        // The thread reports device-open success or failure back through
        // this one-shot channel so start() can fail synchronously.
        let (ready_tx, ready_rx) = mpsc::channel();
        let config = self.config.clone();
        let thread_flags = Arc::clone(&flags);

        thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || read_loop(&config, &thread_flags, on_data, &ready_tx))
            .map_err(|e| CaptureError::Backend(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.session = Some(flags);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::Backend(
                "capture thread exited before reporting readiness".to_string(),
            )),
        }
    }

    fn stop(&mut self) {
        if let Some(flags) = self.session.take() {
            flags.running.store(false, Ordering::SeqCst);
            flags.capturing.store(false, Ordering::SeqCst);
            tracing::info!("capture stop requested");
        }
    }

    fn is_capturing(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|flags| flags.capturing.load(Ordering::SeqCst))
    }
}

/// The dedicated read loop: owns the CPAL stream for its whole lifetime.
fn read_loop(
    config: &DeviceConfig,
    flags: &SessionFlags,
    mut on_data: DataCallback,
    ready_tx: &mpsc::Sender<Result<(), CaptureError>>,
) {
    let (stream, mut samples_rx, error_flag) = match open_stream(config) {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    flags.capturing.store(true, Ordering::SeqCst);
    let _ = ready_tx.send(Ok(()));
    tracing::info!(
        sample_rate = config.sample_rate,
        channels = config.channels,
        "capture read loop started"
    );

    let chunk_samples = config.read_chunk.max(1);
    let mut samples = vec![0i16; chunk_samples];
    let mut bytes = vec![0u8; chunk_samples * BYTES_PER_SAMPLE];

    // Poll at half the chunk duration so a full chunk is usually ready.
    let chunk_micros = chunk_samples as u64 * 1_000_000 / u64::from(config.sample_rate.max(1));
    let poll = Duration::from_micros((chunk_micros / 2).max(1000));

    while flags.running.load(Ordering::SeqCst) {
        if error_flag.load(Ordering::SeqCst) {
            tracing::error!("audio stream error; terminating read loop");
            break;
        }

        let n = samples_rx.pop_slice(&mut samples);
        if n == 0 {
            thread::sleep(poll);
            continue;
        }

        for (i, &sample) in samples[..n].iter().enumerate() {
            let le = sample.to_le_bytes();
            bytes[i * BYTES_PER_SAMPLE] = le[0];
            bytes[i * BYTES_PER_SAMPLE + 1] = le[1];
        }

        // Re-check after the blocking read, mirroring stop() semantics:
        // a buffer read while stopping is not delivered.
        if flags.running.load(Ordering::SeqCst) {
            on_data(&bytes[..n * BYTES_PER_SAMPLE]);
        }
    }

    flags.capturing.store(false, Ordering::SeqCst);
    drop(stream);
    tracing::info!("capture read loop exited");
}

/// Opens the input device and starts the CPAL stream.
///
/// Returns the running stream, the ring buffer consumer, and a flag set by
/// the stream's error callback.
fn open_stream(
    config: &DeviceConfig,
) -> Result<(Stream, ringbuf::HeapCons<i16>, Arc<AtomicBool>), CaptureError> {
    let host = cpal::default_host();
    let device = match &config.device_name {
        Some(name) => find_input_device(&host, name)?,
        None => host
            .default_input_device()
            .ok_or(CaptureError::NoDefaultDevice)?,
    };

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::unavailable(e.to_string()))?;
    let sample_format = supported.sample_format();

    let stream_config = CpalStreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let ring_buffer = HeapRb::<i16>::new(config.ring_capacity);
    let (producer, consumer) = ring_buffer.split();
    let error_flag = Arc::new(AtomicBool::new(false));

    let stream = match sample_format {
        SampleFormat::I16 => build_i16_stream(&device, &stream_config, producer, &error_flag)?,
        SampleFormat::F32 => build_f32_stream(&device, &stream_config, producer, &error_flag)?,
        format => {
            return Err(CaptureError::unavailable(format!(
                "unsupported sample format: {format:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| CaptureError::Backend(e.to_string()))?;

    Ok((stream, consumer, error_flag))
}

fn find_input_device(host: &cpal::Host, name: &str) -> Result<Device, CaptureError> {
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Backend(e.to_string()))?;

    for device in devices {
        if let Ok(device_name) = device.name() {
            if device_name == name {
                return Ok(device);
            }
        }
    }

    Err(CaptureError::unavailable(format!(
        "input device not found: {name}"
    )))
}

fn build_i16_stream(
    device: &Device,
    config: &CpalStreamConfig,
    mut producer: ringbuf::HeapProd<i16>,
    error_flag: &Arc<AtomicBool>,
) -> Result<Stream, CaptureError> {
    let error_flag = Arc::clone(error_flag);
    device
        .build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                // Non-blocking push - drops samples if the ring is full
                let _ = producer.push_slice(data);
            },
            move |err| {
                tracing::error!("audio stream error: {err}");
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| CaptureError::unavailable(e.to_string()))
}

// The clamp bounds every value to the i16 range before the cast
#[allow(clippy::cast_possible_truncation)]
fn build_f32_stream(
    device: &Device,
    config: &CpalStreamConfig,
    mut producer: ringbuf::HeapProd<i16>,
    error_flag: &Arc<AtomicBool>,
) -> Result<Stream, CaptureError> {
    let error_flag = Arc::clone(error_flag);
    device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Inline conversion to avoid function call overhead in the
                // audio callback
                for &sample in data {
                    let converted =
                        (sample * I16_MAX_SYMMETRIC).clamp(I16_MIN_F32, I16_MAX_F32) as i16;
                    let _ = producer.try_push(converted);
                }
            },
            move |err| {
                tracing::error!("audio stream error: {err}");
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| CaptureError::unavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_device_is_not_capturing() {
        let device = CpalCaptureDevice::new(DeviceConfig::default());
        assert!(!device.is_capturing());
    }

    #[test]
    fn test_stop_when_not_capturing_is_noop() {
        let mut device = CpalCaptureDevice::new(DeviceConfig::default());
        device.stop();
        device.stop();
        assert!(!device.is_capturing());
    }

    // Note: real capture tests require audio hardware and are skipped in CI
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_start_and_stop_real_device() {
        let mut device = CpalCaptureDevice::new(DeviceConfig::default());
        device
            .start(Box::new(|buf| {
                assert!(!buf.is_empty());
                assert_eq!(buf.len() % BYTES_PER_SAMPLE, 0);
            }))
            .unwrap();
        assert!(device.is_capturing());

        std::thread::sleep(Duration::from_millis(100));

        device.stop();
        assert!(!device.is_capturing());
    }
}
