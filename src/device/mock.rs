//! Mock capture device for testing without hardware.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::{CaptureDevice, DataCallback};
use crate::CaptureError;

/// A capture device driven by the test instead of real hardware.
///
/// This allows exercising the full registry/fan-out/lifecycle machinery
/// without a microphone, making it suitable for CI environments.
///
/// Construction returns the device together with a [`MockHandle`]; the
/// device is handed to the multiplexer while the handle stays with the test
/// to push buffers and inspect start/stop activity.
///
/// # Example
///
/// ```
/// use mic_fanout::device::MockCaptureDevice;
/// use mic_fanout::CaptureDevice;
///
/// let (mut device, handle) = MockCaptureDevice::new();
/// device.start(Box::new(|buf| assert_eq!(buf, &[0, 1, 2]))).unwrap();
///
/// handle.push(&[0, 1, 2]);
/// assert_eq!(handle.start_count(), 1);
/// ```
pub struct MockCaptureDevice {
    state: Arc<MockState>,
}

/// Test-side handle to a [`MockCaptureDevice`].
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<MockState>,
}

struct MockState {
    fail_start: bool,
    capturing: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    callback: Mutex<Option<DataCallback>>,
}

impl MockCaptureDevice {
    /// Creates a working mock device and its handle.
    pub fn new() -> (Self, MockHandle) {
        Self::with_fail_start(false)
    }

    /// Creates a mock device whose `start` always fails with
    /// `DeviceUnavailable`.
    pub fn unavailable() -> (Self, MockHandle) {
        Self::with_fail_start(true)
    }

    fn with_fail_start(fail_start: bool) -> (Self, MockHandle) {
        let state = Arc::new(MockState {
            fail_start,
            capturing: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            callback: Mutex::new(None),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            MockHandle { state },
        )
    }
}

impl CaptureDevice for MockCaptureDevice {
    fn start(&mut self, on_data: DataCallback) -> Result<(), CaptureError> {
        if self.state.capturing.load(Ordering::SeqCst) {
            return Err(CaptureError::AlreadyCapturing);
        }
        self.state.starts.fetch_add(1, Ordering::SeqCst);

        if self.state.fail_start {
            return Err(CaptureError::unavailable(
                "mock device configured as unavailable",
            ));
        }

        *self.state.callback.lock() = Some(on_data);
        self.state.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    // Only flips flags: must stay safe to call re-entrantly from inside the
    // data callback (the fan-out eviction path does exactly that).
    fn stop(&mut self) {
        if self.state.capturing.swap(false, Ordering::SeqCst) {
            self.state.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_capturing(&self) -> bool {
        self.state.capturing.load(Ordering::SeqCst)
    }
}

impl MockHandle {
    /// Delivers one captured buffer through the registered callback, as the
    /// read loop would. Ignored while the device is not capturing.
    pub fn push(&self, buf: &[u8]) {
        if !self.state.capturing.load(Ordering::SeqCst) {
            return;
        }

        // Take the callback out so it is not invoked while holding the
        // slot lock; the callback may call back into the device.
        let taken = self.state.callback.lock().take();
        if let Some(mut on_data) = taken {
            on_data(buf);
            let mut slot = self.state.callback.lock();
            if slot.is_none() {
                *slot = Some(on_data);
            }
        }
    }

    /// Returns whether the device believes it is capturing.
    pub fn is_capturing(&self) -> bool {
        self.state.capturing.load(Ordering::SeqCst)
    }

    /// Number of `start` calls observed (including failed ones).
    pub fn start_count(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls observed while capturing.
    pub fn stop_count(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop_transitions() {
        let (mut device, handle) = MockCaptureDevice::new();
        assert!(!device.is_capturing());

        device.start(Box::new(|_| {})).unwrap();
        assert!(device.is_capturing());
        assert!(handle.is_capturing());

        device.stop();
        assert!(!device.is_capturing());
        assert_eq!(handle.start_count(), 1);
        assert_eq!(handle.stop_count(), 1);
    }

    #[test]
    fn test_start_while_capturing_fails() {
        let (mut device, _handle) = MockCaptureDevice::new();
        device.start(Box::new(|_| {})).unwrap();

        let err = device.start(Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, CaptureError::AlreadyCapturing));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut device, handle) = MockCaptureDevice::new();
        device.start(Box::new(|_| {})).unwrap();

        device.stop();
        device.stop();
        assert_eq!(handle.stop_count(), 1);
    }

    #[test]
    fn test_push_delivers_buffer() {
        let (mut device, handle) = MockCaptureDevice::new();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        device
            .start(Box::new(move |buf| sink.lock().push(buf.to_vec())))
            .unwrap();

        handle.push(&[0, 1, 2]);
        handle.push(&[3, 4]);

        assert_eq!(*seen.lock(), vec![vec![0, 1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_push_after_stop_is_dropped() {
        let (mut device, handle) = MockCaptureDevice::new();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        device
            .start(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        handle.push(&[1]);
        device.stop();
        handle.push(&[2]);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unavailable_device_fails_start() {
        let (mut device, handle) = MockCaptureDevice::unavailable();

        let err = device.start(Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable { .. }));
        assert!(!device.is_capturing());
        assert_eq!(handle.start_count(), 1);
    }
}
