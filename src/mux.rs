//! Capture multiplexer: sink registry, fan-out, eviction, lifecycle.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::device::CaptureDevice;
use crate::lifecycle::{LifecycleSignal, LifecycleState};
use crate::sink::Sink;
use crate::{CaptureError, StreamId};

/// A registered sink behind its own lock.
///
/// The per-sink lock keeps the registry-level critical sections short:
/// blocking sink I/O happens under this lock only, never under the registry
/// mutex. No code path holds the registry mutex while waiting on a sink
/// lock, which is what makes eviction deadlock-free.
type SinkHandle = Arc<Mutex<Box<dyn Sink>>>;

/// Distributes captured audio to registered sinks.
///
/// The multiplexer owns the capture device and a registry of sinks keyed by
/// [`StreamId`]. The device is started when the first sink registers and
/// stopped when the last one is removed; every captured buffer is written to
/// every registered sink, and a sink whose write fails is closed and evicted
/// without affecting the others.
///
/// Registration, deregistration, and device start/stop are serialized by a
/// single mutex, so these operations may be called from any thread.
///
/// # Example
///
/// ```
/// use mic_fanout::device::MockCaptureDevice;
/// use mic_fanout::{CaptureMultiplexer, ChannelSink, LifecycleState};
/// use tokio::sync::mpsc;
///
/// let (device, handle) = MockCaptureDevice::new();
/// let mux = CaptureMultiplexer::new(Box::new(device));
///
/// let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
/// mux.register_sink("voice", Box::new(ChannelSink::new(tx))).unwrap();
/// assert_eq!(mux.current_state(), LifecycleState::Working);
///
/// handle.push(&[0, 1, 2]);
/// assert_eq!(rx.try_recv().unwrap(), vec![0, 1, 2]);
///
/// mux.deregister_sink(&"voice".into());
/// assert_eq!(mux.current_state(), LifecycleState::Idle);
/// ```
pub struct CaptureMultiplexer {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    lifecycle: LifecycleSignal,
}

struct Inner {
    device: Box<dyn CaptureDevice>,
    sinks: HashMap<StreamId, SinkHandle>,
}

impl CaptureMultiplexer {
    /// Creates a multiplexer around the given capture device.
    ///
    /// The device is not started until the first sink registers.
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    device,
                    sinks: HashMap::new(),
                }),
                lifecycle: LifecycleSignal::new(),
            }),
        }
    }

    /// Registers `sink` under `id`, starting capture if this is the first
    /// registration.
    ///
    /// Registering under an id that is already live replaces the previous
    /// sink: the old sink is closed, no error is raised, and no lifecycle
    /// transition is emitted.
    ///
    /// # Errors
    ///
    /// If the registry was empty and the capture device fails to start, the
    /// error is returned, the supplied sink is closed, and nothing is
    /// registered.
    pub fn register_sink(
        &self,
        id: impl Into<StreamId>,
        mut sink: Box<dyn Sink>,
    ) -> Result<(), CaptureError> {
        let id = id.into();

        let replaced = {
            let mut inner = self.shared.inner.lock();

            if inner.sinks.is_empty() {
                if let Err(e) = self.start_device(&mut inner) {
                    drop(inner);
                    tracing::warn!(stream_id = %id, error = %e, "capture start failed; releasing sink");
                    if let Err(close_err) = sink.close() {
                        tracing::warn!(stream_id = %id, error = %close_err, "failed to close sink");
                    }
                    return Err(e);
                }
                tracing::debug!(stream_id = %id, "first sink registered; capture started");
                inner.sinks.insert(id.clone(), Arc::new(Mutex::new(sink)));
                self.shared.lifecycle.set(LifecycleState::Working);
                None
            } else {
                inner.sinks.insert(id.clone(), Arc::new(Mutex::new(sink)))
            }
        };

        if let Some(old) = replaced {
            tracing::debug!(stream_id = %id, "replaced live registration; closing previous sink");
            close_sink(&id, &old);
        }
        Ok(())
    }

    /// Removes the sink registered under `id`, if any, and closes it.
    ///
    /// Stops the capture device and emits [`LifecycleState::Idle`] when the
    /// registry becomes empty. Unknown ids are ignored. Close failures are
    /// logged, never propagated.
    pub fn deregister_sink(&self, id: &StreamId) {
        let removed = {
            let mut inner = self.shared.inner.lock();
            let removed = inner.sinks.remove(id);
            if removed.is_some() && inner.sinks.is_empty() {
                inner.device.stop();
                self.shared.lifecycle.set(LifecycleState::Idle);
                tracing::debug!(stream_id = %id, "last sink deregistered; capture stopped");
            }
            removed
        };

        match removed {
            Some(handle) => close_sink(id, &handle),
            None => tracing::debug!(stream_id = %id, "deregister for unknown stream id ignored"),
        }
    }

    /// Returns an observer of the capture-session lifecycle signal.
    ///
    /// The receiver immediately holds the most recent state, and only actual
    /// transitions wake it (never consecutive duplicates).
    pub fn lifecycle_state(&self) -> watch::Receiver<LifecycleState> {
        self.shared.lifecycle.subscribe()
    }

    /// Returns the current lifecycle state.
    pub fn current_state(&self) -> LifecycleState {
        self.shared.lifecycle.current()
    }

    /// Returns whether the capture device is currently running.
    pub fn is_capturing(&self) -> bool {
        self.shared.inner.lock().device.is_capturing()
    }

    /// Deregisters and closes every remaining sink and stops the device,
    /// emitting [`LifecycleState::Idle`] if a transition occurs.
    ///
    /// Also runs on `Drop`. Idempotent.
    pub fn shutdown(&self) {
        let drained: Vec<(StreamId, SinkHandle)> = {
            let mut inner = self.shared.inner.lock();
            let drained: Vec<_> = inner.sinks.drain().collect();
            if !drained.is_empty() {
                inner.device.stop();
                self.shared.lifecycle.set(LifecycleState::Idle);
                tracing::debug!(count = drained.len(), "multiplexer shut down; all sinks released");
            }
            drained
        };

        for (id, handle) in drained {
            close_sink(&id, &handle);
        }
    }

    /// Starts the device with a fan-out callback holding a weak reference
    /// back to the shared state, so the device never keeps the multiplexer
    /// alive.
    fn start_device(&self, inner: &mut Inner) -> Result<(), CaptureError> {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        inner.device.start(Box::new(move |buf| {
            if let Some(shared) = weak.upgrade() {
                shared.fan_out(buf);
            }
        }))
    }
}

impl Drop for CaptureMultiplexer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    /// Delivers one captured buffer to every registered sink, then evicts
    /// the sinks whose write failed.
    ///
    /// Runs on the device's read-loop thread. The registry is snapshotted
    /// up front so every sink present at the start of the pass is attempted
    /// exactly once and the map is never mutated mid-iteration; eviction
    /// bookkeeping runs only after the full pass, so a failing sink never
    /// robs the others of the buffer.
    fn fan_out(&self, buf: &[u8]) {
        let snapshot: Vec<(StreamId, SinkHandle)> = {
            let inner = self.inner.lock();
            inner
                .sinks
                .iter()
                .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
                .collect()
        };

        let mut failed: Vec<(StreamId, SinkHandle)> = Vec::new();
        for (id, handle) in snapshot {
            let result = handle.lock().write(buf);
            if let Err(e) = result {
                tracing::warn!(stream_id = %id, error = %e, "sink write failed; evicting");
                failed.push((id, handle));
            }
        }
        if failed.is_empty() {
            return;
        }

        let mut to_close: Vec<(StreamId, SinkHandle)> = Vec::new();
        {
            let mut inner = self.inner.lock();
            for (id, handle) in failed {
                // Evict only the exact sink that failed: a concurrent
                // deregister-and-replace under the same id keeps the fresh
                // registration.
                let is_current = inner
                    .sinks
                    .get(&id)
                    .is_some_and(|current| Arc::ptr_eq(current, &handle));
                if is_current {
                    inner.sinks.remove(&id);
                    to_close.push((id, handle));
                }
            }

            if !to_close.is_empty() && inner.sinks.is_empty() {
                // stop() only signals the read loop, so calling it from
                // inside the data callback cannot deadlock.
                inner.device.stop();
                self.lifecycle.set(LifecycleState::Idle);
                tracing::debug!("last sink evicted; capture stopped");
            }
        }

        for (id, handle) in to_close {
            close_sink(&id, &handle);
        }
    }
}

/// Closes a sink, logging (never propagating) any failure: the sink is
/// being discarded regardless of the close outcome.
fn close_sink(id: &StreamId, handle: &SinkHandle) {
    if let Err(e) = handle.lock().close() {
        tracing::warn!(stream_id = %id, error = %e, "failed to close sink");
    }
}
