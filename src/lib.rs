//! # mic-fanout
//!
//! Microphone capture with multi-sink fan-out.
//!
//! `mic-fanout` owns a single audio input device and distributes every
//! captured PCM buffer to any number of concurrently registered byte sinks,
//! each identified by an opaque [`StreamId`]. The capture device is started
//! when the first sink registers and stopped when the last one leaves, and
//! that occupancy is published as a two-state [`LifecycleState`] signal so a
//! hosting process can manage its own lifetime.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mic_fanout::{CaptureMultiplexer, ChannelSink, CpalCaptureDevice, DeviceConfig};
//! use tokio::sync::mpsc;
//!
//! let device = CpalCaptureDevice::new(DeviceConfig::default());
//! let mux = CaptureMultiplexer::new(Box::new(device));
//!
//! let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
//! mux.register_sink("transcriber", Box::new(ChannelSink::new(tx)))?;
//!
//! // Captured 16kHz mono PCM16 buffers arrive on the channel
//! while let Some(buf) = rx.recv().await {
//!     // forward to a speech engine, file, socket, ...
//! }
//!
//! mux.deregister_sink(&"transcriber".into());
//! ```
//!
//! ## Architecture
//!
//! - **Read loop**: a dedicated capture thread pulls fixed-size buffers from
//!   the device and invokes the multiplexer's fan-out callback.
//! - **Registry**: sinks keyed by [`StreamId`], mutated by the caller,
//!   iterated by the read loop; one mutex serializes registration,
//!   deregistration and device start/stop.
//! - **Failure isolation**: a sink whose `write` fails is closed and evicted
//!   after the fan-out pass; the other sinks are unaffected.

#![warn(missing_docs)]

pub mod device;
mod error;
mod lifecycle;
mod mux;
pub mod sink;
mod stream_id;

pub use device::{
    CaptureDevice, CpalCaptureDevice, DataCallback, DeviceConfig, MockCaptureDevice, MockHandle,
};
pub use error::{CaptureError, SinkError};
pub use lifecycle::LifecycleState;
pub use mux::CaptureMultiplexer;
pub use sink::{ChannelSink, Sink, WavSink};
pub use stream_id::StreamId;
