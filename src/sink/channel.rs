//! Tokio mpsc channel sink implementation.

use tokio::sync::mpsc;

use crate::sink::Sink;
use crate::SinkError;

/// A sink that forwards captured buffers to a tokio mpsc channel.
///
/// This is the primary way to hand captured audio to async processing
/// (transcription, streaming to an engine, etc.). The channel is unbounded
/// because `write` runs on the capture read-loop thread and must not block
/// behind a slow consumer.
///
/// # Example
///
/// ```
/// use mic_fanout::ChannelSink;
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
/// let sink = ChannelSink::new(tx);
///
/// // Register with a CaptureMultiplexer, then receive buffers:
/// // while let Some(buf) = rx.recv().await { ... }
/// ```
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelSink {
    /// Creates a new channel sink with the given sender.
    pub fn new(sender: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { sender }
    }
}

impl Sink for ChannelSink {
    fn write(&mut self, buf: &[u8]) -> Result<(), SinkError> {
        self.sender
            .send(buf.to_vec())
            .map_err(|_| SinkError::ChannelClosed)
    }
}
