//! Sink trait and implementations for captured-audio destinations.
//!
//! A [`Sink`] is any writable destination for raw captured bytes. The crate
//! provides two built-in sinks:
//!
//! - [`ChannelSink`]: forwards buffers to a tokio mpsc channel
//! - [`WavSink`]: writes buffers to a WAV file
//!
//! You can implement the [`Sink`] trait for custom destinations like
//! sockets, pipes, or an embedded speech engine.

mod channel;
mod file;

pub use channel::ChannelSink;
pub use file::WavSink;

use crate::SinkError;

/// A writable destination for captured audio bytes.
///
/// Once registered with a [`CaptureMultiplexer`], a sink is exclusively
/// owned by its registry entry: the multiplexer is the only writer, and it
/// closes the sink exactly once when the registration ends (explicit
/// deregistration, write-failure eviction, replacement, or teardown).
///
/// # Implementation Notes
///
/// - `write` runs on the capture read-loop thread and may block; a slow
///   sink delays delivery to the others in the same pass
/// - `write` is treated as atomic-or-failed: on `Err` the buffer counts as
///   undelivered and the sink is evicted
/// - `close` failures are logged by the multiplexer, never propagated
///
/// # Example
///
/// ```
/// use mic_fanout::{Sink, SinkError};
///
/// struct PrintSink;
///
/// impl Sink for PrintSink {
///     fn write(&mut self, buf: &[u8]) -> Result<(), SinkError> {
///         println!("received {} bytes", buf.len());
///         Ok(())
///     }
/// }
/// ```
pub trait Sink: Send {
    /// Writes one captured buffer to the destination.
    ///
    /// `buf` holds exactly the bytes captured in this cycle (little-endian
    /// PCM16). Returning an error evicts this sink from the registry.
    fn write(&mut self, buf: &[u8]) -> Result<(), SinkError>;

    /// Releases the destination.
    ///
    /// Called exactly once when the registration ends. Errors are logged
    /// and ignored, since the sink is being discarded regardless.
    ///
    /// Default implementation does nothing.
    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSink {
        writes: usize,
        closes: usize,
    }

    impl Sink for CountingSink {
        fn write(&mut self, _buf: &[u8]) -> Result<(), SinkError> {
            self.writes += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<(), SinkError> {
            self.closes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_sink_lifecycle() {
        let mut sink = CountingSink {
            writes: 0,
            closes: 0,
        };

        sink.write(&[0, 1, 2]).unwrap();
        sink.write(&[3, 4, 5]).unwrap();
        sink.close().unwrap();

        assert_eq!(sink.writes, 2);
        assert_eq!(sink.closes, 1);
    }

    #[test]
    fn test_default_close_is_ok() {
        struct WriteOnly;
        impl Sink for WriteOnly {
            fn write(&mut self, _buf: &[u8]) -> Result<(), SinkError> {
                Ok(())
            }
        }

        let mut sink = WriteOnly;
        assert!(sink.close().is_ok());
    }

    #[test]
    fn test_sink_is_object_safe_and_send() {
        fn assert_send<T: Send + ?Sized>() {}
        assert_send::<Box<dyn Sink>>();
    }
}
