//! Error types for mic-fanout.
//!
//! Errors are split into two categories:
//! - **Capture errors** ([`CaptureError`]): prevent capture from starting,
//!   surfaced to the caller of `start`/`register_sink`
//! - **Sink errors** ([`SinkError`]): recovered locally by evicting the
//!   failing sink; never propagated to registration callers

use std::path::PathBuf;

/// Errors that prevent audio capture from starting.
///
/// These are returned from [`CaptureDevice::start`] and, transitively, from
/// [`CaptureMultiplexer::register_sink`] when registering the first sink.
/// Runtime sink failures are handled via eviction instead.
///
/// [`CaptureDevice::start`]: crate::CaptureDevice::start
/// [`CaptureMultiplexer::register_sink`]: crate::CaptureMultiplexer::register_sink
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// `start` was called while a capture session is already running.
    #[error("already capturing")]
    AlreadyCapturing,

    /// No default input device is configured on this system.
    #[error("no default input device configured")]
    NoDefaultDevice,

    /// The input device exists but could not be opened or configured.
    #[error("device unavailable: {reason}")]
    DeviceUnavailable {
        /// Why the device could not be opened.
        reason: String,
    },

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    Backend(String),
}

impl CaptureError {
    /// Creates a `DeviceUnavailable` error with the given reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }
}

/// Errors that can occur within a [`Sink`](crate::Sink) implementation.
///
/// Sink errors are recoverable from the multiplexer's point of view: the
/// offending sink is closed and evicted after the fan-out pass, and capture
/// continues for the remaining sinks.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// A write operation failed.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// File I/O error.
    #[error("file error: {path}: {source}")]
    FileError {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The receiving end of a channel sink was dropped.
    #[error("channel closed")]
    ChannelClosed,

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl SinkError {
    /// Creates a custom sink error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a write failed error with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Creates a file error for the given path.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileError {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::unavailable("device is busy");
        assert_eq!(err.to_string(), "device unavailable: device is busy");

        assert_eq!(
            CaptureError::AlreadyCapturing.to_string(),
            "already capturing"
        );
    }

    #[test]
    fn test_sink_error_custom() {
        let err = SinkError::custom("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }

    #[test]
    fn test_sink_error_write_failed() {
        let err = SinkError::write_failed("pipe broken");
        assert_eq!(err.to_string(), "write failed: pipe broken");
    }

    #[test]
    fn test_sink_error_file_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = SinkError::file_error("/tmp/test.wav", io_err);
        assert!(err.to_string().contains("/tmp/test.wav"));
    }
}
