//! Registration identifiers.

use std::fmt;
use std::sync::Arc;

/// Names one sink registration in the multiplexer's registry.
///
/// A `StreamId` is chosen by the caller at registration time and refers to
/// that registration until it ends. Registering under an id that is already
/// live replaces the existing sink; an id whose registration ended may be
/// reused and keys a completely fresh registry entry. Backed by `Arc<str>`,
/// so the clones held by in-flight fan-out passes are pointer copies.
///
/// # Example
///
/// ```
/// use mic_fanout::StreamId;
///
/// let voice = StreamId::new("voice");
/// assert_eq!(voice.as_str(), "voice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(Arc<str>);

impl StreamId {
    /// Creates an id from any string-like value.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}
