//! Error types for the f.bain wire format.

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// JSON serialization failed
    #[error("frame serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("frame deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// The frame carried a code this protocol version does not know
    #[error("unknown frame code: {0}")]
    UnknownCode(u16),

    /// A frame was missing a field its code requires
    #[error("frame missing required field: {0}")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FrameError::UnknownCode(999);
        assert_eq!(err.to_string(), "unknown frame code: 999");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FrameError>();
    }
}
