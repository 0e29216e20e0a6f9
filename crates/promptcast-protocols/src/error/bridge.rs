//! Cross-context bridge errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Message has no source tag")]
    MissingSource,

    #[error("Message from foreign source: {0}")]
    ForeignSource(String),

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Post failed: {0}")]
    PostFailed(String),

    #[error("Channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_source_display() {
        let err = BridgeError::ForeignSource("other-extension".to_string());
        assert!(err.to_string().contains("other-extension"));
    }

    #[test]
    fn test_error_debug() {
        let debug = format!("{:?}", BridgeError::ChannelClosed);
        assert!(debug.contains("ChannelClosed"));
    }
}
