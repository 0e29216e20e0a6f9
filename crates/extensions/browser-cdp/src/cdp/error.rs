//! CDP error types.

use thiserror::Error;

use promptcast_protocols::{BridgeError, TabError, WidgetError};

/// CDP client errors.
#[derive(Debug, Error)]
pub enum CdpError {
    /// Failed to connect to Chrome.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Chrome not found or not running with remote debugging.
    #[error("Chrome not available at {0}. Start Chrome with: chrome --remote-debugging-port=9222")]
    ChromeNotAvailable(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol error.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error (for endpoint discovery).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JavaScript execution error.
    #[error("JavaScript error: {0}")]
    JavaScript(String),

    /// Timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Session closed.
    #[error("Session closed")]
    SessionClosed,

    /// Invalid response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CdpError {
    /// The execution context the call targeted no longer exists, usually
    /// because the page navigated.
    pub fn is_stale_context(&self) -> bool {
        match self {
            CdpError::Protocol { message, .. } => {
                message.contains("Cannot find context") || message.contains("context was destroyed")
            }
            CdpError::JavaScript(text) => text.contains("context was destroyed"),
            _ => false,
        }
    }

    /// The remote object handle no longer resolves.
    pub fn is_stale_object(&self) -> bool {
        matches!(self, CdpError::Protocol { message, .. } if message.contains("Could not find object"))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        CdpError::ConnectionFailed(format!("Invalid URL: {}", e))
    }
}

impl From<CdpError> for WidgetError {
    fn from(e: CdpError) -> Self {
        if e.is_stale_object() || e.is_stale_context() {
            return WidgetError::Detached;
        }
        match e {
            CdpError::JavaScript(text) => WidgetError::Script(text),
            other => WidgetError::Transport(other.to_string()),
        }
    }
}

impl From<CdpError> for BridgeError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::SessionClosed => BridgeError::ChannelClosed,
            other => BridgeError::PostFailed(other.to_string()),
        }
    }
}

impl From<CdpError> for TabError {
    fn from(e: CdpError) -> Self {
        TabError::Browser(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol(message: &str) -> CdpError {
        CdpError::Protocol {
            code: -32000,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(
            protocol("No target with given id found").to_string(),
            "CDP error: No target with given id found (code: -32000)"
        );
    }

    #[test]
    fn test_stale_handles_map_to_detached() {
        let err: WidgetError = protocol("Could not find object with given id").into();
        assert!(matches!(err, WidgetError::Detached));

        let err: WidgetError = protocol("Cannot find context with specified id").into();
        assert!(matches!(err, WidgetError::Detached));
    }

    #[test]
    fn test_script_error_maps_to_script() {
        let err: WidgetError = CdpError::JavaScript("TypeError: x is null".to_string()).into();
        assert!(matches!(err, WidgetError::Script(ref t) if t.contains("TypeError")));
    }

    #[test]
    fn test_closed_session_closes_bridge() {
        let err: BridgeError = CdpError::SessionClosed.into();
        assert!(matches!(err, BridgeError::ChannelClosed));
    }
}
