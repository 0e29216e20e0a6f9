//! Tab errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TabError {
    #[error("Tab not found: {0}")]
    NotFound(String),

    #[error("Tab creation failed: {0}")]
    CreateFailed(String),

    /// Focusing or inspecting a tab failed, usually because it closed.
    #[error("Tab access failed: {0}")]
    AccessFailed(String),

    #[error("Message delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Browser unavailable: {0}")]
    Browser(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_failed_display() {
        let err = TabError::AccessFailed("tab-7 closed".to_string());
        assert!(err.to_string().contains("access failed"));
        assert!(err.to_string().contains("tab-7"));
    }

    #[test]
    fn test_timeout_display() {
        let err = TabError::Timeout("page load".to_string());
        assert_eq!(err.to_string(), "Timed out waiting for page load");
    }
}
