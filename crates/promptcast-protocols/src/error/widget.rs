//! Widget errors.

use thiserror::Error;

/// Failure of a single page-side primitive.
///
/// The fill engine treats every variant as "this strategy failed" and moves on.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("Element detached from document")]
    Detached,

    #[error("Script error: {0}")]
    Script(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widget_error_display() {
        assert_eq!(
            WidgetError::Detached.to_string(),
            "Element detached from document"
        );
        let err = WidgetError::Unsupported("CompositionEvent");
        assert!(err.to_string().contains("CompositionEvent"));
    }
}
