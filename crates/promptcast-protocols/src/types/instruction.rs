//! Broadcast requests and per-page fill instructions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::provider::Provider;

/// One user send action, fanned out to every listed provider.
///
/// Built once and never retried as a whole; each provider is resolved and
/// delivered to independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRequest {
    pub id: Uuid,
    pub prompt: String,
    pub providers: Vec<Provider>,
    pub auto_send: bool,
    pub follow_up: bool,
}

impl BroadcastRequest {
    pub fn new(
        prompt: impl Into<String>,
        providers: Vec<Provider>,
        auto_send: bool,
        follow_up: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            providers,
            auto_send,
            follow_up,
        }
    }
}

/// What is actually delivered into a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillInstruction {
    pub prompt: String,
    pub auto_send: bool,
    pub follow_up: bool,
}

/// Observed result of one page-side attempt. Logged, never propagated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionOutcome {
    pub filled: bool,
    pub sent: bool,
}

impl InjectionOutcome {
    /// Short label distinguishing "filled but not sent" from total failure.
    pub fn label(&self) -> &'static str {
        match (self.filled, self.sent) {
            (_, true) => "sent",
            (true, false) => "filled",
            (false, false) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_get_distinct_ids() {
        let a = BroadcastRequest::new("a", vec![], false, false);
        let b = BroadcastRequest::new("a", vec![], false, false);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(InjectionOutcome::default().label(), "failed");
        assert_eq!(InjectionOutcome { filled: true, sent: false }.label(), "filled");
        assert_eq!(InjectionOutcome { filled: true, sent: true }.label(), "sent");
    }
}
