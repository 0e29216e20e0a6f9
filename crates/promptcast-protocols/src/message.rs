//! Runtime message contracts.
//!
//! Every request on the runtime channel is answered with a [`MessageAck`].
//! An ack of `success: true` means the work was *initiated*; it says nothing
//! about whether a fill or send eventually succeeded.

use serde::{Deserialize, Serialize};

use crate::types::FillInstruction;

/// Messages exchanged between the controller, the orchestrator and pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuntimeMessage {
    /// Controller → orchestrator: open (or reuse) one tab per URL and fill it.
    #[serde(rename = "OPEN_AI_PROVIDERS", rename_all = "camelCase")]
    OpenAiProviders {
        urls: Vec<String>,
        prompt: String,
        #[serde(default)]
        auto_send: bool,
        #[serde(default)]
        follow_up_mode: bool,
    },

    /// Orchestrator → page: fill the prompt, optionally submit.
    #[serde(rename = "FILL_PROMPT", rename_all = "camelCase")]
    FillPrompt {
        prompt: String,
        #[serde(default)]
        auto_send: bool,
        #[serde(default)]
        follow_up_mode: bool,
    },

    /// Page → orchestrator: a send affordance was activated.
    #[serde(rename = "PROMPT_SENT")]
    PromptSent {},
}

impl RuntimeMessage {
    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OpenAiProviders { .. } => "OPEN_AI_PROVIDERS",
            Self::FillPrompt { .. } => "FILL_PROMPT",
            Self::PromptSent {} => "PROMPT_SENT",
        }
    }

    /// The fill instruction carried by a `FILL_PROMPT`, if any.
    pub fn fill_instruction(&self) -> Option<FillInstruction> {
        match self {
            Self::FillPrompt {
                prompt,
                auto_send,
                follow_up_mode,
            } => Some(FillInstruction {
                prompt: prompt.clone(),
                auto_send: *auto_send,
                follow_up: *follow_up_mode,
            }),
            _ => None,
        }
    }
}

impl From<FillInstruction> for RuntimeMessage {
    fn from(instruction: FillInstruction) -> Self {
        Self::FillPrompt {
            prompt: instruction.prompt,
            auto_send: instruction.auto_send,
            follow_up_mode: instruction.follow_up,
        }
    }
}

/// Response to every runtime message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAck {
    pub success: bool,
}

impl MessageAck {
    pub fn ok() -> Self {
        Self { success: true }
    }

    pub fn rejected() -> Self {
        Self { success: false }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
