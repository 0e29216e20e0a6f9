//! Cross-context bridge.
//!
//! Some pages only honour events dispatched from their own native context.
//! For those, the isolated-context agent posts a `FILL` envelope on the
//! page-global message channel; a [`NativeCompanion`] in the native context
//! performs the fill and posts `SENT` back; an [`ExtensionRelay`] in the
//! isolated context forwards `SENT` to the orchestrator as `PROMPT_SENT`.
//!
//! The channel is shared with the page and anything else running in it.
//! Raw messages are validated by [`Envelope::parse`] before any field is used.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use promptcast_protocols::{BridgeError, PageSurface, RuntimeMessage};

use crate::agent::{PageFiller, RuntimePort};
use crate::profile::ProviderProfile;

/// Source tag carried by every bridge message.
pub const BRIDGE_SOURCE: &str = "promptcast";

const TYPE_FILL: &str = "FILL";
const TYPE_SENT: &str = "SENT";

/// Typed bridge payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    #[serde(rename = "FILL", rename_all = "camelCase")]
    Fill {
        prompt: String,
        #[serde(default)]
        auto_send: bool,
    },
    #[serde(rename = "SENT")]
    Sent {},
}

/// A bridge message with its source tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub source: &'static str,
    #[serde(flatten)]
    pub message: BridgeMessage,
}

impl Envelope {
    pub fn new(message: BridgeMessage) -> Self {
        Self {
            source: BRIDGE_SOURCE,
            message,
        }
    }

    pub fn fill(prompt: impl Into<String>, auto_send: bool) -> Self {
        Self::new(BridgeMessage::Fill {
            prompt: prompt.into(),
            auto_send,
        })
    }

    pub fn sent() -> Self {
        Self::new(BridgeMessage::Sent {})
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!(self)
    }

    /// Validate a raw channel message. The source tag is checked before
    /// anything else is read.
    pub fn parse(raw: &Value) -> Result<BridgeMessage, BridgeError> {
        let object = raw
            .as_object()
            .ok_or_else(|| BridgeError::Malformed("not an object".to_string()))?;

        match object.get("source") {
            None => return Err(BridgeError::MissingSource),
            Some(Value::String(source)) if source == BRIDGE_SOURCE => {}
            Some(other) => return Err(BridgeError::ForeignSource(other.to_string())),
        }

        match object.get("type").and_then(Value::as_str) {
            Some(TYPE_FILL) | Some(TYPE_SENT) => {}
            Some(other) => return Err(BridgeError::UnknownType(other.to_string())),
            None => return Err(BridgeError::Malformed("missing type".to_string())),
        }

        let message: BridgeMessage = serde_json::from_value(raw.clone())
            .map_err(|e| BridgeError::Malformed(e.to_string()))?;
        if let BridgeMessage::Fill { ref prompt, .. } = message {
            if prompt.is_empty() {
                return Err(BridgeError::Malformed("empty prompt".to_string()));
            }
        }
        Ok(message)
    }
}

/// One context's handle on the page-global message channel.
#[async_trait]
pub trait BridgeChannel: Send + Sync {
    /// Post a message to the page (`window.postMessage`).
    async fn post(&self, message: Value) -> Result<(), BridgeError>;

    /// Start receiving every message posted on the page, from any context.
    async fn listen(&self) -> Result<mpsc::UnboundedReceiver<Value>, BridgeError>;
}

/// Native-context end: performs fills requested over the bridge.
pub struct NativeCompanion {
    page: Arc<dyn PageSurface>,
    channel: Arc<dyn BridgeChannel>,
    profile: ProviderProfile,
    filler: Arc<PageFiller>,
}

impl NativeCompanion {
    pub fn new(
        page: Arc<dyn PageSurface>,
        channel: Arc<dyn BridgeChannel>,
        profile: ProviderProfile,
        filler: Arc<PageFiller>,
    ) -> Self {
        Self {
            page,
            channel,
            profile,
            filler,
        }
    }

    /// Start listening, then handle `FILL` requests one at a time until the
    /// channel closes.
    pub async fn spawn(self) -> Result<JoinHandle<()>, BridgeError> {
        let mut inbox = self.channel.listen().await?;
        debug!("Native companion listening");
        Ok(tokio::spawn(async move {
            while let Some(raw) = inbox.recv().await {
                match Envelope::parse(&raw) {
                    Ok(BridgeMessage::Fill { prompt, auto_send }) => {
                        self.handle_fill(&prompt, auto_send).await;
                    }
                    Ok(BridgeMessage::Sent {}) => {}
                    Err(e) => debug!("Native companion ignored message: {}", e),
                }
            }
        }))
    }

    async fn handle_fill(&self, prompt: &str, auto_send: bool) {
        let outcome = self
            .filler
            .run(self.page.as_ref(), &self.profile, prompt, auto_send)
            .await;
        info!("Native fill outcome: {}", outcome.label());
        if outcome.sent {
            if let Err(e) = self.channel.post(Envelope::sent().to_value()).await {
                warn!("Failed to post SENT: {}", e);
            }
        }
    }
}

/// Isolated-context end: forwards `SENT` to the orchestrator.
pub struct ExtensionRelay {
    channel: Arc<dyn BridgeChannel>,
    port: RuntimePort,
}

impl ExtensionRelay {
    pub fn new(channel: Arc<dyn BridgeChannel>, port: RuntimePort) -> Self {
        Self { channel, port }
    }

    /// Start listening, then forward every `SENT` until either side closes.
    pub async fn spawn(self) -> Result<JoinHandle<()>, BridgeError> {
        let mut inbox = self.channel.listen().await?;
        Ok(tokio::spawn(async move {
            while let Some(raw) = inbox.recv().await {
                match Envelope::parse(&raw) {
                    Ok(BridgeMessage::Sent {}) => {
                        debug!("Relaying SENT as PROMPT_SENT");
                        if self.port.send(RuntimeMessage::PromptSent {}).is_err() {
                            debug!("Runtime port closed, relay stopping");
                            return;
                        }
                    }
                    Ok(BridgeMessage::Fill { .. }) => {}
                    Err(e) => debug!("Relay ignored message: {}", e),
                }
            }
        }))
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
