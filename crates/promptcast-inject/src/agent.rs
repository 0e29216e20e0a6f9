//! The isolated-context page agent.
//!
//! One [`PageAgent`] lives in every provider tab. It accepts `FILL_PROMPT`,
//! waits for the document, then either fills the page itself or hands the
//! work to the native context over the bridge. A send is reported to the
//! orchestrator as `PROMPT_SENT`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use promptcast_config::TimingConfig;
use promptcast_protocols::{
    FillInstruction, InjectionOutcome, MessageAck, PageSurface, RuntimeMessage,
};

use crate::bridge::{BridgeChannel, Envelope};
use crate::discovery::ElementDiscovery;
use crate::engine::FillEngine;
use crate::profile::{ExecutionContext, ProviderProfile};
use crate::strategy::FillContext;
use crate::submit::SubmissionTrigger;
use crate::wait::wait_for_document_complete;

/// Page → orchestrator half of the runtime channel.
pub type RuntimePort = mpsc::UnboundedSender<RuntimeMessage>;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Discover, fill, settle, and optionally submit. Shared by both contexts.
pub struct PageFiller {
    discovery: ElementDiscovery,
    engine: FillEngine,
    engine_without_handler: FillEngine,
    trigger: SubmissionTrigger,
    render_settle: Duration,
}

impl PageFiller {
    pub fn new(
        discovery: ElementDiscovery,
        ctx: FillContext,
        trigger: SubmissionTrigger,
        render_settle: Duration,
    ) -> Self {
        Self {
            discovery,
            engine: FillEngine::new(ctx.clone()),
            engine_without_handler: FillEngine::new(ctx).without_component_handler(),
            trigger,
            render_settle,
        }
    }

    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self::new(
            ElementDiscovery::new(timing.discovery_timeout()),
            FillContext::from_timing(timing),
            SubmissionTrigger::from_timing(timing),
            timing.render_settle(),
        )
    }

    pub async fn run(
        &self,
        page: &dyn PageSurface,
        profile: &ProviderProfile,
        prompt: &str,
        auto_send: bool,
    ) -> InjectionOutcome {
        let widget = match self
            .discovery
            .find(page, &profile.input_selectors, profile.requires_visible())
            .await
        {
            Some(widget) => widget,
            None => {
                warn!(
                    "No input element found within {:?}",
                    self.discovery.timeout()
                );
                return InjectionOutcome::default();
            }
        };

        let engine = if profile.component_handler {
            &self.engine
        } else {
            &self.engine_without_handler
        };
        let fill = engine.fill(widget.as_ref(), prompt).await;

        // Let the page render the new text before anything looks for a
        // send button.
        if let Err(e) = widget.next_frame().await {
            debug!("Animation frame wait failed: {}", e);
        }
        tokio::time::sleep(self.render_settle).await;

        // Submission is attempted even after a failed fill.
        let sent = auto_send
            && self
                .trigger
                .try_submit(page, widget.as_ref(), profile)
                .await;

        InjectionOutcome {
            filled: fill.filled,
            sent,
        }
    }
}

/// Clears the processed flag when a follow-up finishes, however it finishes.
struct ResetOnDrop<'a>(&'a AtomicBool);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct PageAgent {
    page: Arc<dyn PageSurface>,
    profile: ProviderProfile,
    filler: Arc<PageFiller>,
    bridge: Option<Arc<dyn BridgeChannel>>,
    port: RuntimePort,
    processed: AtomicBool,
    ready_timeout: Duration,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl PageAgent {
    pub fn new(
        page: Arc<dyn PageSurface>,
        profile: ProviderProfile,
        filler: Arc<PageFiller>,
        port: RuntimePort,
    ) -> Self {
        Self {
            page,
            profile,
            filler,
            bridge: None,
            port,
            processed: AtomicBool::new(false),
            ready_timeout: TimingConfig::default().ready_state_timeout(),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Channel used to reach the native context.
    pub fn with_bridge(mut self, bridge: Arc<dyn BridgeChannel>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    /// Acknowledge a runtime message. A non-empty `FILL_PROMPT` is accepted
    /// and processed in the background; everything else is rejected.
    pub fn handle_message(self: &Arc<Self>, message: RuntimeMessage) -> MessageAck {
        let instruction = match message.fill_instruction() {
            Some(instruction) if !instruction.prompt.trim().is_empty() => instruction,
            Some(_) => {
                debug!("Ignoring FILL_PROMPT with an empty prompt");
                return MessageAck::rejected();
            }
            None => {
                debug!("Page agent does not handle {}", message.kind());
                return MessageAck::rejected();
            }
        };

        let agent = Arc::clone(self);
        let handle = tokio::spawn(async move {
            agent.process(instruction).await;
        });
        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
        MessageAck::ok()
    }

    /// Run one instruction. Returns `None` when the instruction was skipped
    /// or handed to the native context.
    pub async fn process(&self, instruction: FillInstruction) -> Option<InjectionOutcome> {
        let _reset = if instruction.follow_up {
            self.processed.store(true, Ordering::SeqCst);
            Some(ResetOnDrop(&self.processed))
        } else {
            if self.processed.swap(true, Ordering::SeqCst) {
                debug!("Page already filled, ignoring repeat instruction");
                return None;
            }
            None
        };

        if !wait_for_document_complete(self.page.as_ref(), self.ready_timeout, READY_POLL_INTERVAL)
            .await
        {
            warn!(
                "Document not complete after {:?}, filling anyway",
                self.ready_timeout
            );
        }

        if self.profile.context == ExecutionContext::Native {
            match &self.bridge {
                Some(bridge) => {
                    let envelope = Envelope::fill(&instruction.prompt, instruction.auto_send);
                    match bridge.post(envelope.to_value()).await {
                        Ok(()) => {
                            debug!("Handed fill to native context on {}", self.profile.domain);
                            return None;
                        }
                        Err(e) => warn!("Bridge post failed ({}), filling locally", e),
                    }
                }
                None => debug!("No bridge for {}, filling locally", self.profile.domain),
            }
        }

        let outcome = self
            .filler
            .run(
                self.page.as_ref(),
                &self.profile,
                &instruction.prompt,
                instruction.auto_send,
            )
            .await;

        if outcome.sent && self.port.send(RuntimeMessage::PromptSent {}).is_err() {
            warn!("Runtime port closed, PROMPT_SENT dropped");
        }
        info!("Injection outcome: {}", outcome.label());
        Some(outcome)
    }

    /// Wait for every instruction accepted so far.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.in_flight.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Page agent task failed: {}", e);
                }
            }
        }
    }

    /// Cancel every instruction still running. Used when the document the
    /// agent was built for has gone away.
    pub fn abort(&self) {
        for handle in self.in_flight.lock().drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
