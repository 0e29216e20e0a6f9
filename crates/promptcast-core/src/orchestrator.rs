//! Tab orchestrator.
//!
//! Resolves one tab per provider for every broadcast, reusing a registered
//! tab in follow-up mode and creating one otherwise, then delivers the fill
//! instruction to the page agent in that tab. Providers are handled
//! concurrently and independently; a failure for one is logged and never
//! touches the others.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use promptcast_config::TimingConfig;
use promptcast_protocols::{
    BroadcastRequest, FillInstruction, MessageAck, Provider, RuntimeMessage, TabBrowser,
    TabError, TabEvent, TabId, TabStatus,
};

use crate::catalog::ProviderCatalog;
use crate::classifier::{classify, DomainKey};
use crate::registry::TabRegistry;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on waiting for a created tab's load-complete signal.
    pub page_load_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_timing(&TimingConfig::default())
    }
}

impl OrchestratorConfig {
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self {
            page_load_timeout: timing.page_load_timeout(),
        }
    }
}

/// How a provider's tab was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    Reused,
    Created,
}

/// Per-provider result of one broadcast. Reports dispatch, not page outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderDispatch {
    pub provider_id: String,
    pub domain: DomainKey,
    pub tab_id: Option<TabId>,
    pub mode: Option<DispatchMode>,
    pub error: Option<String>,
}

impl ProviderDispatch {
    fn new(provider: &Provider, domain: &DomainKey) -> Self {
        Self {
            provider_id: provider.id.clone(),
            domain: domain.clone(),
            tab_id: None,
            mode: None,
            error: None,
        }
    }

    /// Whether the fill instruction reached a tab.
    pub fn is_dispatched(&self) -> bool {
        self.tab_id.is_some() && self.error.is_none()
    }
}

/// Result of one broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastReport {
    pub request_id: Uuid,
    pub dispatches: Vec<ProviderDispatch>,
}

impl BroadcastReport {
    pub fn dispatched(&self) -> usize {
        self.dispatches.iter().filter(|d| d.is_dispatched()).count()
    }
}

/// Maps providers to tabs and relays fill instructions.
pub struct TabOrchestrator {
    browser: Arc<dyn TabBrowser>,
    registry: TabRegistry,
    catalog: ProviderCatalog,
    config: OrchestratorConfig,
    /// Most recent broadcast, kept for inspection.
    last_broadcast: Mutex<Option<BroadcastRequest>>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl TabOrchestrator {
    pub fn new(
        browser: Arc<dyn TabBrowser>,
        catalog: ProviderCatalog,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            browser,
            registry: TabRegistry::new(),
            catalog,
            config,
            last_broadcast: Mutex::new(None),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &TabRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn last_broadcast(&self) -> Option<BroadcastRequest> {
        self.last_broadcast.lock().clone()
    }

    /// Run one broadcast to completion of every provider's dispatch.
    pub async fn broadcast(&self, request: BroadcastRequest) -> BroadcastReport {
        info!(
            "Broadcast {} to {} provider(s) (auto_send: {}, follow_up: {})",
            request.id,
            request.providers.len(),
            request.auto_send,
            request.follow_up
        );
        *self.last_broadcast.lock() = Some(request.clone());

        let dispatches = join_all(
            request
                .providers
                .iter()
                .map(|provider| self.dispatch(provider, &request)),
        )
        .await;

        let report = BroadcastReport {
            request_id: request.id,
            dispatches,
        };
        info!(
            "Broadcast {} dispatched to {}/{} provider(s)",
            report.request_id,
            report.dispatched(),
            report.dispatches.len()
        );
        report
    }

    /// Start a broadcast in the background.
    pub fn spawn_broadcast(self: &Arc<Self>, request: BroadcastRequest) {
        let this = Arc::clone(self);
        self.track(tokio::spawn(async move {
            this.broadcast(request).await;
        }));
    }

    /// Answer one runtime message. Work is started, not awaited; a `true`
    /// ack only means it was initiated.
    ///
    /// `sender` is the tab the message came from, when it came from a page.
    pub fn handle_message(
        self: &Arc<Self>,
        message: RuntimeMessage,
        sender: Option<TabId>,
    ) -> MessageAck {
        match message {
            RuntimeMessage::OpenAiProviders {
                urls,
                prompt,
                auto_send,
                follow_up_mode,
            } => {
                if prompt.trim().is_empty() {
                    warn!("Rejecting OPEN_AI_PROVIDERS with an empty prompt");
                    return MessageAck::rejected();
                }
                let providers = urls
                    .iter()
                    .map(|url| self.catalog.provider_for_url(url))
                    .collect();
                let request = BroadcastRequest::new(prompt, providers, auto_send, follow_up_mode);
                self.spawn_broadcast(request);
                MessageAck::ok()
            }
            RuntimeMessage::PromptSent {} => match sender {
                Some(tab_id) => {
                    let this = Arc::clone(self);
                    self.track(tokio::spawn(async move {
                        this.on_prompt_sent(&tab_id).await;
                    }));
                    MessageAck::ok()
                }
                None => {
                    debug!("PROMPT_SENT without a sender tab, ignoring");
                    MessageAck::rejected()
                }
            },
            RuntimeMessage::FillPrompt { .. } => {
                debug!("FILL_PROMPT is addressed to pages, not the orchestrator");
                MessageAck::rejected()
            }
        }
    }

    /// A page reported a send: register its tab under the tab's own domain.
    ///
    /// This is how tabs the user opened by hand enter the registry.
    pub async fn on_prompt_sent(&self, tab_id: &TabId) {
        match self.browser.get_tab(tab_id).await {
            Ok(Some(info)) => {
                let domain = classify(&info.url);
                if domain.is_valid() {
                    info!("Prompt sent from tab {} ({})", tab_id, domain);
                    self.registry.record(domain, tab_id.clone());
                } else {
                    debug!("Prompt sent from tab {} with unclassifiable URL", tab_id);
                }
            }
            Ok(None) => debug!("Prompt sent from tab {} which is already gone", tab_id),
            Err(e) => warn!("Failed to inspect tab {} after send: {}", tab_id, e),
        }
    }

    /// Apply one tab lifecycle notification.
    pub fn on_tab_event(&self, event: &TabEvent) {
        if let TabEvent::Removed { tab_id } = event {
            self.registry.remove(tab_id);
        }
    }

    /// Consume tab lifecycle events until the stream closes.
    pub async fn run(self: Arc<Self>, mut events: broadcast::Receiver<TabEvent>) {
        debug!("Orchestrator event loop started");
        loop {
            match events.recv().await {
                Ok(event) => self.on_tab_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Orchestrator lagged, {} tab event(s) dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Orchestrator event loop stopped");
    }

    /// Wait for every background task started so far.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.in_flight.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("Background dispatch task failed: {}", e);
                }
            }
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    async fn dispatch(&self, provider: &Provider, request: &BroadcastRequest) -> ProviderDispatch {
        let domain = classify(&provider.url);
        let auto_send = self.catalog.effective_auto_send(&domain, request.auto_send);
        let mut dispatch = ProviderDispatch::new(provider, &domain);

        if request.follow_up {
            if let Some(tab_id) = self.find_existing(&domain).await {
                match self.browser.activate_tab(&tab_id).await {
                    Ok(()) => {
                        let instruction = FillInstruction {
                            prompt: request.prompt.clone(),
                            auto_send,
                            follow_up: true,
                        };
                        info!("Follow-up to {} in existing tab {}", provider.id, tab_id);
                        if let Err(e) = self.deliver(&tab_id, instruction).await {
                            warn!("Delivery to {} (tab {}) failed: {}", provider.id, tab_id, e);
                            dispatch.error = Some(e.to_string());
                        }
                        dispatch.tab_id = Some(tab_id);
                        dispatch.mode = Some(DispatchMode::Reused);
                        return dispatch;
                    }
                    Err(e) => {
                        warn!(
                            "Focusing tab {} for {} failed: {}, opening a new tab",
                            tab_id, provider.id, e
                        );
                        self.registry.remove(&tab_id);
                    }
                }
            }
        }

        let instruction = FillInstruction {
            prompt: request.prompt.clone(),
            auto_send,
            follow_up: false,
        };
        match self.open_and_fill(provider, &domain, instruction).await {
            Ok(tab_id) => {
                dispatch.tab_id = Some(tab_id);
                dispatch.mode = Some(DispatchMode::Created);
            }
            Err((tab_id, e)) => {
                warn!("Dispatch to {} failed: {}", provider.id, e);
                dispatch.tab_id = tab_id;
                dispatch.mode = dispatch.tab_id.as_ref().map(|_| DispatchMode::Created);
                dispatch.error = Some(e.to_string());
            }
        }
        dispatch
    }

    /// The two reuse paths: cached entry first, then a scan of open tabs.
    async fn find_existing(&self, domain: &DomainKey) -> Option<TabId> {
        if !domain.is_valid() {
            return None;
        }
        if let Some(tab_id) = self.registry.resolve(domain, self.browser.as_ref()).await {
            return Some(tab_id);
        }
        self.registry.observe_all(domain, self.browser.as_ref()).await
    }

    /// Create a tab, register it, wait for it to load, then deliver.
    async fn open_and_fill(
        &self,
        provider: &Provider,
        domain: &DomainKey,
        instruction: FillInstruction,
    ) -> Result<TabId, (Option<TabId>, TabError)> {
        // Subscribe before creating so the load signal cannot be missed.
        let mut events = self.browser.subscribe();
        let tab_id = self
            .browser
            .create_tab(&provider.url)
            .await
            .map_err(|e| (None, e))?;
        info!("Opened tab {} for {}", tab_id, provider.id);
        self.registry.record(domain.clone(), tab_id.clone());

        match self.wait_for_load(&mut events, &tab_id).await {
            Ok(()) => debug!("Tab {} finished loading", tab_id),
            Err(TabError::Timeout(what)) => {
                warn!("Timed out waiting for {}, delivering anyway", what);
            }
            Err(e) => return Err((Some(tab_id), e)),
        }
        drop(events);

        self.deliver(&tab_id, instruction)
            .await
            .map_err(|e| (Some(tab_id.clone()), e))?;
        Ok(tab_id)
    }

    /// Wait for exactly one load-complete signal for `tab_id`.
    async fn wait_for_load(
        &self,
        events: &mut broadcast::Receiver<TabEvent>,
        tab_id: &TabId,
    ) -> Result<(), TabError> {
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(TabEvent::Updated {
                        tab_id: id,
                        status: TabStatus::Complete,
                    }) if id == *tab_id => return Ok(()),
                    Ok(TabEvent::Removed { tab_id: id }) if id == *tab_id => {
                        return Err(TabError::AccessFailed(format!(
                            "tab {} closed while loading",
                            tab_id
                        )));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => {
                        // Missed events; fall back to asking for the status directly.
                        if let Ok(Some(info)) = self.browser.get_tab(tab_id).await {
                            if info.status == TabStatus::Complete {
                                return Ok(());
                            }
                        }
                    }
                    Err(RecvError::Closed) => {
                        return Err(TabError::Browser("tab event stream closed".to_string()));
                    }
                }
            }
        };

        tokio::time::timeout(self.config.page_load_timeout, wait)
            .await
            .map_err(|_| TabError::Timeout(format!("tab {} to load", tab_id)))?
    }

    async fn deliver(&self, tab_id: &TabId, instruction: FillInstruction) -> Result<(), TabError> {
        let ack = self.browser.deliver(tab_id, instruction.into()).await?;
        if !ack.success {
            warn!("Page in tab {} declined the fill instruction", tab_id);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
