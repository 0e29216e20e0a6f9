//! Per-tab page agents.
//!
//! Each attached tab gets one [`PageAgent`] in promptcast's isolated world,
//! created on first delivery and replaced whenever the tab's main frame
//! navigates. Pages whose profile needs the native context also get a
//! [`NativeCompanion`] in the main world and an [`ExtensionRelay`] back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use promptcast_config::TimingConfig;
use promptcast_inject::{
    BridgeChannel, ExecutionContext, ExtensionRelay, NativeCompanion, PageAgent, PageFiller,
    ProfileBook,
};
use promptcast_protocols::{
    BridgeError, MessageAck, PageSurface, RuntimeMessage, TabError, TabId,
};

use crate::cdp::PageSession;
use crate::channel::CdpWindowChannel;
use crate::page::{CdpPage, PageContext, World};

/// Page → orchestrator messages, tagged with the sending tab.
pub type Uplink = mpsc::UnboundedSender<(TabId, RuntimeMessage)>;

/// Everything running for one document.
struct PageRuntime {
    agent: Arc<PageAgent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for PageRuntime {
    fn drop(&mut self) {
        self.agent.abort();
        for task in &self.tasks {
            task.abort();
        }
    }
}

pub struct AgentHost {
    book: ProfileBook,
    filler: Arc<PageFiller>,
    ready_timeout: Duration,
    uplink: Uplink,
    pages: Mutex<HashMap<TabId, PageRuntime>>,
}

impl AgentHost {
    pub fn new(book: ProfileBook, timing: &TimingConfig, uplink: Uplink) -> Self {
        Self {
            book,
            filler: Arc::new(PageFiller::from_timing(timing)),
            ready_timeout: timing.ready_state_timeout(),
            uplink,
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// Hand a runtime message to the tab's agent, creating it if needed.
    pub async fn deliver(
        &self,
        tab_id: &TabId,
        session: Arc<PageSession>,
        message: RuntimeMessage,
    ) -> Result<MessageAck, TabError> {
        let agent = self.agent_for(tab_id, session).await?;
        Ok(agent.handle_message(message))
    }

    /// The tab's document changed; its agent and companions go with it.
    pub fn reset(&self, tab_id: &TabId) {
        if self.pages.lock().remove(tab_id).is_some() {
            debug!("Dropped page agent for {} after navigation", tab_id);
        }
    }

    pub fn forget(&self, tab_id: &TabId) {
        self.pages.lock().remove(tab_id);
    }

    /// Wait until every page agent has finished the work it started.
    pub async fn settle(&self) {
        let agents: Vec<Arc<PageAgent>> = self
            .pages
            .lock()
            .values()
            .map(|runtime| runtime.agent.clone())
            .collect();
        join_all(agents.iter().map(|agent| agent.settle())).await;
    }

    async fn agent_for(
        &self,
        tab_id: &TabId,
        session: Arc<PageSession>,
    ) -> Result<Arc<PageAgent>, TabError> {
        if let Some(runtime) = self.pages.lock().get(tab_id) {
            return Ok(runtime.agent.clone());
        }

        let runtime = self.install(tab_id, session).await?;
        let mut pages = self.pages.lock();
        // A concurrent delivery may have installed first; keep that one.
        let runtime = pages.entry(tab_id.clone()).or_insert(runtime);
        Ok(runtime.agent.clone())
    }

    async fn install(
        &self,
        tab_id: &TabId,
        session: Arc<PageSession>,
    ) -> Result<PageRuntime, TabError> {
        let isolated = PageContext::new(session.clone(), World::Isolated);
        let page = CdpPage::new(isolated.clone());
        let hostname = page
            .hostname()
            .await
            .map_err(|e| TabError::DeliveryFailed(format!("{}: {}", tab_id, e)))?;
        let hostname = page_host(tab_id, hostname)?;
        let profile = self.book.for_host(&hostname).clone();

        let (port, mut inbox) = mpsc::unbounded_channel::<RuntimeMessage>();
        let mut tasks = Vec::new();

        let uplink = self.uplink.clone();
        let sender = tab_id.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                if uplink.send((sender.clone(), message)).is_err() {
                    break;
                }
            }
        }));

        let mut agent = PageAgent::new(
            Arc::new(page),
            profile.clone(),
            self.filler.clone(),
            port.clone(),
        )
        .with_ready_timeout(self.ready_timeout);

        if profile.context == ExecutionContext::Native {
            let bridge_err =
                |e: BridgeError| TabError::DeliveryFailed(format!("{}: bridge: {}", tab_id, e));

            let main = PageContext::new(session, World::Main);
            let main_channel: Arc<dyn BridgeChannel> =
                Arc::new(CdpWindowChannel::new(main.clone()));
            let companion = NativeCompanion::new(
                Arc::new(CdpPage::new(main)),
                main_channel,
                profile.clone(),
                self.filler.clone(),
            );
            tasks.push(companion.spawn().await.map_err(bridge_err)?);

            let isolated_channel: Arc<dyn BridgeChannel> =
                Arc::new(CdpWindowChannel::new(isolated));
            let relay = ExtensionRelay::new(isolated_channel.clone(), port);
            tasks.push(relay.spawn().await.map_err(bridge_err)?);

            agent = agent.with_bridge(isolated_channel);
        }

        info!(
            "Page agent ready on {} ({}, {:?} context)",
            tab_id,
            hostname,
            profile.context
        );
        Ok(PageRuntime {
            agent: Arc::new(agent),
            tasks,
        })
    }
}

/// The profile is chosen by host, so a document without one (the blank page
/// a new tab starts on) cannot take an agent yet.
fn page_host(tab_id: &TabId, hostname: String) -> Result<String, TabError> {
    if hostname.is_empty() {
        return Err(TabError::DeliveryFailed(format!(
            "{}: page has no host yet",
            tab_id
        )));
    }
    Ok(hostname)
}
