//! [`TabBrowser`] over CDP targets.
//!
//! Top-level page targets are tabs. Target discovery keeps the tab table in
//! step with the browser; an attached session per tab reports load progress
//! and carries page scripting.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use promptcast_protocols::{
    MessageAck, RuntimeMessage, TabBrowser, TabError, TabEvent, TabId, TabInfo, TabStatus,
};

use crate::cdp::{CdpClient, CdpError, CdpEvent, FrameNavigated, PageSession, TargetInfo};
use crate::host::AgentHost;
use crate::scripts;

const TAB_EVENT_BUFFER: usize = 64;

/// A browser-level change to the set of tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TargetChange {
    Opened { id: TabId, url: String },
    Changed { id: TabId, url: String },
    Destroyed { id: TabId },
    Crashed { id: TabId },
    Detached { id: TabId },
}

/// Map a browser-level CDP event to a tab change. Non-page targets and
/// unrelated events map to `None`.
pub(crate) fn target_change(event: &CdpEvent) -> Option<TargetChange> {
    let page_info = |params: &Value| -> Option<TargetInfo> {
        let info: TargetInfo = serde_json::from_value(params["targetInfo"].clone()).ok()?;
        info.is_page().then_some(info)
    };
    let target_id = |params: &Value| -> Option<TabId> {
        params["targetId"].as_str().map(TabId::from)
    };

    match event.method.as_str() {
        "Target.targetCreated" => page_info(&event.params).map(|info| TargetChange::Opened {
            id: TabId::from(info.target_id),
            url: info.url,
        }),
        "Target.targetInfoChanged" => {
            page_info(&event.params).map(|info| TargetChange::Changed {
                id: TabId::from(info.target_id),
                url: info.url,
            })
        }
        "Target.targetDestroyed" => {
            target_id(&event.params).map(|id| TargetChange::Destroyed { id })
        }
        "Target.targetCrashed" => target_id(&event.params).map(|id| TargetChange::Crashed { id }),
        "Target.detachedFromTarget" => {
            target_id(&event.params).map(|id| TargetChange::Detached { id })
        }
        _ => None,
    }
}

/// A tab-level change reported by the tab's own session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PageChange {
    Loaded,
    Navigated { url: String },
    Crashed,
}

pub(crate) fn page_change(event: &CdpEvent) -> Option<PageChange> {
    match event.method.as_str() {
        "Page.loadEventFired" => Some(PageChange::Loaded),
        "Inspector.targetCrashed" => Some(PageChange::Crashed),
        "Page.frameNavigated" => {
            let nav: FrameNavigated = serde_json::from_value(event.params.clone()).ok()?;
            nav.frame.is_main().then_some(PageChange::Navigated { url: nav.frame.url })
        }
        _ => None,
    }
}

/// Whether a [`scripts::DOCUMENT_STATE`] snapshot shows the tab's own page
/// fully loaded. A fresh tab's initial `about:blank` also reports "complete".
pub(crate) fn loaded_document(snapshot: &Value, expected_url: &str) -> bool {
    if snapshot["state"].as_str() != Some("complete") {
        return false;
    }
    let Some(shown) = snapshot["href"].as_str().and_then(|href| Url::parse(href).ok()) else {
        return false;
    };
    if !matches!(shown.scheme(), "http" | "https") {
        return false;
    }
    match Url::parse(expected_url) {
        Ok(expected) => expected.origin() == shown.origin(),
        Err(_) => true,
    }
}

struct TabState {
    info: TabInfo,
    session: Option<Arc<PageSession>>,
    watcher: Option<JoinHandle<()>>,
}

impl TabState {
    fn new(id: TabId, url: String, status: TabStatus) -> Self {
        Self {
            info: TabInfo {
                id,
                url,
                status,
                discarded: false,
            },
            session: None,
            watcher: None,
        }
    }

    fn detach(&mut self) -> Option<Arc<PageSession>> {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.session.take()
    }

    /// The renderer crashed or the session was lost.
    fn discard(&mut self) -> Option<Arc<PageSession>> {
        self.info.discarded = true;
        self.detach()
    }

    /// A fresh session makes a discarded tab usable again.
    fn adopt(&mut self, session: Arc<PageSession>, watcher: JoinHandle<()>) {
        if let Some(old) = self.watcher.replace(watcher) {
            old.abort();
        }
        self.session = Some(session);
        self.info.discarded = false;
    }
}

pub struct CdpTabs {
    client: Arc<CdpClient>,
    host: Arc<AgentHost>,
    tabs: Mutex<HashMap<TabId, TabState>>,
    events: broadcast::Sender<TabEvent>,
    attach_lock: tokio::sync::Mutex<()>,
    pump: Mutex<Option<JoinHandle<()>>>,
    this: Weak<Self>,
}

impl CdpTabs {
    /// Seed the tab table from the browser and start following target events.
    pub async fn start(client: Arc<CdpClient>, host: Arc<AgentHost>) -> Result<Arc<Self>, CdpError> {
        let (events, _) = broadcast::channel(TAB_EVENT_BUFFER);
        let tabs = Arc::new_cyclic(|this| Self {
            client: client.clone(),
            host,
            tabs: Mutex::new(HashMap::new()),
            events,
            attach_lock: tokio::sync::Mutex::new(()),
            pump: Mutex::new(None),
            this: this.clone(),
        });

        let browser_events = client.events();
        client.discover_targets().await?;
        for target in client.get_targets().await?.into_iter().filter(TargetInfo::is_page) {
            let id = TabId::from(target.target_id);
            tabs.tabs
                .lock()
                .entry(id.clone())
                .or_insert_with(|| TabState::new(id, target.url, TabStatus::Complete));
        }
        info!("Tracking {} open tab(s)", tabs.tabs.lock().len());

        let pump = tokio::spawn(Self::follow_targets(Arc::downgrade(&tabs), browser_events));
        *tabs.pump.lock() = Some(pump);
        Ok(tabs)
    }

    async fn follow_targets(tabs: Weak<Self>, mut events: broadcast::Receiver<CdpEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Some(change) = target_change(&event) else {
                        continue;
                    };
                    let Some(tabs) = tabs.upgrade() else {
                        break;
                    };
                    tabs.apply(change);
                }
                Err(RecvError::Lagged(n)) => warn!("Target events lagged, {} dropped", n),
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Target event pump stopped");
    }

    fn apply(&self, change: TargetChange) {
        match change {
            TargetChange::Opened { id, url } => {
                self.tabs
                    .lock()
                    .entry(id.clone())
                    .or_insert_with(|| TabState::new(id, url, TabStatus::Loading));
            }
            TargetChange::Changed { id, url } => {
                if let Some(state) = self.tabs.lock().get_mut(&id) {
                    state.info.url = url;
                }
            }
            TargetChange::Destroyed { id } => {
                let removed = self.tabs.lock().remove(&id);
                if let Some(mut state) = removed {
                    if let Some(session) = state.detach() {
                        self.client.forget_session(session.session_id());
                    }
                    self.host.forget(&id);
                    debug!("Tab {} closed", id);
                    let _ = self.events.send(TabEvent::Removed { tab_id: id });
                }
            }
            TargetChange::Crashed { id } | TargetChange::Detached { id } => {
                let detached = self.tabs.lock().get_mut(&id).and_then(TabState::discard);
                if let Some(session) = detached {
                    self.client.forget_session(session.session_id());
                }
                self.host.forget(&id);
                warn!("Tab {} is no longer usable", id);
            }
        }
    }

    fn set_status(&self, id: &TabId, status: TabStatus, url: Option<String>) {
        let changed = match self.tabs.lock().get_mut(id) {
            Some(state) => {
                if let Some(url) = url {
                    state.info.url = url;
                }
                let changed = state.info.status != status;
                state.info.status = status;
                changed
            }
            None => false,
        };
        if changed {
            let _ = self.events.send(TabEvent::Updated {
                tab_id: id.clone(),
                status,
            });
        }
    }

    async fn follow_page(
        tabs: Weak<Self>,
        id: TabId,
        mut events: broadcast::Receiver<CdpEvent>,
    ) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Some(change) = page_change(&event) else {
                        continue;
                    };
                    let Some(tabs) = tabs.upgrade() else {
                        break;
                    };
                    match change {
                        PageChange::Loaded => tabs.set_status(&id, TabStatus::Complete, None),
                        PageChange::Navigated { url } => {
                            tabs.host.reset(&id);
                            tabs.set_status(&id, TabStatus::Loading, Some(url));
                        }
                        PageChange::Crashed => {
                            tabs.apply(TargetChange::Crashed { id: id.clone() });
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("Page events for {} lagged, {} dropped", id, n),
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Attach a session to a tab once, and start following its load events.
    async fn attach(&self, id: &TabId) -> Result<Arc<PageSession>, TabError> {
        let _guard = self.attach_lock.lock().await;

        match self.tabs.lock().get(id) {
            None => return Err(TabError::NotFound(id.to_string())),
            Some(state) => {
                if let Some(session) = &state.session {
                    return Ok(session.clone());
                }
            }
        }

        let session = Arc::new(
            self.client
                .attach(id.as_str())
                .await
                .map_err(|e| TabError::AccessFailed(format!("{}: {}", id, e)))?,
        );
        let watcher = tokio::spawn(Self::follow_page(
            self.this.clone(),
            id.clone(),
            session.events(),
        ));

        let stored = match self.tabs.lock().get_mut(id) {
            Some(state) => {
                state.adopt(session.clone(), watcher);
                true
            }
            None => {
                watcher.abort();
                false
            }
        };
        if !stored {
            self.client.forget_session(session.session_id());
            return Err(TabError::NotFound(id.to_string()));
        }

        // The load may have finished before the session existed.
        let expected = self.tabs.lock().get(id).map(|state| state.info.url.clone());
        match session.evaluate(scripts::DOCUMENT_STATE, None).await {
            Ok(snapshot) if loaded_document(&snapshot, expected.as_deref().unwrap_or_default()) => {
                self.set_status(id, TabStatus::Complete, None);
            }
            Ok(_) => {}
            Err(e) => debug!("readyState check on {} failed: {}", id, e),
        }
        Ok(session)
    }

}

impl Drop for CdpTabs {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        for state in self.tabs.lock().values_mut() {
            state.detach();
        }
    }
}

#[async_trait]
impl TabBrowser for CdpTabs {
    async fn create_tab(&self, url: &str) -> Result<TabId, TabError> {
        let id = TabId::from(
            self.client
                .create_target(url)
                .await
                .map_err(|e| TabError::CreateFailed(format!("{}: {}", url, e)))?,
        );
        self.tabs
            .lock()
            .entry(id.clone())
            .or_insert_with(|| TabState::new(id.clone(), url.to_string(), TabStatus::Loading));
        info!("Opened tab {} for {}", id, url);

        if let Err(e) = self.attach(&id).await {
            warn!("Could not attach to new tab {}: {}", id, e);
        }
        Ok(id)
    }

    async fn get_tab(&self, tab_id: &TabId) -> Result<Option<TabInfo>, TabError> {
        Ok(self.tabs.lock().get(tab_id).map(|s| s.info.clone()))
    }

    async fn query_tabs(&self) -> Result<Vec<TabInfo>, TabError> {
        Ok(self.tabs.lock().values().map(|s| s.info.clone()).collect())
    }

    async fn activate_tab(&self, tab_id: &TabId) -> Result<(), TabError> {
        if !self.tabs.lock().contains_key(tab_id) {
            return Err(TabError::NotFound(tab_id.to_string()));
        }
        self.client
            .activate_target(tab_id.as_str())
            .await
            .map_err(|e| TabError::AccessFailed(format!("{}: {}", tab_id, e)))
    }

    async fn deliver(&self, tab_id: &TabId, message: RuntimeMessage) -> Result<MessageAck, TabError> {
        let session = self.attach(tab_id).await?;
        self.host.deliver(tab_id, session, message).await
    }

    fn subscribe(&self) -> broadcast::Receiver<TabEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tabs_tests.rs"]
mod tests;
