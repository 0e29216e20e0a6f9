//! In-memory `TabBrowser` used by the registry and orchestrator tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use promptcast_protocols::{
    MessageAck, RuntimeMessage, TabBrowser, TabError, TabEvent, TabId, TabInfo, TabStatus,
};

pub struct FakeBrowser {
    tabs: Mutex<Vec<TabInfo>>,
    next_id: AtomicUsize,
    /// Emit a load-complete event right after creating a tab.
    complete_on_create: AtomicBool,
    pub created: Mutex<Vec<String>>,
    pub activated: Mutex<Vec<TabId>>,
    pub delivered: Mutex<Vec<(TabId, RuntimeMessage)>>,
    fail_activate: Mutex<HashSet<TabId>>,
    events: broadcast::Sender<TabEvent>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            tabs: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            complete_on_create: AtomicBool::new(true),
            created: Mutex::new(Vec::new()),
            activated: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
            fail_activate: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// Created tabs stay in `Loading` until [`finish_load`](Self::finish_load).
    pub fn hold_loads(&self) {
        self.complete_on_create.store(false, Ordering::SeqCst);
    }

    /// Add an already-open tab, as if the user opened it by hand.
    pub fn open_existing(&self, id: &str, url: &str) -> TabId {
        let tab_id = TabId::from(id);
        self.tabs.lock().push(TabInfo {
            id: tab_id.clone(),
            url: url.to_string(),
            status: TabStatus::Complete,
            discarded: false,
        });
        tab_id
    }

    pub fn discard(&self, id: &TabId) {
        if let Some(tab) = self.tabs.lock().iter_mut().find(|t| &t.id == id) {
            tab.discarded = true;
        }
    }

    pub fn close(&self, id: &TabId) {
        self.tabs.lock().retain(|t| &t.id != id);
        let _ = self.events.send(TabEvent::Removed { tab_id: id.clone() });
    }

    pub fn finish_load(&self, id: &TabId) {
        if let Some(tab) = self.tabs.lock().iter_mut().find(|t| &t.id == id) {
            tab.status = TabStatus::Complete;
        }
        let _ = self.events.send(TabEvent::Updated {
            tab_id: id.clone(),
            status: TabStatus::Complete,
        });
    }

    /// Make `activate_tab` fail for this tab, as a closed-underneath tab would.
    pub fn fail_activation(&self, id: &TabId) {
        self.fail_activate.lock().insert(id.clone());
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }

    pub fn deliveries_to(&self, id: &TabId) -> Vec<RuntimeMessage> {
        self.delivered
            .lock()
            .iter()
            .filter(|(tab, _)| tab == id)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[async_trait]
impl TabBrowser for FakeBrowser {
    async fn create_tab(&self, url: &str) -> Result<TabId, TabError> {
        let id = TabId::new(format!("tab-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.created.lock().push(url.to_string());
        self.tabs.lock().push(TabInfo {
            id: id.clone(),
            url: url.to_string(),
            status: TabStatus::Loading,
            discarded: false,
        });
        let _ = self.events.send(TabEvent::Updated {
            tab_id: id.clone(),
            status: TabStatus::Loading,
        });
        if self.complete_on_create.load(Ordering::SeqCst) {
            self.finish_load(&id);
        }
        Ok(id)
    }

    async fn get_tab(&self, tab_id: &TabId) -> Result<Option<TabInfo>, TabError> {
        Ok(self.tabs.lock().iter().find(|t| &t.id == tab_id).cloned())
    }

    async fn query_tabs(&self) -> Result<Vec<TabInfo>, TabError> {
        Ok(self.tabs.lock().clone())
    }

    async fn activate_tab(&self, tab_id: &TabId) -> Result<(), TabError> {
        self.activated.lock().push(tab_id.clone());
        if self.fail_activate.lock().contains(tab_id) {
            return Err(TabError::AccessFailed(format!("tab {} is gone", tab_id)));
        }
        Ok(())
    }

    async fn deliver(&self, tab_id: &TabId, message: RuntimeMessage) -> Result<MessageAck, TabError> {
        self.delivered.lock().push((tab_id.clone(), message));
        Ok(MessageAck::ok())
    }

    fn subscribe(&self) -> broadcast::Receiver<TabEvent> {
        self.events.subscribe()
    }
}
