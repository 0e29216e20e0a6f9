//! Tab lifecycle trait consumed by the orchestrator.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::TabError;
use crate::message::{MessageAck, RuntimeMessage};
use crate::types::{TabEvent, TabId, TabInfo};

/// The browser's tab surface, as the orchestrator sees it.
#[async_trait]
pub trait TabBrowser: Send + Sync {
    /// Open a new tab at `url`. Returns as soon as the tab exists, not when it loads.
    async fn create_tab(&self, url: &str) -> Result<TabId, TabError>;

    /// Look up one tab; `Ok(None)` when it no longer exists.
    async fn get_tab(&self, tab_id: &TabId) -> Result<Option<TabInfo>, TabError>;

    /// All open tabs.
    async fn query_tabs(&self) -> Result<Vec<TabInfo>, TabError>;

    /// Bring a tab to the foreground.
    async fn activate_tab(&self, tab_id: &TabId) -> Result<(), TabError>;

    /// Deliver a runtime message to the page agent hosted in a tab.
    async fn deliver(&self, tab_id: &TabId, message: RuntimeMessage) -> Result<MessageAck, TabError>;

    /// Subscribe to tab lifecycle notifications. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<TabEvent>;
}
