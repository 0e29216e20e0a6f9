//! Tab identity and lifecycle types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque browser tab identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TabId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Load status of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// Snapshot of an open tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    pub status: TabStatus,
    /// Discarded or unloaded; such a tab must not be reused.
    pub discarded: bool,
}

impl TabInfo {
    pub fn is_live(&self) -> bool {
        !self.discarded
    }
}

/// Tab lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    Updated { tab_id: TabId, status: TabStatus },
    Removed { tab_id: TabId },
}

impl TabEvent {
    pub fn tab_id(&self) -> &TabId {
        match self {
            Self::Updated { tab_id, .. } | Self::Removed { tab_id } => tab_id,
        }
    }
}
