//! Tab registry.
//!
//! Process-wide map from canonical provider domain to the tab currently
//! representing it. At most one entry per domain. The lock is never held
//! across an `.await`; browser lookups happen between two short critical
//! sections, and eviction only removes the exact entry that was checked.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use promptcast_protocols::{TabBrowser, TabId};

use crate::classifier::{classify, DomainKey};

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabRecord {
    pub provider_domain: DomainKey,
    pub tab_id: TabId,
}

/// Domain → tab map with named transitions.
#[derive(Default)]
pub struct TabRegistry {
    entries: Mutex<HashMap<DomainKey, TabId>>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached tab for a domain, without checking that it still exists.
    pub fn lookup(&self, domain: &DomainKey) -> Option<TabId> {
        self.entries.lock().get(domain).cloned()
    }

    /// Upsert the tab for a domain. Invalid domains are ignored.
    pub fn record(&self, domain: DomainKey, tab_id: TabId) {
        if !domain.is_valid() {
            debug!("Ignoring record for invalid domain (tab {})", tab_id);
            return;
        }
        debug!("Recording {} -> tab {}", domain, tab_id);
        self.entries.lock().insert(domain, tab_id);
    }

    /// Purge every entry pointing at `tab_id`. Returns how many were removed.
    pub fn remove(&self, tab_id: &TabId) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, id| id != tab_id);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Removed {} registry entr(y/ies) for tab {}", removed, tab_id);
        }
        removed
    }

    /// Cached tab for `domain`, only if the browser still has it and it is
    /// not discarded. A stale entry is evicted.
    pub async fn resolve(&self, domain: &DomainKey, browser: &dyn TabBrowser) -> Option<TabId> {
        if !domain.is_valid() {
            return None;
        }
        let cached = self.lookup(domain)?;

        match browser.get_tab(&cached).await {
            Ok(Some(info)) if info.is_live() => Some(cached),
            Ok(Some(_)) => {
                debug!("Cached tab {} for {} is discarded, evicting", cached, domain);
                self.evict(domain, &cached);
                None
            }
            Ok(None) => {
                debug!("Cached tab {} for {} no longer exists, evicting", cached, domain);
                self.evict(domain, &cached);
                None
            }
            Err(e) => {
                debug!("Lookup of cached tab {} failed: {}, evicting", cached, e);
                self.evict(domain, &cached);
                None
            }
        }
    }

    /// Scan every open tab for one whose URL classifies to `domain`; cache
    /// and return the first live match.
    ///
    /// Only meaningful after [`resolve`](Self::resolve) missed.
    pub async fn observe_all(
        &self,
        domain: &DomainKey,
        browser: &dyn TabBrowser,
    ) -> Option<TabId> {
        if !domain.is_valid() {
            return None;
        }
        let tabs = match browser.query_tabs().await {
            Ok(tabs) => tabs,
            Err(e) => {
                debug!("Tab scan failed: {}", e);
                return None;
            }
        };

        let found = tabs
            .into_iter()
            .find(|tab| tab.is_live() && classify(&tab.url) == *domain)?;
        debug!("Adopting open tab {} for {}", found.id, domain);
        self.record(domain.clone(), found.id.clone());
        Some(found.id)
    }

    /// All entries, ordered by domain.
    pub fn snapshot(&self) -> Vec<TabRecord> {
        let mut records: Vec<TabRecord> = self
            .entries
            .lock()
            .iter()
            .map(|(domain, tab_id)| TabRecord {
                provider_domain: domain.clone(),
                tab_id: tab_id.clone(),
            })
            .collect();
        records.sort_by(|a, b| a.provider_domain.cmp(&b.provider_domain));
        records
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove `domain` only if it still points at `tab_id`.
    fn evict(&self, domain: &DomainKey, tab_id: &TabId) {
        let mut entries = self.entries.lock();
        if entries.get(domain) == Some(tab_id) {
            entries.remove(domain);
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
