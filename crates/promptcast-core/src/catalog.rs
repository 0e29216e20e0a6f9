//! Provider catalog.
//!
//! The built-in provider list plus the per-provider preferences read from
//! configuration (`[providers.<id>]`).

use serde::Serialize;
use tracing::warn;

use promptcast_config::Config;
use promptcast_protocols::{CapabilityClass, Provider};

use crate::classifier::{classify, DomainKey};

/// A provider and its user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub provider: Provider,
    pub enabled: bool,
    /// Forces auto-send on or off for this provider regardless of the request.
    pub auto_send: Option<bool>,
    /// Whether the component change-handler fill strategy may run.
    pub component_handler: bool,
}

impl CatalogEntry {
    fn builtin(provider: Provider) -> Self {
        Self {
            provider,
            enabled: true,
            auto_send: None,
            component_handler: true,
        }
    }

    pub fn domain(&self) -> DomainKey {
        DomainKey::new(self.provider.canonical_domain.clone())
    }
}

/// Ordered set of known providers.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    entries: Vec<CatalogEntry>,
}

impl ProviderCatalog {
    /// The four providers promptcast ships selectors for.
    pub fn builtin() -> Self {
        let entries = vec![
            Provider::new(
                "chatgpt",
                "ChatGPT",
                "chatgpt.com",
                "https://chatgpt.com/",
                CapabilityClass::ValueBearing,
            ),
            Provider::new(
                "grok",
                "Grok",
                "grok.com",
                "https://grok.com/",
                CapabilityClass::ValueBearing,
            ),
            Provider::new(
                "gemini",
                "Gemini",
                "gemini.google.com",
                "https://gemini.google.com/",
                CapabilityClass::PlainContentEditable,
            ),
            Provider::new(
                "claude",
                "Claude",
                "claude.ai",
                "https://claude.ai/",
                CapabilityClass::FrameworkOwnedEditable,
            ),
        ]
        .into_iter()
        .map(CatalogEntry::builtin)
        .collect();

        Self { entries }
    }

    /// Built-in catalog with `[providers.<id>]` overrides applied.
    pub fn from_config(config: &Config) -> Self {
        let mut catalog = Self::builtin();
        for (id, over) in &config.providers {
            let Some(entry) = catalog.entries.iter_mut().find(|e| e.provider.id == *id) else {
                warn!("Ignoring overrides for unknown provider '{}'", id);
                continue;
            };
            if let Some(enabled) = over.enabled {
                entry.enabled = enabled;
            }
            if let Some(ref url) = over.url {
                entry.provider.url = url.clone();
            }
            if over.auto_send.is_some() {
                entry.auto_send = over.auto_send;
            }
            if let Some(component_handler) = over.component_handler {
                entry.component_handler = component_handler;
            }
        }
        catalog
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.provider.id == id)
    }

    pub fn by_domain(&self, domain: &DomainKey) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.provider.canonical_domain == domain.as_str())
    }

    /// Enabled providers, in catalog order.
    pub fn enabled(&self) -> Vec<Provider> {
        self.entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.provider.clone())
            .collect()
    }

    /// Select providers by id. Unknown ids are reported back.
    pub fn select(&self, ids: &[String]) -> (Vec<Provider>, Vec<String>) {
        let mut selected = Vec::new();
        let mut unknown = Vec::new();
        for id in ids {
            match self.get(id) {
                Some(entry) => selected.push(entry.provider.clone()),
                None => unknown.push(id.clone()),
            }
        }
        (selected, unknown)
    }

    /// Provider for an arbitrary URL. Unknown hosts get an ad-hoc
    /// content-editable provider named after the host.
    pub fn provider_for_url(&self, url: &str) -> Provider {
        let domain = classify(url);
        if let Some(entry) = self.by_domain(&domain) {
            let mut provider = entry.provider.clone();
            provider.url = url.to_string();
            return provider;
        }
        Provider::new(
            domain.as_str(),
            domain.as_str(),
            domain.as_str(),
            url,
            CapabilityClass::PlainContentEditable,
        )
    }

    /// Auto-send for one provider: the per-provider override wins over the request.
    pub fn effective_auto_send(&self, domain: &DomainKey, requested: bool) -> bool {
        self.by_domain(domain)
            .and_then(|e| e.auto_send)
            .unwrap_or(requested)
    }

    pub fn component_handler_enabled(&self, domain: &DomainKey) -> bool {
        self.by_domain(domain)
            .map(|e| e.component_handler)
            .unwrap_or(true)
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptcast_config::ProviderOverride;

    #[test]
    fn test_builtin_order_and_domains() {
        let catalog = ProviderCatalog::builtin();
        let ids: Vec<&str> = catalog.entries().iter().map(|e| e.provider.id.as_str()).collect();
        assert_eq!(ids, vec!["chatgpt", "grok", "gemini", "claude"]);
        for entry in catalog.entries() {
            assert_eq!(classify(&entry.provider.url), entry.domain());
        }
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        config.providers.insert(
            "grok".to_string(),
            ProviderOverride {
                enabled: Some(false),
                ..Default::default()
            },
        );
        config.providers.insert(
            "chatgpt".to_string(),
            ProviderOverride {
                url: Some("https://chatgpt.com/?model=gpt-4o".to_string()),
                auto_send: Some(true),
                component_handler: Some(false),
                ..Default::default()
            },
        );
        config
            .providers
            .insert("nonexistent".to_string(), ProviderOverride::default());

        let catalog = ProviderCatalog::from_config(&config);
        let enabled: Vec<String> = catalog.enabled().into_iter().map(|p| p.id).collect();
        assert_eq!(enabled, vec!["chatgpt", "gemini", "claude"]);

        let chatgpt = catalog.get("chatgpt").unwrap();
        assert_eq!(chatgpt.provider.url, "https://chatgpt.com/?model=gpt-4o");
        assert!(!catalog.component_handler_enabled(&chatgpt.domain()));
        assert!(catalog.effective_auto_send(&chatgpt.domain(), false));
    }

    #[test]
    fn test_effective_auto_send_defaults_to_request() {
        let catalog = ProviderCatalog::builtin();
        let claude = DomainKey::new("claude.ai");
        assert!(catalog.effective_auto_send(&claude, true));
        assert!(!catalog.effective_auto_send(&claude, false));
    }

    #[test]
    fn test_select_reports_unknown() {
        let catalog = ProviderCatalog::builtin();
        let (selected, unknown) =
            catalog.select(&["claude".to_string(), "bard".to_string()]);
        assert_eq!(selected.len(), 1);
        assert_eq!(unknown, vec!["bard".to_string()]);
    }

    #[test]
    fn test_provider_for_url() {
        let catalog = ProviderCatalog::builtin();
        let known = catalog.provider_for_url("https://chat.openai.com/");
        assert_eq!(known.id, "chatgpt");
        assert_eq!(known.url, "https://chat.openai.com/");

        let adhoc = catalog.provider_for_url("https://chat.mistral.ai/chat");
        assert_eq!(adhoc.canonical_domain, "chat.mistral.ai");
        assert_eq!(adhoc.capability, CapabilityClass::PlainContentEditable);
    }
}
