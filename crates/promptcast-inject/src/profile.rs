//! Per-provider page profiles: where the input lives, where the send button
//! lives, and which execution context must do the work.

use serde::Serialize;

use promptcast_core::classifier::canonicalize;
use promptcast_core::ProviderCatalog;
use promptcast_protocols::CapabilityClass;

/// Which script context performs the fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// promptcast's own isolated context.
    Isolated,
    /// The page's native context, reached through the bridge.
    Native,
}

/// Selector set and behavior flags for one provider's page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderProfile {
    /// Canonical domain this profile applies to. Empty for the generic profile.
    pub domain: String,
    pub capability: CapabilityClass,
    /// Input selectors, tried in order.
    pub input_selectors: Vec<String>,
    /// Provider-specific send selectors, tried before the generic heuristics.
    pub send_selectors: Vec<String>,
    pub context: ExecutionContext,
    pub require_visible: bool,
    pub component_handler: bool,
}

impl ProviderProfile {
    fn new(domain: &str, capability: CapabilityClass, inputs: &[&str], sends: &[&str]) -> Self {
        Self {
            domain: domain.to_string(),
            capability,
            input_selectors: inputs.iter().map(|s| s.to_string()).collect(),
            send_selectors: sends.iter().map(|s| s.to_string()).collect(),
            context: ExecutionContext::Isolated,
            require_visible: false,
            component_handler: true,
        }
    }

    fn native(mut self) -> Self {
        self.context = ExecutionContext::Native;
        self
    }

    fn visible_only(mut self) -> Self {
        self.require_visible = true;
        self
    }

    /// Whether discovery must skip elements that are not visibly rendered.
    pub fn requires_visible(&self) -> bool {
        self.require_visible || self.capability.requires_visible()
    }

    /// Profile for pages of unknown providers.
    pub fn generic() -> Self {
        Self::new(
            "",
            CapabilityClass::PlainContentEditable,
            &[
                "textarea",
                "[contenteditable=\"true\"]",
                "[role=\"textbox\"]",
            ],
            &[],
        )
        .visible_only()
    }
}

/// Lookup of profiles by page hostname.
#[derive(Debug, Clone)]
pub struct ProfileBook {
    profiles: Vec<ProviderProfile>,
    generic: ProviderProfile,
}

impl ProfileBook {
    pub fn builtin() -> Self {
        let profiles = vec![
            ProviderProfile::new(
                "chatgpt.com",
                CapabilityClass::ValueBearing,
                &[
                    "div[id='prompt-textarea']",
                    "div[data-testid='text-input-area'] textarea",
                ],
                &["button[data-testid='send-button']"],
            ),
            ProviderProfile::new(
                "grok.com",
                CapabilityClass::ValueBearing,
                &[
                    "textarea",
                    "div[contenteditable=\"true\"]",
                    "[contenteditable=\"true\"]",
                    "div[role=\"textbox\"]",
                    "[role=\"textbox\"]",
                    "div.ProseMirror",
                    "div[data-placeholder]",
                ],
                &[
                    "button[type=\"submit\"]",
                    "button[aria-label*=\"send\" i]",
                    "button[aria-label*=\"submit\" i]",
                    "button svg[class*=\"send\" i]",
                    "form button",
                    "button[class*=\"send\" i]",
                    "div[class*=\"input\"] button",
                ],
            )
            .native()
            .visible_only(),
            ProviderProfile::new(
                "gemini.google.com",
                CapabilityClass::PlainContentEditable,
                &["div.ql-editor[contenteditable='true']"],
                &["button.send-button"],
            ),
            ProviderProfile::new(
                "claude.ai",
                CapabilityClass::FrameworkOwnedEditable,
                &["div.ProseMirror[contenteditable='true']"],
                &["button[type='button'][aria-label='Send Message']"],
            ),
        ];

        Self {
            profiles,
            generic: ProviderProfile::generic(),
        }
    }

    /// Built-in profiles with the catalog's component-handler preferences applied.
    pub fn from_catalog(catalog: &ProviderCatalog) -> Self {
        let mut book = Self::builtin();
        for profile in &mut book.profiles {
            let domain = canonicalize(&profile.domain);
            profile.component_handler = catalog.component_handler_enabled(&domain);
        }
        book
    }

    /// Profile for a page hostname; unknown hosts get the generic profile.
    pub fn for_host(&self, hostname: &str) -> &ProviderProfile {
        let domain = canonicalize(hostname);
        self.profiles
            .iter()
            .find(|p| p.domain == domain.as_str())
            .unwrap_or(&self.generic)
    }
}

impl Default for ProfileBook {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptcast_config::{Config, ProviderOverride};

    #[test]
    fn test_for_host_canonicalizes() {
        let book = ProfileBook::builtin();
        assert_eq!(book.for_host("chat.openai.com").domain, "chatgpt.com");
        assert_eq!(book.for_host("www.claude.ai").domain, "claude.ai");
    }

    #[test]
    fn test_unknown_host_gets_generic_profile() {
        let book = ProfileBook::builtin();
        let profile = book.for_host("chat.example.org");
        assert!(profile.domain.is_empty());
        assert!(profile.requires_visible());
    }

    #[test]
    fn test_grok_runs_in_native_context() {
        let book = ProfileBook::builtin();
        let grok = book.for_host("grok.com");
        assert_eq!(grok.context, ExecutionContext::Native);
        assert!(grok.requires_visible());
        assert_eq!(grok.input_selectors[0], "textarea");
    }

    #[test]
    fn test_claude_requires_visible_through_capability() {
        let book = ProfileBook::builtin();
        let claude = book.for_host("claude.ai");
        assert!(!claude.require_visible);
        assert!(claude.requires_visible());
    }

    #[test]
    fn test_component_handler_preference_from_catalog() {
        let mut config = Config::default();
        config.providers.insert(
            "grok".to_string(),
            ProviderOverride {
                component_handler: Some(false),
                ..Default::default()
            },
        );
        let book = ProfileBook::from_catalog(&ProviderCatalog::from_config(&config));
        assert!(!book.for_host("grok.com").component_handler);
        assert!(book.for_host("chatgpt.com").component_handler);
    }
}
