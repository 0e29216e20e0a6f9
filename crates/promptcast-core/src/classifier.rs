//! Domain classification.
//!
//! Maps an arbitrary URL to the canonical domain of a known provider, or to
//! its raw hostname when no known provider matches.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Known provider hosts and the canonical domain each maps to.
///
/// Matched by substring against the hostname, first match wins.
const KNOWN_HOSTS: &[(&str, &str)] = &[
    ("chatgpt.com", "chatgpt.com"),
    ("chat.openai.com", "chatgpt.com"),
    ("grok.com", "grok.com"),
    ("claude.ai", "claude.ai"),
    ("gemini.google.com", "gemini.google.com"),
];

/// Canonical provider identity derived from a URL.
///
/// The empty key is invalid; it never matches a registry entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainKey(String);

impl DomainKey {
    pub fn new(domain: impl Into<String>) -> Self {
        Self(domain.into())
    }

    /// The key produced for URLs without a usable host.
    pub fn invalid() -> Self {
        Self(String::new())
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            f.write_str(&self.0)
        } else {
            f.write_str("<invalid>")
        }
    }
}

/// Classify a URL. Never fails; malformed input yields [`DomainKey::invalid`].
pub fn classify(url: &str) -> DomainKey {
    match host_of(url.trim()) {
        Some(host) => canonicalize(&host),
        None => DomainKey::invalid(),
    }
}

/// Canonical key for a bare hostname.
pub fn canonicalize(host: &str) -> DomainKey {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return DomainKey::invalid();
    }
    KNOWN_HOSTS
        .iter()
        .find(|(needle, _)| host.contains(needle))
        .map(|(_, canonical)| DomainKey::new(*canonical))
        .unwrap_or(DomainKey(host))
}

fn host_of(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    let parsed = match Url::parse(input) {
        Ok(url) => url,
        // Bare "host/path" without a scheme.
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", input)).ok()?
        }
        Err(_) => return None,
    };
    parsed.host_str().map(str::to_string)
}
