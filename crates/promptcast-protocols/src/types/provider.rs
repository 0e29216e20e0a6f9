//! Provider definitions.

use serde::{Deserialize, Serialize};

/// How a provider's text-entry widget takes text, which selects the fill cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityClass {
    /// A value-typed control (textarea/input) that a framework may instrument.
    ValueBearing,
    /// A content-editable region with no framework interception assumed.
    PlainContentEditable,
    /// A content-editable region owned by an editor framework; hidden
    /// duplicates may coexist with the live editor.
    FrameworkOwnedEditable,
}

impl CapabilityClass {
    /// Whether discovery must reject elements that are not visibly rendered.
    pub fn requires_visible(&self) -> bool {
        matches!(self, Self::FrameworkOwnedEditable)
    }
}

impl std::fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ValueBearing => "value_bearing",
            Self::PlainContentEditable => "plain_content_editable",
            Self::FrameworkOwnedEditable => "framework_owned_editable",
        };
        f.write_str(name)
    }
}

/// One target conversational web application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub canonical_domain: String,
    pub url: String,
    pub capability: CapabilityClass,
}

impl Provider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        canonical_domain: impl Into<String>,
        url: impl Into<String>,
        capability: CapabilityClass,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            canonical_domain: canonical_domain.into(),
            url: url.into(),
            capability,
        }
    }
}
