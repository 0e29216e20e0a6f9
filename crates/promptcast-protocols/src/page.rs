//! Page-side traits consumed by the fill engine and submission trigger.
//!
//! A [`PageSurface`] is bound to exactly one execution context of a page:
//! either the isolated context promptcast owns, or the page's own native
//! context. Widgets and controls it hands out act in that same context.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::WidgetError;

/// Receiver of DOM-mutation notifications. Dropping it disconnects the observer.
pub type MutationFeed = mpsc::UnboundedReceiver<()>;

/// What kind of element a located widget turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    /// `<textarea>` / `<input>`: text lives in the `value` property.
    ValueControl,
    /// Content-editable region: text lives in a DOM subtree.
    Editable,
}

/// A programmatically constructed event, dispatched bubbling on a widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntheticEvent {
    Focus,
    FocusIn,
    KeyDown { key: String, code: String },
    KeyUp { key: String, code: String },
    BeforeInput { data: String },
    Input { data: Option<String> },
    Change,
    CompositionEnd { data: String },
    Paste { data: String },
}

impl SyntheticEvent {
    /// DOM event type name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::FocusIn => "focusin",
            Self::KeyDown { .. } => "keydown",
            Self::KeyUp { .. } => "keyup",
            Self::BeforeInput { .. } => "beforeinput",
            Self::Input { .. } => "input",
            Self::Change => "change",
            Self::CompositionEnd { .. } => "compositionend",
            Self::Paste { .. } => "paste",
        }
    }

    pub fn key_down(ch: char) -> Self {
        Self::KeyDown {
            key: ch.to_string(),
            code: key_code(ch),
        }
    }

    pub fn key_up(ch: char) -> Self {
        Self::KeyUp {
            key: ch.to_string(),
            code: key_code(ch),
        }
    }

    pub fn enter_down() -> Self {
        Self::KeyDown {
            key: "Enter".to_string(),
            code: "Enter".to_string(),
        }
    }

    pub fn enter_up() -> Self {
        Self::KeyUp {
            key: "Enter".to_string(),
            code: "Enter".to_string(),
        }
    }

    /// Event payload text, if the event carries one.
    pub fn data(&self) -> Option<&str> {
        match self {
            Self::BeforeInput { data }
            | Self::CompositionEnd { data }
            | Self::Paste { data } => Some(data),
            Self::Input { data } => data.as_deref(),
            _ => None,
        }
    }
}

/// Physical key code for a typed character (`KeyboardEvent.code`).
pub fn key_code(ch: char) -> String {
    if ch.is_ascii_alphabetic() {
        format!("Key{}", ch.to_ascii_uppercase())
    } else if ch.is_ascii_digit() {
        format!("Digit{}", ch)
    } else if ch == ' ' {
        "Space".to_string()
    } else if ch == '\n' {
        "Enter".to_string()
    } else {
        "Unidentified".to_string()
    }
}

/// A located text-entry element.
///
/// Every method is one page-side primitive. None of them verifies the
/// outcome; verification belongs to the fill engine.
#[async_trait]
pub trait Widget: Send + Sync {
    fn kind(&self) -> WidgetKind;

    /// Short human-readable description for logs (tag, id, classes).
    fn describe(&self) -> String;

    async fn focus(&self) -> Result<(), WidgetError>;

    /// Current `value` property (value controls only).
    async fn value(&self) -> Result<String, WidgetError>;

    /// Rendered text of the element (`innerText`, falling back to `textContent`).
    async fn rendered_text(&self) -> Result<String, WidgetError>;

    /// Write `value` through the prototype-level setter, bypassing any
    /// per-instance setter a framework installed.
    async fn write_value_via_prototype(&self, text: &str) -> Result<(), WidgetError>;

    /// Prime a change-tracking shim with `previous`. `Ok(false)` when the
    /// element carries no tracker.
    async fn prime_value_tracker(&self, previous: &str) -> Result<bool, WidgetError>;

    /// Dispatch one bubbling synthetic event. `Ok(false)` when the event
    /// constructor is not supported by the page.
    async fn dispatch(&self, event: &SyntheticEvent) -> Result<bool, WidgetError>;

    /// Walk the component-instance back-reference chain upward to the first
    /// `onChange`-shaped prop and invoke it with a synthetic event exposing
    /// `target.value`. `Ok(false)` when no handler exists.
    async fn invoke_component_change_handler(&self, text: &str) -> Result<bool, WidgetError>;

    async fn select_all(&self) -> Result<(), WidgetError>;

    /// Native text-insertion command at the current selection.
    async fn insert_text(&self, text: &str) -> Result<bool, WidgetError>;

    /// Replace the element's children with one paragraph holding `text`.
    async fn replace_with_paragraph(&self, text: &str) -> Result<(), WidgetError>;

    /// Plain text assignment to the element.
    async fn assign_text(&self, text: &str) -> Result<(), WidgetError>;

    async fn place_caret_at_end(&self) -> Result<(), WidgetError>;

    /// Resolve after the page's next animation frame.
    async fn next_frame(&self) -> Result<(), WidgetError>;

    /// First enabled button inside the widget's enclosing form.
    async fn enabled_form_button(&self) -> Result<Option<Box<dyn Control>>, WidgetError>;

    /// Dispatch a submit event on the nearest ancestor form. `Ok(false)` without one.
    async fn submit_enclosing_form(&self) -> Result<bool, WidgetError>;
}

/// A clickable send affordance.
#[async_trait]
pub trait Control: Send + Sync {
    fn describe(&self) -> String;

    async fn activate(&self) -> Result<(), WidgetError>;
}

/// One execution context of a loaded page.
#[async_trait]
pub trait PageSurface: Send + Sync {
    /// Hostname of the page's current location.
    async fn hostname(&self) -> Result<String, WidgetError>;

    /// `document.readyState`.
    async fn ready_state(&self) -> Result<String, WidgetError>;

    /// First element matching `selector` (and visibly rendered, if required).
    async fn find_widget(
        &self,
        selector: &str,
        require_visible: bool,
    ) -> Result<Option<Box<dyn Widget>>, WidgetError>;

    /// Start observing DOM mutations on the document body.
    async fn watch_mutations(&self) -> Result<MutationFeed, WidgetError>;

    /// First enabled button matching `selector`. A match inside a button
    /// (an icon, say) resolves to that button.
    async fn find_enabled_control(
        &self,
        selector: &str,
    ) -> Result<Option<Box<dyn Control>>, WidgetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_codes() {
        assert_eq!(key_code('a'), "KeyA");
        assert_eq!(key_code('7'), "Digit7");
        assert_eq!(key_code(' '), "Space");
        assert_eq!(key_code('?'), "Unidentified");
    }

    #[test]
    fn test_event_names_and_payloads() {
        let event = SyntheticEvent::BeforeInput {
            data: "hi".to_string(),
        };
        assert_eq!(event.name(), "beforeinput");
        assert_eq!(event.data(), Some("hi"));
        assert_eq!(SyntheticEvent::Change.data(), None);
        assert_eq!(SyntheticEvent::Input { data: None }.data(), None);
        assert_eq!(SyntheticEvent::enter_down().name(), "keydown");
    }
}
