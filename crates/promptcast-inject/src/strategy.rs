//! Fill strategies.
//!
//! Each strategy is one technique for getting text into a widget. A strategy
//! only performs its writes; the engine checks the result afterwards.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use promptcast_config::TimingConfig;
use promptcast_protocols::{SyntheticEvent, Widget, WidgetError};

/// Timing used by strategies.
#[derive(Debug, Clone)]
pub struct FillContext {
    pub settle: Duration,
    pub paste_settle: Duration,
    pub keystroke_delay: Duration,
}

impl FillContext {
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self {
            settle: timing.settle_delay(),
            paste_settle: timing.paste_settle(),
            keystroke_delay: timing.keystroke_delay(),
        }
    }
}

impl Default for FillContext {
    fn default() -> Self {
        Self::from_timing(&TimingConfig::default())
    }
}

#[async_trait]
pub trait FillStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(
        &self,
        widget: &dyn Widget,
        text: &str,
        ctx: &FillContext,
    ) -> Result<(), WidgetError>;
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Dispatch one event; constructors the page lacks are skipped.
async fn emit(widget: &dyn Widget, event: SyntheticEvent) -> Result<(), WidgetError> {
    if !widget.dispatch(&event).await? {
        debug!("{} event not supported, skipped", event.name());
    }
    Ok(())
}

/// Write through the prototype-level `value` setter, prime the change
/// tracker with the previous value, then replay a full typing event sequence.
pub struct PrototypeSetter;

#[async_trait]
impl FillStrategy for PrototypeSetter {
    fn name(&self) -> &'static str {
        "prototype_setter"
    }

    async fn apply(
        &self,
        widget: &dyn Widget,
        text: &str,
        ctx: &FillContext,
    ) -> Result<(), WidgetError> {
        widget.focus().await?;
        pause(ctx.settle).await;

        let previous = widget.value().await?;
        widget.write_value_via_prototype(text).await?;
        if widget.prime_value_tracker(&previous).await? {
            debug!("Primed value tracker on {}", widget.describe());
        }

        let key = text.chars().last().unwrap_or('a');
        let data = text.to_string();
        for event in [
            SyntheticEvent::Focus,
            SyntheticEvent::FocusIn,
            SyntheticEvent::key_down(key),
            SyntheticEvent::BeforeInput { data: data.clone() },
            SyntheticEvent::Input {
                data: Some(data.clone()),
            },
            SyntheticEvent::key_up(key),
            SyntheticEvent::Change,
            SyntheticEvent::CompositionEnd { data },
        ] {
            emit(widget, event).await?;
        }
        Ok(())
    }
}

/// Call the framework's own change handler, found by walking the component
/// back-references upward from the element.
pub struct ComponentChangeHandler;

#[async_trait]
impl FillStrategy for ComponentChangeHandler {
    fn name(&self) -> &'static str {
        "component_change_handler"
    }

    async fn apply(
        &self,
        widget: &dyn Widget,
        text: &str,
        _ctx: &FillContext,
    ) -> Result<(), WidgetError> {
        if !widget.invoke_component_change_handler(text).await? {
            return Err(WidgetError::Unsupported("component change handler"));
        }
        widget.write_value_via_prototype(text).await
    }
}

/// Focus, select everything, then the browser's native insert-text command.
pub struct InsertTextCommand {
    /// Follow the command with an `input` event (content-editable regions).
    pub notify: bool,
}

#[async_trait]
impl FillStrategy for InsertTextCommand {
    fn name(&self) -> &'static str {
        "insert_text_command"
    }

    async fn apply(
        &self,
        widget: &dyn Widget,
        text: &str,
        ctx: &FillContext,
    ) -> Result<(), WidgetError> {
        widget.focus().await?;
        pause(ctx.settle).await;
        widget.select_all().await?;
        if !widget.insert_text(text).await? {
            return Err(WidgetError::Unsupported("insertText command"));
        }
        if self.notify {
            emit(
                widget,
                SyntheticEvent::Input {
                    data: Some(text.to_string()),
                },
            )
            .await?;
        }
        Ok(())
    }
}

/// Synthetic clipboard paste carrying the text as `text/plain`.
pub struct ClipboardPaste;

#[async_trait]
impl FillStrategy for ClipboardPaste {
    fn name(&self) -> &'static str {
        "clipboard_paste"
    }

    async fn apply(
        &self,
        widget: &dyn Widget,
        text: &str,
        ctx: &FillContext,
    ) -> Result<(), WidgetError> {
        widget.focus().await?;
        pause(ctx.settle).await;
        let event = SyntheticEvent::Paste {
            data: text.to_string(),
        };
        if !widget.dispatch(&event).await? {
            return Err(WidgetError::Unsupported("ClipboardEvent"));
        }
        pause(ctx.paste_settle).await;
        Ok(())
    }
}

/// One keydown, beforeinput, input, keyup group per character.
pub struct Keystrokes;

#[async_trait]
impl FillStrategy for Keystrokes {
    fn name(&self) -> &'static str {
        "keystrokes"
    }

    async fn apply(
        &self,
        widget: &dyn Widget,
        text: &str,
        ctx: &FillContext,
    ) -> Result<(), WidgetError> {
        widget.focus().await?;
        pause(ctx.settle).await;
        for ch in text.chars() {
            let data = ch.to_string();
            emit(widget, SyntheticEvent::key_down(ch)).await?;
            emit(widget, SyntheticEvent::BeforeInput { data: data.clone() }).await?;
            emit(widget, SyntheticEvent::Input { data: Some(data) }).await?;
            emit(widget, SyntheticEvent::key_up(ch)).await?;
            pause(ctx.keystroke_delay).await;
        }
        Ok(())
    }
}

/// Replace the region's children with one paragraph holding the text.
pub struct ParagraphReplace;

#[async_trait]
impl FillStrategy for ParagraphReplace {
    fn name(&self) -> &'static str {
        "paragraph_replace"
    }

    async fn apply(
        &self,
        widget: &dyn Widget,
        text: &str,
        _ctx: &FillContext,
    ) -> Result<(), WidgetError> {
        widget.replace_with_paragraph(text).await?;
        emit(
            widget,
            SyntheticEvent::Input {
                data: Some(text.to_string()),
            },
        )
        .await
    }
}

/// Plain text assignment. Last resort.
pub struct TextAssignment;

#[async_trait]
impl FillStrategy for TextAssignment {
    fn name(&self) -> &'static str {
        "text_assignment"
    }

    async fn apply(
        &self,
        widget: &dyn Widget,
        text: &str,
        _ctx: &FillContext,
    ) -> Result<(), WidgetError> {
        widget.assign_text(text).await?;
        emit(widget, SyntheticEvent::Input { data: None }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeWidget;

    fn ctx() -> FillContext {
        FillContext {
            settle: Duration::ZERO,
            paste_settle: Duration::ZERO,
            keystroke_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_prototype_setter_event_order() {
        let widget = FakeWidget::plain_textarea();
        PrototypeSetter.apply(&widget, "hi", &ctx()).await.unwrap();

        assert_eq!(widget.text(), "hi");
        assert_eq!(
            widget.event_names(),
            vec![
                "focus",
                "focusin",
                "keydown",
                "beforeinput",
                "input",
                "keyup",
                "change",
                "compositionend"
            ]
        );
        let state = widget.state.lock();
        assert_eq!(state.events[3].data(), Some("hi"));
    }

    #[tokio::test]
    async fn test_component_handler_missing_is_unsupported() {
        let widget = FakeWidget::plain_textarea();
        let result = ComponentChangeHandler.apply(&widget, "hi", &ctx()).await;
        assert!(matches!(result, Err(WidgetError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_insert_text_unsupported() {
        let widget = FakeWidget::editable();
        let result = InsertTextCommand { notify: true }
            .apply(&widget, "hi", &ctx())
            .await;
        assert!(result.is_err());
        assert_eq!(widget.calls(), vec!["focus", "select_all", "insert_text"]);
    }

    #[tokio::test]
    async fn test_keystrokes_emit_four_events_per_char() {
        let widget = FakeWidget::plain_textarea();
        Keystrokes.apply(&widget, "ab", &ctx()).await.unwrap();
        assert_eq!(widget.event_names().len(), 8);
        let state = widget.state.lock();
        assert_eq!(
            state.events[0],
            SyntheticEvent::KeyDown {
                key: "a".to_string(),
                code: "KeyA".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_paragraph_replace_writes_and_notifies() {
        let widget = FakeWidget::editable();
        ParagraphReplace.apply(&widget, "hello", &ctx()).await.unwrap();
        assert_eq!(widget.text(), "hello");
        assert_eq!(widget.event_names(), vec!["input"]);
    }
}
