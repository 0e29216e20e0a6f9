//! The resilient fill engine.
//!
//! Runs an ordered cascade of [`FillStrategy`]s against a widget and stops at
//! the first one after which the widget displays exactly the prompt. The
//! cascade is chosen by what the discovered element actually is: a
//! value-bearing provider whose page now renders a content-editable region
//! gets the content-editable cascade.

use serde::Serialize;
use tracing::{debug, warn};

use promptcast_protocols::{Widget, WidgetKind};

use crate::strategy::{
    ClipboardPaste, ComponentChangeHandler, FillContext, FillStrategy, InsertTextCommand,
    Keystrokes, ParagraphReplace, PrototypeSetter, TextAssignment,
};

/// Result of one fill. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FillOutcome {
    pub filled: bool,
    /// Name of the strategy that verified, if any.
    pub strategy: Option<&'static str>,
}

impl FillOutcome {
    fn verified(strategy: &'static str) -> Self {
        Self {
            filled: true,
            strategy: Some(strategy),
        }
    }

    fn exhausted() -> Self {
        Self {
            filled: false,
            strategy: None,
        }
    }
}

pub struct FillEngine {
    ctx: FillContext,
    value_cascade: Vec<Box<dyn FillStrategy>>,
    editable_cascade: Vec<Box<dyn FillStrategy>>,
}

impl FillEngine {
    pub fn new(ctx: FillContext) -> Self {
        Self {
            ctx,
            value_cascade: vec![
                Box::new(PrototypeSetter),
                Box::new(ComponentChangeHandler),
                Box::new(InsertTextCommand { notify: false }),
                Box::new(ClipboardPaste),
                Box::new(Keystrokes),
            ],
            editable_cascade: vec![
                Box::new(InsertTextCommand { notify: true }),
                Box::new(ClipboardPaste),
                Box::new(ParagraphReplace),
                Box::new(TextAssignment),
            ],
        }
    }

    /// Drop the component change-handler walk from the value cascade.
    pub fn without_component_handler(mut self) -> Self {
        self.value_cascade
            .retain(|s| s.name() != ComponentChangeHandler.name());
        self
    }

    /// Strategy names, in order, for a widget kind.
    pub fn cascade(&self, kind: WidgetKind) -> Vec<&'static str> {
        self.strategies(kind).iter().map(|s| s.name()).collect()
    }

    fn strategies(&self, kind: WidgetKind) -> &[Box<dyn FillStrategy>] {
        match kind {
            WidgetKind::ValueControl => &self.value_cascade,
            WidgetKind::Editable => &self.editable_cascade,
        }
    }

    pub async fn fill(&self, widget: &dyn Widget, text: &str) -> FillOutcome {
        let kind = widget.kind();
        for strategy in self.strategies(kind) {
            match strategy.apply(widget, text, &self.ctx).await {
                Ok(()) => {
                    if self.displays(widget, text).await {
                        debug!("{} filled {}", strategy.name(), widget.describe());
                        if kind == WidgetKind::ValueControl {
                            if let Err(e) = widget.place_caret_at_end().await {
                                debug!("Could not move caret: {}", e);
                            }
                        }
                        return FillOutcome::verified(strategy.name());
                    }
                    debug!("{} did not take on {}", strategy.name(), widget.describe());
                }
                Err(e) => debug!("{} failed on {}: {}", strategy.name(), widget.describe(), e),
            }
        }

        warn!("Every fill strategy failed on {}", widget.describe());
        FillOutcome::exhausted()
    }

    /// Post-condition: the widget displays exactly `text`. Rendered text of
    /// an editable region may differ only in surrounding whitespace.
    async fn displays(&self, widget: &dyn Widget, text: &str) -> bool {
        let shown = match widget.kind() {
            WidgetKind::ValueControl => widget.value().await,
            WidgetKind::Editable => widget.rendered_text().await,
        };
        match (widget.kind(), shown) {
            (WidgetKind::ValueControl, Ok(shown)) => shown == text,
            (WidgetKind::Editable, Ok(shown)) => shown == text || shown.trim() == text.trim(),
            (_, Err(e)) => {
                debug!("Could not read back {}: {}", widget.describe(), e);
                false
            }
        }
    }
}

impl Default for FillEngine {
    fn default() -> Self {
        Self::new(FillContext::default())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
