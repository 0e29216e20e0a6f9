//! Scriptable page, widget, control and bridge fakes.
//!
//! The value-control fake models a framework that keeps its own copy of the
//! text: a dispatched `input` event is accepted only when the change tracker
//! disagrees with the DOM value, otherwise the framework re-renders its own
//! copy over the DOM.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use promptcast_protocols::{
    BridgeError, Control, MutationFeed, PageSurface, SyntheticEvent, Widget, WidgetError,
    WidgetKind,
};

use crate::bridge::BridgeChannel;

#[derive(Debug, Default)]
pub struct WidgetState {
    pub dom: String,
    pub framework: String,
    /// `Some` when a framework tracks the value.
    pub tracker: Option<String>,
    /// Framework ignores synthetic input events and re-renders its own copy.
    pub ignores_synthetic_input: bool,
    pub has_component_handler: bool,
    pub insert_text_supported: bool,
    pub paste_supported: bool,
    pub has_form: bool,
    pub form_button: Option<FakeControl>,
    /// The control drops trailing whitespace from whatever it is given.
    pub strips_trailing_whitespace: bool,
    pub calls: Vec<&'static str>,
    pub events: Vec<SyntheticEvent>,
}

#[derive(Clone)]
pub struct FakeWidget {
    kind: WidgetKind,
    pub state: Arc<Mutex<WidgetState>>,
}

impl FakeWidget {
    /// A textarea with no framework instrumentation.
    pub fn plain_textarea() -> Self {
        Self::with_state(WidgetKind::ValueControl, WidgetState::default())
    }

    /// A textarea whose framework overrode the instance `value` setter and
    /// tracks the last value it saw.
    pub fn framework_textarea(current: &str) -> Self {
        Self::with_state(
            WidgetKind::ValueControl,
            WidgetState {
                dom: current.to_string(),
                framework: current.to_string(),
                tracker: Some(current.to_string()),
                ..Default::default()
            },
        )
    }

    pub fn editable() -> Self {
        Self::with_state(WidgetKind::Editable, WidgetState::default())
    }

    pub fn with_state(kind: WidgetKind, state: WidgetState) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn configure(self, f: impl FnOnce(&mut WidgetState)) -> Self {
        f(&mut self.state.lock());
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub fn text(&self) -> String {
        self.state.lock().dom.clone()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.state.lock().events.iter().map(|e| e.name()).collect()
    }

    fn shown(&self) -> String {
        let state = self.state.lock();
        if state.strips_trailing_whitespace {
            return state.dom.trim_end().to_string();
        }
        state.dom.clone()
    }

    fn call(&self, name: &'static str) {
        self.state.lock().calls.push(name);
    }
}

#[async_trait]
impl Widget for FakeWidget {
    fn kind(&self) -> WidgetKind {
        self.kind
    }

    fn describe(&self) -> String {
        match self.kind {
            WidgetKind::ValueControl => "textarea".to_string(),
            WidgetKind::Editable => "div[contenteditable]".to_string(),
        }
    }

    async fn focus(&self) -> Result<(), WidgetError> {
        self.call("focus");
        Ok(())
    }

    async fn value(&self) -> Result<String, WidgetError> {
        Ok(self.shown())
    }

    async fn rendered_text(&self) -> Result<String, WidgetError> {
        Ok(self.shown())
    }

    async fn write_value_via_prototype(&self, text: &str) -> Result<(), WidgetError> {
        self.call("write_value_via_prototype");
        self.state.lock().dom = text.to_string();
        Ok(())
    }

    async fn prime_value_tracker(&self, previous: &str) -> Result<bool, WidgetError> {
        self.call("prime_value_tracker");
        let mut state = self.state.lock();
        match state.tracker {
            Some(_) => {
                state.tracker = Some(previous.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn dispatch(&self, event: &SyntheticEvent) -> Result<bool, WidgetError> {
        let mut state = self.state.lock();
        state.events.push(event.clone());
        match event {
            SyntheticEvent::Input { .. } if state.tracker.is_some() => {
                let changed = state.tracker.as_deref() != Some(state.dom.as_str());
                if changed && !state.ignores_synthetic_input {
                    state.framework = state.dom.clone();
                    state.tracker = Some(state.dom.clone());
                } else {
                    state.dom = state.framework.clone();
                }
            }
            SyntheticEvent::Paste { data } => {
                if !state.paste_supported {
                    return Ok(false);
                }
                state.dom = data.clone();
                if state.tracker.is_some() {
                    state.framework = data.clone();
                    state.tracker = Some(data.clone());
                }
            }
            _ => {}
        }
        Ok(true)
    }

    async fn invoke_component_change_handler(&self, text: &str) -> Result<bool, WidgetError> {
        self.call("invoke_component_change_handler");
        let mut state = self.state.lock();
        if !state.has_component_handler {
            return Ok(false);
        }
        state.framework = text.to_string();
        state.dom = text.to_string();
        state.tracker = Some(text.to_string());
        Ok(true)
    }

    async fn select_all(&self) -> Result<(), WidgetError> {
        self.call("select_all");
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<bool, WidgetError> {
        self.call("insert_text");
        let mut state = self.state.lock();
        if !state.insert_text_supported {
            return Ok(false);
        }
        state.dom = text.to_string();
        if state.tracker.is_some() {
            state.framework = text.to_string();
            state.tracker = Some(text.to_string());
        }
        Ok(true)
    }

    async fn replace_with_paragraph(&self, text: &str) -> Result<(), WidgetError> {
        self.call("replace_with_paragraph");
        self.state.lock().dom = text.to_string();
        Ok(())
    }

    async fn assign_text(&self, text: &str) -> Result<(), WidgetError> {
        self.call("assign_text");
        self.state.lock().dom = text.to_string();
        Ok(())
    }

    async fn place_caret_at_end(&self) -> Result<(), WidgetError> {
        self.call("place_caret_at_end");
        Ok(())
    }

    async fn next_frame(&self) -> Result<(), WidgetError> {
        Ok(())
    }

    async fn enabled_form_button(&self) -> Result<Option<Box<dyn Control>>, WidgetError> {
        Ok(self
            .state
            .lock()
            .form_button
            .clone()
            .map(|b| Box::new(b) as Box<dyn Control>))
    }

    async fn submit_enclosing_form(&self) -> Result<bool, WidgetError> {
        self.call("submit_enclosing_form");
        Ok(self.state.lock().has_form)
    }
}

#[derive(Debug, Clone)]
pub struct FakeControl {
    pub label: String,
    pub clicks: Arc<Mutex<u32>>,
}

impl FakeControl {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            clicks: Arc::new(Mutex::new(0)),
        }
    }

    pub fn clicks(&self) -> u32 {
        *self.clicks.lock()
    }
}

#[async_trait]
impl Control for FakeControl {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn activate(&self) -> Result<(), WidgetError> {
        *self.clicks.lock() += 1;
        Ok(())
    }
}

/// A page holding widgets and controls keyed by selector.
#[derive(Default)]
pub struct FakePage {
    pub hostname: String,
    widgets: Mutex<Vec<(String, FakeWidget, bool)>>,
    controls: Mutex<Vec<(String, FakeControl)>>,
    observers: Mutex<Vec<mpsc::UnboundedSender<()>>>,
    pub probes: Mutex<Vec<String>>,
    pub control_probes: Mutex<Vec<String>>,
}

impl FakePage {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            ..Default::default()
        }
    }

    /// Add a widget and notify mutation observers.
    pub fn insert_widget(&self, selector: &str, widget: FakeWidget, visible: bool) {
        self.widgets
            .lock()
            .push((selector.to_string(), widget, visible));
        self.mutate();
    }

    pub fn insert_control(&self, selector: &str, control: FakeControl) {
        self.controls.lock().push((selector.to_string(), control));
    }

    pub fn mutate(&self) {
        self.observers.lock().retain(|tx| tx.send(()).is_ok());
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().iter().filter(|tx| !tx.is_closed()).count()
    }
}

#[async_trait]
impl PageSurface for FakePage {
    async fn hostname(&self) -> Result<String, WidgetError> {
        Ok(self.hostname.clone())
    }

    async fn ready_state(&self) -> Result<String, WidgetError> {
        Ok("complete".to_string())
    }

    async fn find_widget(
        &self,
        selector: &str,
        require_visible: bool,
    ) -> Result<Option<Box<dyn Widget>>, WidgetError> {
        self.probes.lock().push(selector.to_string());
        Ok(self
            .widgets
            .lock()
            .iter()
            .find(|(s, _, visible)| s == selector && (*visible || !require_visible))
            .map(|(_, w, _)| Box::new(w.clone()) as Box<dyn Widget>))
    }

    async fn watch_mutations(&self) -> Result<MutationFeed, WidgetError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.lock().push(tx);
        Ok(rx)
    }

    async fn find_enabled_control(
        &self,
        selector: &str,
    ) -> Result<Option<Box<dyn Control>>, WidgetError> {
        self.control_probes.lock().push(selector.to_string());
        Ok(self
            .controls
            .lock()
            .iter()
            .find(|(s, _)| s == selector)
            .map(|(_, c)| Box::new(c.clone()) as Box<dyn Control>))
    }
}

/// One end of a shared in-memory page-global message channel.
#[derive(Clone)]
pub struct FakeChannel {
    bus: Arc<Mutex<Vec<mpsc::UnboundedSender<serde_json::Value>>>>,
    pub posted: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self {
            bus: Arc::new(Mutex::new(Vec::new())),
            posted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Deliver a raw message to every listener, as the page itself would.
    pub fn inject(&self, value: serde_json::Value) {
        self.bus.lock().retain(|tx| tx.send(value.clone()).is_ok());
    }
}

#[async_trait]
impl BridgeChannel for FakeChannel {
    async fn post(&self, message: serde_json::Value) -> Result<(), BridgeError> {
        self.posted.lock().push(message.clone());
        self.inject(message);
        Ok(())
    }

    async fn listen(&self) -> Result<mpsc::UnboundedReceiver<serde_json::Value>, BridgeError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.bus.lock().push(tx);
        Ok(rx)
    }
}
