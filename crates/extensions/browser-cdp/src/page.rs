//! [`PageSurface`], [`Widget`] and [`Control`] over a CDP session.
//!
//! A [`PageContext`] is one execution context of a tab: promptcast's isolated
//! world or the page's main world. Element handles obtained in a context act
//! in that context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use promptcast_protocols::{
    Control, MutationFeed, PageSurface, SyntheticEvent, Widget, WidgetError, WidgetKind,
};

use crate::cdp::{BindingCalled, CdpError, PageSession, RemoteObject};
use crate::scripts::{self, invoke};

/// Which script environment a context runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum World {
    /// promptcast's own isolated world.
    Isolated,
    /// The page's own scripts' world.
    Main,
}

impl World {
    fn suffix(self) -> &'static str {
        match self {
            World::Isolated => "isolated",
            World::Main => "main",
        }
    }
}

/// Evaluates in one world of a tab, recreating the isolated world after the
/// page navigates.
#[derive(Clone)]
pub(crate) struct Evaluator {
    session: Arc<PageSession>,
    world: World,
    context_id: Arc<tokio::sync::Mutex<Option<i64>>>,
}

impl Evaluator {
    fn new(session: Arc<PageSession>, world: World) -> Self {
        Self {
            session,
            world,
            context_id: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    async fn context(&self) -> Result<Option<i64>, CdpError> {
        if self.world == World::Main {
            return Ok(None);
        }
        let mut cached = self.context_id.lock().await;
        if let Some(id) = *cached {
            return Ok(Some(id));
        }
        let id = self
            .session
            .create_isolated_world(scripts::WORLD_NAME)
            .await?;
        debug!("Created isolated world {} in {}", id, self.session.target_id());
        *cached = Some(id);
        Ok(Some(id))
    }

    async fn invalidate(&self) {
        *self.context_id.lock().await = None;
    }

    pub(crate) async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let context = self.context().await?;
        match self.session.evaluate(expression, context).await {
            Err(e) if e.is_stale_context() && self.world == World::Isolated => {
                self.invalidate().await;
                let context = self.context().await?;
                self.session.evaluate(expression, context).await
            }
            other => other,
        }
    }

    pub(crate) async fn evaluate_handle(&self, expression: &str) -> Result<RemoteObject, CdpError> {
        let context = self.context().await?;
        match self.session.evaluate_handle(expression, context).await {
            Err(e) if e.is_stale_context() && self.world == World::Isolated => {
                self.invalidate().await;
                let context = self.context().await?;
                self.session.evaluate_handle(expression, context).await
            }
            other => other,
        }
    }

    /// Per-world binding name, so main-world and isolated-world listeners
    /// never see each other's calls.
    pub(crate) fn binding_name(&self, base: &str) -> String {
        format!("{}_{}", base, self.world.suffix())
    }

    pub(crate) async fn bind(
        &self,
        base: &str,
    ) -> Result<mpsc::UnboundedReceiver<BindingCalled>, CdpError> {
        let world_name = match self.world {
            World::Isolated => Some(scripts::WORLD_NAME),
            World::Main => None,
        };
        self.session.bind(&self.binding_name(base), world_name).await
    }
}

type Observers = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<()>>>>;

/// One execution context of a tab.
pub struct PageContext {
    evaluator: Evaluator,
    observers: Observers,
    next_token: AtomicU64,
    mutation_pump: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl PageContext {
    pub fn new(session: Arc<PageSession>, world: World) -> Arc<Self> {
        Arc::new(Self {
            evaluator: Evaluator::new(session, world),
            observers: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(1),
            mutation_pump: tokio::sync::Mutex::new(None),
        })
    }

    pub fn world(&self) -> World {
        self.evaluator.world
    }

    pub(crate) fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    fn session(&self) -> &Arc<PageSession> {
        &self.evaluator.session
    }

    /// Route mutation binding calls to observers; disconnect observers whose
    /// feed was dropped.
    async fn ensure_mutation_pump(&self) -> Result<(), CdpError> {
        let mut pump = self.mutation_pump.lock().await;
        if pump.is_some() {
            return Ok(());
        }
        let mut calls = self.evaluator.bind(scripts::MUTATION_BINDING).await?;
        let observers = self.observers.clone();
        let evaluator = self.evaluator.clone();
        *pump = Some(tokio::spawn(async move {
            while let Some(called) = calls.recv().await {
                let Ok(token) = called.payload.parse::<u64>() else {
                    continue;
                };
                let delivered = observers
                    .lock()
                    .get(&token)
                    .map(|tx| tx.send(()).is_ok());
                if delivered == Some(false) {
                    observers.lock().remove(&token);
                    let script = invoke(scripts::UNWATCH_MUTATIONS, &[json!(token)]);
                    if let Err(e) = evaluator.evaluate(&script).await {
                        trace!("Observer {} disconnect failed: {}", token, e);
                    }
                }
            }
        }));
        Ok(())
    }

    async fn describe(&self, object_id: &str) -> Result<Description, CdpError> {
        let raw = self
            .session()
            .call_function_on(object_id, scripts::DESCRIBE, vec![])
            .await?;
        Ok(serde_json::from_value(raw)?)
    }
}

impl Drop for PageContext {
    fn drop(&mut self) {
        if let Some(pump) = self.mutation_pump.get_mut().take() {
            pump.abort();
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Description {
    value_control: bool,
    label: String,
}

/// [`PageSurface`] bound to one [`PageContext`].
#[derive(Clone)]
pub struct CdpPage {
    ctx: Arc<PageContext>,
}

impl CdpPage {
    pub fn new(ctx: Arc<PageContext>) -> Self {
        Self { ctx }
    }

    async fn string(&self, expression: &str) -> Result<String, WidgetError> {
        let value = self.ctx.evaluator.evaluate(expression).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl PageSurface for CdpPage {
    async fn hostname(&self) -> Result<String, WidgetError> {
        self.string(scripts::HOSTNAME).await
    }

    async fn ready_state(&self) -> Result<String, WidgetError> {
        self.string(scripts::READY_STATE).await
    }

    async fn find_widget(
        &self,
        selector: &str,
        require_visible: bool,
    ) -> Result<Option<Box<dyn Widget>>, WidgetError> {
        let script = invoke(scripts::FIND_ELEMENT, &[json!(selector), json!(require_visible)]);
        let found = self.ctx.evaluator.evaluate_handle(&script).await?;
        let Some(object_id) = found.handle() else {
            return Ok(None);
        };
        let description = self.ctx.describe(object_id).await?;
        let kind = if description.value_control {
            WidgetKind::ValueControl
        } else {
            WidgetKind::Editable
        };
        Ok(Some(Box::new(CdpWidget {
            session: self.ctx.session().clone(),
            object_id: object_id.to_string(),
            kind,
            label: description.label,
        })))
    }

    async fn watch_mutations(&self) -> Result<MutationFeed, WidgetError> {
        self.ctx.ensure_mutation_pump().await?;
        let token = self.ctx.next_token.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.ctx.observers.lock().insert(token, tx);

        let binding = self.ctx.evaluator.binding_name(scripts::MUTATION_BINDING);
        let script = invoke(scripts::WATCH_MUTATIONS, &[json!(binding), json!(token)]);
        if let Err(e) = self.ctx.evaluator.evaluate(&script).await {
            self.ctx.observers.lock().remove(&token);
            return Err(e.into());
        }
        Ok(rx)
    }

    async fn find_enabled_control(
        &self,
        selector: &str,
    ) -> Result<Option<Box<dyn Control>>, WidgetError> {
        let script = invoke(scripts::FIND_ENABLED_CONTROL, &[json!(selector)]);
        let found = self.ctx.evaluator.evaluate_handle(&script).await?;
        let Some(object_id) = found.handle() else {
            return Ok(None);
        };
        let label = match self.ctx.describe(object_id).await {
            Ok(description) => description.label,
            Err(_) => selector.to_string(),
        };
        Ok(Some(Box::new(CdpControl {
            session: self.ctx.session().clone(),
            object_id: object_id.to_string(),
            label,
        })))
    }
}

/// Release a remote handle without blocking the dropping task.
fn release_later(session: &Arc<PageSession>, object_id: &str) {
    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        let session = session.clone();
        let object_id = object_id.to_string();
        runtime.spawn(async move {
            if let Err(e) = session.release_object(&object_id).await {
                trace!("Releasing {} failed: {}", object_id, e);
            }
        });
    }
}

/// Payload shape understood by the page-side dispatch script.
pub(crate) fn event_init(event: &SyntheticEvent) -> Value {
    let family = match event {
        SyntheticEvent::Focus | SyntheticEvent::FocusIn => "focus",
        SyntheticEvent::KeyDown { .. } | SyntheticEvent::KeyUp { .. } => "keyboard",
        SyntheticEvent::BeforeInput { .. } | SyntheticEvent::Input { .. } => "input",
        SyntheticEvent::CompositionEnd { .. } => "composition",
        SyntheticEvent::Paste { .. } => "clipboard",
        SyntheticEvent::Change => "plain",
    };
    let mut init = json!({"family": family, "type": event.name()});
    match event {
        SyntheticEvent::KeyDown { key, code } | SyntheticEvent::KeyUp { key, code } => {
            init["key"] = json!(key);
            init["code"] = json!(code);
        }
        _ => {
            init["data"] = json!(event.data());
        }
    }
    init
}

pub struct CdpWidget {
    session: Arc<PageSession>,
    object_id: String,
    kind: WidgetKind,
    label: String,
}

impl CdpWidget {
    async fn call(&self, function: &str, args: Vec<Value>) -> Result<Value, WidgetError> {
        Ok(self
            .session
            .call_function_on(&self.object_id, function, args)
            .await?)
    }

    async fn call_bool(&self, function: &str, args: Vec<Value>) -> Result<bool, WidgetError> {
        Ok(self.call(function, args).await?.as_bool().unwrap_or(false))
    }

    async fn call_string(&self, function: &str) -> Result<String, WidgetError> {
        Ok(self
            .call(function, vec![])
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

impl Drop for CdpWidget {
    fn drop(&mut self) {
        release_later(&self.session, &self.object_id);
    }
}

#[async_trait]
impl Widget for CdpWidget {
    fn kind(&self) -> WidgetKind {
        self.kind
    }

    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn focus(&self) -> Result<(), WidgetError> {
        self.call(scripts::FOCUS, vec![]).await.map(|_| ())
    }

    async fn value(&self) -> Result<String, WidgetError> {
        self.call_string(scripts::VALUE).await
    }

    async fn rendered_text(&self) -> Result<String, WidgetError> {
        self.call_string(scripts::RENDERED_TEXT).await
    }

    async fn write_value_via_prototype(&self, text: &str) -> Result<(), WidgetError> {
        self.call(scripts::WRITE_VALUE_VIA_PROTOTYPE, vec![json!(text)])
            .await
            .map(|_| ())
    }

    async fn prime_value_tracker(&self, previous: &str) -> Result<bool, WidgetError> {
        self.call_bool(scripts::PRIME_VALUE_TRACKER, vec![json!(previous)])
            .await
    }

    async fn dispatch(&self, event: &SyntheticEvent) -> Result<bool, WidgetError> {
        self.call_bool(scripts::DISPATCH, vec![event_init(event)])
            .await
    }

    async fn invoke_component_change_handler(&self, text: &str) -> Result<bool, WidgetError> {
        self.call_bool(scripts::INVOKE_COMPONENT_CHANGE_HANDLER, vec![json!(text)])
            .await
    }

    async fn select_all(&self) -> Result<(), WidgetError> {
        self.call(scripts::SELECT_ALL, vec![]).await.map(|_| ())
    }

    async fn insert_text(&self, text: &str) -> Result<bool, WidgetError> {
        self.call_bool(scripts::INSERT_TEXT, vec![json!(text)]).await
    }

    async fn replace_with_paragraph(&self, text: &str) -> Result<(), WidgetError> {
        self.call(scripts::REPLACE_WITH_PARAGRAPH, vec![json!(text)])
            .await
            .map(|_| ())
    }

    async fn assign_text(&self, text: &str) -> Result<(), WidgetError> {
        self.call(scripts::ASSIGN_TEXT, vec![json!(text)])
            .await
            .map(|_| ())
    }

    async fn place_caret_at_end(&self) -> Result<(), WidgetError> {
        self.call(scripts::PLACE_CARET_AT_END, vec![])
            .await
            .map(|_| ())
    }

    async fn next_frame(&self) -> Result<(), WidgetError> {
        self.call(scripts::NEXT_FRAME, vec![]).await.map(|_| ())
    }

    async fn enabled_form_button(&self) -> Result<Option<Box<dyn Control>>, WidgetError> {
        let found = self
            .session
            .call_function_handle(&self.object_id, scripts::ENABLED_FORM_BUTTON, vec![])
            .await?;
        Ok(found.handle().map(|object_id| {
            Box::new(CdpControl {
                session: self.session.clone(),
                object_id: object_id.to_string(),
                label: format!("form button of {}", self.label),
            }) as Box<dyn Control>
        }))
    }

    async fn submit_enclosing_form(&self) -> Result<bool, WidgetError> {
        self.call_bool(scripts::SUBMIT_ENCLOSING_FORM, vec![]).await
    }
}

pub struct CdpControl {
    session: Arc<PageSession>,
    object_id: String,
    label: String,
}

impl Drop for CdpControl {
    fn drop(&mut self) {
        release_later(&self.session, &self.object_id);
    }
}

#[async_trait]
impl Control for CdpControl {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn activate(&self) -> Result<(), WidgetError> {
        self.session
            .call_function_on(&self.object_id, scripts::CLICK, vec![])
            .await?;
        Ok(())
    }
}
