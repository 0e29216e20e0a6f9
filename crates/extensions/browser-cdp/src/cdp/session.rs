//! CDP page session for interacting with a single tab.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::client::Transport;
use super::error::CdpError;
use super::protocol::{BindingCalled, CdpEvent, ExceptionDetails, RemoteObject};

/// A session attached to a single page/target.
pub struct PageSession {
    target_id: String,
    session_id: String,
    transport: Arc<Transport>,
    events: broadcast::Sender<CdpEvent>,
}

impl PageSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        transport: Arc<Transport>,
        events: broadcast::Sender<CdpEvent>,
    ) -> Self {
        Self {
            target_id,
            session_id,
            transport,
            events,
        }
    }

    /// Get target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Get session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Events for this session.
    pub fn events(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport
            .call(method, params, Some(&self.session_id))
            .await
    }

    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Inspector.enable", None).await?;
        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Evaluate an expression and return its value. `context` selects the
    /// execution context; `None` is the page's main world.
    pub async fn evaluate(&self, expression: &str, context: Option<i64>) -> Result<Value, CdpError> {
        let mut params = json!({
            "expression": expression,
            "returnByValue": true,
            "awaitPromise": true,
        });
        if let Some(id) = context {
            params["contextId"] = json!(id);
        }
        let result = self.call("Runtime.evaluate", Some(params)).await?;
        check_exception(&result)?;
        Ok(result["result"]["value"].clone())
    }

    /// Evaluate an expression and return a handle to the result.
    pub async fn evaluate_handle(
        &self,
        expression: &str,
        context: Option<i64>,
    ) -> Result<RemoteObject, CdpError> {
        let mut params = json!({
            "expression": expression,
            "returnByValue": false,
            "awaitPromise": true,
        });
        if let Some(id) = context {
            params["contextId"] = json!(id);
        }
        let result = self.call("Runtime.evaluate", Some(params)).await?;
        check_exception(&result)?;
        Ok(serde_json::from_value(result["result"].clone())?)
    }

    /// Call a function with `this` bound to a remote object; return its value.
    pub async fn call_function_on(
        &self,
        object_id: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.callFunctionOn",
                Some(call_params(object_id, function, args, true)),
            )
            .await?;
        check_exception(&result)?;
        Ok(result["result"]["value"].clone())
    }

    /// Like [`call_function_on`](Self::call_function_on) but returns a handle.
    pub async fn call_function_handle(
        &self,
        object_id: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<RemoteObject, CdpError> {
        let result = self
            .call(
                "Runtime.callFunctionOn",
                Some(call_params(object_id, function, args, false)),
            )
            .await?;
        check_exception(&result)?;
        Ok(serde_json::from_value(result["result"].clone())?)
    }

    pub async fn release_object(&self, object_id: &str) -> Result<(), CdpError> {
        self.call(
            "Runtime.releaseObject",
            Some(json!({"objectId": object_id})),
        )
        .await?;
        Ok(())
    }

    /// ID of the tab's top-level frame.
    pub async fn main_frame_id(&self) -> Result<String, CdpError> {
        let tree = self.call("Page.getFrameTree", None).await?;
        tree["frameTree"]["frame"]["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::InvalidResponse("Missing frame id".to_string()))
    }

    /// Create a named isolated world in the main frame and return its
    /// execution context ID.
    pub async fn create_isolated_world(&self, world_name: &str) -> Result<i64, CdpError> {
        let frame_id = self.main_frame_id().await?;
        let result = self
            .call(
                "Page.createIsolatedWorld",
                Some(json!({
                    "frameId": frame_id,
                    "worldName": world_name,
                    "grantUniveralAccess": false,
                })),
            )
            .await?;
        result["executionContextId"]
            .as_i64()
            .ok_or_else(|| CdpError::InvalidResponse("Missing executionContextId".to_string()))
    }

    /// Expose a page→host binding and stream its calls.
    ///
    /// With `world_name` the binding exists only in isolated worlds of that
    /// name; without it, in the main world.
    pub async fn bind(
        &self,
        name: &str,
        world_name: Option<&str>,
    ) -> Result<mpsc::UnboundedReceiver<BindingCalled>, CdpError> {
        // Subscribe first so no call made right after registration is lost.
        let events = self.events();

        let mut params = json!({"name": name});
        if let Some(world) = world_name {
            params["executionContextName"] = json!(world);
        }
        self.call("Runtime.addBinding", Some(params)).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        forward_binding(name.to_string(), events, tx);
        Ok(rx)
    }
}

/// Pass `Runtime.bindingCalled` events for `name` on to `tx` until the
/// receiving side goes away or the session ends.
fn forward_binding(
    name: String,
    mut events: broadcast::Receiver<CdpEvent>,
    tx: mpsc::UnboundedSender<BindingCalled>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = tx.closed() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(event) if event.method == "Runtime.bindingCalled" => {
                    let called: BindingCalled = match serde_json::from_value(event.params) {
                        Ok(called) => called,
                        Err(e) => {
                            trace!("Unreadable bindingCalled: {}", e);
                            continue;
                        }
                    };
                    if called.name == name && tx.send(called).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("Binding {} lagged, {} event(s) dropped", name, n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn call_params(object_id: &str, function: &str, args: Vec<Value>, by_value: bool) -> Value {
    json!({
        "objectId": object_id,
        "functionDeclaration": function,
        "arguments": args.into_iter().map(|v| json!({"value": v})).collect::<Vec<_>>(),
        "returnByValue": by_value,
        "awaitPromise": true,
    })
}

fn check_exception(result: &Value) -> Result<(), CdpError> {
    match result.get("exceptionDetails") {
        Some(raw) => {
            let message = serde_json::from_value::<ExceptionDetails>(raw.clone())
                .map(|d| d.message())
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(CdpError::JavaScript(message))
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_params_wrap_arguments() {
        let params = call_params("1.1", "function(t){}", vec![json!("hi")], true);
        assert_eq!(params["arguments"], json!([{"value": "hi"}]));
        assert_eq!(params["returnByValue"], json!(true));
    }

    fn binding_called(name: &str, payload: &str) -> CdpEvent {
        CdpEvent {
            method: "Runtime.bindingCalled".to_string(),
            params: json!({"name": name, "payload": payload, "executionContextId": 7}),
            session_id: Some("S1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_forwarder_passes_only_its_binding() {
        let (events, rx) = broadcast::channel(8);
        let (tx, mut calls) = mpsc::unbounded_channel();
        let task = forward_binding("__promptcastMutation_isolated".to_string(), rx, tx);

        events.send(binding_called("__promptcastMessage_isolated", "x")).unwrap();
        events.send(binding_called("__promptcastMutation_isolated", "3")).unwrap();

        let called = calls.recv().await.unwrap();
        assert_eq!(called.payload, "3");
        assert_eq!(called.execution_context_id, 7);

        drop(events);
        task.await.unwrap();
        assert!(calls.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forwarder_stops_when_receiver_dropped() {
        let (_events, rx) = broadcast::channel::<CdpEvent>(8);
        let (tx, calls) = mpsc::unbounded_channel();
        let task = forward_binding("__promptcastMutation_isolated".to_string(), rx, tx);

        drop(calls);
        tokio::time::timeout(std::time::Duration::from_secs(1), task)
            .await
            .expect("forwarder outlived its receiver")
            .unwrap();
    }

    #[test]
    fn test_check_exception() {
        assert!(check_exception(&json!({"result": {"type": "undefined"}})).is_ok());

        let err = check_exception(&json!({
            "result": {"type": "object"},
            "exceptionDetails": {
                "exceptionId": 3,
                "text": "Uncaught",
                "lineNumber": 1,
                "columnNumber": 1,
                "exception": {"type": "object", "description": "ReferenceError: foo"}
            }
        }))
        .unwrap_err();
        assert!(matches!(err, CdpError::JavaScript(ref m) if m == "ReferenceError: foo"));
    }
}
