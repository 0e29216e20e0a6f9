use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::Request,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tower::ServiceExt;

use promptcast_core::{OrchestratorConfig, ProviderCatalog};
use promptcast_protocols::{TabBrowser, TabError, TabEvent, TabId, TabInfo, TabStatus};

/// Browser whose tabs load instantly and whose pages accept everything.
struct InstantBrowser {
    tabs: Mutex<Vec<TabInfo>>,
    next_id: AtomicUsize,
    delivered: Mutex<Vec<(TabId, RuntimeMessage)>>,
    events: broadcast::Sender<TabEvent>,
}

impl InstantBrowser {
    fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            tabs: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            delivered: Mutex::new(Vec::new()),
            events,
        }
    }
}

#[async_trait]
impl TabBrowser for InstantBrowser {
    async fn create_tab(&self, url: &str) -> Result<TabId, TabError> {
        let id = TabId::from(format!("tab-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.tabs.lock().push(TabInfo {
            id: id.clone(),
            url: url.to_string(),
            status: TabStatus::Complete,
            discarded: false,
        });
        let _ = self.events.send(TabEvent::Updated {
            tab_id: id.clone(),
            status: TabStatus::Complete,
        });
        Ok(id)
    }

    async fn get_tab(&self, tab_id: &TabId) -> Result<Option<TabInfo>, TabError> {
        Ok(self.tabs.lock().iter().find(|t| &t.id == tab_id).cloned())
    }

    async fn query_tabs(&self) -> Result<Vec<TabInfo>, TabError> {
        Ok(self.tabs.lock().clone())
    }

    async fn activate_tab(&self, _tab_id: &TabId) -> Result<(), TabError> {
        Ok(())
    }

    async fn deliver(&self, tab_id: &TabId, message: RuntimeMessage) -> Result<MessageAck, TabError> {
        self.delivered.lock().push((tab_id.clone(), message));
        Ok(MessageAck::ok())
    }

    fn subscribe(&self) -> broadcast::Receiver<TabEvent> {
        self.events.subscribe()
    }
}

fn create_test_app() -> (Router, Arc<TabOrchestrator>, Arc<InstantBrowser>) {
    let browser = Arc::new(InstantBrowser::new());
    let orchestrator = Arc::new(TabOrchestrator::new(
        browser.clone(),
        ProviderCatalog::builtin(),
        OrchestratorConfig::default(),
    ));
    (create_router(orchestrator.clone()), orchestrator, browser)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_open_providers_dispatches_and_registers() {
    let (app, orchestrator, browser) = create_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/messages",
            serde_json::json!({
                "type": "OPEN_AI_PROVIDERS",
                "urls": ["https://chatgpt.com/", "https://claude.ai/new"],
                "prompt": "compare these",
                "autoSend": true
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"success": true}));

    orchestrator.settle().await;
    let delivered = browser.delivered.lock().clone();
    assert_eq!(delivered.len(), 2);
    for (_, message) in &delivered {
        let instruction = message.fill_instruction().unwrap();
        assert_eq!(instruction.prompt, "compare these");
        assert!(instruction.auto_send);
        assert!(!instruction.follow_up);
    }

    let response = app
        .oneshot(Request::builder().uri("/api/tabs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tabs = body_json(response).await;
    let domains: Vec<&str> = tabs
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["provider_domain"].as_str().unwrap())
        .collect();
    assert_eq!(domains, vec!["chatgpt.com", "claude.ai"]);
}

#[tokio::test]
async fn test_blank_prompt_is_rejected() {
    let (app, orchestrator, browser) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/messages",
            serde_json::json!({
                "type": "OPEN_AI_PROVIDERS",
                "urls": ["https://chatgpt.com/"],
                "prompt": "   "
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"success": false}));

    orchestrator.settle().await;
    assert!(browser.delivered.lock().is_empty());
}

#[tokio::test]
async fn test_prompt_sent_needs_a_sender_tab() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/messages",
            serde_json::json!({"type": "PROMPT_SENT"}),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({"success": false}));
}

#[tokio::test]
async fn test_malformed_message_is_bad_request() {
    let (app, _, _) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/messages",
            serde_json::json!({"type": "SELF_DESTRUCT"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, serde_json::json!({"success": false}));
}

#[tokio::test]
async fn test_health_reports_registry_size() {
    let (app, orchestrator, _) = create_test_app();
    orchestrator
        .registry()
        .record(promptcast_core::classify("https://grok.com/"), TabId::from("tab-9"));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["tabs"], 1);
}
