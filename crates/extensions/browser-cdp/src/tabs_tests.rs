use super::*;
use crate::cdp::Transport;
use serde_json::json;

fn event(method: &str, params: Value) -> CdpEvent {
    CdpEvent {
        method: method.to_string(),
        params,
        session_id: None,
    }
}

fn target(id: &str, kind: &str, url: &str) -> Value {
    json!({
        "targetInfo": {
            "targetId": id,
            "type": kind,
            "title": "",
            "url": url,
            "attached": false
        }
    })
}

#[test]
fn test_created_page_opens_tab() {
    let change = target_change(&event(
        "Target.targetCreated",
        target("T1", "page", "https://chatgpt.com/"),
    ));
    assert_eq!(
        change,
        Some(TargetChange::Opened {
            id: TabId::from("T1"),
            url: "https://chatgpt.com/".to_string(),
        })
    );
}

#[test]
fn test_non_page_targets_are_ignored() {
    let worker = event(
        "Target.targetCreated",
        target("W1", "service_worker", "https://claude.ai/sw.js"),
    );
    assert_eq!(target_change(&worker), None);

    let iframe = event(
        "Target.targetInfoChanged",
        target("F1", "iframe", "https://example.com/"),
    );
    assert_eq!(target_change(&iframe), None);
}

#[test]
fn test_info_change_carries_new_url() {
    let change = target_change(&event(
        "Target.targetInfoChanged",
        target("T1", "page", "https://claude.ai/new"),
    ));
    assert_eq!(
        change,
        Some(TargetChange::Changed {
            id: TabId::from("T1"),
            url: "https://claude.ai/new".to_string(),
        })
    );
}

#[test]
fn test_lifecycle_endings() {
    let params = json!({"targetId": "T2"});
    assert_eq!(
        target_change(&event("Target.targetDestroyed", params.clone())),
        Some(TargetChange::Destroyed { id: TabId::from("T2") })
    );
    assert_eq!(
        target_change(&event("Target.targetCrashed", params.clone())),
        Some(TargetChange::Crashed { id: TabId::from("T2") })
    );
    assert_eq!(
        target_change(&event(
            "Target.detachedFromTarget",
            json!({"sessionId": "S", "targetId": "T2"})
        )),
        Some(TargetChange::Detached { id: TabId::from("T2") })
    );
}

#[test]
fn test_unrelated_or_malformed_events() {
    assert_eq!(target_change(&event("Page.loadEventFired", json!({}))), None);
    assert_eq!(target_change(&event("Target.targetDestroyed", json!({}))), None);
    assert_eq!(
        target_change(&event("Target.targetCreated", json!({"targetInfo": 5}))),
        None
    );
}

#[test]
fn test_load_event_completes_page() {
    assert_eq!(
        page_change(&event("Page.loadEventFired", json!({"timestamp": 1.5}))),
        Some(PageChange::Loaded)
    );
}

#[test]
fn test_renderer_crash_is_reported() {
    assert_eq!(
        page_change(&event("Inspector.targetCrashed", json!({}))),
        Some(PageChange::Crashed)
    );
}

#[test]
fn test_only_main_frame_navigation_counts() {
    let main = event(
        "Page.frameNavigated",
        json!({"frame": {"id": "F", "url": "https://gemini.google.com/app"}}),
    );
    assert_eq!(
        page_change(&main),
        Some(PageChange::Navigated {
            url: "https://gemini.google.com/app".to_string()
        })
    );

    let child = event(
        "Page.frameNavigated",
        json!({"frame": {"id": "C", "parentId": "F", "url": "about:blank"}}),
    );
    assert_eq!(page_change(&child), None);
}

#[test]
fn test_initial_blank_document_is_not_loaded() {
    let snapshot = json!({"state": "complete", "href": "about:blank"});
    assert!(!loaded_document(&snapshot, "https://grok.com/"));
}

#[test]
fn test_loaded_document_needs_complete_state_on_target_origin() {
    let loading = json!({"state": "interactive", "href": "https://claude.ai/new"});
    assert!(!loaded_document(&loading, "https://claude.ai/"));

    let done = json!({"state": "complete", "href": "https://claude.ai/new"});
    assert!(loaded_document(&done, "https://claude.ai/"));

    let elsewhere = json!({"state": "complete", "href": "https://accounts.google.com/"});
    assert!(!loaded_document(&elsewhere, "https://gemini.google.com/"));
}

#[test]
fn test_unreadable_document_state_is_not_loaded() {
    assert!(!loaded_document(&Value::Null, "https://chatgpt.com/"));
    assert!(!loaded_document(&json!("complete"), "https://chatgpt.com/"));
}

#[tokio::test]
async fn test_reattached_tab_is_usable_again() {
    let (events, _) = broadcast::channel(4);
    let session = Arc::new(PageSession::new(
        "T1".to_string(),
        "S1".to_string(),
        Transport::loopback().await,
        events,
    ));
    let mut state = TabState::new(
        TabId::from("T1"),
        "https://claude.ai/".to_string(),
        TabStatus::Complete,
    );

    assert!(state.discard().is_none());
    assert!(state.info.discarded);

    state.adopt(session.clone(), tokio::spawn(async {}));
    assert!(!state.info.discarded);

    let dropped = state.discard().map(|s| s.session_id().to_string());
    assert_eq!(dropped.as_deref(), Some("S1"));
}
