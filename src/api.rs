//! HTTP surface.
//!
//! ```text
//! POST /api/messages  - runtime message in, {success} out
//! GET  /api/tabs      - provider tab registry snapshot
//! GET  /health        - liveness with registry size
//! ```

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use promptcast_core::{TabOrchestrator, TabRecord};
use promptcast_protocols::{MessageAck, RuntimeMessage};

type AppState = Arc<TabOrchestrator>;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tabs: usize,
}

pub(crate) fn create_router(orchestrator: Arc<TabOrchestrator>) -> Router {
    Router::new()
        .route("/api/messages", post(post_message))
        .route("/api/tabs", get(list_tabs))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

async fn post_message(
    State(orchestrator): State<AppState>,
    body: Result<Json<RuntimeMessage>, JsonRejection>,
) -> (StatusCode, Json<MessageAck>) {
    let message = match body {
        Ok(Json(message)) => message,
        Err(rejection) => {
            warn!("Rejected runtime message: {}", rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(MessageAck::rejected()));
        }
    };

    info!("Received {} over HTTP", message.kind());
    let ack = orchestrator.handle_message(message, None);
    (StatusCode::OK, Json(ack))
}

async fn list_tabs(State(orchestrator): State<AppState>) -> Json<Vec<TabRecord>> {
    Json(orchestrator.registry().snapshot())
}

async fn health(State(orchestrator): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        tabs: orchestrator.registry().len(),
    })
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
