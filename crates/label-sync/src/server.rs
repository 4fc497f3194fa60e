//! HTTP server for GitHub label webhooks.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::event::{verify_webhook_signature, LabelEvent};
use crate::fanout::FanOutDriver;
use crate::github::GitHubClient;
use crate::models::RepoRef;

/// Fan-out driver backed by the GitHub API.
pub type GitHubFanOut = FanOutDriver<GitHubClient, GitHubClient>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Canonical repository; events from anywhere else are ignored.
    pub source: RepoRef,
    /// Webhook signing secret. Signatures are not checked when unset.
    pub webhook_secret: Option<String>,
    pub driver: Arc<GitHubFanOut>,
}

/// Build the HTTP router for the webhook service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/github", post(github_webhook_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port, "Label sync service listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Accept a `label` event and fan it out in the background.
async fn github_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    if let Some(secret) = &state.webhook_secret {
        let signature = header(&headers, "x-hub-signature-256");
        if !verify_webhook_signature(&body, signature, secret) {
            warn!("Rejected webhook with invalid signature");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "status": "error", "error": "invalid signature" })),
            );
        }
    }

    match header(&headers, "x-github-event") {
        "label" => {}
        "ping" => return (StatusCode::OK, Json(json!({ "status": "pong" }))),
        other => {
            debug!(event = other, "Ignoring non-label event");
            return (
                StatusCode::OK,
                Json(json!({ "status": "ignored", "event": other })),
            );
        }
    }

    let event = match LabelEvent::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Failed to parse label event");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "error": e.to_string() })),
            );
        }
    };

    if let Some(origin) = event.foreign_origin(&state.source) {
        debug!(origin = %origin, "Ignoring label event from non-source repository");
        return (
            StatusCode::OK,
            Json(json!({ "status": "ignored", "repository": origin.full_name() })),
        );
    }

    let change = match event.to_change() {
        Ok(change) => change,
        Err(e) => {
            warn!(error = %e, "Unsupported label event");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "error": e.to_string() })),
            );
        }
    };

    let action = change.kind();
    let label = change.label().name.clone();
    info!(action, label = %label, "Accepted label event");

    let driver = Arc::clone(&state.driver);
    tokio::spawn(async move {
        match driver.run(change).await {
            Ok(report) if report.is_success() => {}
            Ok(report) => error!(
                failed = report.failure_count(),
                "Label fan-out finished with failures"
            ),
            Err(e) => error!(error = %e, "Label fan-out failed"),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "action": action, "label": label })),
    )
}
