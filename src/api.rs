//! HTTP surface: Meta webhook (handshake + delivery), health, and the
//! operator diagnostic send.
//!
//! The delivery endpoint acknowledges every authenticated request with 200 so
//! the platform never retries or flags the endpoint; outcomes are only logged.

use crate::gateway::{DeliveryStatus, Gateway};
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use relay_channels::whatsapp_cloud::{
    constant_time_eq, parse_event, verify_handshake, verify_signature, HandshakeQuery,
};
use relay_core::config::Config;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    gateway: Arc<Gateway>,
    verify_token: Arc<str>,
    app_secret: Option<Arc<str>>,
    api_key: Option<String>,
    test_recipient: Option<String>,
    uptime: Instant,
}

impl ApiState {
    pub fn new(config: &Config, gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            verify_token: Arc::from(config.whatsapp.verify_token.as_str()),
            app_secret: config
                .whatsapp
                .app_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(Arc::from),
            api_key: Some(config.api.api_key.clone()).filter(|k| !k.is_empty()),
            test_recipient: config
                .whatsapp
                .test_recipient
                .clone()
                .filter(|r| !r.is_empty()),
            uptime: Instant::now(),
        }
    }
}

/// Check bearer token auth. Returns `None` if authorized, `Some(response)` if rejected.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<(StatusCode, Json<Value>)> {
    let key = match api_key {
        Some(k) => k,
        None => return None, // No auth configured, allow all.
    };

    let value = match headers.get("authorization").map(|h| h.to_str()) {
        Some(Ok(v)) => v,
        Some(Err(_)) => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid Authorization header"})),
            ));
        }
        None => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "missing Authorization header"})),
            ));
        }
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => None,
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

/// `GET /`: liveness plus a few counters.
async fn health(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "conversations": state.gateway.store().conversation_count(),
        "simulate": state.gateway.simulate(),
    }))
}

/// `GET /webhook`: Meta subscription handshake.
///
/// A query string that does not deserialize (duplicated or conflicting
/// parameters) is rejected like any other failed handshake.
async fn verify(
    State(state): State<ApiState>,
    query: Result<Query<HandshakeQuery>, QueryRejection>,
) -> (StatusCode, String) {
    let query = match query {
        Ok(Query(query)) => query,
        Err(e) => {
            warn!("webhook verification rejected: malformed query ({e})");
            return (StatusCode::FORBIDDEN, "Forbidden".to_string());
        }
    };
    match verify_handshake(&query, &state.verify_token) {
        Ok(challenge) => {
            info!("webhook verified");
            (StatusCode::OK, challenge)
        }
        Err(e) => {
            warn!("webhook verification rejected: {e}");
            (StatusCode::FORBIDDEN, "Forbidden".to_string())
        }
    }
}

/// `POST /webhook`: message delivery.
async fn receive(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    if let Some(ref app_secret) = state.app_secret {
        let signature = headers
            .get("X-Hub-Signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(app_secret, &body, signature) {
            warn!(
                "webhook signature verification failed (signature: {})",
                if signature.is_empty() { "missing" } else { "invalid" }
            );
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid signature"})),
            );
        }
    }

    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => {
            let handled = state.gateway.handle_event(parse_event(&payload)).await;
            debug!("webhook handled: {handled:?}");
        }
        Err(e) => warn!("webhook body is not JSON ({e}), acknowledged anyway"),
    }

    (StatusCode::OK, Json(json!({"ok": true})))
}

/// `POST /send-test`: send the diagnostic text to the configured recipient.
async fn send_test(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return err;
    }

    let Some(recipient) = state.test_recipient.as_deref() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "no test recipient configured (WHATSAPP_TEST_TO)"})),
        );
    };

    match state.gateway.send_diagnostic(recipient).await {
        DeliveryStatus::Sent => (StatusCode::OK, Json(json!({"status": "sent"}))),
        DeliveryStatus::Simulated => (StatusCode::OK, Json(json!({"status": "simulated"}))),
        DeliveryStatus::NoRecipient => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "test recipient has no digits"})),
        ),
        DeliveryStatus::Failed(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"status": "failed", "error": e})),
        ),
    }
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", get(verify).post(receive))
        .route("/send-test", post(send_test))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &Config, gateway: Arc<Gateway>) -> anyhow::Result<()> {
    let app = build_router(ApiState::new(config, gateway));
    let addr = format!("{}:{}", config.api.host, config.api.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;

    info!("listening on {addr}");
    info!("  GET  /          health");
    info!("  GET  /webhook   Meta webhook verification");
    info!("  POST /webhook   WhatsApp message webhook");
    info!("  POST /send-test diagnostic send");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("server error: {e}");
            anyhow::anyhow!("server error: {e}")
        })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[cfg(test)]
mod tests;
