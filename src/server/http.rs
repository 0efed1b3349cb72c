//! HTTP server implementation
//!
//! Routes:
//! - `GET|POST /health`: liveness plus extension identity, never signed
//! - `POST /webhooks/*event`: signed webhook delivery, dispatched by event
//!   and version
//!
//! Signature verification runs as middleware on every path containing
//! `/webhooks/`, before any routing or JSON parsing happens.

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::auth::{self, AuthError};
use crate::client::{KiketClient, EVENT_VERSION_HEADER};
use crate::config::ResolvedConfig;
use crate::handlers::{DispatchError, HandlerContext, HandlerRegistry};
use crate::telemetry::{TelemetryReporter, TelemetryStatus};

/// Maximum accepted webhook body size (1 MiB).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Version used when the request names none.
pub const DEFAULT_EVENT_VERSION: &str = "v1";

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ResolvedConfig>,
    /// Handler registry
    pub registry: Arc<HandlerRegistry>,
    /// Outbound platform client; re-targeted per request
    pub client: KiketClient,
    pub telemetry: Arc<TelemetryReporter>,
    /// Server start time (Unix timestamp)
    pub start_time: i64,
}

impl AppState {
    /// Build state from resolved configuration, deriving the outbound client.
    pub fn new(
        config: Arc<ResolvedConfig>,
        registry: Arc<HandlerRegistry>,
        telemetry: Arc<TelemetryReporter>,
    ) -> Self {
        let client = KiketClient::new(
            config.base_url.clone(),
            config.workspace_token.clone(),
            None,
        );
        AppState {
            config,
            registry,
            client,
            telemetry,
            start_time: chrono::Utc::now().timestamp(),
        }
    }
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler).post(health_handler))
        .route("/webhooks/*event", post(webhook_handler))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, signature_middleware))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

/// JSON error body: `{"error": message}`.
fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), &self.to_string())
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        match self {
            DispatchError::HandlerNotFound { .. } => {
                error_response(StatusCode::NOT_FOUND, &self.to_string())
            }
            DispatchError::HandlerThrew { .. } => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Handler failed")
            }
        }
    }
}

/// Reject unsigned or badly signed webhook requests.
///
/// The body is buffered so the exact received bytes can be verified, then
/// handed on unchanged.
pub async fn signature_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !auth::requires_signature(request.uri().path()) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large"),
    };

    let outcome = auth::verify_request(
        state.config.webhook_secret.as_deref(),
        &parts.headers,
        &bytes,
    );
    if let Err(err) = outcome.into_result() {
        if err == AuthError::InternalError {
            error!(target: "auth", path = %parts.uri.path(), "no webhook secret configured");
        } else {
            warn!(target: "auth", path = %parts.uri.path(), reason = %err, "webhook rejected");
        }
        return err.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    pub version: Option<String>,
}

/// Event version from the header, then the query string, then the default.
pub fn resolve_event_version(headers: &HeaderMap, query_version: Option<&str>) -> String {
    headers
        .get(EVENT_VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| query_version.map(str::trim).filter(|v| !v.is_empty()))
        .unwrap_or(DEFAULT_EVENT_VERSION)
        .to_string()
}

/// Parse a webhook body; an empty body is an empty object.
fn parse_payload(body: &[u8]) -> Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(body)
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let uptime = chrono::Utc::now().timestamp() - state.start_time;
    Json(json!({
        "status": "ok",
        "extensionId": state.config.extension_id,
        "extensionVersion": state.config.extension_version,
        "events": state.registry.event_names(),
        "uptimeSecs": uptime,
    }))
    .into_response()
}

async fn webhook_handler(
    State(state): State<AppState>,
    Path(event): Path<String>,
    Query(query): Query<VersionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let version = resolve_event_version(&headers, query.version.as_deref());

    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(target: "http", %event, error = %e, "invalid webhook payload");
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON payload");
        }
    };

    let ctx = HandlerContext::build(&state.config, &state.client, &event, &version, &headers);

    let started = Instant::now();
    let result = state.registry.dispatch(&event, &version, payload, ctx).await;
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(value) => {
            debug!(target: "dispatch", %event, %version, duration_ms, "handler completed");
            state
                .telemetry
                .record(&event, &version, TelemetryStatus::Ok, duration_ms, None);
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(err) => {
            match &err {
                DispatchError::HandlerNotFound { .. } => {
                    warn!(target: "dispatch", %event, %version, "no handler registered");
                }
                DispatchError::HandlerThrew { source, .. } => {
                    error!(target: "dispatch", %event, %version, error = %source, "handler failed");
                    state.telemetry.record(
                        &event,
                        &version,
                        TelemetryStatus::Error,
                        duration_ms,
                        Some(source.to_string()),
                    );
                }
            }
            err.into_response()
        }
    }
}
