//! Axum route handlers for the capbridge HTTP surface.
//!
//! # Routes
//!
//! - `GET  /health`           — Returns `{"status": "ok", "version": ..., "service": "capbridge"}`
//! - `GET  /schema`           — Exported tool and resource schema
//! - `POST /invoke`           — Accepts a `CommandRequest`, returns a `CommandResponse`
//! - `GET  /tools/:name`      — Exported descriptor of one tool
//! - `GET  /resources/:name`  — Exported descriptor of one resource

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::capabilities::export_schema;
use crate::dispatch::{CommandRequest, CommandResponse, Dispatcher};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/schema", get(schema_handler))
        .route("/invoke", post(invoke_handler))
        .route("/tools/:name", get(tool_handler))
        .route("/resources/:name", get(resource_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "capbridge",
    }))
}

/// GET /schema — the same document `get_schema` returns over TCP.
async fn schema_handler(State(state): State<AppState>) -> Json<Value> {
    Json(export_schema(state.dispatcher.catalog()))
}

/// POST /invoke — run one command.
///
/// Capability failures are reported in the body with `status: "error"`; the
/// HTTP status stays 200 so the response shape matches the TCP transport.
/// Requests without an `id` get a fresh UUID.
async fn invoke_handler(
    State(state): State<AppState>,
    Json(mut request): Json<CommandRequest>,
) -> Json<CommandResponse> {
    let id = request
        .id
        .get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
    tracing::debug!("HTTP command '{}' (id {})", request.command, id);
    Json(state.dispatcher.handle(request).await)
}

/// GET /tools/:name
async fn tool_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .dispatcher
        .catalog()
        .get_tool(&name)
        .map(|tool| Json(tool.to_json()))
        .ok_or_else(|| not_found("tool", &name))
}

/// GET /resources/:name
async fn resource_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .dispatcher
        .catalog()
        .get_resource(&name)
        .map(|resource| Json(resource.to_json()))
        .ok_or_else(|| not_found("resource", &name))
}

fn not_found(kind: &str, name: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("{} '{}' not found", kind, name)})),
    )
}
