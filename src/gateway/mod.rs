//! HTTP surface (Axum): probes and event ingress.
//!
//! Used by the `genie` binary; everything else happens on the event bus.

pub mod error;
pub mod handler;
pub mod state;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::{ErrorResponse, GatewayError};
pub use handler::{AcceptedResponse, ingest_event_handler};
pub use state::AppState;

pub const GENIE_STATUS_HEADER: &str = "x-genie-status";
pub const GENIE_STATUS_HEALTHY: &str = "healthy";
pub const GENIE_STATUS_READY: &str = "ready";
pub const GENIE_STATUS_NOT_READY: &str = "not_ready";
pub const GENIE_STATUS_ACCEPTED: &str = "accepted";
pub const GENIE_STATUS_ERROR: &str = "error";

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/v1/events", post(ingest_event_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub storage: &'static str,
    pub worker: &'static str,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        GENIE_STATUS_HEADER,
        HeaderValue::from_static(GENIE_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let storage = if state.data_path.is_dir() {
        GENIE_STATUS_READY
    } else {
        GENIE_STATUS_ERROR
    };
    let worker = if state.shutdown.is_cancelled() {
        "stopping"
    } else {
        GENIE_STATUS_READY
    };

    let components = ComponentStatus {
        http: GENIE_STATUS_READY,
        storage,
        worker,
    };
    let is_ready =
        components.storage == GENIE_STATUS_READY && components.worker == GENIE_STATUS_READY;

    let (status_code, status_msg, header) = if is_ready {
        (StatusCode::OK, "ok", GENIE_STATUS_READY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "pending", GENIE_STATUS_NOT_READY)
    };

    let mut headers = HeaderMap::new();
    headers.insert(GENIE_STATUS_HEADER, HeaderValue::from_static(header));

    (
        status_code,
        headers,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}
