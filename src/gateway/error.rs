use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::GENIE_STATUS_HEADER;
use crate::events::EventBusError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("event bus unavailable: {0}")]
    BusUnavailable(#[from] EventBusError),

    #[error("shutting down")]
    ShuttingDown,
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, genie_status) = match &self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::BusUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "bus_error"),
            GatewayError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "shutting_down"),
        };

        let mut headers = HeaderMap::new();
        headers.insert(GENIE_STATUS_HEADER, HeaderValue::from_static(genie_status));

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}
