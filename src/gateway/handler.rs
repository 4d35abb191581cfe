use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::GatewayError;
use super::state::AppState;
use super::{GENIE_STATUS_ACCEPTED, GENIE_STATUS_HEADER};
use crate::events::{DomainEvent, EventEnvelope};

/// Accepted ingress bodies: a full envelope (redeliveries keep their `event_id`) or a
/// bare event, which gets a fresh ID.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IngressBody {
    Envelope(EventEnvelope),
    Event(DomainEvent),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub event_id: String,
    pub topic: String,
}

/// `POST /v1/events`: puts one event on the bus and answers 202 once it is queued.
#[tracing::instrument(skip(state, request))]
pub async fn ingest_event_handler(
    State(state): State<AppState>,
    Json(request): Json<serde_json::Value>,
) -> Result<Response, GatewayError> {
    if state.shutdown.is_cancelled() {
        return Err(GatewayError::ShuttingDown);
    }

    let envelope = match serde_json::from_value::<IngressBody>(request) {
        Ok(IngressBody::Envelope(envelope)) => envelope,
        Ok(IngressBody::Event(event)) => EventEnvelope::new(event),
        Err(e) => {
            debug!(error = %e, "Rejected event body");
            return Err(GatewayError::InvalidRequest(format!(
                "body is neither an event envelope nor a known event: {e}"
            )));
        }
    };

    let response = AcceptedResponse {
        event_id: envelope.event_id.clone(),
        topic: envelope.topic().to_string(),
    };
    state.publisher.publish(envelope).await?;
    info!(event_id = %response.event_id, topic = %response.topic, "Event accepted");

    let mut headers = HeaderMap::new();
    headers.insert(
        GENIE_STATUS_HEADER,
        HeaderValue::from_static(GENIE_STATUS_ACCEPTED),
    );
    Ok((StatusCode::ACCEPTED, headers, Json(response)).into_response())
}
