use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::error::EventBusError;
use super::types::EventEnvelope;

/// Producer side of the event bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), EventBusError>;
}

/// Bounded in-process bus. Publishing waits when the buffer is full.
#[derive(Debug, Clone)]
pub struct InProcessBus {
    sender: mpsc::Sender<EventEnvelope>,
}

/// Consumer side of an [`InProcessBus`].
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::Receiver<EventEnvelope>,
}

impl InProcessBus {
    pub fn new(capacity: usize) -> (Self, EventStream) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, EventStream { receiver })
    }
}

impl EventStream {
    /// Next event, or `None` once every publisher is dropped.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }

    /// Non-blocking poll used by tests and shutdown draining.
    pub fn try_next(&mut self) -> Option<EventEnvelope> {
        self.receiver.try_recv().ok()
    }
}

#[async_trait]
impl EventPublisher for InProcessBus {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), EventBusError> {
        let topic = envelope.topic();
        debug!(topic, event_id = %envelope.event_id, "Publishing event");
        self.sender
            .send(envelope)
            .await
            .map_err(|_| EventBusError::Closed { topic })
    }
}
