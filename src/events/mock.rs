use async_trait::async_trait;
use parking_lot::Mutex;

use super::bus::EventPublisher;
use super::error::EventBusError;
use super::types::{DomainEvent, EventEnvelope};

/// Publisher that keeps every envelope in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<EventEnvelope>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.published.lock().clone()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.published
            .lock()
            .iter()
            .map(|e| e.event.clone())
            .collect()
    }

    /// Events published on `topic`.
    pub fn on_topic(&self, topic: &str) -> Vec<DomainEvent> {
        self.published
            .lock()
            .iter()
            .filter(|e| e.topic() == topic)
            .map(|e| e.event.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), EventBusError> {
        self.published.lock().push(envelope);
        Ok(())
    }
}
