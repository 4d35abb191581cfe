//! Domain events and the event-bus port.
//!
//! Delivery is at-least-once, so every consumer in this crate is idempotent: handlers
//! derive record IDs from the event's natural key (see [`crate::hashing`]).

pub mod bus;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use bus::{EventPublisher, EventStream, InProcessBus};
pub use error::EventBusError;
#[cfg(any(test, feature = "mock"))]
pub use mock::RecordingPublisher;
pub use types::{DomainEvent, EventEnvelope, topics};
