use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("event bus closed; dropped '{topic}' event")]
    Closed { topic: &'static str },

    #[error("failed to publish '{topic}' event: {message}")]
    PublishFailed {
        topic: &'static str,
        message: String,
    },
}
