use std::time::Duration;

use async_trait::async_trait;
use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest};
use tracing::{debug, error};

use super::error::BackendError;

/// External text generator: prompt in, text out.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<String, BackendError>;
}

/// [`GenerativeBackend`] over a `genai` client.
#[derive(Clone)]
pub struct GenaiBackend {
    client: Client,
    model: String,
}

impl GenaiBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::default(),
            model: model.into(),
        }
    }

    pub fn with_client(client: Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Maps provider error text onto the retry taxonomy.
fn classify_provider_error(message: String) -> BackendError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        BackendError::RateLimited { message }
    } else if lower.contains("400")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("404")
        || lower.contains("invalid")
    {
        BackendError::InvalidRequest { message }
    } else {
        BackendError::Unavailable { message }
    }
}

#[async_trait]
impl GenerativeBackend for GenaiBackend {
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<String, BackendError> {
        let request = ChatRequest::new(vec![ChatMessage::user(prompt.to_string())]);
        let options = ChatOptions::default().with_max_tokens(max_tokens);

        let response = tokio::time::timeout(
            timeout,
            self.client.exec_chat(&self.model, request, Some(&options)),
        )
        .await
        .map_err(|_| BackendError::Timeout { after: timeout })?
        .map_err(|e| {
            error!(model = %self.model, error = %e, "Provider error");
            classify_provider_error(e.to_string())
        })?;

        let text = response.first_text().unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(BackendError::MalformedResponse {
                message: "response contained no text".to_string(),
            });
        }

        debug!(model = %self.model, chars = text.len(), "Backend completion received");
        Ok(text)
    }
}
