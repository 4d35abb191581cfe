use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::GenerativeBackend;
use super::error::BackendError;
use super::prompt::{DRAFT_HEADER, OUTPUT_HEADER, RULES_HEADER};

/// Scriptable [`GenerativeBackend`] for tests.
///
/// Queued responses are returned first. Once the queue is empty the backend "follows
/// the rules": it takes the draft section of the prompt and applies every listed
/// correction rule as a plain text replacement.
#[derive(Debug, Default)]
pub struct MockBackend {
    script: Mutex<VecDeque<Result<String, BackendError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(responses: impl IntoIterator<Item = Result<String, BackendError>>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Sleeps before answering; used to exercise timeouts and cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, response: Result<String, BackendError>) {
        self.script.lock().push_back(response);
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

fn section<'a>(prompt: &'a str, header: &str) -> &'a str {
    let Some(start) = prompt.find(header) else {
        return "";
    };
    let body = &prompt[start + header.len()..];
    let end = body.find("\n### ").unwrap_or(body.len());
    body[..end].trim()
}

fn parse_rule(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("- \"")?;
    let (source, rest) = rest.split_once("\" -> \"")?;
    let (target, _) = rest.split_once('"')?;
    Some((source, target))
}

/// Applies the prompt's rules to its draft section.
pub fn follow_rules(prompt: &str) -> String {
    let mut text = section(prompt, DRAFT_HEADER).to_string();
    for (source, target) in section(prompt, RULES_HEADER).lines().filter_map(parse_rule) {
        text = text.replace(source, target);
    }
    text
}

#[async_trait]
impl GenerativeBackend for MockBackend {
    async fn complete(
        &self,
        prompt: &str,
        _max_tokens: u32,
        _timeout: Duration,
    ) -> Result<String, BackendError> {
        self.prompts.lock().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(response) => response,
            None if prompt.contains(OUTPUT_HEADER) => Ok(follow_rules(prompt)),
            None => Err(BackendError::InvalidRequest {
                message: "prompt has no output section".to_string(),
            }),
        }
    }
}
