//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort { value: String },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// A variable was set to something unusable, or a loaded value breaks an invariant.
    #[error("invalid {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    /// Rules, few-shot examples, a source draft and the completion cannot all fit.
    #[error(
        "worst-case prompt needs ~{required} tokens but the backend context is {available}; \
         lower GENIE_MAX_PROMPT_RULES, GENIE_FEW_SHOT_WINDOW, GENIE_FEW_SHOT_MAX_CHARS or \
         GENIE_MAX_COMPLETION_TOKENS"
    )]
    PromptBudgetExceeded { required: usize, available: usize },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}
