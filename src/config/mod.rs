//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `GENIE_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::bucket::BucketBands;
use crate::constants::{
    DEFAULT_EMBEDDING_DIM, DEFAULT_EVENT_BUFFER, DEFAULT_GENERATION_MODEL,
    DEFAULT_WORKER_CONCURRENCY, SOURCE_DRAFT_TOKEN_RESERVE,
};
use crate::evaluation::{EvaluationConfig, QualityWeights};
use crate::rag::{OrchestratorConfig, PromptStorage};
use crate::rag::prompt::worst_case_context_tokens;
use crate::vector::BuilderConfig;

/// Service configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `GENIE_*` overrides on top of defaults, then
/// [`Config::validate`] before wiring anything.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Root directory of the record stores. Default: `./.data`.
    pub data_path: PathBuf,

    /// Qdrant endpoint URL. Default: `http://localhost:6334`.
    pub qdrant_url: String,

    /// Speaker registry base URL. Unset: in-memory registry.
    pub registry_url: Option<String>,

    /// Draft store base URL. Unset: in-memory draft store.
    pub draft_store_url: Option<String>,

    /// `genai` model name for generation.
    pub model: String,

    pub builder: BuilderConfig,
    pub orchestrator: OrchestratorConfig,
    pub evaluation: EvaluationConfig,

    /// Hashing embedder output dimension. Default: `384`.
    pub embedding_dim: usize,

    /// Events processed concurrently. Default: `8`.
    pub worker_concurrency: usize,

    /// In-process event bus capacity. Default: `1024`.
    pub event_buffer: usize,

    /// Apply `bucket_reassignment.proposed` events automatically. Default: `false`.
    pub auto_apply_buckets: bool,
}

/// Default Qdrant URL used when `GENIE_QDRANT_URL` is not set.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            data_path: PathBuf::from("./.data"),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            registry_url: None,
            draft_store_url: None,
            model: DEFAULT_GENERATION_MODEL.to_string(),
            builder: BuilderConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            evaluation: EvaluationConfig::default(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
            event_buffer: DEFAULT_EVENT_BUFFER,
            auto_apply_buckets: false,
        }
    }
}

impl Config {
    pub const ENV_PORT: &'static str = "GENIE_PORT";
    const ENV_BIND_ADDR: &'static str = "GENIE_BIND_ADDR";
    const ENV_DATA_PATH: &'static str = "GENIE_DATA_PATH";
    const ENV_QDRANT_URL: &'static str = "GENIE_QDRANT_URL";
    const ENV_REGISTRY_URL: &'static str = "GENIE_REGISTRY_URL";
    const ENV_DRAFT_STORE_URL: &'static str = "GENIE_DRAFT_STORE_URL";
    const ENV_MODEL: &'static str = "GENIE_MODEL";
    const ENV_MIN_RULE_FREQUENCY: &'static str = "GENIE_MIN_RULE_FREQUENCY";
    const ENV_MAX_NGRAM: &'static str = "GENIE_MAX_NGRAM";
    const ENV_MAX_PROMPT_RULES: &'static str = "GENIE_MAX_PROMPT_RULES";
    const ENV_FEW_SHOT_WINDOW: &'static str = "GENIE_FEW_SHOT_WINDOW";
    const ENV_FEW_SHOT_MAX_CHARS: &'static str = "GENIE_FEW_SHOT_MAX_CHARS";
    const ENV_PROMPT_STORAGE: &'static str = "GENIE_PROMPT_STORAGE";
    const ENV_GENERATION_TIMEOUT_SECS: &'static str = "GENIE_GENERATION_TIMEOUT_SECS";
    const ENV_MAX_COMPLETION_TOKENS: &'static str = "GENIE_MAX_COMPLETION_TOKENS";
    const ENV_BACKEND_CONTEXT_TOKENS: &'static str = "GENIE_BACKEND_CONTEXT_TOKENS";
    const ENV_COLD_START_TOP_K: &'static str = "GENIE_COLD_START_TOP_K";
    const ENV_WEIGHT_WER: &'static str = "GENIE_WEIGHT_WER";
    const ENV_WEIGHT_SIMILARITY: &'static str = "GENIE_WEIGHT_SIMILARITY";
    const ENV_WEIGHT_SER: &'static str = "GENIE_WEIGHT_SER";
    const ENV_BUCKET_BANDS: &'static str = "GENIE_BUCKET_BANDS";
    const ENV_EMBEDDING_DIM: &'static str = "GENIE_EMBEDDING_DIM";
    const ENV_WORKER_CONCURRENCY: &'static str = "GENIE_WORKER_CONCURRENCY";
    const ENV_EVENT_BUFFER: &'static str = "GENIE_EVENT_BUFFER";
    const ENV_AUTO_APPLY_BUCKETS: &'static str = "GENIE_AUTO_APPLY_BUCKETS";

    /// Every variable [`Config::from_env`] reads.
    pub const ENV_VARS: [&'static str; 25] = [
        Self::ENV_PORT,
        Self::ENV_BIND_ADDR,
        Self::ENV_DATA_PATH,
        Self::ENV_QDRANT_URL,
        Self::ENV_REGISTRY_URL,
        Self::ENV_DRAFT_STORE_URL,
        Self::ENV_MODEL,
        Self::ENV_MIN_RULE_FREQUENCY,
        Self::ENV_MAX_NGRAM,
        Self::ENV_MAX_PROMPT_RULES,
        Self::ENV_FEW_SHOT_WINDOW,
        Self::ENV_FEW_SHOT_MAX_CHARS,
        Self::ENV_PROMPT_STORAGE,
        Self::ENV_GENERATION_TIMEOUT_SECS,
        Self::ENV_MAX_COMPLETION_TOKENS,
        Self::ENV_BACKEND_CONTEXT_TOKENS,
        Self::ENV_COLD_START_TOP_K,
        Self::ENV_WEIGHT_WER,
        Self::ENV_WEIGHT_SIMILARITY,
        Self::ENV_WEIGHT_SER,
        Self::ENV_BUCKET_BANDS,
        Self::ENV_EMBEDDING_DIM,
        Self::ENV_WORKER_CONCURRENCY,
        Self::ENV_EVENT_BUFFER,
        Self::ENV_AUTO_APPLY_BUCKETS,
    ];

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let d_builder = defaults.builder;
        let d_orch = &defaults.orchestrator;
        let d_weights = defaults.evaluation.weights;

        let builder = BuilderConfig {
            min_frequency: Self::parse_from_env(
                Self::ENV_MIN_RULE_FREQUENCY,
                d_builder.min_frequency,
            )?,
            max_ngram: Self::parse_from_env(Self::ENV_MAX_NGRAM, d_builder.max_ngram)?,
        };

        let timeout_secs = Self::parse_from_env(
            Self::ENV_GENERATION_TIMEOUT_SECS,
            d_orch.generation_timeout.as_secs(),
        )?;
        let orchestrator = OrchestratorConfig {
            max_prompt_rules: Self::parse_from_env(
                Self::ENV_MAX_PROMPT_RULES,
                d_orch.max_prompt_rules,
            )?,
            few_shot_window: Self::parse_from_env(
                Self::ENV_FEW_SHOT_WINDOW,
                d_orch.few_shot_window,
            )?,
            few_shot_max_chars: Self::parse_from_env(
                Self::ENV_FEW_SHOT_MAX_CHARS,
                d_orch.few_shot_max_chars,
            )?,
            generation_timeout: Duration::from_secs(timeout_secs),
            max_completion_tokens: Self::parse_from_env(
                Self::ENV_MAX_COMPLETION_TOKENS,
                d_orch.max_completion_tokens,
            )?,
            backend_context_tokens: Self::parse_from_env(
                Self::ENV_BACKEND_CONTEXT_TOKENS,
                d_orch.backend_context_tokens,
            )?,
            cold_start_top_k: Self::parse_from_env(
                Self::ENV_COLD_START_TOP_K,
                d_orch.cold_start_top_k,
            )?,
            prompt_storage: Self::parse_prompt_storage_from_env(d_orch.prompt_storage)?,
        };

        let evaluation = EvaluationConfig {
            weights: QualityWeights {
                wer: Self::parse_from_env(Self::ENV_WEIGHT_WER, d_weights.wer)?,
                similarity: Self::parse_from_env(
                    Self::ENV_WEIGHT_SIMILARITY,
                    d_weights.similarity,
                )?,
                ser: Self::parse_from_env(Self::ENV_WEIGHT_SER, d_weights.ser)?,
            },
            bands: Self::parse_bands_from_env(defaults.evaluation.bands)?,
        };

        Ok(Self {
            port: Self::parse_port_from_env(defaults.port)?,
            bind_addr: Self::parse_bind_addr_from_env(defaults.bind_addr)?,
            data_path: Self::parse_path_from_env(Self::ENV_DATA_PATH, defaults.data_path),
            qdrant_url: Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url),
            registry_url: Self::parse_optional_string_from_env(Self::ENV_REGISTRY_URL),
            draft_store_url: Self::parse_optional_string_from_env(Self::ENV_DRAFT_STORE_URL),
            model: Self::parse_string_from_env(Self::ENV_MODEL, defaults.model),
            builder,
            orchestrator,
            evaluation,
            embedding_dim: Self::parse_from_env(Self::ENV_EMBEDDING_DIM, defaults.embedding_dim)?,
            worker_concurrency: Self::parse_from_env(
                Self::ENV_WORKER_CONCURRENCY,
                defaults.worker_concurrency,
            )?,
            event_buffer: Self::parse_from_env(Self::ENV_EVENT_BUFFER, defaults.event_buffer)?,
            auto_apply_buckets: Self::parse_bool_from_env(
                Self::ENV_AUTO_APPLY_BUCKETS,
                defaults.auto_apply_buckets,
            )?,
        })
    }

    /// Checks invariants the pipeline relies on (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_path.exists() && !self.data_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.data_path.clone(),
            });
        }

        Self::require(
            self.builder.min_frequency >= 1,
            Self::ENV_MIN_RULE_FREQUENCY,
            "must be at least 1",
        )?;
        Self::require(
            self.builder.max_ngram >= 1,
            Self::ENV_MAX_NGRAM,
            "must be at least 1",
        )?;
        Self::require(
            self.embedding_dim > 0,
            Self::ENV_EMBEDDING_DIM,
            "must be greater than 0",
        )?;
        Self::require(
            self.worker_concurrency > 0,
            Self::ENV_WORKER_CONCURRENCY,
            "must be greater than 0",
        )?;
        Self::require(
            self.event_buffer > 0,
            Self::ENV_EVENT_BUFFER,
            "must be greater than 0",
        )?;
        Self::require(
            !self.orchestrator.generation_timeout.is_zero(),
            Self::ENV_GENERATION_TIMEOUT_SECS,
            "must be greater than 0",
        )?;
        Self::require(
            self.orchestrator.cold_start_top_k > 0,
            Self::ENV_COLD_START_TOP_K,
            "must be greater than 0",
        )?;

        self.evaluation
            .bands
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                name: Self::ENV_BUCKET_BANDS,
                reason: e.to_string(),
            })?;
        self.evaluation
            .weights
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                name: "GENIE_WEIGHT_*",
                reason: e.to_string(),
            })?;

        let required = self.worst_case_prompt_tokens();
        let available = self.orchestrator.backend_context_tokens as usize;
        if required > available {
            return Err(ConfigError::PromptBudgetExceeded {
                required,
                available,
            });
        }

        Ok(())
    }

    /// Worst-case prompt plus completion tokens for the configured limits.
    pub fn worst_case_prompt_tokens(&self) -> usize {
        let o = &self.orchestrator;
        worst_case_context_tokens(o.max_prompt_rules, o.few_shot_window, o.few_shot_max_chars)
            + SOURCE_DRAFT_TOKEN_RESERVE
            + o.max_completion_tokens as usize
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn require(ok: bool, name: &'static str, reason: &str) -> Result<(), ConfigError> {
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue {
                name,
                reason: reason.to_string(),
            })
        }
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_prompt_storage_from_env(
        default: PromptStorage,
    ) -> Result<PromptStorage, ConfigError> {
        match env::var(Self::ENV_PROMPT_STORAGE) {
            Ok(value) => value.parse().map_err(|reason| ConfigError::InvalidValue {
                name: Self::ENV_PROMPT_STORAGE,
                reason,
            }),
            Err(_) => Ok(default),
        }
    }

    fn parse_bands_from_env(default: BucketBands) -> Result<BucketBands, ConfigError> {
        match env::var(Self::ENV_BUCKET_BANDS) {
            Ok(value) => BucketBands::parse(&value).map_err(|e| ConfigError::InvalidValue {
                name: Self::ENV_BUCKET_BANDS,
                reason: e.to_string(),
            }),
            Err(_) => Ok(default),
        }
    }

    fn parse_bool_from_env(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match env::var(var_name) {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    name: var_name,
                    reason: format!("'{value}' is not a boolean"),
                }),
            },
            Err(_) => Ok(default),
        }
    }

    /// Parses a set variable strictly; a malformed value is an error, not a fallback.
    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    name: var_name,
                    reason: format!("'{value}': {e}"),
                }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }
}
