//! Cross-cutting, shared constants.
//!
//! Runtime values live in [`crate::config::Config`]; these are the defaults it falls
//! back to and the fixed policy values that must not drift between modules.

/// Minimum number of observations before a correction rule is kept.
pub const DEFAULT_MIN_RULE_FREQUENCY: u32 = 2;

/// Longest run of consecutive substitutions merged into a single phrase rule.
pub const DEFAULT_MAX_NGRAM: usize = 3;

/// Number of correction rules placed into a generation prompt.
pub const DEFAULT_MAX_PROMPT_RULES: usize = 20;

/// Number of recent (draft, final note) pairs used as few-shot context.
pub const DEFAULT_FEW_SHOT_WINDOW: usize = 5;

/// Per-text character cap applied to few-shot examples.
pub const DEFAULT_FEW_SHOT_MAX_CHARS: usize = 2_000;

/// Hard bound on the generative backend call.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

/// Completion budget requested from the backend.
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 2_048;

/// Context window assumed for the backend when validating prompt budgets.
pub const DEFAULT_BACKEND_CONTEXT_TOKENS: u32 = 32_768;

/// Candidates requested from the vector index during cold start.
pub const DEFAULT_COLD_START_TOP_K: u64 = 5;

/// Output dimension of the default hashing embedder.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Events processed concurrently by the pipeline worker.
pub const DEFAULT_WORKER_CONCURRENCY: usize = 8;

pub const DEFAULT_WEIGHT_WER: f64 = 0.4;
pub const DEFAULT_WEIGHT_SIMILARITY: f64 = 0.4;
pub const DEFAULT_WEIGHT_SER: f64 = 0.2;

/// Lower score bounds for EXCELLENT, GOOD, AVERAGE and POOR (anything lower is
/// NEEDS_IMPROVEMENT).
pub const DEFAULT_BUCKET_BANDS: [f64; 4] = [90.0, 75.0, 55.0, 35.0];

/// Rough characters-per-token ratio used for prompt budget estimates.
pub const CHARS_PER_TOKEN: usize = 4;

/// Token estimate for a single rendered correction rule line.
pub const RULE_LINE_TOKEN_ESTIMATE: usize = 24;

/// Token estimate for the fixed instruction block and section headers.
pub const PROMPT_OVERHEAD_TOKENS: usize = 512;

/// Qdrant collection holding speaker correction-vector embeddings.
pub const CORRECTION_VECTOR_COLLECTION: &str = "speaker_correction_vectors";

/// Identifier recorded on vectors built with [`crate::embedding::HashingEmbedder`].
pub const HASHING_EMBEDDER_MODEL_ID: &str = "genie-hash-v1";

/// Tokens reserved for the source draft when validating the prompt budget at startup.
pub const SOURCE_DRAFT_TOKEN_RESERVE: usize = 4_096;

/// Upper bound on attempt ordinals tried when a direct generation races another.
pub const MAX_ATTEMPT_PROBES: usize = 16;

/// Default `genai` model for note generation.
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";

/// Buffered events on the in-process bus before publishers wait.
pub const DEFAULT_EVENT_BUFFER: usize = 1_024;
