//! Named default values shared across all coursegraph crates.
//!
//! Every tunable that appears in more than one place lives here so the
//! config structs, env parsing, and tests agree on a single number.

// ─── Completion context budget ─────────────────────────────────────────────

/// Model context window size in tokens.
pub const CONTEXT_SIZE: usize = 8192;

/// Tokens reserved for prompt scaffolding (system prompt, instructions).
pub const RESERVED_PROMPT_TOKENS: usize = 1500;

/// Tokens reserved for the model response.
pub const RESERVED_RESPONSE_TOKENS: usize = 1500;

/// Conservative chars-per-token estimate used to convert token budgets
/// into character windows without a tokenizer round-trip.
pub const CHARS_PER_TOKEN: usize = 3;

/// Minimum chunk overlap in characters, regardless of window size.
pub const MIN_OVERLAP_CHARS: usize = 1000;

// ─── Ollama backend ────────────────────────────────────────────────────────

/// Default Ollama endpoint.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model.
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Generation slower than this is logged as a slow operation (milliseconds).
pub const SLOW_GEN_MS: u64 = 30_000;

// ─── Extraction ────────────────────────────────────────────────────────────

/// Upper bound on concepts kept per slide.
pub const MAX_CONCEPTS_PER_SLIDE: usize = 8;

// ─── Structural roll-up ────────────────────────────────────────────────────

/// Number of concept names kept in a section's concept_summary cache.
pub const SUMMARY_TOP_N: usize = 10;

/// Coverage score at or above which a concept is a primary topic of a section.
pub const COVERAGE_PRIMARY_MIN: f32 = 0.75;

/// Coverage score at or above which a concept is a secondary topic.
pub const COVERAGE_SECONDARY_MIN: f32 = 0.5;

// ─── Harmonization ─────────────────────────────────────────────────────────

/// Estimated prompt tokens consumed per concept name in a clustering call.
pub const TOKENS_PER_CONCEPT: usize = 15;

/// Floor on the harmonizer batch size.
pub const MIN_HARMONIZE_BATCH: usize = 50;

/// Unaligned-concept count at which a harmonization run is worthwhile.
pub const HARMONIZE_THRESHOLD: u64 = 5;
