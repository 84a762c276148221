//! Structured logging field name constants for coursegraph.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, unit skipped or fallback applied |
//! | INFO  | Lifecycle events, per-course/per-run completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (chunks, slides, cluster members) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "inference", "db", "pipeline"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "ollama", "outline", "concepts", "linker", "harmonizer"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "ingest_course", "extract_outline", "roll_up", "cluster_batch"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Course id being operated on.
pub const COURSE_ID: &str = "course_id";

/// Slide id being operated on.
pub const SLIDE_ID: &str = "slide_id";

/// Section id being operated on.
pub const SECTION_ID: &str = "section_id";

/// Concept name (the natural merge key).
pub const CONCEPT: &str = "concept";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of chunks a document was split into.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Number of concepts extracted or harmonized.
pub const CONCEPT_COUNT: &str = "concept_count";

/// Number of clustering batches in a harmonization run.
pub const BATCH_COUNT: &str = "batch_count";

/// Number of clusters produced.
pub const CLUSTER_COUNT: &str = "cluster_count";

/// Byte length of a prompt or response.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
