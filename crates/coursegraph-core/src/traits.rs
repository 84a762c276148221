//! Core traits for coursegraph abstractions.
//!
//! These traits define the seams between the construction pipeline and its
//! external collaborators (completion service, graph store, semantic index,
//! blob store), enabling pluggable backends and testability. Backends are
//! constructed once and passed by dependency injection; there is no shared
//! global client.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Coverage, CourseMeta, PageElement, Section, SlideRecord};

// =============================================================================
// COMPLETION SERVICE
// =============================================================================

/// A text completion backend (LLM).
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Generate free-form text with system context.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate with JSON output enforcement where the backend supports it.
    ///
    /// The returned string is still untrusted: callers decode it through
    /// the tolerant decode strategies, never directly.
    async fn complete_json(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// GRAPH STORE
// =============================================================================

/// Property-graph store for the course knowledge graph.
///
/// All write operations are idempotent upserts keyed by deterministic
/// ids/names (merge-on-key, set-on-match): repeating any write with the
/// same key overwrites attributes and never duplicates nodes or edges.
/// Writes for disjoint course ids are safe to run concurrently.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ── Pass 1: structural upserts ─────────────────────────────────────

    /// Upsert a Course node with its metadata.
    async fn upsert_course(&self, meta: &CourseMeta) -> Result<()>;

    /// Upsert a Section node and its `HAS_SECTION` edge from its parent.
    async fn upsert_section(&self, section: &Section) -> Result<()>;

    /// Upsert a Slide node and its `HAS_SLIDE` edge from its course.
    async fn upsert_slide(&self, slide: &SlideRecord) -> Result<()>;

    /// Upsert a Concept node keyed by name.
    async fn upsert_concept(&self, name: &str, description: &str) -> Result<()>;

    /// Upsert a `TEACHES` edge (slide → concept) carrying salience.
    /// Overwrites salience on repeat.
    async fn upsert_teaches(&self, slide_id: &str, concept: &str, salience: f32) -> Result<()>;

    // ── Pass 2: derived data ───────────────────────────────────────────

    /// Attach a slide to a section (`HAS_SLIDE` edge from section).
    async fn attach_slide_to_section(&self, section_id: &str, slide_id: &str) -> Result<()>;

    /// Upsert a `COVERS` edge (section → concept) with aggregated coverage.
    async fn upsert_covers(&self, section_id: &str, concept: &str, coverage: Coverage)
        -> Result<()>;

    /// Overwrite a section's cached top-N concept summary.
    async fn set_concept_summary(&self, section_id: &str, names: &[String]) -> Result<()>;

    // ── Reads ──────────────────────────────────────────────────────────

    /// All sections under a course, ordered by id.
    async fn sections_for_course(&self, course_id: &str) -> Result<Vec<Section>>;

    /// All slides of a course, ordered by page number.
    async fn slides_for_course(&self, course_id: &str) -> Result<Vec<SlideRecord>>;

    /// (concept name, salience) pairs taught by a slide.
    async fn teaches_for_slide(&self, slide_id: &str) -> Result<Vec<(String, f32)>>;

    /// (concept name, coverage) pairs covered by a section.
    async fn covers_for_section(&self, section_id: &str) -> Result<Vec<(String, Coverage)>>;

    // ── Harmonization ──────────────────────────────────────────────────

    /// All distinct concept names in the graph.
    async fn concept_names(&self) -> Result<Vec<String>>;

    /// Count of concepts with no `ALIGNS_TO` edge.
    async fn unaligned_concept_count(&self) -> Result<u64>;

    /// Upsert a CanonicalConcept node keyed by name.
    async fn upsert_canonical_concept(&self, name: &str, description: &str) -> Result<()>;

    /// Upsert an `ALIGNS_TO` edge (concept → canonical concept).
    async fn upsert_aligns_to(&self, concept: &str, canonical: &str) -> Result<()>;

    /// Canonical names a concept aligns to. Used for inspection and tests;
    /// more than one entry indicates the documented stale-alignment gap.
    async fn alignments_for_concept(&self, concept: &str) -> Result<Vec<String>>;
}

// =============================================================================
// SEMANTIC INDEX (consumer)
// =============================================================================

/// Downstream vector index fed with slide text for nearest-neighbor search.
///
/// The pipeline is a producer only: failures here are logged and never
/// abort a course run.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Upsert a slide's text keyed by slide id.
    async fn upsert_slide(&self, course_id: &str, slide_id: &str, text: &str) -> Result<()>;
}

// =============================================================================
// ARTIFACT STORE (source)
// =============================================================================

/// Read contract for the blob store holding per-page extraction payloads.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch the raw extracted elements for a course's source artifact.
    async fn fetch_page_elements(&self, course_id: &str) -> Result<Vec<PageElement>>;
}
