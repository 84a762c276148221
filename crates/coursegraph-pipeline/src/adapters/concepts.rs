//! Per-slide concept extraction adapter.

use std::sync::Arc;

use tracing::{trace, warn};

use coursegraph_core::{defaults, CompletionBackend, ConceptRecord, PageElement};
use coursegraph_inference::decode_slide_concepts;
use coursegraph_inference::prompts::{concepts_user_prompt, PromptProfile};

/// Extracts (name, description, salience) concept records from one slide.
pub struct ConceptExtractor {
    backend: Arc<dyn CompletionBackend>,
    profile: PromptProfile,
    max_per_slide: usize,
}

impl ConceptExtractor {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            profile: PromptProfile::concepts(),
            max_per_slide: defaults::MAX_CONCEPTS_PER_SLIDE,
        }
    }

    /// Override the default prompt profile.
    pub fn with_profile(mut self, profile: PromptProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Extract concepts from a slide's formatted text.
    ///
    /// Failures (call or decode) are logged per slide and yield an empty
    /// list; the slide then simply contributes no `TEACHES` edges.
    pub async fn extract(&self, slide_id: &str, slide_text: &str) -> Vec<ConceptRecord> {
        let raw = match self
            .backend
            .complete_json(&self.profile.render(), &concepts_user_prompt(slide_text))
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "concepts",
                    slide_id,
                    error = %e,
                    "Concept extraction call failed, slide contributes no concepts"
                );
                return Vec::new();
            }
        };

        let parsed = match decode_slide_concepts(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "concepts",
                    slide_id,
                    error = %e,
                    "Concept response undecodable, slide contributes no concepts"
                );
                return Vec::new();
            }
        };

        let concepts: Vec<ConceptRecord> = parsed
            .concepts
            .into_iter()
            .filter_map(ConceptRecord::normalized)
            .take(self.max_per_slide)
            .collect();

        trace!(
            subsystem = "pipeline",
            component = "concepts",
            slide_id,
            concept_count = concepts.len(),
            "Extracted slide concepts"
        );
        concepts
    }
}

/// Format a page's elements as type-tagged text for the concept prompt,
/// e.g. `[Title] Hydraulic Principles`. Empty elements are skipped.
pub fn format_slide_text(elements: &[&PageElement]) -> String {
    elements
        .iter()
        .filter(|el| !el.text.trim().is_empty())
        .map(|el| format!("[{}] {}", el.element_type, el.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
