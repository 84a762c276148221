//! Outline extraction adapter.
//!
//! Turns raw, page-marked document text into a hierarchical section tree
//! via structured completion calls, chunking the document when it exceeds
//! the context budget and merging the partial outlines afterwards.

use std::sync::Arc;

use tracing::{debug, info, warn};

use coursegraph_core::{chunk_text, CompletionBackend, ContextBudget, Outline, OutlineSection};
use coursegraph_inference::prompts::{outline_user_prompt, PromptProfile};
use coursegraph_inference::decode_outline;

/// Extracts a document outline through the completion service.
pub struct OutlineExtractor {
    backend: Arc<dyn CompletionBackend>,
    budget: ContextBudget,
    profile: PromptProfile,
}

impl OutlineExtractor {
    pub fn new(backend: Arc<dyn CompletionBackend>, budget: ContextBudget) -> Self {
        Self {
            backend,
            budget,
            profile: PromptProfile::outline(),
        }
    }

    /// Override the default prompt profile.
    pub fn with_profile(mut self, profile: PromptProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Extract the outline for a full document.
    ///
    /// Per-chunk extraction failures are logged and that chunk's partial
    /// outline is omitted from the merge; if every chunk fails the result
    /// is an empty outline and the caller proceeds without a section tree.
    pub async fn extract(&self, document_text: &str) -> Outline {
        let chunks = chunk_text(&self.budget, document_text);
        let system = self.profile.render();

        if chunks.len() == 1 {
            debug!(
                subsystem = "pipeline",
                component = "outline",
                "Document fits in context ({} chars)",
                document_text.len()
            );
            return match self.extract_chunk(&system, &chunks[0].text).await {
                Some(outline) => outline,
                None => Outline::default(),
            };
        }

        info!(
            subsystem = "pipeline",
            component = "outline",
            chunk_count = chunks.len(),
            "Document exceeds context, extracting per chunk"
        );

        let mut partials = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            debug!(
                chunk_index = i,
                start_offset = chunk.start_offset,
                "Extracting outline chunk"
            );
            match self.extract_chunk(&system, &chunk.text).await {
                Some(outline) => partials.push(outline),
                None => warn!(
                    subsystem = "pipeline",
                    component = "outline",
                    chunk_index = i,
                    "Outline chunk failed, omitting from merge"
                ),
            }
        }

        merge_partial_outlines(partials)
    }

    async fn extract_chunk(&self, system: &str, text: &str) -> Option<Outline> {
        let raw = match self
            .backend
            .complete_json(system, &outline_user_prompt(text))
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "outline",
                    error = %e,
                    "Outline completion call failed"
                );
                return None;
            }
        };
        match decode_outline(&raw) {
            Ok(outline) => Some(outline),
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "outline",
                    error = %e,
                    "Outline response undecodable"
                );
                None
            }
        }
    }
}

/// Merge partial outlines from overlapping chunks into one.
///
/// Sections are deduplicated by start_page — not by title, since titles are
/// neither unique nor stable across chunk boundaries — then sorted by
/// start_page ascending. Sections without a start_page are kept as-is.
pub fn merge_partial_outlines(partials: Vec<Outline>) -> Outline {
    if partials.len() <= 1 {
        return partials.into_iter().next().unwrap_or_default();
    }

    let mut seen_pages = std::collections::BTreeSet::new();
    let mut sections: Vec<OutlineSection> = Vec::new();

    for outline in partials {
        for section in outline.sections {
            if let Some(start) = section.start_page {
                if !seen_pages.insert(start) {
                    continue;
                }
            }
            sections.push(section);
        }
    }

    sections.sort_by_key(|s| s.start_page.unwrap_or(0));

    debug!(
        subsystem = "pipeline",
        component = "outline",
        section_count = sections.len(),
        "Merged partial outlines"
    );
    Outline { sections }
}
