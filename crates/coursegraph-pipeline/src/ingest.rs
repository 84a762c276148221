//! Pass 1: knowledge-graph construction for one course.
//!
//! Takes the per-page extraction payload for a source artifact, extracts
//! the outline and per-slide concepts through the completion service, and
//! idempotently upserts the Course, Section, Slide, and Concept nodes plus
//! their structural and teaching edges. Completion failures degrade to
//! partial results; graph write failures abort the course run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use coursegraph_core::{
    ArtifactStore, CompletionBackend, ContextBudget, CourseMeta, GraphStore, PageElement, Result,
    SemanticIndex, SlideLayout, SlideRecord,
};

use crate::adapters::{format_slide_text, ConceptExtractor, OutlineExtractor};

/// Stable course id derived from the artifact's storage path.
///
/// Re-ingesting the same artifact therefore targets the same graph nodes.
pub fn course_id_for_artifact(artifact_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(artifact_path.as_bytes());
    let digest = hasher.finalize();
    format!("crs_{}", &hex::encode(digest)[..16])
}

/// Detect a slide's layout archetype from its extracted elements.
///
/// Coordinate-free heuristic: the `content_caption` archetype needs element
/// geometry and is only produced by upstream detectors that have it.
pub fn detect_layout(elements: &[&PageElement]) -> SlideLayout {
    let mut tables = 0usize;
    let mut embedded = 0usize;
    let mut text_len = 0usize;

    for el in elements {
        match el.element_type.to_ascii_lowercase().as_str() {
            "table" => tables += 1,
            "image" | "figure" | "picture" => embedded += 1,
            "title" | "narrativetext" | "listitem" | "text" => {
                text_len += el.text.trim().len();
            }
            _ => {}
        }
    }

    if tables == 0 && embedded == 0 && text_len == 0 {
        return SlideLayout::Blank;
    }
    if tables > 0 {
        return SlideLayout::Table;
    }
    if embedded == 0 {
        return if text_len < 200 {
            SlideLayout::Hero
        } else {
            SlideLayout::Documentary
        };
    }
    if embedded >= 3 {
        return SlideLayout::Grid;
    }
    SlideLayout::Split
}

/// Summary of one pass-1 ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    pub course_id: String,
    pub sections: usize,
    pub slides: usize,
    pub concepts: usize,
    /// Slides whose concept extraction failed and contributed no edges.
    pub failed_slides: usize,
}

/// Pass-1 graph writer for course artifacts.
pub struct GraphBuilder {
    backend: Arc<dyn CompletionBackend>,
    store: Arc<dyn GraphStore>,
    artifacts: Arc<dyn ArtifactStore>,
    index: Option<Arc<dyn SemanticIndex>>,
    budget: ContextBudget,
}

impl GraphBuilder {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        store: Arc<dyn GraphStore>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            backend,
            store,
            artifacts,
            index: None,
            budget: ContextBudget::default(),
        }
    }

    /// Feed slide text into a downstream semantic index as well.
    pub fn with_semantic_index(mut self, index: Arc<dyn SemanticIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Override the default context budget.
    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Ingest one course: outline, sections, slides, concepts, edges.
    pub async fn ingest_course(&self, meta: &CourseMeta) -> Result<IngestReport> {
        let start = Instant::now();
        info!(
            subsystem = "pipeline",
            component = "ingest",
            op = "ingest_course",
            course_id = %meta.id,
            "Building knowledge graph"
        );

        let elements = self.artifacts.fetch_page_elements(&meta.id).await?;
        let pages = group_by_page(&elements);
        let full_text = page_marked_text(&pages);

        self.store.upsert_course(meta).await?;

        // Outline → section tree. An empty outline is tolerated: slide and
        // concept processing still proceeds.
        let extractor = OutlineExtractor::new(self.backend.clone(), self.budget);
        let outline = extractor.extract(&full_text).await;
        if outline.is_empty() {
            warn!(
                subsystem = "pipeline",
                component = "ingest",
                course_id = %meta.id,
                "Outline extraction yielded no sections"
            );
        }

        let mut sections = outline.flatten(&meta.id);
        for section in &mut sections {
            if section.validate().is_err() {
                warn!(
                    subsystem = "pipeline",
                    component = "ingest",
                    section_id = %section.id,
                    start_page = section.start_page,
                    end_page = section.end_page,
                    "Model produced inverted page range, treating as open-ended"
                );
                section.end_page = None;
            }
            self.store.upsert_section(section).await?;
        }

        let concept_extractor = ConceptExtractor::new(self.backend.clone());
        let mut slide_count = 0usize;
        let mut concept_count = 0usize;
        let mut failed_slides = 0usize;

        for (page, page_elements) in &pages {
            let slide_text = page_elements
                .iter()
                .map(|el| el.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            if slide_text.is_empty() {
                continue;
            }

            let slide_id = SlideRecord::slide_id(&meta.id, *page);
            let slide = SlideRecord {
                id: slide_id.clone(),
                course_id: meta.id.clone(),
                page_number: *page,
                text: slide_text.clone(),
                layout: detect_layout(page_elements),
                elements: serde_json::to_value(page_elements)?,
            };
            self.store.upsert_slide(&slide).await?;
            slide_count += 1;

            if let Some(index) = &self.index {
                if let Err(e) = index.upsert_slide(&meta.id, &slide_id, &slide_text).await {
                    warn!(
                        subsystem = "pipeline",
                        component = "ingest",
                        slide_id = %slide_id,
                        error = %e,
                        "Semantic index upsert failed, continuing"
                    );
                }
            }

            let formatted = format_slide_text(page_elements);
            let concepts = concept_extractor.extract(&slide_id, &formatted).await;
            if concepts.is_empty() {
                failed_slides += 1;
            }
            for concept in concepts {
                self.store
                    .upsert_concept(&concept.name, &concept.description)
                    .await?;
                self.store
                    .upsert_teaches(&slide_id, &concept.name, concept.salience)
                    .await?;
                concept_count += 1;
            }
        }

        let report = IngestReport {
            course_id: meta.id.clone(),
            sections: sections.len(),
            slides: slide_count,
            concepts: concept_count,
            failed_slides,
        };
        info!(
            subsystem = "pipeline",
            component = "ingest",
            op = "ingest_course",
            course_id = %meta.id,
            sections = report.sections,
            slides = report.slides,
            concept_count = report.concepts,
            duration_ms = start.elapsed().as_millis() as u64,
            "Knowledge graph built"
        );
        Ok(report)
    }
}

/// Group extracted elements by page number, preserving element order.
fn group_by_page(elements: &[PageElement]) -> BTreeMap<u32, Vec<&PageElement>> {
    let mut pages: BTreeMap<u32, Vec<&PageElement>> = BTreeMap::new();
    for el in elements {
        pages.entry(el.page()).or_default().push(el);
    }
    pages
}

/// Reconstruct the full document text with page markers for the outline
/// prompt.
fn page_marked_text(pages: &BTreeMap<u32, Vec<&PageElement>>) -> String {
    pages
        .iter()
        .map(|(page, elements)| {
            let body = elements
                .iter()
                .map(|el| el.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            format!("[Page {}]\n{}", page, body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
