//! Pass 2: structural linking and coverage aggregation.
//!
//! Runs after a course's pass-1 graph exists. Reads sections and slides
//! back from the graph, attaches each slide to every section whose page
//! range contains it, and rolls per-slide `TEACHES` salience up into
//! per-section `COVERS` coverage plus a cached top-N concept summary.
//! Pure graph-to-graph: no completion calls.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use coursegraph_core::defaults::SUMMARY_TOP_N;
use coursegraph_core::{Coverage, GraphStore, Result};

/// Summary of one pass-2 run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkReport {
    pub course_id: String,
    pub sections: usize,
    /// Section→slide attachments written.
    pub attachments: usize,
    /// Section→concept coverage edges written.
    pub covers: usize,
}

/// Pass-2 linker, re-runnable at any time for a course.
pub struct StructuralLinker {
    store: Arc<dyn GraphStore>,
    summary_top_n: usize,
}

impl StructuralLinker {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            summary_top_n: SUMMARY_TOP_N,
        }
    }

    /// Override the size of the cached per-section concept summary.
    pub fn with_summary_top_n(mut self, top_n: usize) -> Self {
        self.summary_top_n = top_n;
        self
    }

    /// Link slides into sections and aggregate coverage for one course.
    ///
    /// Overlapping section ranges each claim the slide independently; no
    /// tie-break is applied.
    pub async fn run(&self, course_id: &str) -> Result<LinkReport> {
        let start = Instant::now();
        let sections = self.store.sections_for_course(course_id).await?;
        let slides = self.store.slides_for_course(course_id).await?;

        // One TEACHES read per slide, shared across all sections.
        let mut teaches: BTreeMap<String, Vec<(String, f32)>> = BTreeMap::new();
        for slide in &slides {
            teaches.insert(slide.id.clone(), self.store.teaches_for_slide(&slide.id).await?);
        }

        let mut attachments = 0usize;
        let mut covers = 0usize;

        for section in &sections {
            // (sum, count) per concept over the section's slides.
            let mut rollup: BTreeMap<&str, (f32, u32)> = BTreeMap::new();

            for slide in &slides {
                if !section.contains_page(slide.page_number) {
                    continue;
                }
                self.store
                    .attach_slide_to_section(&section.id, &slide.id)
                    .await?;
                attachments += 1;

                if let Some(pairs) = teaches.get(&slide.id) {
                    for (concept, salience) in pairs {
                        let entry = rollup.entry(concept.as_str()).or_insert((0.0, 0));
                        entry.0 += salience;
                        entry.1 += 1;
                    }
                }
            }

            let mut scored: Vec<(&str, Coverage)> = rollup
                .into_iter()
                .map(|(concept, (sum, count))| {
                    (
                        concept,
                        Coverage {
                            score: sum / count as f32,
                            frequency: count,
                        },
                    )
                })
                .collect();

            for (concept, coverage) in &scored {
                self.store
                    .upsert_covers(&section.id, concept, *coverage)
                    .await?;
                covers += 1;
            }

            // Top-N by score desc, name asc for determinism on ties.
            scored.sort_by(|a, b| {
                b.1.score
                    .partial_cmp(&a.1.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(b.0))
            });
            let summary: Vec<String> = scored
                .iter()
                .take(self.summary_top_n)
                .map(|(concept, _)| concept.to_string())
                .collect();
            self.store.set_concept_summary(&section.id, &summary).await?;
        }

        let report = LinkReport {
            course_id: course_id.to_string(),
            sections: sections.len(),
            attachments,
            covers,
        };
        info!(
            subsystem = "pipeline",
            component = "linker",
            op = "run",
            course_id = %course_id,
            sections = report.sections,
            attachments = report.attachments,
            covers = report.covers,
            duration_ms = start.elapsed().as_millis() as u64,
            "Structural linking complete"
        );
        Ok(report)
    }
}
