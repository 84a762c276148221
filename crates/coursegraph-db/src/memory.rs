//! In-memory graph store and collaborator test doubles.
//!
//! `MemoryGraphStore` implements the full `GraphStore` trait over keyed
//! maps and sets, giving the same merge-on-key upsert semantics as the
//! PostgreSQL store. It backs the pipeline integration tests and small
//! embedded deployments that do not want a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use coursegraph_core::{
    Coverage, CourseMeta, Error, GraphStore, PageElement, Result, Section, SemanticIndex,
    SlideRecord,
};
use coursegraph_core::ArtifactStore;

#[derive(Debug, Default)]
struct GraphState {
    courses: BTreeMap<String, CourseMeta>,
    sections: BTreeMap<String, Section>,
    slides: BTreeMap<String, SlideRecord>,
    /// name → description
    concepts: BTreeMap<String, String>,
    /// name → description
    canonical: BTreeMap<String, String>,
    /// (slide_id, concept) → salience
    teaches: BTreeMap<(String, String), f32>,
    /// (section_id, slide_id)
    section_slides: BTreeSet<(String, String)>,
    /// (section_id, concept) → coverage
    covers: BTreeMap<(String, String), Coverage>,
    /// (concept, canonical)
    aligns: BTreeSet<(String, String)>,
}

/// In-memory implementation of `GraphStore`.
#[derive(Default)]
pub struct MemoryGraphStore {
    state: Mutex<GraphState>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct canonical concept nodes. Test/inspection helper.
    pub fn canonical_count(&self) -> usize {
        self.state.lock().expect("graph state lock").canonical.len()
    }

    /// All `ALIGNS_TO` edges as (concept, canonical) pairs.
    pub fn alignment_edges(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .expect("graph state lock")
            .aligns
            .iter()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn upsert_course(&self, meta: &CourseMeta) -> Result<()> {
        let mut state = self.state.lock().expect("graph state lock");
        state.courses.insert(meta.id.clone(), meta.clone());
        Ok(())
    }

    async fn upsert_section(&self, section: &Section) -> Result<()> {
        section.validate()?;
        let mut state = self.state.lock().expect("graph state lock");
        if !state.courses.contains_key(&section.course_id) {
            return Err(Error::CourseNotFound(section.course_id.clone()));
        }
        // Preserve the derived summary on structural re-upserts, matching
        // the SQL store where pass 1 never touches concept_summary.
        let summary = state
            .sections
            .get(&section.id)
            .map(|s| s.concept_summary.clone())
            .unwrap_or_default();
        let mut section = section.clone();
        section.concept_summary = summary;
        state.sections.insert(section.id.clone(), section);
        Ok(())
    }

    async fn upsert_slide(&self, slide: &SlideRecord) -> Result<()> {
        let mut state = self.state.lock().expect("graph state lock");
        if !state.courses.contains_key(&slide.course_id) {
            return Err(Error::CourseNotFound(slide.course_id.clone()));
        }
        state.slides.insert(slide.id.clone(), slide.clone());
        Ok(())
    }

    async fn upsert_concept(&self, name: &str, description: &str) -> Result<()> {
        let mut state = self.state.lock().expect("graph state lock");
        state
            .concepts
            .insert(name.to_string(), description.to_string());
        Ok(())
    }

    async fn upsert_teaches(&self, slide_id: &str, concept: &str, salience: f32) -> Result<()> {
        let mut state = self.state.lock().expect("graph state lock");
        state
            .teaches
            .insert((slide_id.to_string(), concept.to_string()), salience);
        Ok(())
    }

    async fn attach_slide_to_section(&self, section_id: &str, slide_id: &str) -> Result<()> {
        let mut state = self.state.lock().expect("graph state lock");
        state
            .section_slides
            .insert((section_id.to_string(), slide_id.to_string()));
        Ok(())
    }

    async fn upsert_covers(
        &self,
        section_id: &str,
        concept: &str,
        coverage: Coverage,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("graph state lock");
        state
            .covers
            .insert((section_id.to_string(), concept.to_string()), coverage);
        Ok(())
    }

    async fn set_concept_summary(&self, section_id: &str, names: &[String]) -> Result<()> {
        let mut state = self.state.lock().expect("graph state lock");
        match state.sections.get_mut(section_id) {
            Some(section) => {
                section.concept_summary = names.to_vec();
                Ok(())
            }
            None => Err(Error::NotFound(format!("section {}", section_id))),
        }
    }

    async fn sections_for_course(&self, course_id: &str) -> Result<Vec<Section>> {
        let state = self.state.lock().expect("graph state lock");
        Ok(state
            .sections
            .values()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn slides_for_course(&self, course_id: &str) -> Result<Vec<SlideRecord>> {
        let state = self.state.lock().expect("graph state lock");
        let mut slides: Vec<SlideRecord> = state
            .slides
            .values()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect();
        slides.sort_by_key(|s| s.page_number);
        Ok(slides)
    }

    async fn teaches_for_slide(&self, slide_id: &str) -> Result<Vec<(String, f32)>> {
        let state = self.state.lock().expect("graph state lock");
        Ok(state
            .teaches
            .iter()
            .filter(|((sid, _), _)| sid == slide_id)
            .map(|((_, concept), salience)| (concept.clone(), *salience))
            .collect())
    }

    async fn covers_for_section(&self, section_id: &str) -> Result<Vec<(String, Coverage)>> {
        let state = self.state.lock().expect("graph state lock");
        Ok(state
            .covers
            .iter()
            .filter(|((sid, _), _)| sid == section_id)
            .map(|((_, concept), coverage)| (concept.clone(), *coverage))
            .collect())
    }

    async fn concept_names(&self) -> Result<Vec<String>> {
        let state = self.state.lock().expect("graph state lock");
        Ok(state.concepts.keys().cloned().collect())
    }

    async fn unaligned_concept_count(&self) -> Result<u64> {
        let state = self.state.lock().expect("graph state lock");
        let aligned: BTreeSet<&String> = state.aligns.iter().map(|(c, _)| c).collect();
        Ok(state
            .concepts
            .keys()
            .filter(|name| !aligned.contains(name))
            .count() as u64)
    }

    async fn upsert_canonical_concept(&self, name: &str, description: &str) -> Result<()> {
        let mut state = self.state.lock().expect("graph state lock");
        state
            .canonical
            .insert(name.to_string(), description.to_string());
        Ok(())
    }

    async fn upsert_aligns_to(&self, concept: &str, canonical: &str) -> Result<()> {
        let mut state = self.state.lock().expect("graph state lock");
        if !state.canonical.contains_key(canonical) {
            return Err(Error::Graph(format!(
                "ALIGNS_TO target missing: {}",
                canonical
            )));
        }
        state
            .aligns
            .insert((concept.to_string(), canonical.to_string()));
        Ok(())
    }

    async fn alignments_for_concept(&self, concept: &str) -> Result<Vec<String>> {
        let state = self.state.lock().expect("graph state lock");
        Ok(state
            .aligns
            .iter()
            .filter(|(c, _)| c == concept)
            .map(|(_, canonical)| canonical.clone())
            .collect())
    }
}

/// In-memory semantic index double. Records upserts; optionally fails to
/// exercise the pipeline's tolerance for index outages.
#[derive(Default)]
pub struct MemorySemanticIndex {
    entries: Mutex<HashMap<String, (String, String)>>,
    failing: bool,
}

impl MemorySemanticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index that errors on every upsert.
    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            failing: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("index lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SemanticIndex for MemorySemanticIndex {
    async fn upsert_slide(&self, course_id: &str, slide_id: &str, text: &str) -> Result<()> {
        if self.failing {
            return Err(Error::Request("semantic index unavailable".to_string()));
        }
        self.entries.lock().expect("index lock").insert(
            slide_id.to_string(),
            (course_id.to_string(), text.to_string()),
        );
        Ok(())
    }
}

/// In-memory artifact store double keyed by course id.
#[derive(Default)]
pub struct MemoryArtifactStore {
    pages: Mutex<HashMap<String, Vec<PageElement>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the extracted elements for a course's artifact.
    pub fn insert(&self, course_id: impl Into<String>, elements: Vec<PageElement>) {
        self.pages
            .lock()
            .expect("artifact lock")
            .insert(course_id.into(), elements);
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn fetch_page_elements(&self, course_id: &str) -> Result<Vec<PageElement>> {
        self.pages
            .lock()
            .expect("artifact lock")
            .get(course_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("artifact payload for {}", course_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_course() -> CourseMeta {
        CourseMeta::new("crs_1", "Hydraulics 101")
    }

    fn sample_section(id: &str, start: u32, end: Option<u32>) -> Section {
        Section {
            id: id.to_string(),
            course_id: "crs_1".to_string(),
            title: "Basics".to_string(),
            level: 0,
            parent_id: "crs_1".to_string(),
            start_page: start,
            end_page: end,
            concept_summary: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_course_upsert_is_idempotent() {
        let store = MemoryGraphStore::new();
        store.upsert_course(&sample_course()).await.unwrap();
        let mut renamed = sample_course();
        renamed.title = "Hydraulics 102".to_string();
        store.upsert_course(&renamed).await.unwrap();
        let state = store.state.lock().unwrap();
        assert_eq!(state.courses.len(), 1);
        assert_eq!(state.courses["crs_1"].title, "Hydraulics 102");
    }

    #[tokio::test]
    async fn test_section_requires_course() {
        let store = MemoryGraphStore::new();
        let err = store
            .upsert_section(&sample_section("crs_1_s0", 1, None))
            .await;
        assert!(matches!(err, Err(Error::CourseNotFound(_))));
    }

    #[tokio::test]
    async fn test_section_reupsert_preserves_summary() {
        let store = MemoryGraphStore::new();
        store.upsert_course(&sample_course()).await.unwrap();
        let section = sample_section("crs_1_s0", 1, Some(3));
        store.upsert_section(&section).await.unwrap();
        store
            .set_concept_summary("crs_1_s0", &["Pump".to_string()])
            .await
            .unwrap();

        // Structural re-ingestion must not wipe derived data.
        store.upsert_section(&section).await.unwrap();
        let sections = store.sections_for_course("crs_1").await.unwrap();
        assert_eq!(sections[0].concept_summary, vec!["Pump".to_string()]);
    }

    #[tokio::test]
    async fn test_teaches_overwrites_salience() {
        let store = MemoryGraphStore::new();
        store.upsert_concept("Pump", "moves fluid").await.unwrap();
        store.upsert_teaches("crs_1_p1", "Pump", 0.4).await.unwrap();
        store.upsert_teaches("crs_1_p1", "Pump", 0.9).await.unwrap();
        let taught = store.teaches_for_slide("crs_1_p1").await.unwrap();
        assert_eq!(taught, vec![("Pump".to_string(), 0.9)]);
    }

    #[tokio::test]
    async fn test_aligns_to_requires_canonical_and_dedups() {
        let store = MemoryGraphStore::new();
        store.upsert_concept("E-Stop", "").await.unwrap();

        let err = store.upsert_aligns_to("E-Stop", "Emergency Stop").await;
        assert!(matches!(err, Err(Error::Graph(_))));

        store
            .upsert_canonical_concept("Emergency Stop", "halts the machine")
            .await
            .unwrap();
        store.upsert_aligns_to("E-Stop", "Emergency Stop").await.unwrap();
        store.upsert_aligns_to("E-Stop", "Emergency Stop").await.unwrap();
        assert_eq!(store.alignment_edges().len(), 1);
    }

    #[tokio::test]
    async fn test_unaligned_concept_count() {
        let store = MemoryGraphStore::new();
        store.upsert_concept("A", "").await.unwrap();
        store.upsert_concept("B", "").await.unwrap();
        assert_eq!(store.unaligned_concept_count().await.unwrap(), 2);

        store.upsert_canonical_concept("A*", "").await.unwrap();
        store.upsert_aligns_to("A", "A*").await.unwrap();
        assert_eq!(store.unaligned_concept_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_slides_sorted_by_page() {
        let store = MemoryGraphStore::new();
        store.upsert_course(&sample_course()).await.unwrap();
        for page in [3u32, 1, 2] {
            store
                .upsert_slide(&SlideRecord {
                    id: SlideRecord::slide_id("crs_1", page),
                    course_id: "crs_1".to_string(),
                    page_number: page,
                    text: format!("page {}", page),
                    layout: Default::default(),
                    elements: serde_json::Value::Null,
                })
                .await
                .unwrap();
        }
        let slides = store.slides_for_course("crs_1").await.unwrap();
        let pages: Vec<u32> = slides.iter().map(|s| s.page_number).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failing_semantic_index() {
        let index = MemorySemanticIndex::failing();
        assert!(index.upsert_slide("c", "c_p1", "text").await.is_err());
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_artifact_store_missing_course() {
        let store = MemoryArtifactStore::new();
        assert!(matches!(
            store.fetch_page_elements("nope").await,
            Err(Error::NotFound(_))
        ));
    }
}
