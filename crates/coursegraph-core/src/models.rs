//! Data model for the course knowledge graph.
//!
//! Node types (Course, Section, Slide, Concept, CanonicalConcept) and the
//! boundary shapes returned by structured completion calls. All LLM-facing
//! structs deserialize tolerantly: optional fields default rather than fail,
//! and numeric ranges are normalized after parsing, so a sloppy model
//! response degrades into a partial result instead of a decode error.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// COURSE
// =============================================================================

/// One ingested document. Root of the structural tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseMeta {
    /// Stable id derived from the source artifact.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub business_unit: Option<String>,
    #[serde(default)]
    pub discipline: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

impl CourseMeta {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            business_unit: None,
            discipline: None,
            level: None,
            duration: None,
        }
    }
}

// =============================================================================
// OUTLINE (LLM boundary shape)
// =============================================================================

/// One node of the hierarchical outline as returned by the completion
/// service. Page numbers and level are frequently omitted by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutlineSection {
    pub title: String,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub start_page: Option<u32>,
    #[serde(default)]
    pub end_page: Option<u32>,
    #[serde(default)]
    pub subsections: Vec<OutlineSection>,
}

/// Hierarchical section list for one document (or one chunk of it).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Outline {
    #[serde(default)]
    pub sections: Vec<OutlineSection>,
}

impl Outline {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Flatten the tree into persistable sections with deterministic
    /// path-based ids (`{parent_id}_s{index}`). Re-ingesting the same
    /// document therefore produces identical ids and idempotent merges.
    pub fn flatten(&self, course_id: &str) -> Vec<Section> {
        let mut out = Vec::new();
        flatten_into(&self.sections, course_id, course_id, 0, &mut out);
        out
    }
}

fn flatten_into(
    nodes: &[OutlineSection],
    course_id: &str,
    parent_id: &str,
    depth: u32,
    out: &mut Vec<Section>,
) {
    for (i, node) in nodes.iter().enumerate() {
        let id = format!("{}_s{}", parent_id, i);
        out.push(Section {
            id: id.clone(),
            course_id: course_id.to_string(),
            title: node.title.trim().to_string(),
            level: node.level.unwrap_or(depth),
            parent_id: parent_id.to_string(),
            start_page: node.start_page.unwrap_or(0),
            end_page: node.end_page,
            concept_summary: Vec::new(),
        });
        flatten_into(&node.subsections, course_id, &id, depth + 1, out);
    }
}

// =============================================================================
// SECTION
// =============================================================================

/// A node in the course outline tree, keyed by its deterministic path id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub id: String,
    pub course_id: String,
    pub title: String,
    /// Nesting level, 0 = top.
    pub level: u32,
    /// Parent section id, or the course id for top-level sections.
    pub parent_id: String,
    pub start_page: u32,
    /// None = open-ended to the end of the document.
    pub end_page: Option<u32>,
    /// Derived top-N concept cache, recomputed by the structural linker.
    #[serde(default)]
    pub concept_summary: Vec<String>,
}

impl Section {
    /// Validate the page-range invariant.
    pub fn validate(&self) -> Result<()> {
        if let Some(end) = self.end_page {
            if end < self.start_page {
                return Err(Error::InvalidInput(format!(
                    "section {}: end_page {} < start_page {}",
                    self.id, end, self.start_page
                )));
            }
        }
        Ok(())
    }

    /// True when `page` falls inside this section's page range.
    pub fn contains_page(&self, page: u32) -> bool {
        page >= self.start_page && self.end_page.map_or(true, |end| page <= end)
    }
}

// =============================================================================
// SLIDE
// =============================================================================

/// Layout archetype detected for a slide.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlideLayout {
    /// Title/slogan slide: no embedded artifacts, little text.
    Hero,
    /// Text-dominated slide.
    Documentary,
    /// Text alongside one or two embedded artifacts.
    Split,
    /// One dominant embedded artifact with caption text.
    ContentCaption,
    /// Three or more embedded artifacts.
    Grid,
    /// Contains at least one table.
    Table,
    /// No usable content.
    Blank,
}

impl SlideLayout {
    /// Stable string tag, used for storage columns and logging.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::Documentary => "documentary",
            Self::Split => "split",
            Self::ContentCaption => "content_caption",
            Self::Grid => "grid",
            Self::Table => "table",
            Self::Blank => "blank",
        }
    }

    /// Parse a detector tag, falling back to `Blank` for anything novel.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "hero" => Self::Hero,
            "documentary" => Self::Documentary,
            "split" => Self::Split,
            "content_caption" => Self::ContentCaption,
            "grid" => Self::Grid,
            "table" => Self::Table,
            _ => Self::Blank,
        }
    }
}

impl Default for SlideLayout {
    fn default() -> Self {
        Self::Blank
    }
}

/// One page/slide of raw extracted content. Owned by exactly one course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlideRecord {
    /// `{course_id}_p{page_number}`
    pub id: String,
    pub course_id: String,
    pub page_number: u32,
    pub text: String,
    #[serde(default)]
    pub layout: SlideLayout,
    /// Raw structured element payload from the extraction step.
    #[serde(default)]
    pub elements: JsonValue,
}

impl SlideRecord {
    /// Deterministic slide id for a (course, page) pair.
    pub fn slide_id(course_id: &str, page_number: u32) -> String {
        format!("{}_p{}", course_id, page_number)
    }
}

// =============================================================================
// PAGE ELEMENTS (blob store payload)
// =============================================================================

/// Positional metadata attached to an extracted element.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ElementMetadata {
    #[serde(default)]
    pub page_number: Option<u32>,
}

/// One extracted text element from the per-page payload in the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageElement {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default = "default_element_type")]
    pub element_type: String,
    #[serde(default)]
    pub metadata: ElementMetadata,
}

fn default_element_type() -> String {
    "NarrativeText".to_string()
}

impl PageElement {
    pub fn new(text: impl Into<String>, element_type: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            element_type: element_type.into(),
            metadata: ElementMetadata {
                page_number: Some(page),
            },
        }
    }

    /// Elements missing positional metadata are attributed to page 1.
    pub fn page(&self) -> u32 {
        self.metadata.page_number.unwrap_or(1)
    }
}

// =============================================================================
// CONCEPT
// =============================================================================

/// A name+description pair extracted from slide text. Name is the natural
/// key: the same name anywhere in the corpus collapses to one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Model-assigned importance in [0,1].
    #[serde(default)]
    pub salience: f32,
}

impl ConceptRecord {
    /// Trim the name and clamp salience into [0,1].
    ///
    /// Returns None for concepts with an empty name, which carry no usable
    /// merge key and are dropped at the boundary.
    pub fn normalized(mut self) -> Option<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return None;
        }
        if !(0.0..=1.0).contains(&self.salience) || self.salience.is_nan() {
            tracing::warn!(
                concept = %self.name,
                salience = self.salience,
                "Clamping out-of-range salience"
            );
            self.salience = if self.salience.is_nan() {
                0.0
            } else {
                self.salience.clamp(0.0, 1.0)
            };
        }
        Some(self)
    }
}

/// Envelope for the per-slide concept extraction call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SlideConcepts {
    #[serde(default)]
    pub concepts: Vec<ConceptRecord>,
}

// =============================================================================
// CANONICAL CONCEPTS & CLUSTERS
// =============================================================================

/// Representative name/description standing for a cluster of concept
/// names judged to be true synonyms. Created only by the harmonizer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalConcept {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One synonym group returned by a clustering call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptCluster {
    pub canonical_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_concepts: Vec<String>,
}

/// Envelope for clustering completion calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterSet {
    #[serde(default)]
    pub clusters: Vec<ConceptCluster>,
}

// =============================================================================
// COVERAGE (derived)
// =============================================================================

/// Aggregated concept coverage carried on a `COVERS` edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coverage {
    /// Mean salience over the slides teaching the concept under a section.
    pub score: f32,
    /// Number of slides teaching the concept under a section.
    pub frequency: u32,
}

/// Coarse bucket for presentation, derived from the coverage score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoverageTier {
    Primary,
    Secondary,
    Mention,
}

impl CoverageTier {
    pub fn from_score(score: f32) -> Self {
        if score >= defaults::COVERAGE_PRIMARY_MIN {
            Self::Primary
        } else if score >= defaults::COVERAGE_SECONDARY_MIN {
            Self::Secondary
        } else {
            Self::Mention
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(title: &str, start: u32) -> OutlineSection {
        OutlineSection {
            title: title.to_string(),
            level: None,
            start_page: Some(start),
            end_page: None,
            subsections: Vec::new(),
        }
    }

    #[test]
    fn test_flatten_assigns_path_ids() {
        let outline = Outline {
            sections: vec![
                OutlineSection {
                    title: "Intro".to_string(),
                    level: None,
                    start_page: Some(1),
                    end_page: Some(3),
                    subsections: vec![leaf("Scope", 2)],
                },
                leaf("Safety", 4),
            ],
        };

        let sections = outline.flatten("crs_1");
        let ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["crs_1_s0", "crs_1_s0_s0", "crs_1_s1"]);
        assert_eq!(sections[1].parent_id, "crs_1_s0");
        assert_eq!(sections[1].level, 1);
        assert_eq!(sections[2].parent_id, "crs_1");
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let outline = Outline {
            sections: vec![leaf("A", 1), leaf("B", 5)],
        };
        assert_eq!(outline.flatten("c"), outline.flatten("c"));
    }

    #[test]
    fn test_flatten_defaults_missing_pages_to_zero() {
        let outline = Outline {
            sections: vec![OutlineSection {
                title: "Untracked".to_string(),
                level: None,
                start_page: None,
                end_page: None,
                subsections: Vec::new(),
            }],
        };
        let sections = outline.flatten("c");
        assert_eq!(sections[0].start_page, 0);
        assert_eq!(sections[0].end_page, None);
    }

    #[test]
    fn test_section_validate_rejects_inverted_range() {
        let mut section = Outline {
            sections: vec![leaf("A", 5)],
        }
        .flatten("c")
        .remove(0);
        section.end_page = Some(3);
        assert!(section.validate().is_err());

        section.end_page = Some(5);
        assert!(section.validate().is_ok());
    }

    #[test]
    fn test_contains_page_bounded() {
        let mut section = Outline {
            sections: vec![leaf("A", 2)],
        }
        .flatten("c")
        .remove(0);
        section.end_page = Some(4);

        assert!(!section.contains_page(1));
        assert!(section.contains_page(2));
        assert!(section.contains_page(4));
        assert!(!section.contains_page(5));
    }

    #[test]
    fn test_contains_page_open_ended() {
        let section = Outline {
            sections: vec![leaf("A", 3)],
        }
        .flatten("c")
        .remove(0);

        assert!(!section.contains_page(2));
        assert!(section.contains_page(3));
        assert!(section.contains_page(9999));
    }

    #[test]
    fn test_concept_normalized_clamps_salience() {
        let c = ConceptRecord {
            name: "  E-Stop ".to_string(),
            description: String::new(),
            salience: 1.7,
        };
        let n = c.normalized().unwrap();
        assert_eq!(n.name, "E-Stop");
        assert_eq!(n.salience, 1.0);

        let c = ConceptRecord {
            name: "X".to_string(),
            description: String::new(),
            salience: -0.2,
        };
        assert_eq!(c.normalized().unwrap().salience, 0.0);
    }

    #[test]
    fn test_concept_normalized_drops_empty_name() {
        let c = ConceptRecord {
            name: "   ".to_string(),
            description: "d".to_string(),
            salience: 0.5,
        };
        assert!(c.normalized().is_none());
    }

    #[test]
    fn test_concept_nan_salience_becomes_zero() {
        let c = ConceptRecord {
            name: "X".to_string(),
            description: String::new(),
            salience: f32::NAN,
        };
        assert_eq!(c.normalized().unwrap().salience, 0.0);
    }

    #[test]
    fn test_slide_layout_from_tag() {
        assert_eq!(SlideLayout::from_tag("table"), SlideLayout::Table);
        assert_eq!(SlideLayout::from_tag("Content_Caption"), SlideLayout::ContentCaption);
        assert_eq!(SlideLayout::from_tag("hologram"), SlideLayout::Blank);
    }

    #[test]
    fn test_slide_layout_tag_roundtrip() {
        for layout in [
            SlideLayout::Hero,
            SlideLayout::Documentary,
            SlideLayout::Split,
            SlideLayout::ContentCaption,
            SlideLayout::Grid,
            SlideLayout::Table,
            SlideLayout::Blank,
        ] {
            assert_eq!(SlideLayout::from_tag(layout.as_tag()), layout);
        }
    }

    #[test]
    fn test_slide_id_format() {
        assert_eq!(SlideRecord::slide_id("crs_9", 12), "crs_9_p12");
    }

    #[test]
    fn test_coverage_tier_buckets() {
        assert_eq!(CoverageTier::from_score(0.9), CoverageTier::Primary);
        assert_eq!(CoverageTier::from_score(0.65), CoverageTier::Secondary);
        assert_eq!(CoverageTier::from_score(0.5), CoverageTier::Secondary);
        assert_eq!(CoverageTier::from_score(0.49), CoverageTier::Mention);
    }

    #[test]
    fn test_outline_tolerant_deserialization() {
        // Missing level/end_page/subsections must not fail the decode.
        let raw = r#"{"sections":[{"title":"Intro","start_page":1}]}"#;
        let outline: Outline = serde_json::from_str(raw).unwrap();
        assert_eq!(outline.sections.len(), 1);
        assert_eq!(outline.sections[0].start_page, Some(1));
        assert!(outline.sections[0].subsections.is_empty());
    }

    #[test]
    fn test_page_element_defaults() {
        let raw = r#"{"text":"Hello"}"#;
        let el: PageElement = serde_json::from_str(raw).unwrap();
        assert_eq!(el.element_type, "NarrativeText");
        assert_eq!(el.page(), 1);
    }
}
