//! # coursegraph-pipeline
//!
//! The two-pass knowledge-graph construction pipeline plus the concept
//! harmonizer. Pass 1 ([`GraphBuilder`]) turns a course artifact's
//! extracted pages into Course/Section/Slide/Concept nodes with `TEACHES`
//! edges; pass 2 ([`StructuralLinker`]) attaches slides to sections and
//! aggregates `COVERS` coverage; the [`Harmonizer`] clusters the full
//! concept vocabulary into canonical concepts with `ALIGNS_TO` edges.

pub mod adapters;
pub mod harmonizer;
pub mod ingest;
pub mod linker;

pub use harmonizer::{HarmonizeReport, Harmonizer, HarmonizerConfig};
pub use ingest::{course_id_for_artifact, detect_layout, GraphBuilder, IngestReport};
pub use linker::{LinkReport, StructuralLinker};
