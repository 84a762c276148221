//! LLM extraction adapters: outline and per-slide concepts.

pub mod concepts;
pub mod outline;

pub use concepts::{format_slide_text, ConceptExtractor};
pub use outline::{merge_partial_outlines, OutlineExtractor};
