//! Prompt construction for the structured extraction and clustering calls.
//!
//! System prompts are assembled from an ordered list of module descriptors
//! held in a `PromptProfile`, so deployments can reorder, drop, or extend
//! instruction blocks through configuration instead of special-casing call
//! sites.

use serde::{Deserialize, Serialize};

/// One instruction block of a system prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptModule {
    pub heading: String,
    pub body: String,
}

impl PromptModule {
    pub fn new(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
        }
    }
}

/// Ordered list of prompt modules rendered into one system prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptProfile {
    pub modules: Vec<PromptModule>,
}

impl PromptProfile {
    pub fn new(modules: Vec<PromptModule>) -> Self {
        Self { modules }
    }

    /// Render the profile into a single system prompt string.
    pub fn render(&self) -> String {
        self.modules
            .iter()
            .map(|m| format!("## {}\n{}", m.heading, m.body))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Default profile for the `ExtractOutline` call.
    pub fn outline() -> Self {
        Self::new(vec![
            PromptModule::new(
                "Task",
                "You are analyzing training material. Extract the hierarchical \
                 section outline of the document below. The text contains page \
                 markers; use them to determine where each section starts and ends.",
            ),
            PromptModule::new(
                "Output",
                r#"Respond with JSON only, matching:
{"sections": [{"title": "...", "level": 0, "start_page": 1, "end_page": 3, "subsections": [...]}]}
Omit end_page when a section runs to the end of the document. Level 0 is the top level."#,
            ),
        ])
    }

    /// Default profile for the per-slide `ExtractConcepts` call.
    pub fn concepts() -> Self {
        Self::new(vec![
            PromptModule::new(
                "Task",
                "Extract the distinct technical concepts taught on this single \
                 slide. For each concept give a short description and a salience \
                 score between 0 and 1 indicating how central it is to the slide.",
            ),
            PromptModule::new(
                "Output",
                r#"Respond with JSON only, matching:
{"concepts": [{"name": "...", "description": "...", "salience": 0.8}]}
Return at most 8 concepts. Use the most specific standard name for each concept."#,
            ),
        ])
    }

    /// Default profile for the `ClusterConcepts` call.
    ///
    /// The instruction is strict-synonym-only: the harmonizer optimizes for
    /// precision over recall, so related-but-distinct concepts must never be
    /// grouped.
    pub fn clustering() -> Self {
        Self::new(vec![
            PromptModule::new(
                "Task",
                "You are given a vocabulary of technical concept names extracted \
                 from many documents. Group ONLY names that refer to the same \
                 real-world thing under different wording, acronym, spelling, or \
                 typo (e.g. 'E-Stop' and 'Emergency Halt'). Never group concepts \
                 that are merely related or belong to the same domain. A name \
                 with no true synonym in the list must not appear in any cluster.",
            ),
            PromptModule::new(
                "Output",
                r#"Respond with JSON only, matching:
{"clusters": [{"canonical_name": "...", "description": "...", "source_concepts": ["...", "..."]}]}
Every source_concepts entry must be copied verbatim from the input list."#,
            ),
        ])
    }
}

/// User prompt for an outline extraction call over one chunk.
pub fn outline_user_prompt(chunk_text: &str) -> String {
    format!("Document text:\n\n{}", chunk_text)
}

/// User prompt for a per-slide concept extraction call.
pub fn concepts_user_prompt(slide_text: &str) -> String {
    format!("Slide content:\n\n{}", slide_text)
}

/// User prompt for a clustering call over a batch of concept names.
pub fn clustering_user_prompt(names: &[String]) -> String {
    let list = serde_json::to_string_pretty(names).unwrap_or_else(|_| format!("{:?}", names));
    format!("Concept names:\n\n{}", list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_preserves_module_order() {
        let profile = PromptProfile::new(vec![
            PromptModule::new("First", "a"),
            PromptModule::new("Second", "b"),
        ]);
        let rendered = profile.render();
        let first = rendered.find("## First").unwrap();
        let second = rendered.find("## Second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_clustering_profile_is_strict_synonym_only() {
        let rendered = PromptProfile::clustering().render();
        assert!(rendered.contains("ONLY"));
        assert!(rendered.contains("Never group"));
        assert!(rendered.contains("must not appear in any cluster"));
    }

    #[test]
    fn test_clustering_user_prompt_contains_all_names() {
        let names = vec!["E-Stop".to_string(), "Branch".to_string()];
        let prompt = clustering_user_prompt(&names);
        assert!(prompt.contains("E-Stop"));
        assert!(prompt.contains("Branch"));
    }

    #[test]
    fn test_outline_profile_mentions_page_numbers() {
        let rendered = PromptProfile::outline().render();
        assert!(rendered.contains("start_page"));
        assert!(rendered.contains("page markers"));
    }
}
