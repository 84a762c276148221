//! Tolerant decoding of structured completion output.
//!
//! Model responses may arrive wrapped in markdown code fences, or as a bare
//! JSON list where an object envelope was requested. Each expected shape is
//! decoded through an explicit ordered list of strategies, tried in
//! sequence; a strategy that does not apply returns None rather than
//! erroring. Only when every strategy fails does the caller get an
//! `Error::Parse` carrying a truncated payload snippet.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::trace;

use coursegraph_core::{ClusterSet, Error, Outline, Result, SlideConcepts};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    // ```json ... ``` or bare ``` ... ```; tolerant of leading/trailing prose.
    Regex::new(r"(?s)```(?:[a-zA-Z]+)?\s*(.*?)```").expect("static fence regex")
});

/// Strip the first markdown code fence, if any, returning its body.
fn strip_code_fences(raw: &str) -> Option<String> {
    CODE_FENCE
        .captures(raw)
        .map(|caps| caps[1].trim().to_string())
}

/// Decode `raw` as `T`, trying in order:
/// 1. the body of a markdown code fence,
/// 2. the raw payload,
/// 3. a bare JSON array wrapped into `{list_key: [...]}`.
fn decode_envelope<T: DeserializeOwned>(raw: &str, list_key: &str) -> Result<T> {
    let trimmed = raw.trim();

    if let Some(body) = strip_code_fences(trimmed) {
        if let Ok(parsed) = serde_json::from_str::<T>(&body) {
            trace!(strategy = "fenced", "Decoded structured output");
            return Ok(parsed);
        }
        // The fence body may itself be a bare list.
        if let Some(parsed) = decode_bare_list::<T>(&body, list_key) {
            trace!(strategy = "fenced_list", "Decoded structured output");
            return Ok(parsed);
        }
    }

    if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
        trace!(strategy = "raw", "Decoded structured output");
        return Ok(parsed);
    }

    if let Some(parsed) = decode_bare_list::<T>(trimmed, list_key) {
        trace!(strategy = "bare_list", "Decoded structured output");
        return Ok(parsed);
    }

    Err(Error::Parse(format!(
        "no decode strategy matched (expected '{}' envelope): {}",
        list_key,
        snippet(trimmed)
    )))
}

/// Direct-list fallback: treat the payload as a flat JSON array and wrap it
/// into the expected object envelope.
fn decode_bare_list<T: DeserializeOwned>(raw: &str, list_key: &str) -> Option<T> {
    let value = serde_json::from_str::<serde_json::Value>(raw).ok()?;
    if !value.is_array() {
        return None;
    }
    let wrapped = serde_json::json!({ list_key: value });
    serde_json::from_value::<T>(wrapped).ok()
}

/// First 160 chars of the payload for error context.
fn snippet(raw: &str) -> String {
    let mut end = raw.len().min(160);
    while end > 0 && !raw.is_char_boundary(end) {
        end -= 1;
    }
    raw[..end].to_string()
}

/// Decode an `ExtractOutline` response.
pub fn decode_outline(raw: &str) -> Result<Outline> {
    decode_envelope(raw, "sections")
}

/// Decode an `ExtractConcepts` response.
pub fn decode_slide_concepts(raw: &str) -> Result<SlideConcepts> {
    decode_envelope(raw, "concepts")
}

/// Decode a `ClusterConcepts` response.
pub fn decode_cluster_set(raw: &str) -> Result<ClusterSet> {
    decode_envelope(raw, "clusters")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_outline_plain_json() {
        let raw = r#"{"sections":[{"title":"Intro","start_page":1,"end_page":3}]}"#;
        let outline = decode_outline(raw).unwrap();
        assert_eq!(outline.sections.len(), 1);
        assert_eq!(outline.sections[0].title, "Intro");
    }

    #[test]
    fn test_decode_outline_fenced() {
        let raw = "Here is the outline you asked for:\n```json\n{\"sections\":[{\"title\":\"Intro\",\"start_page\":1}]}\n```\nLet me know if you need more.";
        let outline = decode_outline(raw).unwrap();
        assert_eq!(outline.sections[0].start_page, Some(1));
    }

    #[test]
    fn test_decode_outline_unlabeled_fence() {
        let raw = "```\n{\"sections\":[{\"title\":\"A\"}]}\n```";
        assert_eq!(decode_outline(raw).unwrap().sections.len(), 1);
    }

    #[test]
    fn test_decode_outline_bare_list_fallback() {
        let raw = r#"[{"title":"Intro","start_page":1},{"title":"Safety","start_page":4}]"#;
        let outline = decode_outline(raw).unwrap();
        assert_eq!(outline.sections.len(), 2);
    }

    #[test]
    fn test_decode_outline_fenced_bare_list() {
        let raw = "```json\n[{\"title\":\"Intro\"}]\n```";
        assert_eq!(decode_outline(raw).unwrap().sections.len(), 1);
    }

    #[test]
    fn test_decode_concepts_with_defaults() {
        let raw = r#"{"concepts":[{"name":"E-Stop","salience":0.9},{"name":"LOTO"}]}"#;
        let parsed = decode_slide_concepts(raw).unwrap();
        assert_eq!(parsed.concepts.len(), 2);
        assert_eq!(parsed.concepts[1].salience, 0.0);
        assert_eq!(parsed.concepts[1].description, "");
    }

    #[test]
    fn test_decode_clusters_bare_list() {
        let raw = r#"[{"canonical_name":"Emergency Stop","source_concepts":["E-Stop","Emergency Halt"]}]"#;
        let parsed = decode_cluster_set(raw).unwrap();
        assert_eq!(parsed.clusters.len(), 1);
        assert_eq!(parsed.clusters[0].source_concepts.len(), 2);
    }

    #[test]
    fn test_decode_garbage_is_parse_error() {
        let raw = "I could not produce an outline, sorry.";
        match decode_outline(raw) {
            Err(Error::Parse(msg)) => assert!(msg.contains("sections")),
            other => panic!("expected parse error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parse_error_snippet_is_truncated() {
        let raw = "x".repeat(5000);
        match decode_outline(&raw) {
            Err(Error::Parse(msg)) => assert!(msg.len() < 300),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_decode_never_panics_on_non_utf8_boundary_snippets() {
        let raw = "é".repeat(200); // multi-byte chars across the snippet cut
        assert!(decode_outline(&raw).is_err());
    }

    #[test]
    fn test_wrong_shape_object_is_parse_error() {
        // Valid JSON but an object without the envelope and not a list.
        let raw = r#"{"foo": 1}"#;
        // Outline has #[serde(default)] sections, so an alien object decodes
        // to an empty outline. That is the documented best-effort behavior.
        let outline = decode_outline(raw).unwrap();
        assert!(outline.is_empty());
    }
}
