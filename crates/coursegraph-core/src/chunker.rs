//! Context-window-aware document chunking.
//!
//! Splits arbitrarily long document text into overlapping windows sized to
//! a completion model's context budget. The window size is derived from the
//! configured context size minus the token budgets reserved for prompt
//! scaffolding and the response, converted to characters with a conservative
//! chars-per-token estimate. Adjacent windows overlap by ~10% of the window
//! (with a floor) so content near chunk boundaries is not lost.

use tracing::debug;

use crate::defaults;

/// Token budget for a completion model's context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    /// Model context window size in tokens.
    pub context_size: usize,
    /// Tokens reserved for prompt scaffolding.
    pub reserved_prompt: usize,
    /// Tokens reserved for the model response.
    pub reserved_response: usize,
    /// Estimated characters per token.
    pub chars_per_token: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            context_size: defaults::CONTEXT_SIZE,
            reserved_prompt: defaults::RESERVED_PROMPT_TOKENS,
            reserved_response: defaults::RESERVED_RESPONSE_TOKENS,
            chars_per_token: defaults::CHARS_PER_TOKEN,
        }
    }
}

impl ContextBudget {
    /// Read the budget from environment variables, falling back to defaults.
    ///
    /// `OLLAMA_NUM_CTX` overrides the context size;
    /// `COURSEGRAPH_RESERVED_PROMPT_TOKENS` / `COURSEGRAPH_RESERVED_RESPONSE_TOKENS`
    /// override the reservations.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            context_size: env_usize("OLLAMA_NUM_CTX", defaults.context_size),
            reserved_prompt: env_usize(
                "COURSEGRAPH_RESERVED_PROMPT_TOKENS",
                defaults.reserved_prompt,
            ),
            reserved_response: env_usize(
                "COURSEGRAPH_RESERVED_RESPONSE_TOKENS",
                defaults.reserved_response,
            ),
            chars_per_token: defaults.chars_per_token,
        }
    }

    /// Tokens left for payload after reservations.
    pub fn usable_tokens(&self) -> usize {
        self.context_size
            .saturating_sub(self.reserved_prompt + self.reserved_response)
    }

    /// Maximum characters of document text per completion call.
    pub fn max_chars(&self) -> usize {
        // At least one char so a degenerate budget still makes progress.
        (self.usable_tokens() * self.chars_per_token).max(1)
    }

    /// Overlap between adjacent chunks: 10% of the window, floored.
    pub fn overlap_chars(&self) -> usize {
        (self.max_chars() / 10).max(defaults::MIN_OVERLAP_CHARS)
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

/// A text chunk with its byte offset in the original document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub start_offset: usize,
}

/// Find a UTF-8 safe boundary at or before the given position.
fn find_char_boundary_before(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Find a UTF-8 safe boundary at or after the given position.
fn find_char_boundary_after(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

/// Split `text` into overlapping windows that fit the budget.
///
/// Returns a single chunk when the document fits. The loop always
/// terminates: when the overlap would pull the next window back to (or
/// behind) the current start, the window is advanced without overlap
/// instead.
pub fn chunk_text(budget: &ContextBudget, text: &str) -> Vec<Chunk> {
    let max_chars = budget.max_chars();
    if text.len() <= max_chars {
        return vec![Chunk {
            text: text.to_string(),
            start_offset: 0,
        }];
    }

    let overlap = budget.overlap_chars();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let mut end = find_char_boundary_before(text, (start + max_chars).min(text.len()));
        if end <= start {
            // Degenerate window (multi-byte char wider than the budget).
            end = find_char_boundary_after(text, start + 1).min(text.len());
        }
        chunks.push(Chunk {
            text: text[start..end].to_string(),
            start_offset: start,
        });
        if end >= text.len() {
            break;
        }

        let mut next = find_char_boundary_after(text, end.saturating_sub(overlap));
        if next <= start {
            // Forced forward progress when overlap >= window size.
            next = end;
        }
        start = next;
    }

    debug!(
        chunk_count = chunks.len(),
        max_chars, overlap, "Split document into chunks"
    );
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(context: usize, prompt: usize, response: usize, cpt: usize) -> ContextBudget {
        ContextBudget {
            context_size: context,
            reserved_prompt: prompt,
            reserved_response: response,
            chars_per_token: cpt,
        }
    }

    /// Rebuild the original text by discounting each chunk's overlap with
    /// its predecessor.
    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut covered = 0usize;
        for chunk in chunks {
            let skip = covered.saturating_sub(chunk.start_offset);
            out.push_str(&chunk.text[skip..]);
            covered = chunk.start_offset + chunk.text.len();
        }
        out
    }

    #[test]
    fn test_single_chunk_when_text_fits() {
        let b = ContextBudget::default();
        let text = "short document";
        let chunks = chunk_text(&b, text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].start_offset, 0);
    }

    #[test]
    fn test_single_chunk_at_exact_boundary() {
        let b = budget(2000, 500, 500, 1); // max_chars = 1000
        let text = "x".repeat(1000);
        assert_eq!(chunk_text(&b, &text).len(), 1);
        let text = "x".repeat(1001);
        assert!(chunk_text(&b, &text).len() > 1);
    }

    #[test]
    fn test_reconstruction_roundtrip() {
        let b = budget(3000, 500, 500, 2); // max_chars = 4000, overlap = 1000
        let text: String = (0..30_000).map(|i| ((i % 26) as u8 + b'a') as char).collect();
        let chunks = chunk_text(&b, &text);
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_chunks_respect_max_chars() {
        let b = budget(3000, 500, 500, 2);
        let text = "y".repeat(25_000);
        for chunk in chunk_text(&b, &text) {
            assert!(chunk.text.len() <= b.max_chars());
        }
    }

    #[test]
    fn test_terminates_when_overlap_exceeds_window() {
        // Window of 1100 chars but the overlap floor is 1000, and with a
        // tiny budget the overlap can dominate the window. Must still halt.
        let b = budget(1100, 50, 50, 1); // max_chars = 1000, overlap = 1000
        let text = "z".repeat(10_000);
        let chunks = chunk_text(&b, &text);
        assert!(!chunks.is_empty());
        // Forward progress means strictly increasing offsets.
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset > pair[0].start_offset);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_degenerate_budget_still_terminates() {
        let b = budget(10, 50, 50, 3); // usable_tokens saturates to 0, max_chars floors to 1
        let text = "abcdef";
        let chunks = chunk_text(&b, text);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_multibyte_boundaries_are_safe() {
        let b = budget(110, 50, 50, 1); // max_chars = 10
        let text = "héllo wörld ünïcode cöntent here".repeat(20);
        let chunks = chunk_text(&b, &text);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_overlap_floor_applies() {
        let b = budget(3000, 500, 500, 2); // max_chars 4000 => 10% = 400 < floor
        assert_eq!(b.overlap_chars(), defaults::MIN_OVERLAP_CHARS);
    }

    #[test]
    fn test_usable_tokens_matches_budget_math() {
        let b = budget(8192, 1500, 1500, 3);
        assert_eq!(b.usable_tokens(), 5192);
        assert_eq!(b.max_chars(), 15_576);
    }
}
