//! # coursegraph-inference
//!
//! Completion backend abstraction for coursegraph: the Ollama chat backend,
//! tolerant decoding of structured model output, prompt construction, and a
//! deterministic mock backend for tests.

pub mod decode;
pub mod mock;
pub mod ollama;
pub mod prompts;

pub use decode::{decode_cluster_set, decode_outline, decode_slide_concepts};
pub use mock::MockCompletionBackend;
pub use ollama::OllamaBackend;
pub use prompts::{PromptModule, PromptProfile};
