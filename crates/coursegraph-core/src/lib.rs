//! # coursegraph-core
//!
//! Core types, traits, and abstractions for the coursegraph library.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the other coursegraph crates depend on.

pub mod chunker;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use chunker::{chunk_text, Chunk, ContextBudget};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
