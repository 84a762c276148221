//! # coursegraph-db
//!
//! Graph store implementations for coursegraph: a PostgreSQL-backed
//! property-graph encoding and an in-memory store for tests and embedded
//! use. Both implement `coursegraph_core::GraphStore` with idempotent,
//! merge-on-key upsert semantics.

pub mod memory;
pub mod pg;
pub mod pool;

pub use memory::{MemoryArtifactStore, MemoryGraphStore, MemorySemanticIndex};
pub use pg::PgGraphStore;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
