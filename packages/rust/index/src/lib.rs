//! Chunking, embedding, and the file-backed vector index.
//!
//! This crate turns crawled page records into a searchable vector index:
//! - [`chunk`] — deterministic overlapping text chunking
//! - [`embedder`] — the [`Embedder`] trait and its providers
//! - [`store`] — building, loading, and querying an on-disk index

pub mod chunk;
pub mod embedder;
pub mod store;

pub use chunk::Chunker;
pub use embedder::{Embedder, FastEmbedder, HashedEmbedder};
pub use store::{BuildSummary, ScoredChunk, VectorIndex};
