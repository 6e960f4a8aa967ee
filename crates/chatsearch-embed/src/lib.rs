//! chatsearch-embed - Embedding engine
//!
//! This crate turns message text into fixed-dimension vectors and scores
//! vectors against an in-memory corpus by cosine similarity.
//!
//! # Features
//!
//! - ONNX Runtime sentence-transformer backend with mean pooling and
//!   L2 normalization
//! - Model cache keyed by model name, injected rather than global
//! - Dense corpus matrix with zero-norm-safe cosine similarity
//! - Stable top-k selection
//! - Deterministic mock backend for tests and offline runs

mod cache;
mod corpus;
mod engine;
mod mock;
mod onnx;

pub use cache::ModelCache;
pub use corpus::{cosine, cosine_similarity, EmbeddingCorpus};
pub use engine::EmbeddingEngine;
pub use mock::MockEmbedder;
pub use onnx::{OnnxEmbedder, OnnxModel};

// Re-export the Embedder trait for convenience
pub use chatsearch_core::Embedder;
