//! chatsearch-query - Search and ranking engine
//!
//! This crate provides hybrid search over chat messages, combining
//! embedding similarity and full-text search using Reciprocal Rank
//! Fusion (RRF).
//!
//! # Features
//!
//! - Hybrid search (vector + keyword) with origin tagging
//! - Reciprocal Rank Fusion with deterministic tie-breaking
//! - Best-effort keyword path with query sanitization and a time budget
//! - Low-value message filter for displayed results
//! - Atomic reload of the in-memory embedding corpus
//!
//! # Example
//!
//! ```rust,ignore
//! use chatsearch_embed::EmbeddingEngine;
//! use chatsearch_query::{HybridSearch, QueryConfig};
//! use std::sync::Arc;
//!
//! let embeddings = EmbeddingEngine::new(Arc::new(embedder), batch_size);
//! let engine = HybridSearch::new(Arc::new(store), embeddings, search_config);
//! let mut results = engine.search("viaje a Lisboa", &QueryConfig::default()).await?;
//! chatsearch_query::filter_low_value(&mut results);
//! ```

mod engine;
mod filters;
mod fusion;
mod lexical;

pub use engine::{HybridSearch, QueryConfig};
pub use filters::{filter_low_value, is_low_value};
pub use fusion::{reciprocal_rank_fusion, FusedCandidate, DEFAULT_RRF_K};
pub use lexical::{sanitize_query, LexicalSearcher};

// Re-export for convenience
pub use chatsearch_core::{MatchType, SearchResult, SearchResults};
