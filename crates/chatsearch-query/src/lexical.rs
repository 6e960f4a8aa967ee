//! Keyword path: query sanitization and best-effort full-text search.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use chatsearch_core::{MessageId, MessageStore, Result, SearchError};

/// Operators of the full-text query grammar, dropped when written as words.
const QUERY_OPERATORS: &[&str] = &["AND", "OR", "NOT", "NEAR"];

/// Reduce a user query to plain search terms.
///
/// Everything that is not a letter, digit, underscore or whitespace
/// (quotes, wildcards, parentheses, brackets, colons, hyphens, ...) becomes
/// a space, upper-case boolean operators are dropped and whitespace is
/// collapsed. Returns `None` when no terms are left.
pub fn sanitize_query(query: &str) -> Option<String> {
    let cleaned: String = query
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let terms: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|term| !QUERY_OPERATORS.contains(term))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

/// Full-text search that never fails the caller.
///
/// Failures and timeouts are logged and turn into an empty result list so
/// that a hybrid query can continue on the vector path alone.
pub struct LexicalSearcher<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S> LexicalSearcher<S>
where
    S: MessageStore,
{
    /// Create a searcher giving each query at most `timeout`.
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Ranked `(id, bm25)` pairs for `query`, best first.
    ///
    /// Scores follow the BM25 convention (lower is better); only the order
    /// is meaningful to callers.
    pub async fn search(&self, query: &str, limit: u32) -> Vec<(MessageId, f32)> {
        let Some(sanitized) = sanitize_query(query) else {
            debug!("Query {:?} has no searchable terms", query);
            return Vec::new();
        };

        match self.try_search(&sanitized, limit).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Keyword search failed for {:?}: {}", sanitized, e);
                Vec::new()
            }
        }
    }

    /// Run an already sanitized query, propagating failures.
    pub async fn try_search(&self, sanitized: &str, limit: u32) -> Result<Vec<(MessageId, f32)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        tokio::time::timeout(self.timeout, self.store.lexical_search(sanitized, limit))
            .await
            .map_err(|_| SearchError::Timeout {
                operation: "keyword search".to_string(),
                millis: self.timeout.as_millis() as u64,
            })?
    }
}
