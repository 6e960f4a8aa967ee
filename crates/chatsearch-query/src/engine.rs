//! Query engine for hybrid search.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use chatsearch_core::{
    Embedder, MatchType, MessageId, MessageStore, Result, SearchConfig, SearchError, SearchResult,
    SearchResults,
};
use chatsearch_embed::{EmbeddingCorpus, EmbeddingEngine};

use crate::fusion::reciprocal_rank_fusion;
use crate::lexical::LexicalSearcher;

/// Configuration for search queries.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Maximum number of results to return.
    pub top_k: usize,

    /// Weight for vector search (0.0 to 1.0).
    ///
    /// Accepted for callers that pass it; fusion is rank-based and does not
    /// scale by it.
    pub vector_weight: f32,

    /// Weight for keyword search (0.0 to 1.0). Not applied, see
    /// `vector_weight`.
    pub keyword_weight: f32,
}

impl QueryConfig {
    /// Query defaults taken from the search configuration.
    pub fn from_search_config(config: &SearchConfig) -> Self {
        Self {
            top_k: config.default_top_k,
            vector_weight: config.vector_weight,
            keyword_weight: config.keyword_weight,
        }
    }

    /// Same configuration with a different `top_k`.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::from_search_config(&SearchConfig::default())
    }
}

/// Hybrid search query engine.
///
/// Performs vector similarity search and keyword search, then fuses
/// the results using Reciprocal Rank Fusion (RRF).
///
/// Embeddings are loaded into memory on the first query and kept for the
/// life of the engine. [`HybridSearch::reload_embeddings`] swaps in a new
/// snapshot; queries already running keep the snapshot they started with.
pub struct HybridSearch<S, E> {
    /// Storage backend.
    store: Arc<S>,

    /// Embedding model and similarity ranking.
    embeddings: EmbeddingEngine<E>,

    /// Keyword path.
    lexical: LexicalSearcher<S>,

    /// Search tuning.
    config: SearchConfig,

    /// Loaded corpus; `None` until the first load.
    corpus: RwLock<Option<Arc<EmbeddingCorpus>>>,
}

impl<S, E> HybridSearch<S, E>
where
    S: MessageStore,
    E: Embedder,
{
    /// Create a new query engine.
    pub fn new(store: Arc<S>, embeddings: EmbeddingEngine<E>, config: SearchConfig) -> Self {
        let lexical = LexicalSearcher::new(
            Arc::clone(&store),
            Duration::from_millis(config.lexical_timeout_ms),
        );

        Self {
            store,
            embeddings,
            lexical,
            config,
            corpus: RwLock::new(None),
        }
    }

    /// Search configuration in use.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The current corpus snapshot, loading it on first use.
    pub async fn load_embeddings(&self) -> Result<Arc<EmbeddingCorpus>> {
        if let Some(corpus) = self.snapshot()? {
            return Ok(corpus);
        }

        let corpus = self.fetch_corpus().await?;

        let mut slot = self
            .corpus
            .write()
            .map_err(|e| SearchError::internal(format!("Corpus lock poisoned: {}", e)))?;

        // Another query may have loaded it while we were reading.
        Ok(Arc::clone(slot.get_or_insert(corpus)))
    }

    /// Re-read the current model's embeddings from the store and swap them in.
    ///
    /// Returns the number of vectors now loaded.
    pub async fn reload_embeddings(&self) -> Result<usize> {
        let corpus = self.fetch_corpus().await?;
        let count = corpus.len();

        let mut slot = self
            .corpus
            .write()
            .map_err(|e| SearchError::internal(format!("Corpus lock poisoned: {}", e)))?;
        *slot = Some(corpus);

        Ok(count)
    }

    fn snapshot(&self) -> Result<Option<Arc<EmbeddingCorpus>>> {
        self.corpus
            .read()
            .map(|slot| slot.clone())
            .map_err(|e| SearchError::internal(format!("Corpus lock poisoned: {}", e)))
    }

    async fn fetch_corpus(&self) -> Result<Arc<EmbeddingCorpus>> {
        let model = self.embeddings.model_name();
        info!("Loading {} embeddings into memory", model);

        let rows = self.store.get_all_embeddings(model).await?;

        match self.store.get_stats().await {
            Ok(stats) => {
                let others: Vec<&str> = stats
                    .embedding_models
                    .iter()
                    .map(String::as_str)
                    .filter(|name| *name != model)
                    .collect();
                if !others.is_empty() {
                    warn!(
                        "Ignoring embeddings from other models ({}); re-run embed with {} to search them",
                        others.join(", "),
                        model
                    );
                }
            }
            Err(e) => debug!("Could not list stored embedding models: {}", e),
        }

        let corpus = EmbeddingCorpus::from_rows(rows)?;

        info!(
            "Loaded {} embeddings (dimension {})",
            corpus.len(),
            corpus.dimension()
        );

        Ok(Arc::new(corpus))
    }

    /// Perform a hybrid search.
    ///
    /// Only an unavailable embedding backend fails the query. Any other
    /// failure on either path is logged and that path contributes nothing.
    pub async fn search(&self, query: &str, config: &QueryConfig) -> Result<SearchResults> {
        let start = Instant::now();
        let top_k = self.clamp_top_k(config.top_k);
        if top_k == 0 {
            return Ok(self.finish(query, Vec::new(), start));
        }

        info!("Searching for: {:?}", query);

        // Each path fetches more than top_k so fusion has overlap to work with
        let fetch_k = top_k.saturating_mul(self.config.candidate_multiplier.max(1));

        let (vector_results, keyword_results) = tokio::join!(
            self.vector_search(query, fetch_k),
            self.lexical.search(query, fetch_k.min(u32::MAX as usize) as u32)
        );

        let vector_results = match vector_results {
            Ok(results) => results,
            Err(e) if e.is_backend_unavailable() => return Err(e),
            Err(e) => {
                warn!("Vector search failed, continuing with keyword results: {}", e);
                Vec::new()
            }
        };

        debug!(
            "Vector search returned {} results, keyword search returned {} results",
            vector_results.len(),
            keyword_results.len()
        );

        let fused = reciprocal_rank_fusion(
            &[
                (MatchType::Vector, vector_results.as_slice()),
                (MatchType::Lexical, keyword_results.as_slice()),
            ],
            self.config.rrf_k,
            top_k,
        );

        debug!("Fused to {} results", fused.len());

        let results = self
            .resolve(
                fused
                    .into_iter()
                    .map(|candidate| (candidate.id, candidate.score, candidate.match_type)),
            )
            .await;

        Ok(self.finish(query, results, start))
    }

    /// Vector search alone. Scores are cosine similarities.
    pub async fn semantic_search_only(&self, query: &str, top_k: usize) -> Result<SearchResults> {
        let start = Instant::now();
        let top_k = self.clamp_top_k(top_k);
        if top_k == 0 {
            return Ok(self.finish(query, Vec::new(), start));
        }

        let vector_results = self.vector_search(query, top_k).await?;

        let results = self
            .resolve(
                vector_results
                    .into_iter()
                    .map(|(id, score)| (id, score as f64, MatchType::Vector)),
            )
            .await;

        Ok(self.finish(query, results, start))
    }

    /// Keyword search alone. Scores are raw BM25 values (lower is better).
    pub async fn keyword_search_only(&self, query: &str, top_k: usize) -> Result<SearchResults> {
        let start = Instant::now();
        let top_k = self.clamp_top_k(top_k);
        if top_k == 0 {
            return Ok(self.finish(query, Vec::new(), start));
        }

        let keyword_results = self
            .lexical
            .search(query, top_k.min(u32::MAX as usize) as u32)
            .await;

        let results = self
            .resolve(
                keyword_results
                    .into_iter()
                    .map(|(id, score)| (id, score as f64, MatchType::Lexical)),
            )
            .await;

        Ok(self.finish(query, results, start))
    }

    /// Perform vector similarity search against the loaded corpus.
    async fn vector_search(&self, query: &str, k: usize) -> Result<Vec<(MessageId, f32)>> {
        let corpus = self.load_embeddings().await?;

        if corpus.is_empty() {
            debug!("No embeddings loaded, skipping vector search");
            return Ok(Vec::new());
        }

        self.embeddings.top_k(query, &corpus, k).await
    }

    /// Fetch the messages for ranked candidates. Ids that no longer
    /// resolve are skipped.
    async fn resolve(
        &self,
        candidates: impl Iterator<Item = (MessageId, f64, MatchType)>,
    ) -> Vec<SearchResult> {
        let mut results = Vec::new();

        for (id, score, match_type) in candidates {
            let message = match self.store.get_message(id).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("Message {} no longer exists, skipping", id);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to fetch message {}: {}", id, e);
                    continue;
                }
            };

            results.push(SearchResult {
                rank: results.len() as u32 + 1,
                score,
                match_type,
                message,
            });
        }

        results
    }

    /// Cap `top_k` at `max_top_k`. Zero stays zero and yields no results.
    fn clamp_top_k(&self, top_k: usize) -> usize {
        top_k.min(self.config.max_top_k.max(1))
    }

    fn finish(&self, query: &str, results: Vec<SearchResult>, start: Instant) -> SearchResults {
        let latency_ms = start.elapsed().as_millis() as u64;

        info!(
            "Search completed in {}ms, returned {} results",
            latency_ms,
            results.len()
        );

        SearchResults::new(query, results, latency_ms)
    }
}
