//! Embedding engine: encoding plus similarity ranking over a corpus.

use std::sync::Arc;

use tracing::debug;

use chatsearch_core::{Embedder, MessageId, Result};

use crate::corpus::EmbeddingCorpus;

/// Encodes text with an [`Embedder`] and ranks corpus vectors against it.
pub struct EmbeddingEngine<E> {
    embedder: Arc<E>,
    batch_size: usize,
}

impl<E> EmbeddingEngine<E>
where
    E: Embedder,
{
    /// Create an engine encoding `batch_size` texts at a time.
    pub fn new(embedder: Arc<E>, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// The underlying embedder.
    pub fn embedder(&self) -> &Arc<E> {
        &self.embedder
    }

    /// Texts handed to the embedder per call.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Name of the model producing the vectors.
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Encode a batch of texts.
    pub async fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.embedder.encode(texts, self.batch_size).await
    }

    /// Encode a query.
    pub async fn encode_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.encode_query(text).await
    }

    /// Cosine similarity of a query vector against every corpus row.
    pub fn similarity(&self, query: &[f32], corpus: &EmbeddingCorpus) -> Result<Vec<f32>> {
        corpus.similarity(query)
    }

    /// The `k` corpus messages most similar to `query`, best first.
    ///
    /// An empty corpus returns nothing without encoding the query.
    pub async fn top_k(
        &self,
        query: &str,
        corpus: &EmbeddingCorpus,
        k: usize,
    ) -> Result<Vec<(MessageId, f32)>> {
        if corpus.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.encode_query(query).await?;
        let results = corpus.top_k(&query_embedding, k)?;

        debug!(
            "Vector top-k: {} of {} corpus vectors",
            results.len(),
            corpus.len()
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEmbedder;
    use chatsearch_core::{EmbeddingRows, SearchError};

    async fn corpus_of(embedder: &MockEmbedder, texts: &[(MessageId, &str)]) -> EmbeddingCorpus {
        let vectors = embedder
            .encode(&texts.iter().map(|(_, t)| *t).collect::<Vec<_>>(), 8)
            .await
            .unwrap();
        EmbeddingCorpus::from_rows(EmbeddingRows {
            ids: texts.iter().map(|(id, _)| *id).collect(),
            vectors,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_top_k_finds_identical_text_first() {
        let embedder = Arc::new(MockEmbedder::with_dimension(64));
        let engine = EmbeddingEngine::new(Arc::clone(&embedder), 16);
        let corpus = corpus_of(
            &embedder,
            &[(1, "el tiempo está bueno"), (2, "me gusta Python"), (3, "hola")],
        )
        .await;

        let results = engine.top_k("me gusta Python", &corpus, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 2);
        assert!((results[0].1 - 1.0).abs() < 1e-5);
        assert!(results[0].1 >= results[1].1);
    }

    #[tokio::test]
    async fn test_top_k_clamped_to_corpus() {
        let embedder = Arc::new(MockEmbedder::with_dimension(16));
        let engine = EmbeddingEngine::new(Arc::clone(&embedder), 16);
        let corpus = corpus_of(&embedder, &[(1, "a"), (2, "b")]).await;

        assert_eq!(engine.top_k("a", &corpus, 10).await.unwrap().len(), 2);
        assert!(engine.top_k("a", &corpus, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_empty() {
        let engine = EmbeddingEngine::new(Arc::new(MockEmbedder::new()), 32);
        let results = engine
            .top_k("anything", &EmbeddingCorpus::empty(), 5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_model_mismatch_detected() {
        let small = Arc::new(MockEmbedder::with_dimension(8));
        let corpus = corpus_of(&small, &[(1, "hola")]).await;

        let engine = EmbeddingEngine::new(Arc::new(MockEmbedder::with_dimension(16)), 32);
        let err = engine.top_k("hola", &corpus, 1).await.unwrap_err();
        assert!(matches!(err, SearchError::DimensionMismatch { expected: 8, actual: 16 }));
    }

    #[tokio::test]
    async fn test_similarity_passthrough() {
        let embedder = Arc::new(MockEmbedder::with_dimension(32));
        let engine = EmbeddingEngine::new(Arc::clone(&embedder), 0);
        let corpus = corpus_of(&embedder, &[(1, "uno"), (2, "dos")]).await;

        let query = engine.encode_query("dos").await.unwrap();
        let scores = engine.similarity(&query, &corpus).unwrap();
        assert_eq!(scores.len(), 2);
        assert!((scores[1] - 1.0).abs() < 1e-5);
        assert_eq!(engine.model_name(), "mock-32");
    }

    #[tokio::test]
    async fn test_encode_uses_batch_size() {
        let embedder = Arc::new(MockEmbedder::with_dimension(16));
        assert_eq!(EmbeddingEngine::new(Arc::clone(&embedder), 0).batch_size(), 1);

        let engine = EmbeddingEngine::new(Arc::clone(&embedder), 2);
        assert_eq!(engine.batch_size(), 2);

        let texts = ["uno", "dos", "tres", "cuatro", "cinco"];
        let batched = engine.encode(&texts).await.unwrap();
        let direct = embedder.encode(&texts, 64).await.unwrap();
        assert_eq!(batched.len(), 5);
        assert_eq!(batched, direct);
        assert!(engine.encode(&[]).await.unwrap().is_empty());
    }
}
