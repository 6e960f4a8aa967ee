//! Core traits defining the interfaces between components.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{EmbeddingRows, ImportantUser, Message, MessageId, Stats};

/// Storage collaborator.
#[async_trait]
pub trait MessageStore: Send + Sync {
    // Message operations
    async fn insert_messages(&self, messages: &[Message]) -> Result<usize>;
    async fn get_message(&self, id: MessageId) -> Result<Option<Message>>;
    async fn messages_with_text(&self) -> Result<Vec<Message>>;

    /// Ranked full-text search over normalized text.
    ///
    /// `query` must already be sanitized for the full-text grammar. Scores
    /// follow the BM25 convention of the backend (lower is better) and are
    /// only meaningful within one result list.
    async fn lexical_search(&self, query: &str, limit: u32) -> Result<Vec<(MessageId, f32)>>;

    // Embedding operations
    async fn save_embeddings(
        &self,
        ids: &[MessageId],
        embeddings: &[Vec<f32>],
        model_name: &str,
    ) -> Result<()>;

    /// All stored vectors produced by `model_name`, ordered by message id.
    ///
    /// Vectors from other models are left out; they live in a different
    /// space even when the dimension happens to match.
    async fn get_all_embeddings(&self, model_name: &str) -> Result<EmbeddingRows>;

    // Important users
    async fn add_important_user(&self, user: &ImportantUser) -> Result<()>;
    async fn important_users(&self) -> Result<Vec<ImportantUser>>;

    /// Flag every stored message whose sender is an important user.
    ///
    /// Returns the number of messages flagged.
    async fn mark_important_messages(&self) -> Result<usize>;

    // Stats
    async fn get_stats(&self) -> Result<Stats>;
}

/// Text embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Encode a batch of texts, `batch_size` at a time.
    ///
    /// Deterministic for a fixed model and input; empty input yields an
    /// empty output.
    async fn encode(&self, texts: &[&str], batch_size: usize) -> Result<Vec<Vec<f32>>>;

    /// Encode a single query text.
    async fn encode_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Name of the model producing the vectors.
    fn model_name(&self) -> &str;
}
