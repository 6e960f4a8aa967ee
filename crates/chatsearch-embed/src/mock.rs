//! Deterministic embedder that needs no model files.

use async_trait::async_trait;

use chatsearch_core::{Embedder, Result};

use crate::onnx::l2_normalize;

/// A mock embedder for testing that doesn't require actual models.
///
/// Vectors are derived from a hash of the text, so equal texts get equal
/// vectors and different texts almost always differ. Similarity between
/// different texts carries no meaning.
pub struct MockEmbedder {
    dimension: usize,
    model_name: String,
}

impl MockEmbedder {
    /// Create a new mock embedder with default settings.
    pub fn new() -> Self {
        Self::with_dimension(384)
    }

    /// Create a mock embedder with a custom dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            model_name: format!("mock-{}", dimension),
        }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        // FNV-1a
        let hash = text
            .bytes()
            .fold(0xcbf29ce484222325u64, |acc, b| (acc ^ b as u64).wrapping_mul(0x100000001b3));

        let embedding = (0..self.dimension)
            .map(|i| {
                let mixed = hash.wrapping_mul(i as u64 * 2 + 1).rotate_left((i % 64) as u32);
                (mixed % 1000) as f32 / 1000.0 - 0.5
            })
            .collect();

        l2_normalize(embedding)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn encode(&self, texts: &[&str], _batch_size: usize) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    async fn encode_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
