//! In-memory embedding corpus and cosine similarity.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use chatsearch_core::{EmbeddingRows, MessageId, Result, SearchError};

/// All embedding vectors of a corpus, one row per message.
///
/// Rows share one dimensionality; a corpus is immutable once built and is
/// replaced wholesale when embeddings are regenerated.
#[derive(Debug, Clone)]
pub struct EmbeddingCorpus {
    ids: Vec<MessageId>,
    vectors: Array2<f32>,
}

impl EmbeddingCorpus {
    /// A corpus with no vectors.
    pub fn empty() -> Self {
        Self {
            ids: Vec::new(),
            vectors: Array2::zeros((0, 0)),
        }
    }

    /// Build a corpus from stored rows.
    pub fn from_rows(rows: EmbeddingRows) -> Result<Self> {
        let EmbeddingRows { ids, vectors } = rows;

        if ids.len() != vectors.len() {
            return Err(SearchError::invalid_argument(format!(
                "{} ids for {} vectors",
                ids.len(),
                vectors.len()
            )));
        }

        let Some(first) = vectors.first() else {
            return Ok(Self::empty());
        };
        let dimension = first.len();

        let mut flat = Vec::with_capacity(vectors.len() * dimension);
        for vector in &vectors {
            if vector.len() != dimension {
                return Err(SearchError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            flat.extend_from_slice(vector);
        }

        let vectors = Array2::from_shape_vec((ids.len(), dimension), flat)
            .map_err(|e| SearchError::internal(format!("Failed to build corpus matrix: {}", e)))?;

        Ok(Self { ids, vectors })
    }

    /// Number of vectors.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the corpus holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Vector dimensionality (0 for an empty corpus).
    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    /// Message ids in row order.
    pub fn ids(&self) -> &[MessageId] {
        &self.ids
    }

    /// Cosine similarity of `query` against every row, in row order.
    pub fn similarity(&self, query: &[f32]) -> Result<Vec<f32>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension() {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        Ok(cosine_similarity(query, self.vectors.view()))
    }

    /// The `k` most similar messages, best first.
    ///
    /// `k` is clamped to the corpus size. Equal scores keep corpus order.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<(MessageId, f32)>> {
        let scores = self.similarity(query)?;

        // A corrupt stored vector yields NaN; rank it below everything.
        let key = |idx: usize| {
            let score = scores[idx];
            if score.is_nan() {
                f32::NEG_INFINITY
            } else {
                score
            }
        };

        let mut order: Vec<usize> = (0..scores.len()).collect();
        // sort_by is stable, so ties stay in corpus order
        order.sort_by(|&a, &b| key(b).total_cmp(&key(a)));
        order.truncate(k.min(scores.len()));

        Ok(order
            .into_iter()
            .map(|idx| (self.ids[idx], scores[idx]))
            .collect())
    }
}

impl Default for EmbeddingCorpus {
    fn default() -> Self {
        Self::empty()
    }
}

/// Cosine similarity between `query` and each row of `corpus`.
///
/// Zero-norm vectors have similarity 0 with everything.
pub fn cosine_similarity(query: &[f32], corpus: ArrayView2<'_, f32>) -> Vec<f32> {
    let query = ArrayView1::from(query);
    let query_norm = query.dot(&query).sqrt();

    if query_norm == 0.0 {
        return vec![0.0; corpus.nrows()];
    }

    let dots = corpus.dot(&query);
    let norms = corpus.map_axis(Axis(1), |row| row.dot(&row).sqrt());

    dots.iter()
        .zip(norms.iter())
        .map(|(&dot, &norm)| {
            if norm == 0.0 {
                0.0
            } else {
                dot / (norm * query_norm)
            }
        })
        .collect()
}

/// Cosine similarity of two vectors of equal length.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(rows: &[(MessageId, Vec<f32>)]) -> EmbeddingCorpus {
        EmbeddingCorpus::from_rows(EmbeddingRows {
            ids: rows.iter().map(|(id, _)| *id).collect(),
            vectors: rows.iter().map(|(_, v)| v.clone()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_self_similarity_is_one() {
        let v = vec![0.3, -1.2, 4.0, 0.5];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);

        let c = corpus(&[(1, v.clone())]);
        let scores = c.similarity(&v).unwrap();
        assert!((scores[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-2.0, 0.5, 1.0];
        assert!((cosine(&a, &b) - cosine(&b, &a)).abs() < 1e-6);

        let ab = corpus(&[(1, b.clone())]).similarity(&a).unwrap()[0];
        let ba = corpus(&[(1, a.clone())]).similarity(&b).unwrap()[0];
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_magnitude_does_not_matter() {
        let c = corpus(&[(1, vec![10.0, 0.0]), (2, vec![0.0, 0.1])]);
        let scores = c.similarity(&[0.5, 0.0]).unwrap();
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert!(scores[1].abs() < 1e-6);
    }

    #[test]
    fn test_zero_norm_is_zero_similarity() {
        let c = corpus(&[(1, vec![0.0, 0.0]), (2, vec![1.0, 1.0])]);

        let scores = c.similarity(&[1.0, 0.0]).unwrap();
        assert_eq!(scores[0], 0.0);
        assert!(scores[1] > 0.0);

        let zero_query = c.similarity(&[0.0, 0.0]).unwrap();
        assert_eq!(zero_query, vec![0.0, 0.0]);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_top_k_orders_and_clamps() {
        let c = corpus(&[
            (10, vec![0.0, 1.0]),
            (20, vec![1.0, 0.0]),
            (30, vec![1.0, 1.0]),
        ]);

        let top = c.top_k(&[1.0, 0.1], 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, 20);
        assert_eq!(top[1].0, 30);

        let all = c.top_k(&[1.0, 0.1], 50).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].0, 10);
    }

    #[test]
    fn test_top_k_ties_keep_corpus_order() {
        let c = corpus(&[
            (7, vec![1.0, 0.0]),
            (3, vec![2.0, 0.0]),
            (5, vec![0.5, 0.0]),
        ]);

        for _ in 0..3 {
            let ids: Vec<MessageId> = c.top_k(&[1.0, 0.0], 3).unwrap().iter().map(|r| r.0).collect();
            assert_eq!(ids, vec![7, 3, 5]);
        }
    }

    #[test]
    fn test_top_k_nan_scores_rank_last() {
        let c = corpus(&[
            (1, vec![f32::NAN, 0.0]),
            (2, vec![0.0, 1.0]),
            (3, vec![1.0, 0.0]),
            (4, vec![f32::NAN, f32::NAN]),
        ]);

        let top = c.top_k(&[1.0, 0.0], 4).unwrap();
        let ids: Vec<MessageId> = top.iter().map(|r| r.0).collect();
        assert_eq!(ids, vec![3, 2, 1, 4]);
        assert!(top[2].1.is_nan());

        let best = c.top_k(&[1.0, 0.0], 1).unwrap();
        assert_eq!(best[0].0, 3);
    }

    #[test]
    fn test_empty_corpus() {
        let c = EmbeddingCorpus::from_rows(EmbeddingRows::default()).unwrap();
        assert!(c.is_empty());
        assert_eq!(c.dimension(), 0);
        assert!(c.top_k(&[1.0, 2.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let err = EmbeddingCorpus::from_rows(EmbeddingRows {
            ids: vec![1, 2],
            vectors: vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
        })
        .unwrap_err();

        assert_eq!(err.error_code(), "DIMENSION_MISMATCH");
    }

    #[test]
    fn test_query_dimension_checked() {
        let c = corpus(&[(1, vec![1.0, 0.0])]);
        assert!(matches!(
            c.similarity(&[1.0, 0.0, 0.0]),
            Err(SearchError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }
}
