//! ONNX-based embedding model implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::ArrayViewD;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use chatsearch_core::{Embedder, EmbeddingConfig, Result, SearchError};

use crate::cache::ModelCache;

/// Longest input fed to the model, in tokens.
const MAX_TOKENS: usize = 512;

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// A loaded sentence-transformer: inference session plus tokenizer.
pub struct OnnxModel {
    /// ONNX inference session (wrapped in Mutex for interior mutability).
    session: Mutex<Session>,

    /// Tokenizer for the model.
    tokenizer: Tokenizer,
}

impl OnnxModel {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    ///
    /// Any failure is reported as [`SearchError::BackendUnavailable`]: without
    /// the model there is no vector search.
    pub fn load(model_dir: &Path, model_name: &str, num_threads: usize) -> Result<Self> {
        let model_path = model_dir.join(MODEL_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);

        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                return Err(SearchError::backend_unavailable(
                    model_name,
                    format!("{} not found", path.display()),
                ));
            }
        }

        info!("Loading ONNX model from {:?}", model_path);

        let unavailable =
            |reason: String| SearchError::backend_unavailable(model_name, reason);

        let session = Session::builder()
            .map_err(|e| unavailable(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| unavailable(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(num_threads)
            .map_err(|e| unavailable(format!("Failed to set thread count: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| unavailable(format!("Failed to load model: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| unavailable(format!("Failed to load tokenizer: {}", e)))?;

        info!("Embedding model {} loaded", model_name);

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    /// Embed one batch of already-prefixed texts.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| SearchError::embedding(format!("Tokenization failed: {}", e)))?;

        // Get max length for padding
        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(MAX_TOKENS);

        let batch_size = encodings.len();

        debug!("Embedding batch: size={}, max_len={}", batch_size, max_len);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
            }
        }

        let tensor = |data: Vec<i64>, what: &str| {
            Tensor::from_array((vec![batch_size, max_len], data))
                .map_err(|e| SearchError::embedding(format!("Failed to create {} tensor: {}", what, e)))
        };
        let input_ids_tensor = tensor(input_ids, "input")?;
        let attention_mask_tensor = tensor(attention_mask, "mask")?;
        let token_type_tensor = tensor(token_type_ids, "token type")?;

        // Copy the output out so the session lock is released before pooling.
        let (shape, data): (Vec<usize>, Vec<f32>) = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| SearchError::embedding(format!("Failed to lock session: {}", e)))?;

            let outputs = session
                .run(ort::inputs![
                    "input_ids" => input_ids_tensor,
                    "attention_mask" => attention_mask_tensor,
                    "token_type_ids" => token_type_tensor
                ])
                .map_err(|e| SearchError::embedding(format!("Inference failed: {}", e)))?;

            let extract_err =
                |e: ort::Error| SearchError::embedding(format!("Failed to extract tensor: {}", e));

            if let Some(output) = outputs.get("last_hidden_state") {
                let view = output.try_extract_array::<f32>().map_err(extract_err)?;
                (view.shape().to_vec(), view.iter().copied().collect())
            } else {
                // Models name their outputs differently; take the first one
                let (_, output) = outputs
                    .iter()
                    .next()
                    .ok_or_else(|| SearchError::embedding("No output tensor found"))?;
                let view = output.try_extract_array::<f32>().map_err(extract_err)?;
                (view.shape().to_vec(), view.iter().copied().collect())
            }
        };

        let view = ArrayViewD::from_shape(shape.as_slice(), data.as_slice())
            .map_err(|e| SearchError::embedding(format!("Bad output shape: {}", e)))?;

        debug!("Output shape: {:?}", shape);

        match shape.len() {
            // (batch_size, seq_len, hidden_dim) - need mean pooling
            3 => Ok(mean_pool(&view, &encodings, max_len)),
            // (batch_size, hidden_dim) - already pooled
            2 => Ok((0..batch_size)
                .map(|i| l2_normalize((0..shape[1]).map(|j| view[[i, j]]).collect()))
                .collect()),
            _ => Err(SearchError::embedding(format!(
                "Unexpected output shape: {:?}",
                shape
            ))),
        }
    }
}

/// Mean pooling over the sequence dimension with attention mask, then
/// L2 normalization.
fn mean_pool(
    tensor: &ArrayViewD<'_, f32>,
    encodings: &[tokenizers::Encoding],
    max_len: usize,
) -> Vec<Vec<f32>> {
    let seq_len = tensor.shape()[1];
    let hidden_dim = tensor.shape()[2];

    encodings
        .iter()
        .enumerate()
        .map(|(i, encoding)| {
            let mask = encoding.get_attention_mask();
            let mut sum = vec![0.0f32; hidden_dim];
            let mut valid = 0usize;

            for j in 0..max_len.min(seq_len).min(mask.len()) {
                if mask[j] == 1 {
                    valid += 1;
                    for (k, s) in sum.iter_mut().enumerate() {
                        *s += tensor[[i, j, k]];
                    }
                }
            }

            if valid == 0 {
                return sum;
            }

            l2_normalize(sum.into_iter().map(|s| s / valid as f32).collect())
        })
        .collect()
}

/// L2 normalize a vector. Zero vectors are returned unchanged.
pub(crate) fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Embedder backed by a sentence-transformer exported to ONNX.
///
/// The model is loaded on first use through a shared [`ModelCache`], so
/// constructing an embedder is cheap and several embedders for the same
/// model share one session.
pub struct OnnxEmbedder {
    config: EmbeddingConfig,
    cache: Arc<ModelCache<OnnxModel>>,
}

impl OnnxEmbedder {
    /// Create an embedder for `config.model_name`.
    pub fn new(config: EmbeddingConfig, cache: Arc<ModelCache<OnnxModel>>) -> Self {
        Self { config, cache }
    }

    /// Get the loaded model, loading it if needed.
    pub fn model(&self) -> Result<Arc<OnnxModel>> {
        let model_dir = self.config.model_path();
        let num_threads = self.config.num_threads;
        self.cache.get_or_load(&self.config.model_name, |name| {
            OnnxModel::load(&model_dir, name, num_threads)
        })
    }

    fn embed_prefixed(&self, texts: &[&str], prefix: &str, batch_size: usize) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model()?;
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(batch_size.max(1)) {
            let prefixed: Vec<String> = batch.iter().map(|t| format!("{}{}", prefix, t)).collect();
            embeddings.extend(model.embed_batch(&prefixed)?);
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn encode(&self, texts: &[&str], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        info!("Encoding {} texts", texts.len());
        self.embed_prefixed(texts, &self.config.document_prefix, batch_size)
    }

    async fn encode_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_prefixed(&[text], &self.config.query_prefix, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::embedding("No embedding returned"))
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
