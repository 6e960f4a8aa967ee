//! Configuration types for chat search.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatSearchConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Enable WAL mode (recommended).
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// SQLite cache size in KB (negative = KB, positive = pages).
    #[serde(default = "default_cache_size")]
    pub cache_size: i32,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            wal_mode: true,
            cache_size: default_cache_size(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

/// Which embedding backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// ONNX Runtime with a sentence-transformer export.
    #[default]
    Onnx,
    /// Deterministic hash vectors, no model files needed.
    Mock,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend implementation.
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Model name; also the subdirectory of `model_dir` holding its files.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Directory containing one subdirectory per model.
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Output dimension of the model.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Batch size for embedding.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of threads for CPU inference.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Prefix prepended to queries (asymmetric models only).
    #[serde(default)]
    pub query_prefix: String,

    /// Prefix prepended to documents (asymmetric models only).
    #[serde(default)]
    pub document_prefix: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Onnx,
            model_name: default_model_name(),
            model_dir: default_model_dir(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            num_threads: default_num_threads(),
            query_prefix: String::new(),
            document_prefix: String::new(),
        }
    }
}

impl EmbeddingConfig {
    /// Directory holding `model.onnx` and `tokenizer.json` for the model.
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_name)
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Maximum number of results.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// RRF smoothing constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    /// Each path fetches `top_k * candidate_multiplier` candidates.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// Weight for the vector path. Accepted, not applied by RRF.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// Weight for the keyword path. Accepted, not applied by RRF.
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Time budget for one full-text query.
    #[serde(default = "default_lexical_timeout")]
    pub lexical_timeout_ms: u64,

    /// Drop low-value messages from displayed results.
    #[serde(default = "default_true")]
    pub filter_low_value: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            rrf_k: default_rrf_k(),
            candidate_multiplier: default_candidate_multiplier(),
            vector_weight: default_vector_weight(),
            keyword_weight: default_keyword_weight(),
            lexical_timeout_ms: default_lexical_timeout(),
            filter_low_value: true,
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_cache_size() -> i32 {
    -64000
}

fn default_busy_timeout() -> u32 {
    30000
}

fn default_model_name() -> String {
    "paraphrase-multilingual-MiniLM-L12-v2".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_batch_size() -> usize {
    32
}

fn default_num_threads() -> usize {
    4
}

fn default_top_k() -> usize {
    15
}

fn default_max_top_k() -> usize {
    100
}

fn default_rrf_k() -> u32 {
    60
}

fn default_candidate_multiplier() -> usize {
    2
}

fn default_vector_weight() -> f32 {
    0.6
}

fn default_keyword_weight() -> f32 {
    0.4
}

fn default_lexical_timeout() -> u64 {
    5000
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatsearch")
        .join("messages.db")
}

fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatsearch")
        .join("models")
}

impl ChatSearchConfig {
    /// Load configuration from file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> crate::error::Result<Self> {
        toml::from_str(content).map_err(|e| crate::error::SearchError::Config {
            message: format!("Failed to parse config: {}", e),
        })
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("chatsearch").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("chatsearch.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }
}
