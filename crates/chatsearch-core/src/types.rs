//! Core domain types for chat search.

use serde::{Deserialize, Serialize};

/// Identifier of a message, unique within a chat and topic.
pub type MessageId = i64;

/// `message_type` of joins, pins and other events without searchable text.
pub const SERVICE_MESSAGE_TYPE: &str = "service";

/// Role given to an important user when none is specified.
pub const DEFAULT_IMPORTANT_ROLE: &str = "important";

/// A single chat message as produced by the ingestion step.
///
/// Messages are immutable once stored; the search engine only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier assigned by the chat service.
    pub id: MessageId,

    /// Chat the message belongs to.
    pub chat_id: String,

    /// Forum topic, if the chat is split into topics.
    #[serde(default)]
    pub topic_id: Option<String>,

    /// Display name of the author.
    pub sender: String,

    /// Kind of message ("text", "media", "service", ...).
    #[serde(default = "default_message_type")]
    pub message_type: String,

    /// Raw text as exported.
    #[serde(default)]
    pub text: String,

    /// Text normalized for search.
    #[serde(default)]
    pub text_clean: String,

    /// Send time, ISO-8601.
    pub timestamp: String,

    /// Message this one replies to.
    #[serde(default)]
    pub reply_to: Option<MessageId>,

    /// Whether the sender is on the important users list.
    #[serde(default)]
    pub is_important_user: bool,
}

fn default_message_type() -> String {
    "text".to_string()
}

impl Message {
    /// Create a plain text message. `text_clean` is the trimmed text.
    pub fn new(id: MessageId, chat_id: &str, sender: &str, text: &str, timestamp: &str) -> Self {
        Self {
            id,
            chat_id: chat_id.to_string(),
            topic_id: None,
            sender: sender.to_string(),
            message_type: default_message_type(),
            text: text.to_string(),
            text_clean: text.trim().to_string(),
            timestamp: timestamp.to_string(),
            reply_to: None,
            is_important_user: false,
        }
    }

    /// Set the topic.
    pub fn with_topic(mut self, topic_id: &str) -> Self {
        self.topic_id = Some(topic_id.to_string());
        self
    }

    /// The text used for classification and display: `text_clean` when
    /// present, the raw text otherwise.
    pub fn search_text(&self) -> &str {
        if self.text_clean.trim().is_empty() {
            &self.text
        } else {
            &self.text_clean
        }
    }
}

/// A chat member whose messages are highlighted in results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportantUser {
    /// Sender name exactly as it appears in the chat.
    pub name: String,

    /// Free-form role ("admin", "moderator", "expert", ...).
    pub role: String,
}

impl ImportantUser {
    /// Create an important user with the given role.
    pub fn new(name: &str, role: &str) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
        }
    }
}

/// Which retrieval path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Found only by embedding similarity.
    Vector,
    /// Found only by full-text search.
    Lexical,
    /// Found by both paths.
    Hybrid,
}

impl MatchType {
    /// Combine the origin of a candidate seen on more than one path.
    pub fn merge(self, other: MatchType) -> MatchType {
        if self == other {
            self
        } else {
            MatchType::Hybrid
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Vector => "vector",
            Self::Lexical => "lexical",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{}", s)
    }
}

/// A search result with score and message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result rank (1-indexed).
    pub rank: u32,

    /// Relevance score (higher is better within one result list).
    pub score: f64,

    /// Path(s) the message was found by.
    pub match_type: MatchType,

    /// The matched message.
    pub message: Message,
}

/// Search results container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// The original query.
    pub query: String,

    /// Total results returned.
    pub total_results: usize,

    /// Search latency in milliseconds.
    pub latency_ms: u64,

    /// Individual results.
    pub results: Vec<SearchResult>,
}

impl SearchResults {
    /// Wrap a result list.
    pub fn new(query: &str, results: Vec<SearchResult>, latency_ms: u64) -> Self {
        Self {
            query: query.to_string(),
            total_results: results.len(),
            latency_ms,
            results,
        }
    }

    /// Keep only results accepted by `keep`, renumbering ranks from 1.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&SearchResult) -> bool,
    {
        self.results.retain(|r| keep(r));
        for (i, result) in self.results.iter_mut().enumerate() {
            result.rank = i as u32 + 1;
        }
        self.total_results = self.results.len();
    }
}

/// Embedding rows as stored: ids and vectors in matching order.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingRows {
    /// Message ids, one per vector.
    pub ids: Vec<MessageId>,

    /// Vectors, one per id.
    pub vectors: Vec<Vec<f32>>,
}

impl EmbeddingRows {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Statistics about the message store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    /// Number of messages.
    pub messages: u64,

    /// Number of stored embeddings.
    pub embeddings: u64,

    /// Distinct embedding model names present in the store.
    pub embedding_models: Vec<String>,

    /// Number of users on the important users list.
    pub important_users: u64,

    /// Database size in bytes.
    pub storage_bytes: u64,
}

impl Stats {
    /// Messages that still lack an embedding.
    pub fn missing_embeddings(&self) -> u64 {
        self.messages.saturating_sub(self.embeddings)
    }
}
