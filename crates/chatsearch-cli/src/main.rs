//! chatsearch CLI - Command-line interface for chat transcript search.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use chatsearch_core::{
    ChatSearchConfig, Embedder, EmbeddingBackend, EmbeddingConfig, ImportantUser, Message,
    MessageId, MessageStore, SearchResults, DEFAULT_IMPORTANT_ROLE,
};
use chatsearch_embed::{EmbeddingEngine, MockEmbedder, ModelCache, OnnxEmbedder, OnnxModel};
use chatsearch_query::{filter_low_value, HybridSearch, QueryConfig};
use chatsearch_store::SqliteStore;

/// Characters of message text shown per result.
const PREVIEW_CHARS: usize = 150;

/// chatsearch - Hybrid keyword and semantic search over chat transcripts
#[derive(Parser)]
#[command(name = "chatsearch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database path (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Config file (default: <config dir>/chatsearch/config.toml, then ./chatsearch.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Import normalized messages from a JSON array
    Import {
        /// JSON file produced by the transcript parser
        file: PathBuf,
    },

    /// Generate embeddings for every message with text
    Embed {
        /// Texts encoded per model call
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Search the messages
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Retrieval paths to use
        #[arg(short, long, value_enum, default_value_t = SearchMode::Hybrid)]
        mode: SearchMode,

        /// Show low-value messages too
        #[arg(long)]
        all: bool,
    },

    /// Show statistics
    Stats,

    /// Add a user whose messages are highlighted in results
    AddImportantUser {
        /// Sender name as it appears in the chat
        #[arg(short, long)]
        name: String,

        /// Role of the user (admin, moderator, expert, ...)
        #[arg(short, long, default_value = DEFAULT_IMPORTANT_ROLE)]
        role: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SearchMode {
    /// Keyword and semantic results fused by rank
    Hybrid,
    /// Embedding similarity only
    Semantic,
    /// Full-text search only
    Keyword,
}

/// The embedding backend picked by configuration.
enum AnyEmbedder {
    Onnx(OnnxEmbedder),
    Mock(MockEmbedder),
}

impl AnyEmbedder {
    fn from_config(config: &EmbeddingConfig, cache: Arc<ModelCache<OnnxModel>>) -> Self {
        match config.backend {
            EmbeddingBackend::Onnx => Self::Onnx(OnnxEmbedder::new(config.clone(), cache)),
            EmbeddingBackend::Mock => Self::Mock(MockEmbedder::with_dimension(config.dimension)),
        }
    }

    fn inner(&self) -> &dyn Embedder {
        match self {
            Self::Onnx(e) => e,
            Self::Mock(e) => e,
        }
    }
}

#[async_trait]
impl Embedder for AnyEmbedder {
    async fn encode(&self, texts: &[&str], batch_size: usize) -> chatsearch_core::Result<Vec<Vec<f32>>> {
        self.inner().encode(texts, batch_size).await
    }

    async fn encode_query(&self, text: &str) -> chatsearch_core::Result<Vec<f32>> {
        self.inner().encode_query(text).await
    }

    fn dimension(&self) -> usize {
        self.inner().dimension()
    }

    fn model_name(&self) -> &str {
        self.inner().model_name()
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(
    path: Option<&Path>,
    database: Option<PathBuf>,
) -> Result<ChatSearchConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => ChatSearchConfig::load(path)?,
        None => ChatSearchConfig::load_default()?,
    };

    if let Some(database) = database {
        config.database.path = database;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.database)?;

    // One model cache for the whole process
    let model_cache = Arc::new(ModelCache::new());

    match cli.command {
        Commands::Init => {
            init_database(&config)?;
        }
        Commands::Import { file } => {
            let store = open_store(&config)?;
            let count = import(&store, &file).await?;
            println!("Imported {} messages from {}", count, file.display());
        }
        Commands::Embed { batch_size } => {
            let store = open_store(&config)?;
            let embedder = AnyEmbedder::from_config(&config.embedding, model_cache);
            let batch_size = batch_size.unwrap_or(config.embedding.batch_size);
            let engine = EmbeddingEngine::new(Arc::new(embedder), batch_size);
            let count = embed(&store, &engine).await?;
            println!("Generated {} embeddings", count);
            println!("Model: {}", engine.model_name());
        }
        Commands::Search {
            query,
            top_k,
            mode,
            all,
        } => {
            let store = Arc::new(open_store(&config)?);
            let important = store.important_users().await?;

            let embedder = AnyEmbedder::from_config(&config.embedding, model_cache);
            let engine = HybridSearch::new(
                store,
                EmbeddingEngine::new(Arc::new(embedder), config.embedding.batch_size),
                config.search.clone(),
            );

            let top_k = top_k.unwrap_or(config.search.default_top_k);
            let mut results = search(&engine, &query, top_k, mode).await?;

            if !all && config.search.filter_low_value {
                filter_low_value(&mut results);
            }

            print_results(&results, &important);
        }
        Commands::Stats => {
            let store = open_store(&config)?;
            stats(&store).await?;
        }
        Commands::AddImportantUser { name, role } => {
            let store = open_store(&config)?;
            let marked = add_important_user(&store, &ImportantUser::new(&name, &role)).await?;
            println!("Added '{}' as {}", name.trim(), role);
            println!("{} messages marked as important", marked);
        }
    }

    Ok(())
}

fn init_database(config: &ChatSearchConfig) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = &config.database.path;

    // Create parent directory if needed
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let _store = SqliteStore::open_with_config(&config.database)?;
    println!("Initialized database at: {}", db_path.display());
    Ok(())
}

fn open_store(config: &ChatSearchConfig) -> Result<SqliteStore, Box<dyn std::error::Error>> {
    let db_path = &config.database.path;

    if !db_path.exists() {
        eprintln!(
            "Database not found at {}. Run 'chatsearch init' first, or specify a path with -d.",
            db_path.display()
        );
        std::process::exit(1);
    }

    Ok(SqliteStore::open_with_config(&config.database)?)
}

/// Parse exported messages, filling in normalized text where missing.
fn parse_messages(json: &str) -> Result<Vec<Message>, serde_json::Error> {
    let mut messages: Vec<Message> = serde_json::from_str(json)?;

    for message in &mut messages {
        if message.text_clean.trim().is_empty() {
            message.text_clean = message.text.trim().to_string();
        }
    }

    Ok(messages)
}

async fn import<S: MessageStore>(
    store: &S,
    file: &Path,
) -> Result<usize, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(file)?;
    let messages = parse_messages(&content)?;

    info!("Importing {} messages from {:?}", messages.len(), file);

    Ok(store.insert_messages(&messages).await?)
}

async fn embed<S: MessageStore, E: Embedder>(
    store: &S,
    engine: &EmbeddingEngine<E>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let messages = store.messages_with_text().await?;

    if messages.is_empty() {
        println!("No messages with text to embed");
        return Ok(0);
    }

    println!(
        "Embedding {} messages with {}...",
        messages.len(),
        engine.model_name()
    );

    let mut done = 0;

    // One model call and one transaction per batch
    for batch in messages.chunks(engine.batch_size()) {
        let ids: Vec<MessageId> = batch.iter().map(|m| m.id).collect();
        let texts: Vec<&str> = batch.iter().map(|m| m.search_text()).collect();

        let vectors = engine.encode(&texts).await?;
        store
            .save_embeddings(&ids, &vectors, engine.model_name())
            .await?;

        done += batch.len();
        info!("Embedded {}/{}", done, messages.len());
    }

    Ok(done)
}

async fn search<S: MessageStore, E: Embedder>(
    engine: &HybridSearch<S, E>,
    query: &str,
    top_k: usize,
    mode: SearchMode,
) -> Result<SearchResults, Box<dyn std::error::Error>> {
    let results = match mode {
        SearchMode::Hybrid => {
            let config = QueryConfig::from_search_config(engine.config()).with_top_k(top_k);
            match engine.search(query, &config).await {
                Ok(results) => results,
                Err(e) if e.is_backend_unavailable() => {
                    warn!("{}", e);
                    eprintln!("Embedding model unavailable, falling back to keyword search");
                    engine.keyword_search_only(query, top_k).await?
                }
                Err(e) => return Err(e.into()),
            }
        }
        SearchMode::Semantic => engine.semantic_search_only(query, top_k).await?,
        SearchMode::Keyword => engine.keyword_search_only(query, top_k).await?,
    };

    Ok(results)
}

fn preview(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }

    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}

/// Add `user` to the important list and flag their stored messages.
///
/// Returns the number of messages newly flagged.
async fn add_important_user<S: MessageStore>(
    store: &S,
    user: &ImportantUser,
) -> Result<usize, Box<dyn std::error::Error>> {
    store.add_important_user(user).await?;
    Ok(store.mark_important_messages().await?)
}

/// Sender name, starred when the sender is an important user.
fn sender_label(message: &Message, important: &HashSet<&str>) -> String {
    if message.is_important_user || important.contains(message.sender.as_str()) {
        format!("★ {}", message.sender)
    } else {
        message.sender.clone()
    }
}

fn print_results(results: &SearchResults, important_users: &[ImportantUser]) {
    let important: HashSet<&str> = important_users.iter().map(|u| u.name.as_str()).collect();

    if results.results.is_empty() {
        println!("No results for {:?}", results.query);
        return;
    }

    println!(
        "{} results for {:?} ({}ms)\n",
        results.total_results, results.query, results.latency_ms
    );

    for result in &results.results {
        println!(
            "{:>3}. [{}] {:.4}  {} ({})",
            result.rank,
            result.match_type,
            result.score,
            sender_label(&result.message, &important),
            result.message.timestamp
        );
        println!("     {}", preview(result.message.search_text()));
    }
}

async fn stats<S: MessageStore>(store: &S) -> Result<(), Box<dyn std::error::Error>> {
    let stats = store.get_stats().await?;

    println!("Messages:   {}", stats.messages);
    println!("Embeddings: {}", stats.embeddings);
    if !stats.embedding_models.is_empty() {
        println!("Models:     {}", stats.embedding_models.join(", "));
    }
    println!("Important:  {}", stats.important_users);
    println!("Size:       {} KB", stats.storage_bytes / 1024);

    if stats.important_users > 0 {
        println!("\nImportant users:");
        for user in store.important_users().await? {
            println!("  - {} ({})", user.name, user.role);
        }
    }

    if stats.missing_embeddings() > 0 {
        println!(
            "\n{} messages have no embedding. Run 'chatsearch embed'.",
            stats.missing_embeddings()
        );
    }

    Ok(())
}
