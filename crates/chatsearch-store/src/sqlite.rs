//! SQLite-based storage implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use chatsearch_core::{
    DatabaseConfig, EmbeddingRows, ImportantUser, Message, MessageId, MessageStore, Result,
    SearchError, Stats, SERVICE_MESSAGE_TYPE,
};

use crate::schema::{MIGRATE_V1_TO_V2, SCHEMA, SCHEMA_VERSION};

const MESSAGE_COLUMNS: &str = "id, chat_id, topic_id, sender, message_type, text, text_clean, \
     timestamp, reply_to, is_important_user";

/// SQLite-based store implementation.
///
/// The connection sits behind a blocking Mutex and every operation runs on
/// tokio's blocking pool, so a caller-side timeout returns control even
/// when a query is slow.
pub struct SqliteStore {
    /// Connection wrapped in blocking Mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = DatabaseConfig {
            path: path.as_ref().to_path_buf(),
            ..DatabaseConfig::default()
        };
        Self::open_with_config(&config)
    }

    /// Open or create a database described by `config`.
    pub fn open_with_config(config: &DatabaseConfig) -> Result<Self> {
        let path = config.path.as_path();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| SearchError::database(format!("Failed to open database: {}", e)))?;

        Self::init(conn, config, path)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            SearchError::database(format!("Failed to open in-memory database: {}", e))
        })?;

        Self::init(conn, &DatabaseConfig::default(), Path::new(":memory:"))
    }

    /// Initialize the store with a connection.
    fn init(conn: Connection, config: &DatabaseConfig, path: &Path) -> Result<Self> {
        Self::configure_connection(&conn, config)?;

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| SearchError::database(format!("Failed to read schema version: {}", e)))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| SearchError::database(format!("Failed to initialize schema: {}", e)))?;

        if version == 1 {
            info!("Migrating schema from version 1 to {}", SCHEMA_VERSION);
            conn.execute_batch(MIGRATE_V1_TO_V2)
                .map_err(|e| SearchError::database(format!("Failed to migrate schema: {}", e)))?;
        }
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|e| SearchError::database(format!("Failed to set schema version: {}", e)))?;

        info!("Database opened at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Configure SQLite connection for optimal performance.
    fn configure_connection(conn: &Connection, config: &DatabaseConfig) -> Result<()> {
        let journal_mode = if config.wal_mode { "WAL" } else { "DELETE" };
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode = {};
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = {};
            PRAGMA busy_timeout = {};
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
            journal_mode, config.cache_size, config.busy_timeout_ms
        ))
        .map_err(|e| SearchError::database(format!("Failed to configure connection: {}", e)))?;

        Ok(())
    }

    /// Run a closure against the connection on the blocking thread pool.
    async fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| SearchError::database(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| SearchError::internal(format!("Database task failed: {}", e)))?
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    // Message operations

    async fn insert_messages(&self, messages: &[Message]) -> Result<usize> {
        let messages: Vec<Message> = messages.to_vec();
        let imported_at = now_millis();

        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| SearchError::database(e.to_string()))?;

            {
                // Upsert so the FTS update trigger fires for edited messages.
                // Senders already on the important list are flagged on the way in.
                let mut stmt = tx
                    .prepare(
                        r#"
                        INSERT INTO messages (id, chat_id, topic_id, sender, message_type,
                                              text, text_clean, timestamp, reply_to,
                                              is_important_user, imported_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                                ?10 OR EXISTS (SELECT 1 FROM important_users WHERE user_name = ?4),
                                ?11)
                        ON CONFLICT(id) DO UPDATE SET
                            chat_id = excluded.chat_id,
                            topic_id = excluded.topic_id,
                            sender = excluded.sender,
                            message_type = excluded.message_type,
                            text = excluded.text,
                            text_clean = excluded.text_clean,
                            timestamp = excluded.timestamp,
                            reply_to = excluded.reply_to,
                            is_important_user = excluded.is_important_user,
                            imported_at = excluded.imported_at
                        "#,
                    )
                    .map_err(|e| SearchError::database(e.to_string()))?;

                for msg in &messages {
                    stmt.execute(params![
                        msg.id,
                        msg.chat_id,
                        msg.topic_id,
                        msg.sender,
                        msg.message_type,
                        msg.text,
                        msg.text_clean,
                        msg.timestamp,
                        msg.reply_to,
                        msg.is_important_user,
                        imported_at,
                    ])
                    .map_err(|e| SearchError::database(format!("Failed to insert message: {}", e)))?;
                }
            }

            tx.commit()
                .map_err(|e| SearchError::database(e.to_string()))?;

            info!("Inserted {} messages", messages.len());
            Ok(messages.len())
        })
        .await
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS))
                .map_err(|e| SearchError::database(e.to_string()))?;

            let result = stmt
                .query_row(params![id], |row| Self::row_to_message(row))
                .optional()
                .map_err(|e| SearchError::database(e.to_string()))?;

            Ok(result)
        })
        .await
    }

    async fn messages_with_text(&self) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    r#"
                    SELECT {} FROM messages
                    WHERE text_clean != ''
                    AND message_type != ?1
                    ORDER BY id
                    "#,
                    MESSAGE_COLUMNS
                ))
                .map_err(|e| SearchError::database(e.to_string()))?;

            let messages = stmt
                .query_map(params![SERVICE_MESSAGE_TYPE], |row| Self::row_to_message(row))
                .map_err(|e| SearchError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| SearchError::database(e.to_string()))?;

            Ok(messages)
        })
        .await
    }

    async fn lexical_search(&self, query: &str, limit: u32) -> Result<Vec<(MessageId, f32)>> {
        let query = query.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT m.id, bm25(messages_fts) AS score
                    FROM messages_fts
                    JOIN messages m ON m.id = messages_fts.rowid
                    WHERE messages_fts MATCH ?1
                    ORDER BY score, m.id
                    LIMIT ?2
                    "#,
                )
                .map_err(|e| SearchError::database(e.to_string()))?;

            let results = stmt
                .query_map(params![query, limit], |row| {
                    let id: MessageId = row.get(0)?;
                    let score: f64 = row.get(1)?;
                    Ok((id, score as f32))
                })
                .map_err(|e| SearchError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| SearchError::database(e.to_string()))?;

            debug!("FTS query {:?} matched {} messages", query, results.len());
            Ok(results)
        })
        .await
    }

    // Embedding operations

    async fn save_embeddings(
        &self,
        ids: &[MessageId],
        embeddings: &[Vec<f32>],
        model_name: &str,
    ) -> Result<()> {
        if ids.len() != embeddings.len() {
            return Err(SearchError::invalid_argument(
                "ids and embeddings must have same length",
            ));
        }

        let ids: Vec<MessageId> = ids.to_vec();
        let embeddings: Vec<Vec<f32>> = embeddings.to_vec();
        let model_name = model_name.to_string();
        let created_at = now_millis();

        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| SearchError::database(e.to_string()))?;

            {
                let mut stmt = tx
                    .prepare(
                        r#"
                        INSERT INTO message_embeddings (message_id, embedding, model_name, created_at)
                        VALUES (?1, ?2, ?3, ?4)
                        ON CONFLICT(message_id) DO UPDATE SET
                            embedding = excluded.embedding,
                            model_name = excluded.model_name,
                            created_at = excluded.created_at
                        "#,
                    )
                    .map_err(|e| SearchError::database(e.to_string()))?;

                for (id, embedding) in ids.iter().zip(embeddings.iter()) {
                    stmt.execute(params![id, vec_to_bytes(embedding), model_name, created_at])
                        .map_err(|e| {
                            SearchError::database(format!("Failed to insert embedding: {}", e))
                        })?;
                }
            }

            tx.commit()
                .map_err(|e| SearchError::database(e.to_string()))?;

            info!("Saved {} embeddings for model {}", ids.len(), model_name);
            Ok(())
        })
        .await
    }

    async fn get_all_embeddings(&self, model_name: &str) -> Result<EmbeddingRows> {
        let model_name = model_name.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT message_id, embedding FROM message_embeddings
                    WHERE model_name = ?1
                    ORDER BY message_id
                    "#,
                )
                .map_err(|e| SearchError::database(e.to_string()))?;

            let rows = stmt
                .query_map(params![model_name], |row| {
                    let id: MessageId = row.get(0)?;
                    let bytes: Vec<u8> = row.get(1)?;
                    Ok((id, bytes))
                })
                .map_err(|e| SearchError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| SearchError::database(e.to_string()))?;

            let mut out = EmbeddingRows::default();
            for (id, bytes) in rows {
                out.ids.push(id);
                out.vectors.push(bytes_to_vec(id, &bytes)?);
            }

            Ok(out)
        })
        .await
    }

    // Important users

    async fn add_important_user(&self, user: &ImportantUser) -> Result<()> {
        let name = user.name.trim().to_string();
        if name.is_empty() {
            return Err(SearchError::invalid_argument("user name must not be empty"));
        }
        let role = user.role.clone();
        let added_at = now_millis();

        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO important_users (user_name, role, added_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_name) DO UPDATE SET role = excluded.role
                "#,
                params![name, role, added_at],
            )
            .map_err(|e| SearchError::database(format!("Failed to add important user: {}", e)))?;

            info!("Added important user {} as {}", name, role);
            Ok(())
        })
        .await
    }

    async fn important_users(&self) -> Result<Vec<ImportantUser>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT user_name, role FROM important_users ORDER BY user_name")
                .map_err(|e| SearchError::database(e.to_string()))?;

            let users = stmt
                .query_map([], |row| {
                    Ok(ImportantUser {
                        name: row.get(0)?,
                        role: row.get(1)?,
                    })
                })
                .map_err(|e| SearchError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| SearchError::database(e.to_string()))?;

            Ok(users)
        })
        .await
    }

    async fn mark_important_messages(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let marked = conn
                .execute(
                    r#"
                    UPDATE messages SET is_important_user = 1
                    WHERE is_important_user = 0
                    AND sender IN (SELECT user_name FROM important_users)
                    "#,
                    [],
                )
                .map_err(|e| SearchError::database(e.to_string()))?;

            debug!("Flagged {} messages from important users", marked);
            Ok(marked)
        })
        .await
    }

    // Stats

    async fn get_stats(&self) -> Result<Stats> {
        self.with_conn(|conn| {
            let messages: u64 = conn
                .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
                .map_err(|e| SearchError::database(e.to_string()))?;

            let embeddings: u64 = conn
                .query_row("SELECT COUNT(*) FROM message_embeddings", [], |row| row.get(0))
                .map_err(|e| SearchError::database(e.to_string()))?;

            let mut stmt = conn
                .prepare("SELECT DISTINCT model_name FROM message_embeddings ORDER BY model_name")
                .map_err(|e| SearchError::database(e.to_string()))?;
            let embedding_models = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| SearchError::database(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| SearchError::database(e.to_string()))?;

            let important_users: u64 = conn
                .query_row("SELECT COUNT(*) FROM important_users", [], |row| row.get(0))
                .map_err(|e| SearchError::database(e.to_string()))?;

            // Get page count and page size to estimate storage
            let page_count: u64 = conn
                .query_row("PRAGMA page_count", [], |row| row.get(0))
                .unwrap_or(0);
            let page_size: u64 = conn
                .query_row("PRAGMA page_size", [], |row| row.get(0))
                .unwrap_or(4096);

            Ok(Stats {
                messages,
                embeddings,
                embedding_models,
                important_users,
                storage_bytes: page_count * page_size,
            })
        })
        .await
    }
}

// Helper methods
impl SqliteStore {
    /// Convert a row to a Message.
    fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
        Ok(Message {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            topic_id: row.get(2)?,
            sender: row.get(3)?,
            message_type: row.get(4)?,
            text: row.get(5)?,
            text_clean: row.get(6)?,
            timestamp: row.get(7)?,
            reply_to: row.get(8)?,
            is_important_user: row.get(9)?,
        })
    }
}

/// Convert f32 vector to bytes (little-endian).
fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a little-endian f32 blob.
fn bytes_to_vec(id: MessageId, bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(SearchError::database(format!(
            "Corrupt embedding for message {}: {} bytes",
            id,
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: MessageId, sender: &str, text: &str) -> Message {
        Message::new(id, "chat", sender, text, "2024-03-01T12:00:00")
    }

    async fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_memory().unwrap();
        store
            .insert_messages(&[
                msg(1, "ana", "me gusta Python para scripts"),
                msg(2, "luis", "prefiero JavaScript en el navegador"),
                msg(3, "ana", "Python Python Python"),
                msg(4, "eva", "jajaja"),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_open_memory() {
        let store = SqliteStore::open_memory().unwrap();
        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.messages, 0);
        assert_eq!(stats.embeddings, 0);
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("messages.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_messages(&[msg(1, "ana", "hola")]).await.unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.get_message(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_message_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let mut original = msg(42, "ana", "hola mundo").with_topic("1478");
        original.reply_to = Some(41);
        store.insert_messages(&[original.clone()]).await.unwrap();

        let loaded = store.get_message(42).await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(store.get_message(43).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lexical_search_ranks_by_bm25() {
        let store = seeded_store().await;

        let results = store.lexical_search("Python", 10).await.unwrap();
        let ids: Vec<MessageId> = results.iter().map(|(id, _)| *id).collect();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&1));
        assert!(ids.contains(&3));
        // bm25 is ascending: lower is better
        assert!(results[0].1 <= results[1].1);
        // Denser match ranks first
        assert_eq!(ids[0], 3);
    }

    #[tokio::test]
    async fn test_lexical_search_limit_and_sender() {
        let store = seeded_store().await;

        let results = store.lexical_search("Python", 1).await.unwrap();
        assert_eq!(results.len(), 1);

        let by_sender = store.lexical_search("luis", 10).await.unwrap();
        assert_eq!(by_sender.len(), 1);
        assert_eq!(by_sender[0].0, 2);
    }

    #[tokio::test]
    async fn test_lexical_search_syntax_error_is_database_error() {
        let store = seeded_store().await;
        let err = store.lexical_search("\"unbalanced", 10).await.unwrap_err();
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn test_upsert_updates_fts() {
        let store = seeded_store().await;
        store
            .insert_messages(&[msg(2, "luis", "ahora uso Rust")])
            .await
            .unwrap();

        assert!(store.lexical_search("JavaScript", 10).await.unwrap().is_empty());
        let rust = store.lexical_search("Rust", 10).await.unwrap();
        assert_eq!(rust.len(), 1);
        assert_eq!(rust[0].0, 2);
        assert_eq!(store.get_stats().await.unwrap().messages, 4);
    }

    #[tokio::test]
    async fn test_messages_with_text_skips_service_and_empty() {
        let store = SqliteStore::open_memory().unwrap();
        let mut service = msg(2, "system", "ana joined the group");
        service.message_type = "service".to_string();
        let mut media = msg(3, "ana", "");
        media.message_type = "media".to_string();

        store
            .insert_messages(&[msg(1, "ana", "hola"), service, media, msg(4, "luis", "adios")])
            .await
            .unwrap();

        let ids: Vec<MessageId> = store
            .messages_with_text()
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[tokio::test]
    async fn test_embeddings_storage() {
        let store = seeded_store().await;

        store
            .save_embeddings(&[3, 1], &[vec![0.0, 1.0], vec![1.0, -0.5]], "mini")
            .await
            .unwrap();

        let rows = store.get_all_embeddings("mini").await.unwrap();
        assert_eq!(rows.ids, vec![1, 3]);
        assert_eq!(rows.vectors[0], vec![1.0, -0.5]);
        assert_eq!(rows.vectors[1], vec![0.0, 1.0]);

        // Re-embedding replaces rather than duplicates
        store
            .save_embeddings(&[1], &[vec![0.25, 0.25]], "mini-v2")
            .await
            .unwrap();
        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.embeddings, 2);
        assert_eq!(stats.embedding_models, vec!["mini".to_string(), "mini-v2".to_string()]);
        assert_eq!(stats.missing_embeddings(), 2);
    }

    #[tokio::test]
    async fn test_embeddings_filtered_by_model() {
        let store = seeded_store().await;
        store
            .save_embeddings(&[1, 2], &[vec![1.0, 0.0], vec![0.0, 1.0]], "mock-2")
            .await
            .unwrap();
        store
            .save_embeddings(&[3], &[vec![0.6, 0.8]], "mini")
            .await
            .unwrap();

        let mock = store.get_all_embeddings("mock-2").await.unwrap();
        assert_eq!(mock.ids, vec![1, 2]);

        let mini = store.get_all_embeddings("mini").await.unwrap();
        assert_eq!(mini.ids, vec![3]);
        assert_eq!(mini.vectors, vec![vec![0.6, 0.8]]);

        assert!(store.get_all_embeddings("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_embeddings_length_mismatch() {
        let store = seeded_store().await;
        let err = store
            .save_embeddings(&[1, 2], &[vec![1.0]], "mini")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_important_users() {
        let store = seeded_store().await;

        store
            .add_important_user(&ImportantUser::new("ana", "admin"))
            .await
            .unwrap();
        store
            .add_important_user(&ImportantUser::new("luis", "important"))
            .await
            .unwrap();
        // Re-adding updates the role
        store
            .add_important_user(&ImportantUser::new("luis", "expert"))
            .await
            .unwrap();

        let users = store.important_users().await.unwrap();
        assert_eq!(
            users,
            vec![ImportantUser::new("ana", "admin"), ImportantUser::new("luis", "expert")]
        );
        assert_eq!(store.get_stats().await.unwrap().important_users, 2);

        // ana wrote 1 and 3, luis wrote 2
        assert_eq!(store.mark_important_messages().await.unwrap(), 3);
        assert!(store.get_message(1).await.unwrap().unwrap().is_important_user);
        assert!(store.get_message(2).await.unwrap().unwrap().is_important_user);
        assert!(!store.get_message(4).await.unwrap().unwrap().is_important_user);

        // Already flagged messages are not counted again
        assert_eq!(store.mark_important_messages().await.unwrap(), 0);

        // Flagging leaves the keyword index intact
        assert_eq!(store.lexical_search("Python", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_new_messages_from_important_users_are_flagged() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .add_important_user(&ImportantUser::new("eva", "moderator"))
            .await
            .unwrap();

        store
            .insert_messages(&[msg(1, "eva", "reglas del grupo"), msg(2, "ana", "vale")])
            .await
            .unwrap();

        assert!(store.get_message(1).await.unwrap().unwrap().is_important_user);
        assert!(!store.get_message(2).await.unwrap().unwrap().is_important_user);
    }

    #[tokio::test]
    async fn test_important_user_name_required() {
        let store = SqliteStore::open_memory().unwrap();
        let err = store
            .add_important_user(&ImportantUser::new("  ", "admin"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
        assert!(store.important_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrates_version_1_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v1.db");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE messages (
                    id INTEGER PRIMARY KEY,
                    chat_id TEXT NOT NULL,
                    topic_id TEXT,
                    sender TEXT NOT NULL,
                    message_type TEXT NOT NULL,
                    text TEXT NOT NULL DEFAULT '',
                    text_clean TEXT NOT NULL DEFAULT '',
                    timestamp TEXT NOT NULL,
                    reply_to INTEGER,
                    imported_at INTEGER NOT NULL
                );
                INSERT INTO messages (id, chat_id, sender, message_type, text, text_clean,
                                      timestamp, imported_at)
                VALUES (1, 'chat', 'ana', 'text', 'hola', 'hola', '2024-03-01T12:00:00', 0);
                PRAGMA user_version = 1;
                "#,
            )
            .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.get_message(1).await.unwrap().unwrap();
        assert!(!loaded.is_important_user);

        store
            .add_important_user(&ImportantUser::new("ana", "admin"))
            .await
            .unwrap();
        assert_eq!(store.mark_important_messages().await.unwrap(), 1);
    }

    #[test]
    fn test_corrupt_blob() {
        assert!(bytes_to_vec(1, &[0, 0, 0]).is_err());
        assert_eq!(bytes_to_vec(1, &vec_to_bytes(&[1.5, -2.0])).unwrap(), vec![1.5, -2.0]);
    }
}
