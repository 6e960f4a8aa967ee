//! Database schema definitions.

/// Main schema SQL for initializing the database.
pub const SCHEMA: &str = r#"
-- Messages table
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY,
    chat_id TEXT NOT NULL,
    topic_id TEXT,
    sender TEXT NOT NULL,
    message_type TEXT NOT NULL,
    text TEXT NOT NULL DEFAULT '',
    text_clean TEXT NOT NULL DEFAULT '',
    timestamp TEXT NOT NULL,
    reply_to INTEGER,
    is_important_user INTEGER NOT NULL DEFAULT 0,
    imported_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_topic ON messages(chat_id, topic_id);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender);

-- FTS5 virtual table for keyword search
CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    text_clean,
    sender,
    content=messages,
    content_rowid=id,
    tokenize='unicode61'
);

-- Triggers to keep FTS5 in sync with messages table
CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, text_clean, sender) VALUES (NEW.id, NEW.text_clean, NEW.sender);
END;

CREATE TRIGGER IF NOT EXISTS messages_ad AFTER DELETE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, text_clean, sender)
    VALUES ('delete', OLD.id, OLD.text_clean, OLD.sender);
END;

CREATE TRIGGER IF NOT EXISTS messages_au AFTER UPDATE OF text_clean, sender ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, text_clean, sender)
    VALUES ('delete', OLD.id, OLD.text_clean, OLD.sender);
    INSERT INTO messages_fts(rowid, text_clean, sender) VALUES (NEW.id, NEW.text_clean, NEW.sender);
END;

-- Embedding vectors, little-endian f32
CREATE TABLE IF NOT EXISTS message_embeddings (
    message_id INTEGER PRIMARY KEY REFERENCES messages(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    model_name TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_embeddings_model ON message_embeddings(model_name);

-- Senders whose messages are highlighted
CREATE TABLE IF NOT EXISTS important_users (
    user_name TEXT PRIMARY KEY,
    role TEXT NOT NULL DEFAULT 'important',
    added_at INTEGER NOT NULL
);
"#;

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 2;

/// Upgrades from version 1, which had no important-user flag on messages.
pub const MIGRATE_V1_TO_V2: &str = r#"
ALTER TABLE messages ADD COLUMN is_important_user INTEGER NOT NULL DEFAULT 0;
"#;
