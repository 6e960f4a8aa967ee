//! chatsearch-store - SQLite storage layer
//!
//! This crate provides persistent storage for chat messages and their
//! embedding vectors using SQLite, with an FTS5 index over the normalized
//! message text for BM25-ranked keyword search.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};
