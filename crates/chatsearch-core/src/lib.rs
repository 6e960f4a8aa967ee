//! chatsearch-core - Core types and traits for chat transcript search
//!
//! This crate provides the message model, search result types, the
//! collaborator traits (storage and embedding backends), configuration
//! and error handling shared by the rest of the workspace.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{Result, SearchError};
pub use traits::*;
pub use types::*;
