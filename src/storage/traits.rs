//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::CrawlSession;
use crate::storage::persisted::PersistedState;
use crate::storage::{RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Backends only need to store opaque blobs and run rows; the session
/// (de)serialization is shared by the provided methods.
pub trait Storage {
    // ===== Key-Value Blobs =====

    /// Reads a blob, `None` if the key was never written
    fn get_value(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes a blob, replacing any previous value
    fn put_value(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Deletes a blob
    fn delete_value(&mut self, key: &str) -> StorageResult<()>;

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, seed_url: &str, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run finished with its final status and page count
    fn finish_run(&mut self, run_id: i64, status: RunStatus, pages: usize) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run, if any
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Session =====

    /// Loads the persisted crawl session
    ///
    /// Never fails on malformed content: unreadable parts are defaulted and
    /// the `running` flag is always cleared.
    fn load_session(&self) -> StorageResult<CrawlSession> {
        let session = match self.get_value(crate::storage::schema::SESSION_KEY)? {
            Some(blob) => PersistedState::from_json(&blob).into_session(),
            None => CrawlSession::new(),
        };
        Ok(session)
    }

    /// Persists the crawl session
    fn save_session(&mut self, session: &CrawlSession) -> StorageResult<()> {
        let blob = serde_json::to_string(&PersistedState::from(session))?;
        self.put_value(crate::storage::schema::SESSION_KEY, &blob)
    }

    /// Removes the persisted crawl session
    fn clear_session(&mut self) -> StorageResult<()> {
        self.delete_value(crate::storage::schema::SESSION_KEY)
    }
}
