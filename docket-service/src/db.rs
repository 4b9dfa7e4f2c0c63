//! Database module for SQLite operations.
//!
//! This module provides the `Database` struct and all database operations
//! organized into submodules by table. Multi-row changes that must stay
//! consistent (a file status and its document projection, an approval and
//! its chunk back-fill) run in a single transaction.

mod batches;
mod chunks;
mod documents;
mod files;
mod migrations;
pub mod models;
mod stats;

pub use documents::LibraryFilter;
pub use models::{
    BatchStatus, ChunkMatch, DocCategory, DocType, Document, DocumentChunk, DocumentStatus,
    FileStatus, NewChunk, ProcessingBatch, ProcessingFile,
};
pub use stats::ProcessingStats;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{DatabaseError, ServiceError, ServiceResult};

/// Database manager for SQLite operations
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> ServiceResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServiceError::Database(DatabaseError::Connection(
                    rusqlite::Error::ToSqlConversionFailure(Box::new(e)),
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(DatabaseError::Connection)?;

        // WAL for concurrent readers; foreign keys drive the chunk cascade
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> ServiceResult<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> ServiceResult<Self> {
        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> ServiceResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ServiceError::Database(DatabaseError::LockPoisoned))
    }
}

/// Current time in the format stored in every timestamp column
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// SQL list literal for a set of statuses, e.g. `('queued', 'uploaded')`
fn status_list(statuses: &[FileStatus]) -> String {
    let items: Vec<String> = statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect();
    format!("({})", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_list() {
        assert_eq!(
            status_list(&[FileStatus::Queued, FileStatus::Uploaded]),
            "('queued', 'uploaded')"
        );
    }

    #[test]
    fn test_open_on_disk_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("docket.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert!(db.list_batches(None).unwrap().is_empty());
    }
}
