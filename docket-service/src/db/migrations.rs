//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Current schema version, stored in `PRAGMA user_version`
const SCHEMA_VERSION: i32 = 1;

/// Run all database migrations.
///
/// Called during database initialization to ensure the schema is current.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(DatabaseError::Query)?;

    if version > SCHEMA_VERSION {
        return Err(DatabaseError::Migration {
            message: format!(
                "database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            ),
        }
        .into());
    }

    conn.execute_batch(
        r#"
        -- Upload batches; never deleted
        CREATE TABLE IF NOT EXISTS processing_batches (
            id TEXT PRIMARY KEY,
            uploaded_by TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'created',
            total_files INTEGER NOT NULL DEFAULT 0,
            processed_files INTEGER NOT NULL DEFAULT 0,
            completed_files INTEGER NOT NULL DEFAULT 0,
            failed_files INTEGER NOT NULL DEFAULT 0,
            rejected_files INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            completed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_batches_status ON processing_batches(status);

        -- Library documents
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            authors TEXT NOT NULL DEFAULT '[]',
            publication_date TEXT,
            doc_type TEXT NOT NULL DEFAULT 'other',
            doc_category TEXT NOT NULL DEFAULT 'Other',
            description TEXT,
            keywords TEXT NOT NULL DEFAULT '[]',
            citation TEXT,
            confidence_scores TEXT,
            confidence_score REAL,
            case_name TEXT,
            court TEXT,
            jurisdiction TEXT,
            practice_area TEXT,
            document_date TEXT,
            legal_signals TEXT,
            content_hash TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            page_count INTEGER,
            word_count INTEGER,
            chunk_count INTEGER NOT NULL DEFAULT 0,
            processing_status TEXT NOT NULL DEFAULT 'processing',
            is_reviewed INTEGER NOT NULL DEFAULT 0,
            reviewed_by TEXT,
            reviewed_at TEXT,
            review_notes TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_by TEXT,
            deleted_at TEXT,
            uploaded_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);
        CREATE INDEX IF NOT EXISTS idx_documents_review
            ON documents(is_reviewed, is_deleted, processing_status);

        -- One row per uploaded file
        CREATE TABLE IF NOT EXISTS processing_files (
            id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            document_id TEXT,
            original_filename TEXT NOT NULL,
            stored_path TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'uploaded',
            retry_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            extracted_text TEXT,
            page_count INTEGER,
            word_count INTEGER,
            char_count INTEGER,
            chunk_count INTEGER NOT NULL DEFAULT 0,
            uploaded_by TEXT NOT NULL,
            reviewed_by TEXT,
            reviewed_at TEXT,
            review_notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (batch_id) REFERENCES processing_batches(id),
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_files_batch ON processing_files(batch_id);
        CREATE INDEX IF NOT EXISTS idx_files_status ON processing_files(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_files_hash ON processing_files(content_hash);
        CREATE INDEX IF NOT EXISTS idx_files_document ON processing_files(document_id);

        -- Embedded chunks; removed with their document
        CREATE TABLE IF NOT EXISTS document_chunks (
            id TEXT PRIMARY KEY,
            processing_file_id TEXT NOT NULL,
            document_id TEXT,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            token_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (processing_file_id, chunk_index),
            FOREIGN KEY (processing_file_id) REFERENCES processing_files(id) ON DELETE CASCADE,
            FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_document ON document_chunks(document_id);
        "#,
    )
    .map_err(DatabaseError::Query)?;

    conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .map_err(DatabaseError::Query)?;

    Ok(())
}
