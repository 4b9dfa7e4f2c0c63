//! Processing batch operations.

use rusqlite::{OptionalExtension, params};

use super::models::{BATCH_COLUMNS, BatchStatus, FileStatus, ProcessingBatch};
use super::{Database, now_timestamp};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Insert a new batch
    pub fn insert_batch(&self, batch: &ProcessingBatch) -> ServiceResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO processing_batches (id, uploaded_by, status, total_files, processed_files, completed_files, failed_files, rejected_files, error_message, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                batch.id,
                batch.uploaded_by,
                batch.status.as_str(),
                batch.total_files,
                batch.processed_files,
                batch.completed_files,
                batch.failed_files,
                batch.rejected_files,
                batch.error_message,
                batch.created_at.to_rfc3339(),
                batch.updated_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Get a batch by ID
    pub fn get_batch(&self, id: &str) -> ServiceResult<Option<ProcessingBatch>> {
        let conn = self.conn()?;

        conn.query_row(
            &format!("SELECT {} FROM processing_batches WHERE id = ?1", BATCH_COLUMNS),
            params![id],
            ProcessingBatch::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// List batches, newest first, optionally filtered by status
    pub fn list_batches(&self, status: Option<BatchStatus>) -> ServiceResult<Vec<ProcessingBatch>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM processing_batches WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC",
                BATCH_COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let batches = stmt
            .query_map(params![status.map(|s| s.as_str())], ProcessingBatch::from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(batches)
    }

    /// Record the outcome of the upload step
    pub fn finish_batch_upload(
        &self,
        batch_id: &str,
        accepted: u32,
        rejected: u32,
        status: BatchStatus,
    ) -> ServiceResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            UPDATE processing_batches
            SET total_files = ?1, rejected_files = ?2, status = ?3, updated_at = ?4,
                completed_at = CASE WHEN ?3 = 'failed' THEN ?4 ELSE completed_at END
            WHERE id = ?5
            "#,
            params![accepted, rejected, status.as_str(), now_timestamp(), batch_id],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Count a batch's files by status
    pub fn batch_file_status_counts(&self, batch_id: &str) -> ServiceResult<Vec<(FileStatus, u32)>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT status, COUNT(*) FROM processing_files WHERE batch_id = ?1 GROUP BY status",
            )
            .map_err(DatabaseError::Query)?;

        let counts = stmt
            .query_map(params![batch_id], |row| {
                let status: String = row.get(0)?;
                Ok((FileStatus::from_db(&status), row.get::<_, u32>(1)?))
            })
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(counts)
    }

    /// Store recomputed counters together with the status they imply
    pub fn update_batch_progress(
        &self,
        batch_id: &str,
        completed: u32,
        failed: u32,
        status: BatchStatus,
    ) -> ServiceResult<()> {
        let conn = self.conn()?;
        let now = now_timestamp();

        conn.execute(
            r#"
            UPDATE processing_batches
            SET completed_files = ?1, failed_files = ?2, processed_files = ?1 + ?2,
                status = ?3,
                completed_at = CASE WHEN ?3 = 'processing' THEN NULL ELSE COALESCE(completed_at, ?4) END,
                updated_at = ?4
            WHERE id = ?5
            "#,
            params![completed, failed, status.as_str(), now, batch_id],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Set a batch's status directly (out-of-band notifications)
    pub fn set_batch_status(
        &self,
        batch_id: &str,
        status: BatchStatus,
        error_message: Option<&str>,
    ) -> ServiceResult<bool> {
        let conn = self.conn()?;

        let rows = conn
            .execute(
                "UPDATE processing_batches SET status = ?1, error_message = COALESCE(?2, error_message), updated_at = ?3 WHERE id = ?4",
                params![status.as_str(), error_message, now_timestamp(), batch_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }
}
