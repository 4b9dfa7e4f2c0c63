//! Processing file operations.
//!
//! Every status write goes through [`write_status`], which updates the file
//! and the linked document's `processing_status` projection together.
//! Conditional transitions (`from` statuses) double as the per-file guard
//! against two pipeline runs advancing the same file.

use rusqlite::{Connection, OptionalExtension, params};

use super::documents::{insert_document_row, write_metadata};
use super::models::{Document, FILE_COLUMNS, FileStatus, ProcessingFile};
use super::{Database, now_timestamp, status_list};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Insert a placeholder document and its processing file atomically
    pub fn insert_upload(&self, doc: &Document, file: &ProcessingFile) -> ServiceResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        insert_document_row(&tx, doc).map_err(DatabaseError::Query)?;
        tx.execute(
            r#"
            INSERT INTO processing_files (id, batch_id, document_id, original_filename, stored_path, mime_type, content_hash, file_size, status, retry_count, uploaded_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                file.id,
                file.batch_id,
                file.document_id,
                file.original_filename,
                file.stored_path,
                file.mime_type,
                file.content_hash,
                file.file_size as i64,
                file.status.as_str(),
                file.retry_count,
                file.uploaded_by,
                file.created_at.to_rfc3339(),
                file.updated_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(())
    }

    /// Get a file by ID
    pub fn get_file(&self, id: &str) -> ServiceResult<Option<ProcessingFile>> {
        let conn = self.conn()?;
        query_file(&conn, id).map_err(|e| DatabaseError::Query(e).into())
    }

    /// Get the most recent file linked to a document
    pub fn get_file_by_document(&self, document_id: &str) -> ServiceResult<Option<ProcessingFile>> {
        let conn = self.conn()?;

        conn.query_row(
            &format!(
                "SELECT {} FROM processing_files WHERE document_id = ?1 ORDER BY created_at DESC LIMIT 1",
                FILE_COLUMNS
            ),
            params![document_id],
            ProcessingFile::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// List the files of a batch in upload order
    pub fn list_batch_files(&self, batch_id: &str) -> ServiceResult<Vec<ProcessingFile>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM processing_files WHERE batch_id = ?1 ORDER BY created_at, rowid",
                FILE_COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let files = stmt
            .query_map(params![batch_id], ProcessingFile::from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(files)
    }

    /// List files currently in any of the given statuses
    pub fn list_files_in_statuses(
        &self,
        statuses: &[FileStatus],
    ) -> ServiceResult<Vec<ProcessingFile>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM processing_files WHERE status IN {} ORDER BY created_at, rowid",
                FILE_COLUMNS,
                status_list(statuses)
            ))
            .map_err(DatabaseError::Query)?;

        let files = stmt
            .query_map([], ProcessingFile::from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(files)
    }

    /// Find a file that still claims the given content hash
    pub fn find_active_file_by_hash(
        &self,
        content_hash: &str,
    ) -> ServiceResult<Option<ProcessingFile>> {
        let releasing: Vec<FileStatus> = FileStatus::ALL
            .into_iter()
            .filter(|s| !s.holds_content_hash())
            .collect();
        let conn = self.conn()?;

        conn.query_row(
            &format!(
                "SELECT {} FROM processing_files WHERE content_hash = ?1 AND status NOT IN {} ORDER BY created_at DESC LIMIT 1",
                FILE_COLUMNS,
                status_list(&releasing)
            ),
            params![content_hash],
            ProcessingFile::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Move a file to `to` only if it is currently in one of `from`.
    ///
    /// Returns false (and changes nothing) when the file is elsewhere.
    pub fn transition_file(
        &self,
        file_id: &str,
        from: &[FileStatus],
        to: FileStatus,
        error_message: Option<&str>,
    ) -> ServiceResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;
        let changed =
            write_status(&tx, file_id, Some(from), to, error_message).map_err(DatabaseError::Query)?;
        tx.commit().map_err(DatabaseError::Query)?;
        Ok(changed)
    }

    /// Set a file's status unconditionally
    pub fn set_file_status(
        &self,
        file_id: &str,
        status: FileStatus,
        error_message: Option<&str>,
    ) -> ServiceResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;
        let changed =
            write_status(&tx, file_id, None, status, error_message).map_err(DatabaseError::Query)?;
        tx.commit().map_err(DatabaseError::Query)?;
        Ok(changed)
    }

    /// Claim the oldest queued file for a worker, moving it to `extracting_text`
    pub fn claim_next_queued_file(&self) -> ServiceResult<Option<ProcessingFile>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        let next: Option<String> = tx
            .query_row(
                "SELECT id FROM processing_files WHERE status = 'queued' ORDER BY created_at, rowid LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        let Some(file_id) = next else {
            return Ok(None);
        };

        write_status(
            &tx,
            &file_id,
            Some(&[FileStatus::Queued]),
            FileStatus::ExtractingText,
            None,
        )
        .map_err(DatabaseError::Query)?;
        let file = query_file(&tx, &file_id).map_err(DatabaseError::Query)?;
        tx.commit().map_err(DatabaseError::Query)?;

        Ok(file)
    }

    /// Store extraction output and advance to `analyzing_metadata`
    pub fn save_extraction(
        &self,
        file_id: &str,
        text: &str,
        page_count: u32,
        word_count: u64,
        char_count: u64,
    ) -> ServiceResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;
        let now = now_timestamp();

        let rows = tx
            .execute(
                r#"
                UPDATE processing_files
                SET extracted_text = ?1, page_count = ?2, word_count = ?3, char_count = ?4, updated_at = ?5
                WHERE id = ?6 AND status = 'extracting_text'
                "#,
                params![text, page_count, word_count as i64, char_count as i64, now, file_id],
            )
            .map_err(DatabaseError::Query)?;

        if rows == 0 {
            return Ok(false);
        }

        tx.execute(
            r#"
            UPDATE documents SET page_count = ?1, word_count = ?2, updated_at = ?3
            WHERE id = (SELECT document_id FROM processing_files WHERE id = ?4)
            "#,
            params![page_count, word_count as i64, now, file_id],
        )
        .map_err(DatabaseError::Query)?;

        write_status(
            &tx,
            file_id,
            Some(&[FileStatus::ExtractingText]),
            FileStatus::AnalyzingMetadata,
            None,
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(true)
    }

    /// Get the transient extracted text of a file
    pub fn get_extracted_text(&self, file_id: &str) -> ServiceResult<Option<String>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT extracted_text FROM processing_files WHERE id = ?1",
            params![file_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .map(Option::flatten)
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Record the final chunk count on the file and its document
    pub fn record_chunk_count(&self, file_id: &str, chunk_count: u32) -> ServiceResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;
        let now = now_timestamp();

        tx.execute(
            "UPDATE processing_files SET chunk_count = ?1, updated_at = ?2 WHERE id = ?3",
            params![chunk_count, now, file_id],
        )
        .map_err(DatabaseError::Query)?;
        tx.execute(
            r#"
            UPDATE documents SET chunk_count = ?1, updated_at = ?2
            WHERE id = (SELECT document_id FROM processing_files WHERE id = ?3)
            "#,
            params![chunk_count, now, file_id],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(())
    }

    /// Finish a successful pipeline run: `review_pending`, transient text dropped
    pub fn complete_file_processing(&self, file_id: &str) -> ServiceResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        let changed = write_status(
            &tx,
            file_id,
            Some(&[FileStatus::GeneratingEmbeddings]),
            FileStatus::ReviewPending,
            None,
        )
        .map_err(DatabaseError::Query)?;

        if changed {
            tx.execute(
                "UPDATE processing_files SET extracted_text = NULL WHERE id = ?1",
                params![file_id],
            )
            .map_err(DatabaseError::Query)?;
        }

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(changed)
    }

    /// Reset a failed file to `uploaded` for another attempt.
    ///
    /// `replacement` is inserted and linked when the earlier failure removed
    /// the file's document. Returns false if the file is not in a failure
    /// status or has used up its retries.
    pub fn reset_file_for_retry(
        &self,
        file_id: &str,
        max_retries: u32,
        replacement: Option<&Document>,
    ) -> ServiceResult<bool> {
        let failures: Vec<FileStatus> = FileStatus::ALL
            .into_iter()
            .filter(FileStatus::is_failure)
            .collect();
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        if let Some(doc) = replacement {
            insert_document_row(&tx, doc).map_err(DatabaseError::Query)?;
        }

        let rows = tx
            .execute(
                &format!(
                    r#"
                    UPDATE processing_files
                    SET status = 'uploaded', retry_count = retry_count + 1, error_message = NULL,
                        extracted_text = NULL, chunk_count = 0,
                        document_id = COALESCE(?1, document_id), updated_at = ?2
                    WHERE id = ?3 AND retry_count < ?4 AND status IN {}
                    "#,
                    status_list(&failures)
                ),
                params![
                    replacement.map(|d| d.id.as_str()),
                    now_timestamp(),
                    file_id,
                    max_retries
                ],
            )
            .map_err(DatabaseError::Query)?;

        if rows == 0 {
            // Dropping the transaction rolls back the replacement insert
            return Ok(false);
        }

        project_document_status(&tx, file_id, FileStatus::Uploaded).map_err(DatabaseError::Query)?;
        tx.commit().map_err(DatabaseError::Query)?;
        Ok(true)
    }

    /// Approve a file awaiting review and mark its document reviewed
    pub fn approve_file(
        &self,
        file_id: &str,
        reviewer_id: &str,
        notes: Option<&str>,
    ) -> ServiceResult<bool> {
        self.record_review(file_id, reviewer_id, notes, FileStatus::Approved)
    }

    /// Reject a file awaiting review
    pub fn reject_file(&self, file_id: &str, reviewer_id: &str, reason: &str) -> ServiceResult<bool> {
        self.record_review(file_id, reviewer_id, Some(reason), FileStatus::Rejected)
    }

    fn record_review(
        &self,
        file_id: &str,
        reviewer_id: &str,
        notes: Option<&str>,
        decision: FileStatus,
    ) -> ServiceResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;
        let now = now_timestamp();

        let changed = write_status(
            &tx,
            file_id,
            Some(&[FileStatus::ReviewPending, FileStatus::UnderReview]),
            decision,
            None,
        )
        .map_err(DatabaseError::Query)?;

        if !changed {
            return Ok(false);
        }

        tx.execute(
            "UPDATE processing_files SET reviewed_by = ?1, reviewed_at = ?2, review_notes = ?3 WHERE id = ?4",
            params![reviewer_id, now, notes, file_id],
        )
        .map_err(DatabaseError::Query)?;

        tx.execute(
            r#"
            UPDATE documents
            SET is_reviewed = ?1, reviewed_by = ?2, reviewed_at = ?3, review_notes = ?4, updated_at = ?3
            WHERE id = (SELECT document_id FROM processing_files WHERE id = ?5)
            "#,
            params![decision == FileStatus::Approved, reviewer_id, now, notes, file_id],
        )
        .map_err(DatabaseError::Query)?;

        tx.execute(
            r#"
            UPDATE document_chunks
            SET document_id = (SELECT document_id FROM processing_files WHERE id = ?1)
            WHERE processing_file_id = ?1 AND document_id IS NULL
            "#,
            params![file_id],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(true)
    }

    /// Save a reviewer's metadata edit and flag the document's file as under review.
    ///
    /// The write only lands while the document is unreviewed, not deleted and
    /// its file (if any) sits in a review state. Returns false otherwise, with
    /// nothing changed.
    pub fn save_review_edit(&self, doc: &Document, editor_id: &str) -> ServiceResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;

        let guard = format!(
            " AND is_reviewed = 0 AND is_deleted = 0 AND NOT EXISTS (\
             SELECT 1 FROM processing_files f WHERE f.document_id = documents.id AND f.status NOT IN {})",
            status_list(&[FileStatus::ReviewPending, FileStatus::UnderReview])
        );
        if write_metadata(&tx, doc, &guard).map_err(DatabaseError::Query)? == 0 {
            return Ok(false);
        }

        let file_id: Option<String> = tx
            .query_row(
                "SELECT id FROM processing_files WHERE document_id = ?1 AND status = 'review_pending'",
                params![doc.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        if let Some(file_id) = file_id {
            write_status(
                &tx,
                &file_id,
                Some(&[FileStatus::ReviewPending]),
                FileStatus::UnderReview,
                None,
            )
            .map_err(DatabaseError::Query)?;
            tx.execute(
                "UPDATE processing_files SET reviewed_by = ?1 WHERE id = ?2",
                params![editor_id, file_id],
            )
            .map_err(DatabaseError::Query)?;
        }

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(true)
    }

    /// Delete files in the given statuses, returning the removed rows
    pub fn delete_files_in_statuses(
        &self,
        statuses: &[FileStatus],
    ) -> ServiceResult<Vec<ProcessingFile>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;
        let list = status_list(statuses);

        let removed = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {} FROM processing_files WHERE status IN {}",
                    FILE_COLUMNS, list
                ))
                .map_err(DatabaseError::Query)?;
            stmt.query_map([], ProcessingFile::from_row)
                .map_err(DatabaseError::Query)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(DatabaseError::Query)?
        };

        tx.execute(
            &format!("DELETE FROM processing_files WHERE status IN {}", list),
            [],
        )
        .map_err(DatabaseError::Query)?;

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(removed)
    }
}

fn query_file(conn: &Connection, id: &str) -> rusqlite::Result<Option<ProcessingFile>> {
    conn.query_row(
        &format!("SELECT {} FROM processing_files WHERE id = ?1", FILE_COLUMNS),
        params![id],
        ProcessingFile::from_row,
    )
    .optional()
}

fn write_status(
    conn: &Connection,
    file_id: &str,
    from: Option<&[FileStatus]>,
    to: FileStatus,
    error_message: Option<&str>,
) -> rusqlite::Result<bool> {
    let guard = from
        .map(|statuses| format!(" AND status IN {}", status_list(statuses)))
        .unwrap_or_default();

    let rows = conn.execute(
        &format!(
            "UPDATE processing_files SET status = ?1, error_message = ?2, updated_at = ?3 WHERE id = ?4{}",
            guard
        ),
        params![to.as_str(), error_message, now_timestamp(), file_id],
    )?;

    if rows == 0 {
        return Ok(false);
    }

    project_document_status(conn, file_id, to)?;
    Ok(true)
}

fn project_document_status(
    conn: &Connection,
    file_id: &str,
    status: FileStatus,
) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        UPDATE documents SET processing_status = ?1, updated_at = ?2
        WHERE id = (SELECT document_id FROM processing_files WHERE id = ?3)
        "#,
        params![status.document_status().as_str(), now_timestamp(), file_id],
    )?;
    Ok(())
}
