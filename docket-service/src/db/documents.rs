//! Document operations.
//!
//! Insert, lookup, metadata updates, hard and soft deletion, and the
//! review-queue and library listings.

use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;

use super::models::{DOCUMENT_COLUMNS, DocCategory, DocType, Document};
use super::{Database, now_timestamp};
use crate::error::{DatabaseError, ServiceResult};

/// Library listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryFilter {
    pub doc_type: Option<DocType>,
    pub doc_category: Option<DocCategory>,
    /// Case-insensitive title substring
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl LibraryFilter {
    fn limit_offset(&self) -> (u32, u32) {
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let page = self.page.unwrap_or(1).max(1);
        (per_page, (page - 1) * per_page)
    }
}

impl Database {
    /// Get a document by ID (including soft-deleted ones)
    pub fn get_document(&self, id: &str) -> ServiceResult<Option<Document>> {
        let conn = self.conn()?;

        conn.query_row(
            &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
            params![id],
            Document::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Find a non-deleted document with the given content hash
    pub fn find_document_by_hash(&self, content_hash: &str) -> ServiceResult<Option<Document>> {
        let conn = self.conn()?;

        conn.query_row(
            &format!(
                "SELECT {} FROM documents WHERE content_hash = ?1 AND is_deleted = 0 ORDER BY created_at LIMIT 1",
                DOCUMENT_COLUMNS
            ),
            params![content_hash],
            Document::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Write every descriptive metadata column from `doc`
    pub fn update_document_metadata(&self, doc: &Document) -> ServiceResult<bool> {
        let conn = self.conn()?;
        let rows = write_metadata(&conn, doc, "").map_err(DatabaseError::Query)?;
        Ok(rows > 0)
    }

    /// Permanently delete a document; its chunks go with it
    pub fn delete_document(&self, id: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;

        let rows = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Soft-delete a document, keeping the row
    pub fn soft_delete_document(&self, id: &str, deleted_by: &str) -> ServiceResult<bool> {
        let conn = self.conn()?;
        let now = now_timestamp();

        let rows = conn
            .execute(
                "UPDATE documents SET is_deleted = 1, deleted_by = ?1, deleted_at = ?2, updated_at = ?2 WHERE id = ?3 AND is_deleted = 0",
                params![deleted_by, now, id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Unreviewed documents still moving toward a decision, newest first
    pub fn list_review_queue(&self) -> ServiceResult<Vec<Document>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM documents \
                 WHERE is_reviewed = 0 AND is_deleted = 0 \
                 AND processing_status IN ('processing', 'review_pending', 'under_review') \
                 ORDER BY created_at DESC",
                DOCUMENT_COLUMNS
            ))
            .map_err(DatabaseError::Query)?;

        let docs = stmt
            .query_map([], Document::from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(docs)
    }

    /// Reviewed, non-deleted documents matching `filter`, with the total match count
    pub fn list_library(&self, filter: &LibraryFilter) -> ServiceResult<(Vec<Document>, u64)> {
        let conn = self.conn()?;
        let (limit, offset) = filter.limit_offset();
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));

        let predicate = "is_reviewed = 1 AND is_deleted = 0 \
             AND (?1 IS NULL OR doc_type = ?1) \
             AND (?2 IS NULL OR doc_category = ?2) \
             AND (?3 IS NULL OR lower(title) LIKE ?3)";
        let doc_type = filter.doc_type.map(|t| t.as_str());
        let doc_category = filter.doc_category.map(|c| c.as_str());

        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM documents WHERE {}", predicate),
                params![doc_type, doc_category, search],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM documents WHERE {} ORDER BY reviewed_at DESC LIMIT ?4 OFFSET ?5",
                DOCUMENT_COLUMNS, predicate
            ))
            .map_err(DatabaseError::Query)?;

        let docs = stmt
            .query_map(
                params![doc_type, doc_category, search, limit, offset],
                Document::from_row,
            )
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok((docs, total as u64))
    }
}

/// Update the descriptive columns of `doc`, with `guard` appended to the
/// `WHERE id = ?` clause
pub(super) fn write_metadata(
    conn: &Connection,
    doc: &Document,
    guard: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            r#"
            UPDATE documents
            SET title = ?1, authors = ?2, publication_date = ?3, doc_type = ?4, doc_category = ?5,
                description = ?6, keywords = ?7, citation = ?8, confidence_scores = ?9,
                confidence_score = ?10, case_name = ?11, court = ?12, jurisdiction = ?13,
                practice_area = ?14, document_date = ?15, legal_signals = ?16, updated_at = ?17
            WHERE id = ?18{}
            "#,
            guard
        ),
        params![
            doc.title,
            json_text(&doc.authors)?,
            doc.publication_date.map(|d| d.to_string()),
            doc.doc_type.as_str(),
            doc.doc_category.as_str(),
            doc.description,
            json_text(&doc.keywords)?,
            doc.citation,
            json_text(&doc.confidence_scores)?,
            doc.confidence_score,
            doc.case_name,
            doc.court,
            doc.jurisdiction,
            doc.practice_area,
            doc.document_date.map(|d| d.to_string()),
            doc.legal_signals.as_ref().map(json_text).transpose()?,
            now_timestamp(),
            doc.id,
        ],
    )
}

pub(super) fn insert_document_row(conn: &Connection, doc: &Document) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35)",
            DOCUMENT_COLUMNS
        ),
        params![
            doc.id,
            doc.title,
            json_text(&doc.authors)?,
            doc.publication_date.map(|d| d.to_string()),
            doc.doc_type.as_str(),
            doc.doc_category.as_str(),
            doc.description,
            json_text(&doc.keywords)?,
            doc.citation,
            json_text(&doc.confidence_scores)?,
            doc.confidence_score,
            doc.case_name,
            doc.court,
            doc.jurisdiction,
            doc.practice_area,
            doc.document_date.map(|d| d.to_string()),
            doc.legal_signals.as_ref().map(json_text).transpose()?,
            doc.content_hash,
            doc.original_filename,
            doc.mime_type,
            doc.file_size as i64,
            doc.page_count,
            doc.word_count.map(|n| n as i64),
            doc.chunk_count,
            doc.processing_status.as_str(),
            doc.is_reviewed,
            doc.reviewed_by,
            doc.reviewed_at.map(|t| t.to_rfc3339()),
            doc.review_notes,
            doc.is_deleted,
            doc.deleted_by,
            doc.deleted_at.map(|t| t.to_rfc3339()),
            doc.uploaded_by,
            doc.created_at.to_rfc3339(),
            doc.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn json_text<T: serde::Serialize + ?Sized>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}
