//! Database model structs.
//!
//! This module contains the data structures for database records and the
//! status vocabularies shared by the pipeline and the review workflow.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical status of a processing file.
///
/// This is the only status vocabulary the pipeline writes; the document's
/// `processing_status` is derived from it with [`FileStatus::document_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploaded,
    Queued,
    ExtractingText,
    ExtractionFailed,
    AnalyzingMetadata,
    AnalysisFailed,
    GeneratingEmbeddings,
    EmbeddingFailed,
    ProcessingFailed,
    ReviewPending,
    UnderReview,
    Approved,
    Rejected,
    Duplicate,
    Cancelled,
    RetryPending,
}

impl FileStatus {
    pub const ALL: [FileStatus; 16] = [
        FileStatus::Uploaded,
        FileStatus::Queued,
        FileStatus::ExtractingText,
        FileStatus::ExtractionFailed,
        FileStatus::AnalyzingMetadata,
        FileStatus::AnalysisFailed,
        FileStatus::GeneratingEmbeddings,
        FileStatus::EmbeddingFailed,
        FileStatus::ProcessingFailed,
        FileStatus::ReviewPending,
        FileStatus::UnderReview,
        FileStatus::Approved,
        FileStatus::Rejected,
        FileStatus::Duplicate,
        FileStatus::Cancelled,
        FileStatus::RetryPending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploaded => "uploaded",
            FileStatus::Queued => "queued",
            FileStatus::ExtractingText => "extracting_text",
            FileStatus::ExtractionFailed => "extraction_failed",
            FileStatus::AnalyzingMetadata => "analyzing_metadata",
            FileStatus::AnalysisFailed => "analysis_failed",
            FileStatus::GeneratingEmbeddings => "generating_embeddings",
            FileStatus::EmbeddingFailed => "embedding_failed",
            FileStatus::ProcessingFailed => "processing_failed",
            FileStatus::ReviewPending => "review_pending",
            FileStatus::UnderReview => "under_review",
            FileStatus::Approved => "approved",
            FileStatus::Rejected => "rejected",
            FileStatus::Duplicate => "duplicate",
            FileStatus::Cancelled => "cancelled",
            FileStatus::RetryPending => "retry_pending",
        }
    }

    /// Parse a stored status. `ai_failed` is accepted as an alias of
    /// `analysis_failed`; anything unrecognised reads as `processing_failed`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "ai_failed" => FileStatus::AnalysisFailed,
            _ => Self::parse(s).unwrap_or(FileStatus::ProcessingFailed),
        }
    }

    /// Strict parse, used for externally supplied values.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Statuses from which nothing moves the file automatically.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileStatus::Approved
                | FileStatus::Rejected
                | FileStatus::Duplicate
                | FileStatus::Cancelled
        )
    }

    /// Stage-specific failure statuses; these are the retryable ones.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FileStatus::ExtractionFailed
                | FileStatus::AnalysisFailed
                | FileStatus::EmbeddingFailed
                | FileStatus::ProcessingFailed
        )
    }

    /// Files that made it through the pipeline, for batch aggregation.
    pub fn counts_as_completed(&self) -> bool {
        matches!(
            self,
            FileStatus::ReviewPending
                | FileStatus::UnderReview
                | FileStatus::Approved
                | FileStatus::Rejected
        )
    }

    /// Files that will not complete without intervention, for batch aggregation.
    pub fn counts_as_failed(&self) -> bool {
        self.is_failure() || matches!(self, FileStatus::Cancelled | FileStatus::Duplicate)
    }

    /// Whether a file in this status still claims its content hash.
    pub fn holds_content_hash(&self) -> bool {
        !(self.is_failure() || matches!(self, FileStatus::Duplicate | FileStatus::Cancelled))
    }

    /// Document-facing projection of this status.
    pub fn document_status(&self) -> DocumentStatus {
        match self {
            FileStatus::Uploaded
            | FileStatus::Queued
            | FileStatus::ExtractingText
            | FileStatus::AnalyzingMetadata
            | FileStatus::GeneratingEmbeddings
            | FileStatus::RetryPending => DocumentStatus::Processing,
            FileStatus::ReviewPending => DocumentStatus::ReviewPending,
            FileStatus::UnderReview => DocumentStatus::UnderReview,
            FileStatus::Approved => DocumentStatus::Active,
            FileStatus::Rejected => DocumentStatus::Rejected,
            FileStatus::ExtractionFailed
            | FileStatus::AnalysisFailed
            | FileStatus::EmbeddingFailed
            | FileStatus::ProcessingFailed
            | FileStatus::Duplicate
            | FileStatus::Cancelled => DocumentStatus::Failed,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document status as shown in listings (derived from [`FileStatus`])
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Processing,
    ReviewPending,
    UnderReview,
    Active,
    Rejected,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::ReviewPending => "review_pending",
            DocumentStatus::UnderReview => "under_review",
            DocumentStatus::Active => "active",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "review_pending" => DocumentStatus::ReviewPending,
            "under_review" => DocumentStatus::UnderReview,
            "active" => DocumentStatus::Active,
            "rejected" => DocumentStatus::Rejected,
            "failed" => DocumentStatus::Failed,
            _ => DocumentStatus::Processing,
        }
    }
}

/// Status of an upload batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Created,
    Processing,
    ProcessingComplete,
    PartiallyCompleted,
    Failed,
}

impl BatchStatus {
    pub const ALL: [BatchStatus; 5] = [
        BatchStatus::Created,
        BatchStatus::Processing,
        BatchStatus::ProcessingComplete,
        BatchStatus::PartiallyCompleted,
        BatchStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Created => "created",
            BatchStatus::Processing => "processing",
            BatchStatus::ProcessingComplete => "processing_complete",
            BatchStatus::PartiallyCompleted => "partially_completed",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "created" => BatchStatus::Created,
            "processing_complete" => BatchStatus::ProcessingComplete,
            "partially_completed" => BatchStatus::PartiallyCompleted,
            "failed" => BatchStatus::Failed,
            _ => BatchStatus::Processing,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

/// Kind of legal document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Book,
    Article,
    Statute,
    CaseLaw,
    ExpertReport,
    #[default]
    Other,
}

impl DocType {
    pub const ALL: [DocType; 6] = [
        DocType::Book,
        DocType::Article,
        DocType::Statute,
        DocType::CaseLaw,
        DocType::ExpertReport,
        DocType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Book => "book",
            DocType::Article => "article",
            DocType::Statute => "statute",
            DocType::CaseLaw => "case_law",
            DocType::ExpertReport => "expert_report",
            DocType::Other => "other",
        }
    }

    /// Unknown values coerce to `Other`.
    pub fn from_db(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or(DocType::Other)
    }
}

/// Practice-area category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocCategory {
    #[serde(rename = "PI")]
    PersonalInjury,
    #[serde(rename = "WD")]
    WrongfulDeath,
    #[serde(rename = "EM")]
    Employment,
    #[serde(rename = "BV")]
    BusinessValuation,
    #[default]
    Other,
}

impl DocCategory {
    pub const ALL: [DocCategory; 5] = [
        DocCategory::PersonalInjury,
        DocCategory::WrongfulDeath,
        DocCategory::Employment,
        DocCategory::BusinessValuation,
        DocCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocCategory::PersonalInjury => "PI",
            DocCategory::WrongfulDeath => "WD",
            DocCategory::Employment => "EM",
            DocCategory::BusinessValuation => "BV",
            DocCategory::Other => "Other",
        }
    }

    /// Unknown values coerce to `Other`.
    pub fn from_db(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or(DocCategory::Other)
    }

    pub fn practice_area(&self) -> Option<&'static str> {
        match self {
            DocCategory::PersonalInjury => Some("Personal Injury"),
            DocCategory::WrongfulDeath => Some("Wrongful Death"),
            DocCategory::Employment => Some("Employment"),
            DocCategory::BusinessValuation => Some("Business Valuation"),
            DocCategory::Other => None,
        }
    }
}

/// One upload request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingBatch {
    pub id: String,
    pub uploaded_by: String,
    pub status: BatchStatus,
    /// Files accepted into the pipeline
    pub total_files: u32,
    /// Files that reached a completed or failed state
    pub processed_files: u32,
    pub completed_files: u32,
    pub failed_files: u32,
    /// Files refused at upload (validation or duplicate)
    pub rejected_files: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

pub(super) const BATCH_COLUMNS: &str = "id, uploaded_by, status, total_files, processed_files, \
     completed_files, failed_files, rejected_files, error_message, created_at, updated_at, completed_at";

impl ProcessingBatch {
    pub fn new(uploaded_by: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            uploaded_by: uploaded_by.to_string(),
            status: BatchStatus::Created,
            total_files: 0,
            processed_files: 0,
            completed_files: 0,
            failed_files: 0,
            rejected_files: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Create from a row selected with [`BATCH_COLUMNS`]
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            uploaded_by: row.get(1)?,
            status: BatchStatus::from_db(&status),
            total_files: row.get(3)?,
            processed_files: row.get(4)?,
            completed_files: row.get(5)?,
            failed_files: row.get(6)?,
            rejected_files: row.get(7)?,
            error_message: row.get(8)?,
            created_at: parse_timestamp(&row.get::<_, String>(9)?),
            updated_at: parse_timestamp(&row.get::<_, String>(10)?),
            completed_at: row
                .get::<_, Option<String>>(11)?
                .map(|s| parse_timestamp(&s)),
        })
    }
}

/// One uploaded file's journey through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingFile {
    pub id: String,
    pub batch_id: String,
    pub document_id: Option<String>,
    pub original_filename: String,
    pub stored_path: String,
    pub mime_type: String,
    pub content_hash: String,
    pub file_size: u64,
    pub status: FileStatus,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub page_count: Option<u32>,
    pub word_count: Option<u64>,
    pub char_count: Option<u64>,
    pub chunk_count: u32,
    pub uploaded_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Extracted text is deliberately absent; read it with `get_extracted_text`.
pub(super) const FILE_COLUMNS: &str = "id, batch_id, document_id, original_filename, stored_path, \
     mime_type, content_hash, file_size, status, retry_count, error_message, page_count, \
     word_count, char_count, chunk_count, uploaded_by, reviewed_by, reviewed_at, review_notes, \
     created_at, updated_at";

impl ProcessingFile {
    /// Create from a row selected with [`FILE_COLUMNS`]
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status: String = row.get(8)?;
        Ok(Self {
            id: row.get(0)?,
            batch_id: row.get(1)?,
            document_id: row.get(2)?,
            original_filename: row.get(3)?,
            stored_path: row.get(4)?,
            mime_type: row.get(5)?,
            content_hash: row.get(6)?,
            file_size: row.get::<_, i64>(7)? as u64,
            status: FileStatus::from_db(&status),
            retry_count: row.get(9)?,
            error_message: row.get(10)?,
            page_count: row.get(11)?,
            word_count: row.get::<_, Option<i64>>(12)?.map(|n| n as u64),
            char_count: row.get::<_, Option<i64>>(13)?.map(|n| n as u64),
            chunk_count: row.get(14)?,
            uploaded_by: row.get(15)?,
            reviewed_by: row.get(16)?,
            reviewed_at: row
                .get::<_, Option<String>>(17)?
                .map(|s| parse_timestamp(&s)),
            review_notes: row.get(18)?,
            created_at: parse_timestamp(&row.get::<_, String>(19)?),
            updated_at: parse_timestamp(&row.get::<_, String>(20)?),
        })
    }
}

/// Reviewable, library-facing document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub publication_date: Option<NaiveDate>,
    pub doc_type: DocType,
    pub doc_category: DocCategory,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub citation: Option<String>,
    pub confidence_scores: BTreeMap<String, f64>,
    pub confidence_score: Option<f64>,
    pub case_name: Option<String>,
    pub court: Option<String>,
    pub jurisdiction: Option<String>,
    pub practice_area: Option<String>,
    pub document_date: Option<NaiveDate>,
    /// Regex-derived figures (dollar amounts, percentages, citations, dates)
    pub legal_signals: Option<serde_json::Value>,
    pub content_hash: String,
    pub original_filename: String,
    pub mime_type: String,
    pub file_size: u64,
    pub page_count: Option<u32>,
    pub word_count: Option<u64>,
    pub chunk_count: u32,
    pub processing_status: DocumentStatus,
    pub is_reviewed: bool,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(super) const DOCUMENT_COLUMNS: &str = "id, title, authors, publication_date, doc_type, \
     doc_category, description, keywords, citation, confidence_scores, confidence_score, \
     case_name, court, jurisdiction, practice_area, document_date, legal_signals, content_hash, \
     original_filename, mime_type, file_size, page_count, word_count, chunk_count, \
     processing_status, is_reviewed, reviewed_by, reviewed_at, review_notes, is_deleted, \
     deleted_by, deleted_at, uploaded_by, created_at, updated_at";

impl Document {
    /// Placeholder document created at upload time, before any metadata exists
    pub fn placeholder(
        filename: &str,
        content_hash: &str,
        mime_type: &str,
        file_size: u64,
        uploaded_by: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: filename.to_string(),
            authors: Vec::new(),
            publication_date: None,
            doc_type: DocType::Other,
            doc_category: DocCategory::Other,
            description: None,
            keywords: Vec::new(),
            citation: None,
            confidence_scores: BTreeMap::new(),
            confidence_score: None,
            case_name: None,
            court: None,
            jurisdiction: None,
            practice_area: None,
            document_date: None,
            legal_signals: None,
            content_hash: content_hash.to_string(),
            original_filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            file_size,
            page_count: None,
            word_count: None,
            chunk_count: 0,
            processing_status: DocumentStatus::Processing,
            is_reviewed: false,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            is_deleted: false,
            deleted_by: None,
            deleted_at: None,
            uploaded_by: uploaded_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create from a row selected with [`DOCUMENT_COLUMNS`]
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let authors: String = row.get(2)?;
        let keywords: String = row.get(7)?;
        let confidence_scores: Option<String> = row.get(9)?;
        let legal_signals: Option<String> = row.get(16)?;
        let doc_type: String = row.get(4)?;
        let doc_category: String = row.get(5)?;
        let processing_status: String = row.get(24)?;

        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            authors: serde_json::from_str(&authors).unwrap_or_default(),
            publication_date: parse_date(row.get(3)?),
            doc_type: DocType::from_db(&doc_type),
            doc_category: DocCategory::from_db(&doc_category),
            description: row.get(6)?,
            keywords: serde_json::from_str(&keywords).unwrap_or_default(),
            citation: row.get(8)?,
            confidence_scores: confidence_scores
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            confidence_score: row.get(10)?,
            case_name: row.get(11)?,
            court: row.get(12)?,
            jurisdiction: row.get(13)?,
            practice_area: row.get(14)?,
            document_date: parse_date(row.get(15)?),
            legal_signals: legal_signals.and_then(|s| serde_json::from_str(&s).ok()),
            content_hash: row.get(17)?,
            original_filename: row.get(18)?,
            mime_type: row.get(19)?,
            file_size: row.get::<_, i64>(20)? as u64,
            page_count: row.get(21)?,
            word_count: row.get::<_, Option<i64>>(22)?.map(|n| n as u64),
            chunk_count: row.get(23)?,
            processing_status: DocumentStatus::from_db(&processing_status),
            is_reviewed: row.get(25)?,
            reviewed_by: row.get(26)?,
            reviewed_at: row
                .get::<_, Option<String>>(27)?
                .map(|s| parse_timestamp(&s)),
            review_notes: row.get(28)?,
            is_deleted: row.get(29)?,
            deleted_by: row.get(30)?,
            deleted_at: row
                .get::<_, Option<String>>(31)?
                .map(|s| parse_timestamp(&s)),
            uploaded_by: row.get(32)?,
            created_at: parse_timestamp(&row.get::<_, String>(33)?),
            updated_at: parse_timestamp(&row.get::<_, String>(34)?),
        })
    }
}

/// Chunk text with an embedding, ready to persist
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: u32,
    pub content: String,
    pub token_count: u32,
    pub embedding: Vec<f32>,
}

/// Stored chunk (vector omitted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub processing_file_id: String,
    pub document_id: Option<String>,
    pub chunk_index: u32,
    pub content: String,
    pub token_count: u32,
    pub created_at: DateTime<Utc>,
}

impl DocumentChunk {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            processing_file_id: row.get(1)?,
            document_id: row.get(2)?,
            chunk_index: row.get(3)?,
            content: row.get(4)?,
            token_count: row.get(5)?,
            created_at: parse_timestamp(&row.get::<_, String>(6)?),
        })
    }
}

/// A chunk ranked against a query vector
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMatch {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: u32,
    pub content: String,
    pub title: String,
    pub original_filename: String,
    pub doc_type: DocType,
    pub doc_category: DocCategory,
    pub similarity: f32,
}

pub(super) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_date(value: Option<String>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_status_roundtrip_and_alias() {
        for status in FileStatus::ALL {
            assert_eq!(FileStatus::from_db(status.as_str()), status);
        }
        assert_eq!(FileStatus::from_db("ai_failed"), FileStatus::AnalysisFailed);
        assert_eq!(FileStatus::parse("bogus"), None);
    }

    #[test]
    fn test_file_status_classification() {
        assert!(FileStatus::ExtractionFailed.is_failure());
        assert!(FileStatus::ProcessingFailed.counts_as_failed());
        assert!(FileStatus::ReviewPending.counts_as_completed());
        assert!(FileStatus::Approved.is_terminal());
        assert!(!FileStatus::Queued.counts_as_completed());
        assert!(!FileStatus::Queued.counts_as_failed());

        assert!(FileStatus::Queued.holds_content_hash());
        assert!(FileStatus::Rejected.holds_content_hash());
        assert!(!FileStatus::ExtractionFailed.holds_content_hash());
        assert!(!FileStatus::Cancelled.holds_content_hash());
    }

    #[test]
    fn test_document_projection() {
        assert_eq!(
            FileStatus::GeneratingEmbeddings.document_status(),
            DocumentStatus::Processing
        );
        assert_eq!(FileStatus::Approved.document_status(), DocumentStatus::Active);
        assert_eq!(
            FileStatus::EmbeddingFailed.document_status(),
            DocumentStatus::Failed
        );
    }

    #[test]
    fn test_doc_enums_coerce_unknown_values() {
        assert_eq!(DocType::from_db("case_law"), DocType::CaseLaw);
        assert_eq!(DocType::from_db("Case_Law"), DocType::CaseLaw);
        assert_eq!(DocType::from_db("novel"), DocType::Other);
        assert_eq!(DocCategory::from_db("pi"), DocCategory::PersonalInjury);
        assert_eq!(DocCategory::from_db("tax"), DocCategory::Other);
        assert_eq!(
            serde_json::to_string(&DocCategory::BusinessValuation).unwrap(),
            "\"BV\""
        );
    }
}
