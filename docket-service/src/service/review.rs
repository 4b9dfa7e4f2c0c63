//! Review workflow and library read paths.
//!
//! Approval and rejection are gated on the file awaiting review; metadata
//! edits are gated on the document not yet being reviewed.

use chrono::NaiveDate;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{
    BatchStatus, DocCategory, DocType, Document, DocumentChunk, FileStatus, LibraryFilter,
    ProcessingBatch, ProcessingFile, ProcessingStats,
};
use crate::error::{ServiceError, ServiceResult};
use crate::metadata::PartialMetadata;
use crate::service::DocketService;

/// Reviewer edits; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub publication_date: Option<NaiveDate>,
    pub doc_type: Option<DocType>,
    pub doc_category: Option<DocCategory>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub citation: Option<String>,
    pub case_name: Option<String>,
    pub court: Option<String>,
    pub jurisdiction: Option<String>,
    pub practice_area: Option<String>,
    pub document_date: Option<NaiveDate>,
}

impl From<MetadataPatch> for PartialMetadata {
    fn from(patch: MetadataPatch) -> Self {
        PartialMetadata {
            title: patch.title.filter(|t| !t.trim().is_empty()),
            authors: patch.authors,
            publication_date: patch.publication_date,
            doc_type: patch.doc_type,
            doc_category: patch.doc_category,
            description: patch.description,
            keywords: patch.keywords,
            citation: patch.citation,
            case_name: patch.case_name,
            court: patch.court,
            jurisdiction: patch.jurisdiction,
            practice_area: patch.practice_area,
            document_date: patch.document_date,
            ..PartialMetadata::default()
        }
    }
}

/// Review queue item
#[derive(Debug, Clone, Serialize)]
pub struct ReviewQueueEntry {
    #[serde(flatten)]
    pub document: Document,
    pub file_id: Option<String>,
    pub file_status: Option<FileStatus>,
}

/// One page of the library
#[derive(Debug, Clone, Serialize)]
pub struct LibraryPage {
    pub documents: Vec<Document>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// A batch with its files
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatusView {
    pub batch: ProcessingBatch,
    pub files: Vec<ProcessingFile>,
}

impl DocketService {
    // ==================== Review decisions ====================

    /// Approve a file awaiting review; its document joins the library
    pub fn approve_file(
        &self,
        file_id: &str,
        reviewer_id: &str,
        notes: Option<&str>,
    ) -> ServiceResult<ProcessingFile> {
        let file = self.require_file(file_id)?;
        if !self.db.approve_file(file_id, reviewer_id, notes)? {
            return Err(not_awaiting_review(&file));
        }

        counter!("docket_review_decisions_total", "decision" => "approved").increment(1);
        info!(file_id = %file_id, reviewer = %reviewer_id, "File approved");
        self.recheck_batch(&file.batch_id);
        self.require_file(file_id)
    }

    /// Reject a file awaiting review. A reason is required.
    pub fn reject_file(
        &self,
        file_id: &str,
        reviewer_id: &str,
        reason: &str,
    ) -> ServiceResult<ProcessingFile> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "A rejection reason is required".to_string(),
            });
        }

        let file = self.require_file(file_id)?;
        if !self.db.reject_file(file_id, reviewer_id, reason)? {
            return Err(not_awaiting_review(&file));
        }

        counter!("docket_review_decisions_total", "decision" => "rejected").increment(1);
        info!(file_id = %file_id, reviewer = %reviewer_id, reason = %reason, "File rejected");
        self.recheck_batch(&file.batch_id);
        self.require_file(file_id)
    }

    /// Edit an unreviewed document's metadata, opening an editing session
    pub fn update_document_metadata(
        &self,
        document_id: &str,
        patch: MetadataPatch,
        editor_id: &str,
    ) -> ServiceResult<Document> {
        let mut doc = self.require_document(document_id)?;
        if doc.is_reviewed {
            return Err(ServiceError::Conflict {
                message: "Cannot edit metadata of a reviewed document".to_string(),
            });
        }

        if let Some(file) = self.db.get_file_by_document(document_id)?
            && !matches!(
                file.status,
                FileStatus::ReviewPending | FileStatus::UnderReview
            )
        {
            return Err(ServiceError::Conflict {
                message: format!(
                    "Document is not ready for review (status: {})",
                    file.status
                ),
            });
        }

        PartialMetadata::from(patch).apply_to(&mut doc);
        if !self.db.save_review_edit(&doc, editor_id)? {
            return Err(ServiceError::Conflict {
                message: "Document was reviewed or left review while being edited".to_string(),
            });
        }

        info!(doc_id = %document_id, editor = %editor_id, "Document metadata edited");
        self.require_document(document_id)
    }

    /// Soft-delete a document; it disappears from every listing
    pub fn delete_document(&self, document_id: &str, deleted_by: &str) -> ServiceResult<()> {
        if !self.db.soft_delete_document(document_id, deleted_by)? {
            return Err(ServiceError::DocumentNotFound {
                document_id: document_id.to_string(),
            });
        }
        info!(doc_id = %document_id, deleted_by = %deleted_by, "Document deleted");
        Ok(())
    }

    // ==================== Read paths ====================

    pub fn review_queue(&self) -> ServiceResult<Vec<ReviewQueueEntry>> {
        self.db
            .list_review_queue()?
            .into_iter()
            .map(|document| {
                let file = self.db.get_file_by_document(&document.id)?;
                Ok(ReviewQueueEntry {
                    file_id: file.as_ref().map(|f| f.id.clone()),
                    file_status: file.map(|f| f.status),
                    document,
                })
            })
            .collect()
    }

    pub fn list_library(&self, filter: &LibraryFilter) -> ServiceResult<LibraryPage> {
        let (documents, total) = self.db.list_library(filter)?;
        Ok(LibraryPage {
            documents,
            total,
            page: filter.page.unwrap_or(1).max(1),
            per_page: filter.per_page.unwrap_or(20).clamp(1, 100),
        })
    }

    pub fn get_document(&self, document_id: &str) -> ServiceResult<Document> {
        self.require_document(document_id)
    }

    pub fn get_batch_status(&self, batch_id: &str) -> ServiceResult<BatchStatusView> {
        let batch = self
            .db
            .get_batch(batch_id)?
            .ok_or_else(|| ServiceError::BatchNotFound {
                batch_id: batch_id.to_string(),
            })?;
        let files = self.db.list_batch_files(batch_id)?;
        Ok(BatchStatusView { batch, files })
    }

    pub fn list_batches(&self, status: Option<BatchStatus>) -> ServiceResult<Vec<ProcessingBatch>> {
        self.db.list_batches(status)
    }

    pub fn get_file(&self, file_id: &str) -> ServiceResult<ProcessingFile> {
        self.require_file(file_id)
    }

    /// Extracted text of a file; `None` once processing has finished
    pub fn get_extracted_text(&self, file_id: &str) -> ServiceResult<Option<String>> {
        self.require_file(file_id)?;
        self.db.get_extracted_text(file_id)
    }

    pub fn get_file_chunks(&self, file_id: &str) -> ServiceResult<Vec<DocumentChunk>> {
        self.require_file(file_id)?;
        self.db.list_chunks_for_file(file_id)
    }

    pub fn processing_stats(&self) -> ServiceResult<ProcessingStats> {
        self.db.processing_stats()
    }
}

fn not_awaiting_review(file: &ProcessingFile) -> ServiceError {
    ServiceError::InvalidTransition {
        message: format!("File is not in review_pending (status: {})", file.status),
    }
}
