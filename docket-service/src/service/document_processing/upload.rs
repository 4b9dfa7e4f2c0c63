//! Upload intake: validation, duplicate detection and storage.

use bytes::Bytes;
use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::db::{BatchStatus, Document, FileStatus, ProcessingBatch, ProcessingFile};
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::ingestion::{compute_content_hash, storage_path, validate_upload};
use crate::service::DocketService;

/// One file received from the client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Per-file result of an upload
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileUploadResult {
    Accepted {
        filename: String,
        file_id: String,
        document_id: String,
        content_hash: String,
    },
    Duplicate {
        filename: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        existing_document_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        existing_file_id: Option<String>,
    },
    Rejected {
        filename: String,
        message: String,
    },
}

impl FileUploadResult {
    fn outcome_label(&self) -> &'static str {
        match self {
            FileUploadResult::Accepted { .. } => "accepted",
            FileUploadResult::Duplicate { .. } => "duplicate",
            FileUploadResult::Rejected { .. } => "rejected",
        }
    }

    fn rejected(filename: &str, message: impl Into<String>) -> Self {
        FileUploadResult::Rejected {
            filename: filename.to_string(),
            message: message.into(),
        }
    }
}

/// Result of an upload request
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub batch_id: String,
    pub status: BatchStatus,
    pub accepted: u32,
    pub rejected: u32,
    pub files: Vec<FileUploadResult>,
}

impl DocketService {
    /// Accept a set of files as one batch and queue the accepted ones.
    ///
    /// Validation and duplicate failures are reported per file and create
    /// no state. The call returns without waiting for processing.
    pub async fn upload_files(
        &self,
        files: Vec<UploadedFile>,
        uploaded_by: &str,
    ) -> ServiceResult<UploadOutcome> {
        let max_files = self.config.limits.max_files_per_batch;
        if files.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "No files provided".to_string(),
            });
        }
        if files.len() > max_files {
            return Err(ServiceError::InvalidRequest {
                message: format!("Too many files: {} (max: {})", files.len(), max_files),
            });
        }

        let batch = ProcessingBatch::new(uploaded_by);
        self.db.insert_batch(&batch)?;
        info!(batch_id = %batch.id, files = files.len(), uploaded_by = %uploaded_by, "Upload batch created");

        let mut results = Vec::with_capacity(files.len());
        let mut queued = Vec::new();
        for file in files {
            let result = self.intake_file(&batch.id, file, uploaded_by).await;
            counter!("docket_uploads_total", "outcome" => result.outcome_label()).increment(1);
            if let FileUploadResult::Accepted { file_id, .. } = &result {
                queued.push(file_id.clone());
            }
            results.push(result);
        }

        let accepted = queued.len() as u32;
        let rejected = results.len() as u32 - accepted;
        let status = if accepted > 0 {
            BatchStatus::Processing
        } else {
            BatchStatus::Failed
        };
        self.db
            .finish_batch_upload(&batch.id, accepted, rejected, status)?;

        for file_id in &queued {
            if let Err(e) = self.queue_file(file_id) {
                error!(file_id = %file_id, error = %format_error_chain(&e), "Failed to queue uploaded file");
            }
        }

        info!(batch_id = %batch.id, accepted, rejected, status = %status.as_str(), "Upload batch stored");

        Ok(UploadOutcome {
            batch_id: batch.id,
            status,
            accepted,
            rejected,
            files: results,
        })
    }

    async fn intake_file(
        &self,
        batch_id: &str,
        file: UploadedFile,
        uploaded_by: &str,
    ) -> FileUploadResult {
        let filename = file.filename.as_str();
        let validated = match validate_upload(
            filename,
            file.content_type.as_deref(),
            file.data.len() as u64,
            &self.config.limits,
        ) {
            Ok(validated) => validated,
            Err(e) => {
                info!(filename = %filename, reason = %e, "Upload rejected");
                return FileUploadResult::rejected(filename, e.to_string());
            }
        };

        let content_hash = compute_content_hash(&file.data);
        match self.find_duplicate(filename, &content_hash) {
            Ok(Some(duplicate)) => return duplicate,
            Ok(None) => {}
            Err(e) => {
                error!(filename = %filename, error = %format_error_chain(&e), "Duplicate check failed");
                return FileUploadResult::rejected(filename, e.to_string());
            }
        }

        let file_id = uuid::Uuid::new_v4().to_string();
        let stored_path = storage_path(&file_id, &validated.extension);
        let size = file.data.len() as u64;

        if let Err(e) = self
            .blobs
            .put(&stored_path, file.data, &validated.mime_type)
            .await
        {
            error!(filename = %filename, path = %stored_path, error = %format_error_chain(&e), "Failed to store upload");
            return FileUploadResult::rejected(filename, e.to_string());
        }

        let doc = Document::placeholder(
            filename,
            &content_hash,
            &validated.mime_type,
            size,
            uploaded_by,
        );
        let now = Utc::now();
        let record = ProcessingFile {
            id: file_id.clone(),
            batch_id: batch_id.to_string(),
            document_id: Some(doc.id.clone()),
            original_filename: filename.to_string(),
            stored_path: stored_path.clone(),
            mime_type: validated.mime_type.clone(),
            content_hash: content_hash.clone(),
            file_size: size,
            status: FileStatus::Uploaded,
            retry_count: 0,
            error_message: None,
            page_count: None,
            word_count: None,
            char_count: None,
            chunk_count: 0,
            uploaded_by: uploaded_by.to_string(),
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.db.insert_upload(&doc, &record) {
            error!(filename = %filename, error = %format_error_chain(&e), "Failed to record upload");
            if let Err(cleanup) = self.blobs.delete(&stored_path).await {
                warn!(path = %stored_path, error = %format_error_chain(&cleanup), "Failed to remove orphaned blob");
            }
            return FileUploadResult::rejected(filename, e.to_string());
        }

        info!(
            batch_id = %batch_id,
            file_id = %file_id,
            filename = %filename,
            mime = %validated.mime_type,
            size,
            "File accepted"
        );

        FileUploadResult::Accepted {
            filename: filename.to_string(),
            file_id,
            document_id: doc.id,
            content_hash,
        }
    }

    /// A file still in flight wins over a library document
    fn find_duplicate(
        &self,
        filename: &str,
        content_hash: &str,
    ) -> ServiceResult<Option<FileUploadResult>> {
        if let Some(active) = self.db.find_active_file_by_hash(content_hash)? {
            info!(filename = %filename, existing_file_id = %active.id, "Duplicate of file in progress");
            return Ok(Some(FileUploadResult::Duplicate {
                filename: filename.to_string(),
                message: format!(
                    "Document is already being processed: {} (Status: {})",
                    active.original_filename, active.status
                ),
                existing_document_id: active.document_id,
                existing_file_id: Some(active.id),
            }));
        }

        if let Some(existing) = self.db.find_document_by_hash(content_hash)? {
            info!(filename = %filename, existing_document_id = %existing.id, "Duplicate of library document");
            return Ok(Some(FileUploadResult::Duplicate {
                filename: filename.to_string(),
                message: format!("Document already exists in library: {}", existing.title),
                existing_document_id: Some(existing.id),
                existing_file_id: None,
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::Providers;
    use crate::service::test_support::{harness, harness_with_config, text_file};

    #[tokio::test]
    async fn test_accepted_file_is_stored_and_queued() {
        let h = harness(Providers::default());
        let outcome = h
            .service
            .upload_files(vec![text_file("brief.md", "# Brief")], "alice")
            .await
            .unwrap();

        assert_eq!(outcome.status, BatchStatus::Processing);
        assert_eq!(outcome.accepted, 1);
        let FileUploadResult::Accepted {
            file_id,
            document_id,
            content_hash,
            ..
        } = &outcome.files[0]
        else {
            panic!("upload was not accepted");
        };

        let file = h.service.db.get_file(file_id).unwrap().unwrap();
        assert_eq!(file.status, FileStatus::Queued);
        assert_eq!(file.stored_path, format!("uploads/doc_{}.md", file_id));
        assert_eq!(file.content_hash, *content_hash);
        assert!(h.blobs.contains(&file.stored_path));

        let doc = h.service.db.get_document(document_id).unwrap().unwrap();
        assert_eq!(doc.title, "brief.md");
        assert_eq!(doc.uploaded_by, "alice");

        let batch = h.service.db.get_batch(&outcome.batch_id).unwrap().unwrap();
        assert_eq!(batch.total_files, 1);
        assert_eq!(batch.rejected_files, 0);
    }

    #[tokio::test]
    async fn test_duplicate_upload_writes_nothing() {
        let h = harness(Providers::default());
        h.service
            .upload_files(vec![text_file("first.txt", "same bytes")], "alice")
            .await
            .unwrap();
        assert_eq!(h.blobs.len(), 1);

        let outcome = h
            .service
            .upload_files(vec![text_file("second.txt", "same bytes")], "bob")
            .await
            .unwrap();
        assert_eq!(outcome.status, BatchStatus::Failed);
        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.rejected, 1);
        match &outcome.files[0] {
            FileUploadResult::Duplicate {
                message,
                existing_file_id,
                ..
            } => {
                assert_eq!(
                    message,
                    "Document is already being processed: first.txt (Status: queued)"
                );
                assert!(existing_file_id.is_some());
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert_eq!(h.blobs.len(), 1);
        assert!(
            h.service
                .db
                .list_batch_files(&outcome.batch_id)
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_duplicate_of_library_document() {
        let h = harness(Providers::default());
        let first = h
            .service
            .upload_files(vec![text_file("first.txt", "same bytes")], "alice")
            .await
            .unwrap();
        h.service.process_batch(&first.batch_id).await.unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &first.files[0] else {
            panic!("upload was not accepted");
        };
        h.service.approve_file(file_id, "rita", None).unwrap();

        // The approved file still claims the hash, so it is reported first
        let outcome = h
            .service
            .upload_files(vec![text_file("again.txt", "same bytes")], "bob")
            .await
            .unwrap();
        assert!(matches!(&outcome.files[0], FileUploadResult::Duplicate { .. }));

        // Without the file row only the library document remains
        h.service.db.delete_files_in_statuses(&[FileStatus::Approved]).unwrap();
        let outcome = h
            .service
            .upload_files(vec![text_file("again.txt", "same bytes")], "bob")
            .await
            .unwrap();
        match &outcome.files[0] {
            FileUploadResult::Duplicate { message, .. } => {
                assert_eq!(message, "Document already exists in library: first");
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_file_releases_its_hash() {
        let h = harness(Providers::default());
        let first = h
            .service
            .upload_files(vec![text_file("a.txt", "retry me")], "alice")
            .await
            .unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &first.files[0] else {
            panic!("upload was not accepted");
        };
        h.service.cancel_file(file_id).unwrap();

        let again = h
            .service
            .upload_files(vec![text_file("a.txt", "retry me")], "alice")
            .await
            .unwrap();
        assert_eq!(again.accepted, 1);
    }

    #[tokio::test]
    async fn test_validation_failures_are_per_file() {
        let h = harness(Providers::default());
        let empty = UploadedFile {
            filename: "empty.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            data: Bytes::new(),
        };
        let outcome = h
            .service
            .upload_files(
                vec![
                    text_file("../escape.txt", "x"),
                    text_file("photo.png", "x"),
                    empty,
                    text_file("ok.txt", "fine"),
                ],
                "alice",
            )
            .await
            .unwrap();

        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.rejected, 3);
        let messages: Vec<&str> = outcome
            .files
            .iter()
            .filter_map(|r| match r {
                FileUploadResult::Rejected { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            messages,
            vec![
                "Filename contains invalid characters: ../escape.txt",
                "Unsupported file extension: .png",
                "File is empty",
            ]
        );
        assert_eq!(h.blobs.len(), 1);
    }

    #[tokio::test]
    async fn test_request_level_limits() {
        let mut config = AppConfig::default();
        config.limits.max_files_per_batch = 1;
        let h = harness_with_config(config, Providers::default());

        assert!(matches!(
            h.service.upload_files(Vec::new(), "alice").await,
            Err(ServiceError::InvalidRequest { .. })
        ));
        assert!(matches!(
            h.service
                .upload_files(vec![text_file("a.txt", "a"), text_file("b.txt", "b")], "alice")
                .await,
            Err(ServiceError::InvalidRequest { .. })
        ));
        assert!(h.service.db.list_batches(None).unwrap().is_empty());
    }

    #[test]
    fn test_result_serializes_with_status_tag() {
        let result = FileUploadResult::Rejected {
            filename: "a.exe".to_string(),
            message: "Unsupported file extension: .exe".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["filename"], "a.exe");
    }
}
