//! Manual retry, cancellation and cleanup of failed files.

use metrics::counter;
use tracing::{info, warn};

use crate::db::{Document, FileStatus, ProcessingFile};
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::service::DocketService;

/// Statuses a file can be cancelled from
const CANCELLABLE: [FileStatus; 3] = [
    FileStatus::Uploaded,
    FileStatus::Queued,
    FileStatus::RetryPending,
];

impl DocketService {
    /// Send a failed file through the pipeline again.
    ///
    /// Allowed only from a failure status and while `retry_count` is below
    /// the configured maximum. A fresh placeholder document replaces the one
    /// removed by the failure.
    pub fn retry_file(&self, file_id: &str) -> ServiceResult<ProcessingFile> {
        let file = self.require_file(file_id)?;
        let max = self.config.processing.max_retries;

        if !file.status.is_failure() {
            return Err(ServiceError::InvalidTransition {
                message: format!("Cannot retry file in status {}", file.status),
            });
        }
        if file.retry_count >= max {
            return Err(ServiceError::RetryExhausted {
                attempts: file.retry_count,
                max,
            });
        }

        let existing = match file.document_id.as_deref() {
            Some(id) => self.db.get_document(id)?,
            None => None,
        };
        let replacement = existing.is_none().then(|| {
            Document::placeholder(
                &file.original_filename,
                &file.content_hash,
                &file.mime_type,
                file.file_size,
                &file.uploaded_by,
            )
        });

        if !self
            .db
            .reset_file_for_retry(file_id, max, replacement.as_ref())?
        {
            return Err(ServiceError::Conflict {
                message: format!("File {} changed while preparing retry", file_id),
            });
        }

        counter!("docket_retries_total").increment(1);
        info!(
            file_id = %file_id,
            attempt = file.retry_count + 1,
            max_retries = max,
            "Retrying file"
        );

        self.queue_file(file_id)?;
        self.recheck_batch(&file.batch_id);
        self.require_file(file_id)
    }

    /// Cancel a file that has not started processing
    pub fn cancel_file(&self, file_id: &str) -> ServiceResult<ProcessingFile> {
        let file = self.require_file(file_id)?;

        if !self
            .db
            .transition_file(file_id, &CANCELLABLE, FileStatus::Cancelled, None)?
        {
            return Err(ServiceError::InvalidTransition {
                message: format!("Cannot cancel file in status {}", file.status),
            });
        }

        info!(file_id = %file_id, "File cancelled");
        self.discard_document(file.document_id.as_deref());
        self.recheck_batch(&file.batch_id);
        self.require_file(file_id)
    }

    /// Delete every failed, duplicate or cancelled file together with its
    /// stored blob. Returns how many files were removed.
    ///
    /// Batch rows keep the status and counters they already had.
    pub async fn clear_failed_files(&self) -> ServiceResult<usize> {
        let cleared: Vec<FileStatus> = FileStatus::ALL
            .into_iter()
            .filter(FileStatus::counts_as_failed)
            .collect();
        let removed = self.db.delete_files_in_statuses(&cleared)?;

        for file in &removed {
            if let Err(e) = self.blobs.delete(&file.stored_path).await {
                warn!(
                    file_id = %file.id,
                    path = %file.stored_path,
                    error = %format_error_chain(&e),
                    "Failed to delete blob of cleared file"
                );
            }
        }

        info!(count = removed.len(), "Cleared failed files");
        Ok(removed.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::db::{BatchStatus, FileStatus};
    use crate::error::ServiceError;
    use crate::llm::Providers;
    use crate::service::FileUploadResult;
    use crate::service::test_support::{FakeLlm, harness, text_file};

    #[tokio::test]
    async fn test_retry_until_exhausted() {
        let h = harness(Providers {
            llm: Some(Arc::new(FakeLlm("garbage"))),
            embedder: None,
        });
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "body text")], "alice")
            .await
            .unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &outcome.files[0] else {
            panic!("upload was not accepted");
        };
        h.service.process_batch(&outcome.batch_id).await.unwrap();

        for attempt in 1..=3 {
            let file = tokio_test::assert_ok!(h.service.retry_file(file_id));
            assert_eq!(file.status, FileStatus::Queued);
            assert_eq!(file.retry_count, attempt);
            assert!(file.document_id.is_some());
            assert!(file.error_message.is_none());

            h.service.process_batch(&outcome.batch_id).await.unwrap();
            let file = h.service.db.get_file(file_id).unwrap().unwrap();
            assert_eq!(file.status, FileStatus::AnalysisFailed);
        }

        let err = h.service.retry_file(file_id).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::RetryExhausted {
                attempts: 3,
                max: 3
            }
        ));
        assert!(
            err.to_string()
                .to_lowercase()
                .contains("maximum retry attempts exceeded")
        );
        let file = h.service.get_file(file_id).unwrap();
        assert_eq!(file.status, FileStatus::AnalysisFailed);
        assert_eq!(file.retry_count, 3);
    }

    #[tokio::test]
    async fn test_retry_requires_failure_status() {
        let h = harness(Providers::default());
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "body text")], "alice")
            .await
            .unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &outcome.files[0] else {
            panic!("upload was not accepted");
        };

        assert!(matches!(
            h.service.retry_file(file_id),
            Err(ServiceError::InvalidTransition { .. })
        ));
        assert!(matches!(
            h.service.retry_file("missing"),
            Err(ServiceError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_queued_file() {
        let h = harness(Providers::default());
        let outcome = h
            .service
            .upload_files(
                vec![text_file("a.txt", "first"), text_file("b.txt", "second")],
                "alice",
            )
            .await
            .unwrap();
        let FileUploadResult::Accepted {
            file_id,
            document_id,
            ..
        } = &outcome.files[0]
        else {
            panic!("upload was not accepted");
        };

        let cancelled = h.service.cancel_file(file_id).unwrap();
        assert_eq!(cancelled.status, FileStatus::Cancelled);
        assert!(h.service.db.get_document(document_id).unwrap().is_none());

        // Cancelled files cannot be cancelled again or retried
        assert!(matches!(
            h.service.cancel_file(file_id),
            Err(ServiceError::InvalidTransition { .. })
        ));
        assert!(h.service.retry_file(file_id).is_err());

        h.service.process_batch(&outcome.batch_id).await.unwrap();
        let batch = h.service.db.get_batch(&outcome.batch_id).unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::PartiallyCompleted);
        assert_eq!(batch.failed_files, 1);
        assert_eq!(batch.completed_files, 1);
    }

    #[tokio::test]
    async fn test_clear_failed_files_removes_rows_and_blobs() {
        let h = harness(Providers {
            llm: Some(Arc::new(FakeLlm("garbage"))),
            embedder: None,
        });
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "body text")], "alice")
            .await
            .unwrap();
        h.service.process_batch(&outcome.batch_id).await.unwrap();
        assert_eq!(h.blobs.len(), 1);
        let before = h.service.db.get_batch(&outcome.batch_id).unwrap().unwrap();

        assert_eq!(h.service.clear_failed_files().await.unwrap(), 1);
        assert_eq!(h.blobs.len(), 0);
        assert!(
            h.service
                .db
                .list_batch_files(&outcome.batch_id)
                .unwrap()
                .is_empty()
        );
        // The batch keeps its outcome even though its files are gone
        let after = h.service.db.get_batch(&outcome.batch_id).unwrap().unwrap();
        assert_eq!(after.status, before.status);
        assert_eq!(after.total_files, before.total_files);
        assert_eq!(after.completed_files, before.completed_files);
        assert_eq!(after.failed_files, before.failed_files);
        assert_eq!(after.status, BatchStatus::Failed);
        assert_eq!(h.service.clear_failed_files().await.unwrap(), 0);
    }
}
