//! Stage sequencing and failure handling.

use futures::future::join_all;
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::locks::FileGuard;
use crate::db::{FileStatus, ProcessingFile};
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::service::DocketService;

/// Result of one stage, produced at the stage boundary instead of an error
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Succeeded,
    /// Nothing to do; the file still advances
    Skipped,
    Failed { status: FileStatus, message: String },
}

impl StageOutcome {
    pub(super) fn failed(status: FileStatus, message: impl Into<String>) -> Self {
        StageOutcome::Failed {
            status,
            message: message.into(),
        }
    }

    /// Failure carrying the full error chain as its message
    pub(super) fn from_error(status: FileStatus, error: &dyn std::error::Error) -> Self {
        Self::failed(status, format_error_chain(error))
    }

    fn label(&self) -> &'static str {
        match self {
            StageOutcome::Succeeded => "succeeded",
            StageOutcome::Skipped => "skipped",
            StageOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Extraction,
    Metadata,
    Embedding,
}

impl Stage {
    const ORDER: [Stage; 3] = [Stage::Extraction, Stage::Metadata, Stage::Embedding];

    fn as_str(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Metadata => "metadata",
            Stage::Embedding => "embedding",
        }
    }

    /// Status a file holds while this stage runs
    fn active_status(&self) -> FileStatus {
        match self {
            Stage::Extraction => FileStatus::ExtractingText,
            Stage::Metadata => FileStatus::AnalyzingMetadata,
            Stage::Embedding => FileStatus::GeneratingEmbeddings,
        }
    }
}

/// Tally of a manual batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchRunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DocketService {
    /// Run every stage for a file already in `extracting_text`, holding its
    /// run guard until the last stage finishes.
    ///
    /// Returns true when the file reached `review_pending`. Never fails:
    /// stage errors are recorded on the file.
    pub(super) async fn run_pipeline(&self, file: &ProcessingFile, _guard: FileGuard<'_>) -> bool {
        info!(file_id = %file.id, filename = %file.original_filename, "Processing file");

        for stage in Stage::ORDER {
            let started = Instant::now();
            let outcome = match stage {
                Stage::Extraction => self.extraction_stage(file).await,
                Stage::Metadata => self.metadata_stage(file).await,
                Stage::Embedding => self.embedding_stage(file).await,
            };

            histogram!("docket_stage_duration_seconds", "stage" => stage.as_str())
                .record(started.elapsed().as_secs_f64());
            counter!(
                "docket_stage_outcomes_total",
                "stage" => stage.as_str(),
                "outcome" => outcome.label()
            )
            .increment(1);

            if let StageOutcome::Failed { status, message } = outcome {
                self.fail_file(file, &[stage.active_status()], status, &message);
                return false;
            }
        }

        match self.db.complete_file_processing(&file.id) {
            Ok(true) => {
                info!(file_id = %file.id, "File ready for review");
                self.recheck_batch(&file.batch_id);
                true
            }
            Ok(false) => {
                warn!(file_id = %file.id, "File left generating_embeddings before completion");
                false
            }
            Err(e) => {
                self.fail_file(
                    file,
                    &[FileStatus::GeneratingEmbeddings],
                    FileStatus::ProcessingFailed,
                    &format_error_chain(&e),
                );
                false
            }
        }
    }

    /// Record a failure: failed status with the error, document removed,
    /// batch rechecked.
    ///
    /// The status write is conditional on `from`; if the file has moved on
    /// (for example through a webhook) nothing is changed.
    pub(crate) fn fail_file(
        &self,
        file: &ProcessingFile,
        from: &[FileStatus],
        status: FileStatus,
        message: &str,
    ) {
        error!(
            file_id = %file.id,
            batch_id = %file.batch_id,
            status = %status,
            error = %message,
            "File processing failed"
        );

        match self.db.transition_file(&file.id, from, status, Some(message)) {
            Ok(true) => {}
            Ok(false) => {
                warn!(file_id = %file.id, status = %status, "File status changed concurrently, failure not recorded");
                return;
            }
            Err(e) => {
                error!(file_id = %file.id, error = %format_error_chain(&e), "Failed to record file failure");
                return;
            }
        }

        self.discard_document(file.document_id.as_deref());
        self.recheck_batch(&file.batch_id);
    }

    /// Hard-delete a failed file's document; its chunks cascade
    pub(crate) fn discard_document(&self, document_id: Option<&str>) {
        let Some(document_id) = document_id else {
            return;
        };
        match self.db.delete_document(document_id) {
            Ok(_) => info!(doc_id = %document_id, "Removed document of failed file"),
            Err(e) => warn!(doc_id = %document_id, error = %format_error_chain(&e), "Failed to remove document"),
        }
    }

    /// Claim a file in `uploaded` or `queued` and run it.
    ///
    /// The run guard is taken before the claim, so a skipped file keeps its status.
    async fn process_file(&self, file: ProcessingFile) -> bool {
        let Some(guard) = self.try_lock_file(&file.id) else {
            warn!(file_id = %file.id, "Skipping file, pipeline already running");
            return false;
        };

        match self.db.transition_file(
            &file.id,
            &[FileStatus::Uploaded, FileStatus::Queued],
            FileStatus::ExtractingText,
            None,
        ) {
            Ok(true) => self.run_pipeline(&file, guard).await,
            Ok(false) => {
                info!(file_id = %file.id, "File was claimed elsewhere, skipping");
                false
            }
            Err(e) => {
                error!(file_id = %file.id, error = %format_error_chain(&e), "Failed to claim file");
                false
            }
        }
    }

    /// Run every pending file of a batch now, a bounded number at a time
    pub async fn process_batch(&self, batch_id: &str) -> ServiceResult<BatchRunSummary> {
        self.db
            .get_batch(batch_id)?
            .ok_or_else(|| ServiceError::BatchNotFound {
                batch_id: batch_id.to_string(),
            })?;

        let pending: Vec<ProcessingFile> = self
            .db
            .list_batch_files(batch_id)?
            .into_iter()
            .filter(|f| matches!(f.status, FileStatus::Uploaded | FileStatus::Queued))
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.processing.max_concurrent_files));
        info!(
            batch_id = %batch_id,
            files = pending.len(),
            concurrency = self.config.processing.max_concurrent_files,
            "Processing batch"
        );

        let total = pending.len();
        let results = join_all(pending.into_iter().map(|file| {
            let semaphore = semaphore.clone();
            async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return false;
                };
                self.process_file(file).await
            }
        }))
        .await;

        let succeeded = results.iter().filter(|ok| **ok).count();
        let summary = BatchRunSummary {
            total,
            succeeded,
            failed: total - succeeded,
        };
        info!(batch_id = %batch_id, ?summary, "Batch run finished");
        Ok(summary)
    }
}
