//! Durable queue and background workers.
//!
//! The queue is the `queued` status in the database, so pending work
//! survives restarts. Workers claim files with a compare-and-set and are
//! woken by [`DocketService::queue_file`] or a poll timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::db::FileStatus;
use crate::error::{ServiceError, ServiceResult, format_error_chain};
use crate::service::DocketService;

/// Back-off after a failed queue check
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Statuses only a running pipeline holds
const IN_FLIGHT: [FileStatus; 3] = [
    FileStatus::ExtractingText,
    FileStatus::AnalyzingMetadata,
    FileStatus::GeneratingEmbeddings,
];

impl DocketService {
    /// Move an uploaded file onto the queue and wake a worker.
    ///
    /// Returns once the file is queued; processing happens in the background.
    pub fn queue_file(&self, file_id: &str) -> ServiceResult<()> {
        if !self
            .db
            .transition_file(file_id, &[FileStatus::Uploaded], FileStatus::Queued, None)?
        {
            let file = self
                .db
                .get_file(file_id)?
                .ok_or_else(|| ServiceError::FileNotFound {
                    file_id: file_id.to_string(),
                })?;
            return Err(ServiceError::InvalidTransition {
                message: format!("Cannot queue file in status {}", file.status),
            });
        }

        self.queue_notify.notify_one();
        Ok(())
    }

    /// Start the document processing workers.
    ///
    /// This should be called once on server startup. Workers stop when
    /// `shutdown` is cancelled; a pipeline run in progress finishes first.
    pub fn start_workers(service: Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        (0..service.config.processing.worker_count)
            .map(|worker| {
                let service = service.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { service.run_worker(worker, shutdown).await })
            })
            .collect()
    }

    async fn run_worker(&self, worker: usize, shutdown: CancellationToken) {
        info!(worker, "Document processing worker started");

        while !shutdown.is_cancelled() {
            match self.db.claim_next_queued_file() {
                Ok(Some(file)) => {
                    let Some(guard) = self.try_lock_file(&file.id) else {
                        self.requeue_claimed_file(worker, &file.id);
                        // Released guards notify, so wait for this run to end
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = self.queue_notify.notified() => {}
                            _ = tokio::time::sleep(self.config.processing.poll_interval()) => {}
                        }
                        continue;
                    };
                    info!(worker, file_id = %file.id, filename = %file.original_filename, "Processing queued file");
                    self.run_pipeline(&file, guard).await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.queue_notify.notified() => {}
                        _ = tokio::time::sleep(self.config.processing.poll_interval()) => {}
                    }
                }
                Err(e) => {
                    error!(worker, error = %format_error_chain(&e), "Failed to check for queued files");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!(worker, "Document processing worker stopped");
    }

    /// Return a claimed file to the queue when another run holds its guard
    fn requeue_claimed_file(&self, worker: usize, file_id: &str) {
        warn!(worker, file_id = %file_id, "Pipeline already running for claimed file, requeueing");
        match self.db.transition_file(
            file_id,
            &[FileStatus::ExtractingText],
            FileStatus::Queued,
            None,
        ) {
            Ok(true) => {}
            Ok(false) => warn!(file_id = %file_id, "Claimed file changed status before requeue"),
            Err(e) => {
                error!(file_id = %file_id, error = %format_error_chain(&e), "Failed to requeue claimed file")
            }
        }
    }

    /// Fail files left mid-stage by a previous process.
    ///
    /// Must run before workers start. Returns how many files were failed.
    pub fn recover_stranded_files(&self) -> ServiceResult<usize> {
        let stranded = self.db.list_files_in_statuses(&IN_FLIGHT)?;
        if stranded.is_empty() {
            return Ok(0);
        }

        warn!(count = stranded.len(), "Found files interrupted by a restart");
        for file in &stranded {
            self.fail_file(
                file,
                &[file.status],
                FileStatus::ProcessingFailed,
                "Interrupted by service restart",
            );
        }
        Ok(stranded.len())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::config::AppConfig;
    use crate::db::FileStatus;
    use crate::error::ServiceError;
    use crate::llm::Providers;
    use crate::service::test_support::{harness, harness_with_config, text_file};
    use crate::service::{DocketService, FileUploadResult};

    #[tokio::test]
    async fn test_workers_drain_queue_and_stop() {
        let h = harness(Providers::default());
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "queued work")], "alice")
            .await
            .unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &outcome.files[0] else {
            panic!("upload was not accepted");
        };

        let shutdown = CancellationToken::new();
        let handles = DocketService::start_workers(h.service.clone(), shutdown.clone());
        assert_eq!(handles.len(), 2);

        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let file = h.service.db.get_file(file_id).unwrap().unwrap();
                if file.status == FileStatus::ReviewPending {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("file was not processed by a worker");

        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_worker_requeues_file_with_active_run() {
        let mut config = AppConfig::default();
        config.processing.poll_interval_secs = 60;
        let h = harness_with_config(config, Providers::default());
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "queued work")], "alice")
            .await
            .unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &outcome.files[0] else {
            panic!("upload was not accepted");
        };

        let held = h.service.try_lock_file(file_id).unwrap();
        let shutdown = CancellationToken::new();
        let handles = DocketService::start_workers(h.service.clone(), shutdown.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let file = h.service.db.get_file(file_id).unwrap().unwrap();
        assert_eq!(file.status, FileStatus::Queued);

        // Releasing the guard wakes a worker well before the next poll
        drop(held);
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let file = h.service.db.get_file(file_id).unwrap().unwrap();
                if file.status == FileStatus::ReviewPending {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("requeued file was not processed");

        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_queue_requires_uploaded_status() {
        let h = harness(Providers::default());
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "body")], "alice")
            .await
            .unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &outcome.files[0] else {
            panic!("upload was not accepted");
        };

        // Already queued by the upload
        assert!(matches!(
            h.service.queue_file(file_id),
            Err(ServiceError::InvalidTransition { .. })
        ));
        assert!(matches!(
            h.service.queue_file("missing"),
            Err(ServiceError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_recover_stranded_files() {
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
        h.service
            .db
            .set_file_status(file_id, FileStatus::AnalyzingMetadata, None)
            .unwrap();

        assert_eq!(h.service.recover_stranded_files().unwrap(), 1);

        let file = h.service.db.get_file(file_id).unwrap().unwrap();
        assert_eq!(file.status, FileStatus::ProcessingFailed);
        assert_eq!(
            file.error_message.as_deref(),
            Some("Interrupted by service restart")
        );
        assert!(h.service.db.get_document(document_id).unwrap().is_none());

        // Queued files are left for the workers
        let files = h.service.db.list_batch_files(&outcome.batch_id).unwrap();
        assert_eq!(files[1].status, FileStatus::Queued);
        assert_eq!(h.service.recover_stranded_files().unwrap(), 0);
    }
}
