//! Batch aggregation.
//!
//! A batch's counters and status are always recomputed from its file rows,
//! never incremented, so repeated checks converge on the same answer.

use tracing::{info, warn};

use crate::db::{BatchStatus, FileStatus};
use crate::error::{ServiceResult, format_error_chain};
use crate::service::DocketService;

/// Completed and failed counts with the batch status they imply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchProgress {
    pub completed: u32,
    pub failed: u32,
    pub status: BatchStatus,
}

/// Aggregate per-status file counts into batch progress
pub(crate) fn aggregate(counts: &[(FileStatus, u32)]) -> BatchProgress {
    let total: u32 = counts.iter().map(|(_, n)| n).sum();
    let completed: u32 = counts
        .iter()
        .filter(|(s, _)| s.counts_as_completed())
        .map(|(_, n)| n)
        .sum();
    let failed: u32 = counts
        .iter()
        .filter(|(s, _)| s.counts_as_failed())
        .map(|(_, n)| n)
        .sum();
    let in_flight = total - completed - failed;

    let status = if total == 0 {
        BatchStatus::Failed
    } else if in_flight > 0 {
        BatchStatus::Processing
    } else if completed == 0 {
        BatchStatus::Failed
    } else if failed == 0 {
        BatchStatus::ProcessingComplete
    } else {
        BatchStatus::PartiallyCompleted
    };

    BatchProgress {
        completed,
        failed,
        status,
    }
}

impl DocketService {
    /// Recompute a batch's counters and status from its files
    pub fn check_batch_completion(&self, batch_id: &str) -> ServiceResult<BatchStatus> {
        let counts = self.db.batch_file_status_counts(batch_id)?;
        let progress = aggregate(&counts);
        self.db
            .update_batch_progress(batch_id, progress.completed, progress.failed, progress.status)?;

        if progress.status != BatchStatus::Processing {
            info!(
                batch_id = %batch_id,
                status = %progress.status.as_str(),
                completed = progress.completed,
                failed = progress.failed,
                "Batch finished"
            );
        }
        Ok(progress.status)
    }

    /// Refresh a batch where the caller cannot act on a failure
    pub(crate) fn recheck_batch(&self, batch_id: &str) {
        if let Err(e) = self.check_batch_completion(batch_id) {
            warn!(batch_id = %batch_id, error = %format_error_chain(&e), "Failed to update batch progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_is_failed() {
        assert_eq!(aggregate(&[]).status, BatchStatus::Failed);
    }

    #[test]
    fn test_in_flight_files_keep_batch_processing() {
        let progress = aggregate(&[
            (FileStatus::ReviewPending, 2),
            (FileStatus::ExtractionFailed, 1),
            (FileStatus::GeneratingEmbeddings, 1),
        ]);
        assert_eq!(progress.status, BatchStatus::Processing);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.failed, 1);
    }

    #[test]
    fn test_terminal_mixes() {
        let all_good = aggregate(&[(FileStatus::ReviewPending, 1), (FileStatus::Approved, 2)]);
        assert_eq!(all_good.status, BatchStatus::ProcessingComplete);

        let mixed = aggregate(&[(FileStatus::Rejected, 1), (FileStatus::Cancelled, 1)]);
        assert_eq!(mixed.status, BatchStatus::PartiallyCompleted);

        let all_bad = aggregate(&[
            (FileStatus::AnalysisFailed, 1),
            (FileStatus::EmbeddingFailed, 1),
        ]);
        assert_eq!(all_bad.status, BatchStatus::Failed);
        assert_eq!(all_bad.failed, 2);
    }

    #[test]
    fn test_retry_pending_counts_as_in_flight() {
        let progress = aggregate(&[(FileStatus::RetryPending, 1), (FileStatus::Approved, 1)]);
        assert_eq!(progress.status, BatchStatus::Processing);
    }
}
