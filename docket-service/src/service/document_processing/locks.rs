//! In-process guard against two pipeline runs for the same file.

use tracing::debug;

use crate::service::DocketService;

/// Held for the duration of one pipeline run; releases on drop
pub(super) struct FileGuard<'a> {
    service: &'a DocketService,
    file_id: String,
}

impl Drop for FileGuard<'_> {
    fn drop(&mut self) {
        self.service.active_files.remove(&self.file_id);
        // A worker may have requeued this file while the run was active
        self.service.queue_notify.notify_one();
    }
}

impl DocketService {
    /// Claim the run guard for a file, or `None` if a run is already active
    pub(super) fn try_lock_file(&self, file_id: &str) -> Option<FileGuard<'_>> {
        if !self.active_files.insert(file_id.to_string()) {
            debug!(file_id = %file_id, "Pipeline run already active for file");
            return None;
        }
        Some(FileGuard {
            service: self,
            file_id: file_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::llm::Providers;
    use crate::service::test_support::harness;

    #[test]
    fn test_guard_is_exclusive_and_released() {
        let h = harness(Providers::default());

        let guard = h.service.try_lock_file("file-1");
        assert!(guard.is_some());
        assert!(h.service.try_lock_file("file-1").is_none());
        assert!(h.service.try_lock_file("file-2").is_some());

        drop(guard);
        assert!(h.service.try_lock_file("file-1").is_some());
    }
}
