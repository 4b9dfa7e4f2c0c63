//! Text extraction stage.

use tracing::{debug, info};

use super::pipeline::StageOutcome;
use crate::db::{FileStatus, ProcessingFile};
use crate::error::{ProcessingError, ServiceError};
use crate::ingestion;
use crate::service::DocketService;

impl DocketService {
    /// Load the stored bytes, extract text off the async runtime and save it.
    pub(super) async fn extraction_stage(&self, file: &ProcessingFile) -> StageOutcome {
        match self.extract_and_save(file).await {
            Ok(true) => StageOutcome::Succeeded,
            Ok(false) => StageOutcome::failed(
                FileStatus::ProcessingFailed,
                "File left extracting_text during extraction",
            ),
            Err(e) => StageOutcome::from_error(FileStatus::ExtractionFailed, &e),
        }
    }

    async fn extract_and_save(&self, file: &ProcessingFile) -> Result<bool, ServiceError> {
        let bytes = self.blobs.get(&file.stored_path).await?;
        debug!(file_id = %file.id, size = bytes.len(), mime = %file.mime_type, "Extracting text");

        let mime_type = file.mime_type.clone();
        let max_chars = self.config.extraction.max_text_chars;
        let extracted = tokio::task::spawn_blocking(move || {
            ingestion::extract_text(&bytes, &mime_type, max_chars)
        })
        .await
        .map_err(|e| ProcessingError::Task {
            message: e.to_string(),
        })??;

        info!(
            file_id = %file.id,
            pages = extracted.page_count,
            words = extracted.word_count,
            chars = extracted.char_count,
            "Text extracted"
        );

        self.db.save_extraction(
            &file.id,
            &extracted.text,
            extracted.page_count,
            extracted.word_count,
            extracted.char_count,
        )
    }
}
