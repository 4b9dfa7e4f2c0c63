//! Metadata analysis stage.

use tracing::info;

use super::pipeline::StageOutcome;
use crate::db::{FileStatus, ProcessingFile};
use crate::error::{ServiceError, ServiceResult};
use crate::metadata;
use crate::service::DocketService;

impl DocketService {
    /// Derive metadata from the extracted text and store it on the document
    pub(super) async fn metadata_stage(&self, file: &ProcessingFile) -> StageOutcome {
        match self.analyze_and_save(file).await {
            Ok(true) => StageOutcome::Succeeded,
            Ok(false) => StageOutcome::failed(
                FileStatus::ProcessingFailed,
                "File left analyzing_metadata during analysis",
            ),
            Err(e) => StageOutcome::from_error(FileStatus::AnalysisFailed, &e),
        }
    }

    async fn analyze_and_save(&self, file: &ProcessingFile) -> ServiceResult<bool> {
        let text = self.db.get_extracted_text(&file.id)?.unwrap_or_default();
        let document_id = file.document_id.as_deref().ok_or_else(|| ServiceError::Internal {
            message: format!("file {} has no document", file.id),
        })?;
        let mut doc = self
            .db
            .get_document(document_id)?
            .ok_or_else(|| ServiceError::DocumentNotFound {
                document_id: document_id.to_string(),
            })?;

        let analyzed = metadata::analyze(
            self.llm.as_deref(),
            &text,
            &file.original_filename,
            &self.config.metadata,
        )
        .await?;

        info!(
            file_id = %file.id,
            source = analyzed.source,
            doc_type = analyzed.metadata.doc_type.map(|t| t.as_str()).unwrap_or("other"),
            "Metadata extracted"
        );

        analyzed.apply_to(&mut doc);
        self.db.update_document_metadata(&doc)?;

        self.db.transition_file(
            &file.id,
            &[FileStatus::AnalyzingMetadata],
            FileStatus::GeneratingEmbeddings,
            None,
        )
    }
}
