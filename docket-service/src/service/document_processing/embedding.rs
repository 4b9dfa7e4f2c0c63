//! Chunking and embedding stage.
//!
//! Chunks are produced lazily and embedded in stream batches; each stream
//! batch is split into provider requests and persisted before the next one
//! is produced, so memory stays bounded for very long documents.

use metrics::counter;
use tracing::{debug, info, warn};

use super::pipeline::StageOutcome;
use crate::db::{FileStatus, NewChunk, ProcessingFile};
use crate::error::{EmbeddingError, ServiceResult};
use crate::ingestion::{TextChunk, TextChunker};
use crate::llm::EmbeddingProvider;
use crate::service::DocketService;

impl DocketService {
    pub(super) async fn embedding_stage(&self, file: &ProcessingFile) -> StageOutcome {
        let Some(embedder) = self.embedder.as_deref() else {
            warn!(file_id = %file.id, "No embedding provider configured, skipping embeddings");
            return match self.db.record_chunk_count(&file.id, 0) {
                Ok(()) => StageOutcome::Skipped,
                Err(e) => StageOutcome::from_error(FileStatus::EmbeddingFailed, &e),
            };
        };

        match self.embed_file(embedder, file).await {
            Ok(count) => {
                info!(file_id = %file.id, chunks = count, provider = embedder.name(), "Embeddings stored");
                StageOutcome::Succeeded
            }
            Err(e) => StageOutcome::from_error(FileStatus::EmbeddingFailed, &e),
        }
    }

    async fn embed_file(
        &self,
        embedder: &dyn EmbeddingProvider,
        file: &ProcessingFile,
    ) -> ServiceResult<u32> {
        let text = self.db.get_extracted_text(&file.id)?.unwrap_or_default();

        // A retry may have left chunks from an earlier attempt
        let stale = self.db.delete_chunks_for_file(&file.id)?;
        if stale > 0 {
            debug!(file_id = %file.id, removed = stale, "Removed chunks from earlier attempt");
        }

        let settings = &self.config.embeddings;
        let chunker = TextChunker::new(&self.config.chunking);
        let mut chunks = chunker.chunks(&text);
        let mut stored: u32 = 0;
        let mut first_request = true;

        loop {
            let batch: Vec<TextChunk<'_>> =
                chunks.by_ref().take(settings.stream_batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let mut rows = Vec::with_capacity(batch.len());
            for group in batch.chunks(settings.provider_batch_size) {
                if !first_request {
                    tokio::time::sleep(settings.inter_batch_delay()).await;
                }
                first_request = false;

                let inputs: Vec<String> = group.iter().map(|c| c.content.to_string()).collect();
                let vectors = self.embed_group(embedder, &inputs).await?;

                rows.extend(group.iter().zip(vectors).map(|(chunk, embedding)| NewChunk {
                    chunk_index: chunk.index as u32,
                    content: chunk.content.to_string(),
                    token_count: chunk.token_count(),
                    embedding,
                }));
            }

            self.db
                .insert_chunks(&file.id, file.document_id.as_deref(), &rows)?;
            stored += rows.len() as u32;
            counter!("docket_chunks_embedded_total").increment(rows.len() as u64);
            debug!(file_id = %file.id, stored, "Stream batch persisted");
        }

        if chunks.truncated() {
            warn!(file_id = %file.id, stored, "Chunking stopped early, document tail not embedded");
        }

        self.db.record_chunk_count(&file.id, stored)?;
        Ok(stored)
    }

    /// One provider request, bounded by the request timeout and checked for shape
    async fn embed_group(
        &self,
        embedder: &dyn EmbeddingProvider,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let settings = &self.config.embeddings;
        let vectors = tokio::time::timeout(settings.request_timeout(), embedder.embed(inputs))
            .await
            .map_err(|_| EmbeddingError::Timeout {
                secs: settings.request_timeout_secs,
            })??;

        if vectors.len() != inputs.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: inputs.len(),
                actual: vectors.len(),
            });
        }

        if let Some(expected) = settings.dimensions
            && let Some(bad) = vectors.iter().find(|v| v.len() != expected)
        {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::config::AppConfig;
    use crate::db::FileStatus;
    use crate::error::EmbeddingError;
    use crate::llm::{EmbeddingProvider, Providers};
    use crate::service::FileUploadResult;
    use crate::service::test_support::{harness_with_config, text_file};

    /// Answers with one vector too few
    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedder {
        fn name(&self) -> &'static str {
            "short"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_fails_embedding() {
        let h = harness_with_config(
            AppConfig::default(),
            Providers {
                llm: None,
                embedder: Some(Arc::new(ShortEmbedder)),
            },
        );
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "short body")], "alice")
            .await
            .unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &outcome.files[0] else {
            panic!("upload was not accepted");
        };
        h.service.process_batch(&outcome.batch_id).await.unwrap();

        let file = h.service.db.get_file(file_id).unwrap().unwrap();
        assert_eq!(file.status, FileStatus::EmbeddingFailed);
        assert_eq!(
            file.error_message.as_deref(),
            Some("Embedding provider returned 0 vectors for 1 inputs")
        );
        assert_eq!(h.service.db.count_chunks_for_file(file_id).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dimension_check() {
        let mut config = AppConfig::default();
        config.embeddings.dimensions = Some(8);
        let h = harness_with_config(
            config,
            Providers {
                llm: None,
                embedder: Some(Arc::new(crate::service::test_support::FakeEmbedder::default())),
            },
        );
        let outcome = h
            .service
            .upload_files(vec![text_file("memo.txt", "short body")], "alice")
            .await
            .unwrap();
        h.service.process_batch(&outcome.batch_id).await.unwrap();

        let file = &h.service.db.list_batch_files(&outcome.batch_id).unwrap()[0];
        assert_eq!(file.status, FileStatus::EmbeddingFailed);
        assert!(
            file.error_message
                .as_deref()
                .unwrap()
                .contains("expected 8, got 3")
        );
    }
}
