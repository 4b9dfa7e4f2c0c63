//! Document pipeline orchestration, review workflow, search and webhooks.
//!
//! [`DocketService`] owns every collaborator the pipeline needs (database,
//! blob store, LLM and embedding providers). They are injected at startup,
//! which also lets tests run the full pipeline against in-memory fakes.

mod document_processing;
mod review;
mod search;
mod webhooks;

pub use document_processing::{BatchRunSummary, FileUploadResult, UploadOutcome, UploadedFile};
pub use review::{BatchStatusView, LibraryPage, MetadataPatch, ReviewQueueEntry};
pub use search::SearchRequest;
pub use webhooks::WebhookResponse;

use dashmap::DashSet;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

use crate::config::AppConfig;
use crate::db::{Database, Document, ProcessingFile};
use crate::error::{ServiceError, ServiceResult};
use crate::llm::{EmbeddingProvider, LlmProvider, Providers};
use crate::storage::BlobStore;

/// Main service coordinator
pub struct DocketService {
    pub config: Arc<AppConfig>,
    pub db: Arc<Database>,
    blobs: Arc<dyn BlobStore>,
    llm: Option<Arc<dyn LlmProvider>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    /// Files with a pipeline run in progress in this process
    active_files: DashSet<String>,
    /// Wakes idle workers when a file is queued
    queue_notify: Notify,
}

impl DocketService {
    pub fn new(
        config: Arc<AppConfig>,
        db: Arc<Database>,
        blobs: Arc<dyn BlobStore>,
        providers: Providers,
    ) -> Self {
        info!(
            llm = providers.llm.as_ref().map(|p| p.name()).unwrap_or("none"),
            embeddings = providers.embedder.as_ref().map(|p| p.name()).unwrap_or("none"),
            "Initializing docket service"
        );

        Self {
            config,
            db,
            blobs,
            llm: providers.llm,
            embedder: providers.embedder,
            active_files: DashSet::new(),
            queue_notify: Notify::new(),
        }
    }

    /// Name of the configured LLM provider, if any
    pub fn llm_provider(&self) -> Option<&'static str> {
        self.llm.as_ref().map(|p| p.name())
    }

    /// Name of the configured embedding provider, if any
    pub fn embedding_provider(&self) -> Option<&'static str> {
        self.embedder.as_ref().map(|p| p.name())
    }

    pub(crate) fn require_file(&self, file_id: &str) -> ServiceResult<ProcessingFile> {
        self.db
            .get_file(file_id)?
            .ok_or_else(|| ServiceError::FileNotFound {
                file_id: file_id.to_string(),
            })
    }

    /// Look up a document that has not been soft-deleted
    pub(crate) fn require_document(&self, document_id: &str) -> ServiceResult<Document> {
        self.db
            .get_document(document_id)?
            .filter(|doc| !doc.is_deleted)
            .ok_or_else(|| ServiceError::DocumentNotFound {
                document_id: document_id.to_string(),
            })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{EmbeddingError, LlmError};
    use crate::storage::MemoryBlobStore;

    /// LLM that always answers with the same text
    pub struct FakeLlm(pub &'static str);

    #[async_trait]
    impl LlmProvider for FakeLlm {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn extract(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    /// Embedder producing deterministic 3-d vectors from text features
    #[derive(Default)]
    pub struct FakeEmbedder {
        pub calls: AtomicUsize,
    }

    pub fn fake_vector(text: &str) -> Vec<f32> {
        let len = text.len() as f32;
        let digits = text.chars().filter(char::is_ascii_digit).count() as f32;
        let spaces = text.chars().filter(|c| c.is_whitespace()).count() as f32;
        vec![1.0, digits / len.max(1.0), spaces / len.max(1.0)]
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| fake_vector(t)).collect())
        }
    }

    pub struct Harness {
        pub service: Arc<DocketService>,
        pub blobs: Arc<MemoryBlobStore>,
    }

    pub fn harness(providers: Providers) -> Harness {
        harness_with_config(AppConfig::default(), providers)
    }

    pub fn harness_with_config(mut config: AppConfig, providers: Providers) -> Harness {
        config.embeddings.inter_batch_delay_ms = 0;
        let blobs = Arc::new(MemoryBlobStore::default());
        let db = Arc::new(Database::open_in_memory().unwrap());
        let service = Arc::new(DocketService::new(
            Arc::new(config),
            db,
            blobs.clone(),
            providers,
        ));
        Harness { service, blobs }
    }

    pub fn text_file(name: &str, content: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: Some("text/plain".to_string()),
            data: bytes::Bytes::copy_from_slice(content.as_bytes()),
        }
    }
}
