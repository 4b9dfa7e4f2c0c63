//! Similarity search over embedded chunks.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::db::{ChunkMatch, DocCategory};
use crate::error::{EmbeddingError, ServiceError, ServiceResult};
use crate::service::DocketService;

const MAX_LIMIT: usize = 100;

/// Search request body
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Restrict results to these categories
    #[serde(default)]
    pub categories: Option<Vec<DocCategory>>,
}

fn default_limit() -> usize {
    10
}

fn default_threshold() -> f32 {
    0.7
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: default_limit(),
            threshold: default_threshold(),
            categories: None,
        }
    }
}

impl DocketService {
    /// Rank stored chunks against the query text, best first.
    ///
    /// Without an embedding provider there is nothing to compare against and
    /// the result is empty.
    pub async fn search(&self, request: &SearchRequest) -> ServiceResult<Vec<ChunkMatch>> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "Search query must not be empty".to_string(),
            });
        }

        let Some(embedder) = self.embedder.as_deref() else {
            warn!("Search requested but no embedding provider is configured");
            return Ok(Vec::new());
        };

        let settings = &self.config.embeddings;
        let mut vectors = tokio::time::timeout(
            settings.request_timeout(),
            embedder.embed(&[query.to_string()]),
        )
        .await
        .map_err(|_| EmbeddingError::Timeout {
            secs: settings.request_timeout_secs,
        })??;

        let query_vector = match vectors.pop() {
            Some(v) if vectors.is_empty() => v,
            _ => {
                return Err(EmbeddingError::CountMismatch {
                    expected: 1,
                    actual: vectors.len() + 1,
                }
                .into());
            }
        };

        let limit = request.limit.clamp(1, MAX_LIMIT);
        let matches = self.db.nearest_chunks(
            &query_vector,
            limit,
            request.threshold,
            request.categories.as_deref(),
        )?;

        debug!(results = matches.len(), limit, threshold = request.threshold, "Search completed");
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llm::Providers;
    use crate::service::FileUploadResult;
    use crate::service::test_support::{FakeEmbedder, harness, text_file};

    #[tokio::test]
    async fn test_search_ranks_and_filters() {
        let h = harness(Providers {
            llm: None,
            embedder: Some(Arc::new(FakeEmbedder::default())),
        });
        let body: String = "abcdefghij".chars().cycle().take(1500).collect();
        let outcome = h
            .service
            .upload_files(vec![text_file("letters.txt", &body)], "alice")
            .await
            .unwrap();
        h.service.process_batch(&outcome.batch_id).await.unwrap();
        let FileUploadResult::Accepted { file_id, .. } = &outcome.files[0] else {
            panic!("upload was not accepted");
        };
        h.service.approve_file(file_id, "reviewer", None).unwrap();

        let results = h.service.search(&SearchRequest::new("abcdef")).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| (r.similarity - 1.0).abs() < 1e-6));
        assert_eq!(results[0].title, "letters");

        let mut limited = SearchRequest::new("abcdef");
        limited.limit = 1;
        assert_eq!(h.service.search(&limited).await.unwrap().len(), 1);

        // Digits pull the query vector away from the stored chunks
        let mut strict = SearchRequest::new("1234");
        strict.threshold = 0.9;
        assert!(h.service.search(&strict).await.unwrap().is_empty());

        let mut filtered = SearchRequest::new("abcdef");
        filtered.categories = Some(vec![DocCategory::PersonalInjury]);
        assert!(h.service.search(&filtered).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_skips_pending_and_rejected_documents() {
        let h = harness(Providers {
            llm: None,
            embedder: Some(Arc::new(FakeEmbedder::default())),
        });
        let outcome = h
            .service
            .upload_files(
                vec![
                    text_file("pending.txt", "abcdefghij abcdefghij"),
                    text_file("rejected.txt", "abcdefghij abcdefghij abcdefghij"),
                ],
                "alice",
            )
            .await
            .unwrap();
        h.service.process_batch(&outcome.batch_id).await.unwrap();

        let mut everything = SearchRequest::new("abcdefghij");
        everything.threshold = 0.0;
        assert!(h.service.search(&everything).await.unwrap().is_empty());

        let FileUploadResult::Accepted { file_id, .. } = &outcome.files[1] else {
            panic!("upload was not accepted");
        };
        h.service.reject_file(file_id, "reviewer", "not relevant").unwrap();
        assert!(h.service.search(&everything).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_without_embedder_is_empty() {
        let h = harness(Providers::default());
        assert!(h.service.search(&SearchRequest::new("damages")).await.unwrap().is_empty());
        assert!(matches!(
            h.service.search(&SearchRequest::new("   ")).await,
            Err(ServiceError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_request_defaults() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "lost wages"}"#).unwrap();
        assert_eq!(request.limit, 10);
        assert!((request.threshold - 0.7).abs() < f32::EPSILON);
        assert!(request.categories.is_none());

        let request: SearchRequest =
            serde_json::from_str(r#"{"query": "x", "categories": ["PI", "WD"]}"#).unwrap();
        assert_eq!(
            request.categories,
            Some(vec![DocCategory::PersonalInjury, DocCategory::WrongfulDeath])
        );
    }
}
