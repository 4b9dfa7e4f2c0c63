//! LLM and embedding capabilities.
//!
//! Both are traits so the pipeline can be wired with whichever provider is
//! configured (or with fakes in tests). Providers are chosen in a fixed
//! preference order: Ollama first, then OpenAI.

mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{LlmConfig, MetadataConfig};
use crate::error::{EmbeddingError, LlmError, ServiceResult};

/// System instruction sent with every metadata extraction request
pub(crate) const SYSTEM_PROMPT: &str = "You are a legal research librarian. You extract \
    bibliographic and legal metadata from documents and always answer with a single JSON object.";

/// Structured-extraction capability. The answer should be JSON but may not be.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Text embedding capability. One vector per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Providers selected at startup
#[derive(Clone, Default)]
pub struct Providers {
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
}

/// Build providers from configuration, first configured provider wins.
pub fn select_providers(config: &LlmConfig, metadata: &MetadataConfig) -> ServiceResult<Providers> {
    if let Some(base_url) = config.ollama.base_url.as_deref() {
        let client = Arc::new(OllamaClient::new(base_url, &config.ollama, metadata)?);
        info!(provider = "ollama", url = %base_url, model = %config.ollama.model, "LLM provider configured");
        return Ok(Providers {
            llm: Some(client.clone()),
            embedder: Some(client),
        });
    }

    if let Some(api_key) = config.openai.api_key.as_deref() {
        let client = Arc::new(OpenAiClient::new(api_key, &config.openai, metadata)?);
        info!(provider = "openai", model = %config.openai.model, "LLM provider configured");
        return Ok(Providers {
            llm: Some(client.clone()),
            embedder: Some(client),
        });
    }

    warn!(
        "No LLM provider configured; metadata falls back to filename heuristics and embeddings are skipped"
    );
    Ok(Providers::default())
}

/// Trim a provider error body for logging and error messages
pub(crate) fn truncate_body(body: String) -> String {
    const MAX: usize = 500;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
