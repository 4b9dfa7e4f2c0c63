//! Configuration management.
//!
//! All settings are loaded once at startup from an optional `config.*` file
//! and `DOCKET__`-prefixed environment variables. Every field has a default
//! so the service starts with no configuration at all.

mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use loader::load_config;

use crate::error::{ServiceError, ServiceResult};

/// MIME type for Word documents
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl AppConfig {
    /// Reject settings that would make the pipeline misbehave.
    pub fn validate(&self) -> ServiceResult<()> {
        let invalid = |message: &str| {
            Err(ServiceError::Config {
                message: message.to_string(),
            })
        };

        if self.chunking.chunk_size < 100 {
            return invalid("chunking.chunk_size must be at least 100");
        }
        if self.chunking.max_chunks == 0 || self.chunking.max_iterations == 0 {
            return invalid("chunking.max_chunks and chunking.max_iterations must be positive");
        }
        if self.embeddings.stream_batch_size == 0 || self.embeddings.provider_batch_size == 0 {
            return invalid("embedding batch sizes must be positive");
        }
        if self.processing.max_concurrent_files == 0 {
            return invalid("processing.max_concurrent_files must be positive");
        }
        if self.limits.max_files_per_batch == 0 {
            return invalid("limits.max_files_per_batch must be positive");
        }
        Ok(())
    }
}

// ==================== Server ====================

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout for HTTP handlers
    #[serde(default = "default_server_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_server_timeout_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_server_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("docket.db")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}

// ==================== Upload limits ====================

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    #[serde(default = "default_max_files_per_batch")]
    pub max_files_per_batch: usize,
    #[serde(default = "default_supported_mime_types")]
    pub supported_mime_types: Vec<String>,
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

fn default_max_files_per_batch() -> usize {
    50
}

fn default_supported_mime_types() -> Vec<String> {
    vec![
        "application/pdf".to_string(),
        "text/plain".to_string(),
        "text/markdown".to_string(),
        DOCX_MIME.to_string(),
    ]
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            max_files_per_batch: default_max_files_per_batch(),
            supported_mime_types: default_supported_mime_types(),
        }
    }
}

// ==================== Pipeline ====================

/// Pipeline worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Concurrency gate for manual batch reprocessing
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_worker_count() -> usize {
    2
}

fn default_max_concurrent_files() -> usize {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_poll_interval_secs() -> u64 {
    2
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_concurrent_files: default_max_concurrent_files(),
            max_retries: default_max_retries(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ProcessingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Text extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

fn default_max_text_chars() -> usize {
    10_000_000
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_text_chars: default_max_text_chars(),
        }
    }
}

/// Metadata analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Only this many leading characters are sent to the LLM
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_prompt_chars() -> usize {
    50_000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2000
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: default_max_prompt_chars(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Chunking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_max_chunks() -> usize {
    500
}

fn default_max_iterations() -> usize {
    10_000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_chunks: default_max_chunks(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Embedding generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Chunks embedded and persisted together before buffers are dropped
    #[serde(default = "default_stream_batch_size")]
    pub stream_batch_size: usize,
    /// Chunks sent in one provider request
    #[serde(default = "default_provider_batch_size")]
    pub provider_batch_size: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
    /// Expected vector length; checked when set
    #[serde(default)]
    pub dimensions: Option<usize>,
}

fn default_stream_batch_size() -> usize {
    50
}

fn default_provider_batch_size() -> usize {
    20
}

fn default_embedding_timeout_secs() -> u64 {
    60
}

fn default_inter_batch_delay_ms() -> u64 {
    100
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            stream_batch_size: default_stream_batch_size(),
            provider_batch_size: default_provider_batch_size(),
            request_timeout_secs: default_embedding_timeout_secs(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            dimensions: None,
        }
    }
}

impl EmbeddingsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}

// ==================== Providers ====================

/// LLM and embedding providers, tried in declaration order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// Ollama provider settings; unset `base_url` means not configured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_ollama_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_ollama_model() -> String {
    "llama3.1".to_string()
}

fn default_ollama_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    120
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_ollama_model(),
            embedding_model: default_ollama_embedding_model(),
            request_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// OpenAI provider settings; unset `api_key` means not configured
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            embedding_model: default_openai_embedding_model(),
            request_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Webhook settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared HMAC secret; signatures are not checked when unset
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.limits.max_file_size_bytes, 52_428_800);
        assert_eq!(config.limits.max_files_per_batch, 50);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.chunking.max_chunks, 500);
        assert_eq!(config.embeddings.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.processing.max_retries, 3);
        assert!(config.llm.ollama.base_url.is_none());
        assert!(config.llm.openai.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"chunking": {"chunk_size": 800}}"#).unwrap();
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_validate_rejects_tiny_chunks() {
        let mut config = AppConfig::default();
        config.chunking.chunk_size = 10;
        assert!(config.validate().is_err());
    }
}
