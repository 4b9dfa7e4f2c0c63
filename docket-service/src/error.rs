use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Document not found: {document_id}")]
    DocumentNotFound { document_id: String },

    #[error("Processing file not found: {file_id}")]
    FileNotFound { file_id: String },

    #[error("Processing batch not found: {batch_id}")]
    BatchNotFound { batch_id: String },

    #[error("{message}")]
    InvalidTransition { message: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Maximum retry attempts exceeded ({attempts}/{max})")]
    RetryExhausted { attempts: u32, max: u32 },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Upload validation errors, reported per file before any state is created
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Filename is required")]
    EmptyFilename,

    #[error("Filename too long (max {max} characters)")]
    FilenameTooLong { max: usize },

    #[error("Filename contains invalid characters: {filename}")]
    InvalidFilename { filename: String },

    #[error("Unsupported file extension: {extension}")]
    UnsupportedExtension { extension: String },

    #[error("Unsupported file type: {mime}")]
    UnsupportedMimeType { mime: String },

    #[error("File is empty")]
    EmptyFile,

    #[error("File too large: {size_mb:.1}MB (max: {max_mb}MB)")]
    FileTooLarge { size_mb: f64, max_mb: u64 },
}

/// LLM provider errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Connection failed to {provider} at {url}")]
    Connection {
        provider: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API failed (status {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error("AI returned invalid JSON response: {message}")]
    InvalidJson { message: String },
}

/// Embedding provider errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Connection failed to {provider} at {url}")]
    Connection {
        provider: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} embedding request failed (status {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("Invalid embedding response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error("Embedding request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Blob storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob not found: {path}")]
    NotFound { path: String },

    #[error("Invalid blob path: {path}")]
    InvalidPath { path: String },

    #[error("Blob storage I/O failed for {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// Text extraction errors
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error(
        "Unsupported MIME type for extraction: {mime}{}",
        .detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
    )]
    UnsupportedMimeType {
        mime: String,
        detail: Option<String>,
    },

    #[error("PDF extraction failed: {message}")]
    Pdf { message: String },

    #[error("DOCX extraction failed: {message}")]
    Docx { message: String },

    #[error("Extracted text too large: {chars} chars (max: {max})")]
    TextTooLarge { chars: usize, max: usize },

    #[error("Extraction task failed: {message}")]
    Task { message: String },
}

/// API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DocumentNotFound { .. }
            | ServiceError::FileNotFound { .. }
            | ServiceError::BatchNotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidTransition { .. }
            | ServiceError::Conflict { .. }
            | ServiceError::RetryExhausted { .. } => StatusCode::CONFLICT,
            ServiceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::Validation(ValidationError::FileTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServiceError::Validation(ValidationError::UnsupportedMimeType { .. })
            | ServiceError::Processing(ProcessingError::UnsupportedMimeType { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ServiceError::Validation(_) | ServiceError::InvalidRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Llm(_) | ServiceError::Embedding(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Storage(StorageError::NotFound { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServiceError::DocumentNotFound { .. } => "document_not_found",
            ServiceError::FileNotFound { .. } => "file_not_found",
            ServiceError::BatchNotFound { .. } => "batch_not_found",
            ServiceError::InvalidTransition { .. } => "invalid_transition",
            ServiceError::Conflict { .. } => "conflict",
            ServiceError::RetryExhausted { .. } => "retry_exhausted",
            ServiceError::Unauthorized { .. } => "unauthorized",
            ServiceError::Validation(ValidationError::FileTooLarge { .. }) => "file_too_large",
            ServiceError::Validation(ValidationError::UnsupportedMimeType { .. }) => {
                "unsupported_format"
            }
            ServiceError::Validation(_) => "validation_error",
            ServiceError::Llm(LlmError::InvalidJson { .. }) => "llm_invalid_json",
            ServiceError::Llm(_) => "llm_error",
            ServiceError::Embedding(EmbeddingError::Timeout { .. }) => "embedding_timeout",
            ServiceError::Embedding(_) => "embedding_error",
            ServiceError::Storage(StorageError::NotFound { .. }) => "blob_not_found",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::Database(_) => "database_error",
            ServiceError::Processing(ProcessingError::UnsupportedMimeType { .. }) => {
                "unsupported_format"
            }
            ServiceError::Processing(ProcessingError::TextTooLarge { .. }) => "text_too_large",
            ServiceError::Processing(_) => "text_extraction_error",
            ServiceError::InvalidRequest { .. } => "invalid_request",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code().to_string();

        if status.is_server_error() {
            tracing::error!(error = %format_error_chain(&self), code = %code, "Request failed");
        }

        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(code),
            details: None,
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Render an error and all of its sources as a single line.
pub fn format_error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
