//! Processing API endpoints.
//!
//! Batch and file inspection plus the manual controls: run a batch now,
//! retry, cancel and clear failures.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{BatchStatus, DocumentChunk, ProcessingBatch, ProcessingFile, ProcessingStats};
use crate::error::ServiceResult;
use crate::service::{BatchRunSummary, BatchStatusView};

use super::{ActingUser, AppState};

/// Batch listing query parameters
#[derive(Deserialize)]
pub struct ListBatchesParams {
    pub status: Option<BatchStatus>,
}

/// Extracted text of a file, if still held
#[derive(Serialize)]
pub struct FileTextResponse {
    pub file_id: String,
    pub text: Option<String>,
}

/// Response for failed-file cleanup
#[derive(Serialize)]
pub struct ClearFailedResponse {
    pub success: bool,
    pub deleted_count: usize,
}

/// List batches, optionally by status
pub async fn list_batches_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListBatchesParams>,
) -> ServiceResult<Json<Vec<ProcessingBatch>>> {
    Ok(Json(state.service.list_batches(params.status)?))
}

/// A batch with its member files
pub async fn get_batch_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<BatchStatusView>> {
    Ok(Json(state.service.get_batch_status(&id)?))
}

/// Run a batch's pending files immediately and wait for the result
pub async fn process_batch_handler(
    State(state): State<Arc<AppState>>,
    _user: ActingUser,
    Path(id): Path<String>,
) -> ServiceResult<Json<BatchRunSummary>> {
    Ok(Json(state.service.process_batch(&id).await?))
}

pub async fn get_file_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<ProcessingFile>> {
    Ok(Json(state.service.get_file(&id)?))
}

pub async fn get_file_text_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<FileTextResponse>> {
    let text = state.service.get_extracted_text(&id)?;
    Ok(Json(FileTextResponse { file_id: id, text }))
}

/// Stored chunks of a file, without vectors
pub async fn get_file_chunks_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<Vec<DocumentChunk>>> {
    Ok(Json(state.service.get_file_chunks(&id)?))
}

/// Re-queue a failed file
pub async fn retry_file_handler(
    State(state): State<Arc<AppState>>,
    _user: ActingUser,
    Path(id): Path<String>,
) -> ServiceResult<Json<ProcessingFile>> {
    Ok(Json(state.service.retry_file(&id)?))
}

/// Cancel a file that has not started processing
pub async fn cancel_file_handler(
    State(state): State<Arc<AppState>>,
    _user: ActingUser,
    Path(id): Path<String>,
) -> ServiceResult<Json<ProcessingFile>> {
    Ok(Json(state.service.cancel_file(&id)?))
}

/// Delete failed, duplicate and cancelled files with their blobs
pub async fn clear_failed_handler(
    State(state): State<Arc<AppState>>,
    _user: ActingUser,
) -> ServiceResult<Json<ClearFailedResponse>> {
    let deleted_count = state.service.clear_failed_files().await?;
    Ok(Json(ClearFailedResponse {
        success: true,
        deleted_count,
    }))
}

pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
) -> ServiceResult<Json<ProcessingStats>> {
    Ok(Json(state.service.processing_stats()?))
}
