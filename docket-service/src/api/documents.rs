//! Document API endpoints.
//!
//! Upload, library listing, the review queue, metadata edits, soft delete
//! and similarity search.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{ChunkMatch, Document, LibraryFilter};
use crate::error::{ServiceError, ServiceResult};
use crate::service::{
    LibraryPage, MetadataPatch, ReviewQueueEntry, SearchRequest, UploadOutcome, UploadedFile,
};

use super::{ActingUser, AppState};

/// Multipart field carrying upload files
const FILES_FIELD: &str = "files";

/// Response for delete operations
#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Search response
#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ChunkMatch>,
}

/// Upload one or more files as a new batch
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    mut multipart: Multipart,
) -> ServiceResult<Json<UploadOutcome>> {
    let mut files = Vec::new();

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ServiceError::InvalidRequest {
                message: format!("Malformed multipart body: {}", e),
            })?;
        let Some(field) = field else { break };

        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| ServiceError::InvalidRequest {
            message: e.to_string(),
        })?;

        files.push(UploadedFile {
            filename,
            content_type,
            data,
        });
    }

    let outcome = state.service.upload_files(files, &user).await?;
    Ok(Json(outcome))
}

/// List reviewed library documents
pub async fn list_library_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<LibraryFilter>,
) -> ServiceResult<Json<LibraryPage>> {
    Ok(Json(state.service.list_library(&filter)?))
}

/// Documents waiting for a reviewer
pub async fn review_queue_handler(
    State(state): State<Arc<AppState>>,
) -> ServiceResult<Json<Vec<ReviewQueueEntry>>> {
    Ok(Json(state.service.review_queue()?))
}

/// Get a specific document by ID
pub async fn get_document_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<Document>> {
    Ok(Json(state.service.get_document(&id)?))
}

/// Edit metadata of a document that has not been reviewed yet
pub async fn update_metadata_handler(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
    Json(patch): Json<MetadataPatch>,
) -> ServiceResult<Json<Document>> {
    let document = state.service.update_document_metadata(&id, patch, &user)?;
    Ok(Json(document))
}

/// Soft-delete a document
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ServiceResult<Json<DeleteResponse>> {
    state.service.delete_document(&id, &user)?;
    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Document {} deleted", id),
    }))
}

/// Similarity search across embedded chunks
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> ServiceResult<Json<SearchResponse>> {
    let results = state.service.search(&request).await?;
    Ok(Json(SearchResponse {
        query: request.query,
        results,
    }))
}
