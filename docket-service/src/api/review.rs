//! Review decision endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::ProcessingFile;
use crate::error::ServiceResult;

use super::{ActingUser, AppState};

/// Approval body; the whole body is optional
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// Approve a file awaiting review
pub async fn approve_file_handler(
    State(state): State<Arc<AppState>>,
    ActingUser(reviewer): ActingUser,
    Path(id): Path<String>,
    request: Option<Json<ApproveRequest>>,
) -> ServiceResult<Json<ProcessingFile>> {
    let notes = request.and_then(|Json(r)| r.notes);
    let file = state
        .service
        .approve_file(&id, &reviewer, notes.as_deref())?;
    Ok(Json(file))
}

/// Reject a file awaiting review with a reason
pub async fn reject_file_handler(
    State(state): State<Arc<AppState>>,
    ActingUser(reviewer): ActingUser,
    Path(id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> ServiceResult<Json<ProcessingFile>> {
    let file = state.service.reject_file(&id, &reviewer, &request.reason)?;
    Ok(Json(file))
}
