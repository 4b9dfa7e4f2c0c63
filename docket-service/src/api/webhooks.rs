//! Processor webhook endpoint.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use std::sync::Arc;

use crate::error::ServiceResult;
use crate::service::WebhookResponse;

use super::AppState;

/// Header carrying the hex HMAC-SHA256 of the raw body
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Receive a processing status notification.
///
/// The body is taken raw so the signature is checked over the exact bytes
/// that were sent.
pub async fn processing_status_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ServiceResult<Json<WebhookResponse>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    Ok(Json(state.service.handle_webhook(&body, signature)?))
}
