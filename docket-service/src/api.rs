//! HTTP API for the docket service.
//!
//! This module provides the REST API endpoints for:
//! - Health and metrics monitoring
//! - Upload, library and review queue
//! - Batch and file processing control
//! - Review decisions
//! - Processor webhooks

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequestParts, State},
    http::{StatusCode, header, request::Parts},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::ServiceError;
use crate::service::DocketService;

pub mod documents;
pub mod processing;
pub mod review;
pub mod webhooks;

use documents::{
    delete_document_handler, get_document_handler, list_library_handler, review_queue_handler,
    search_handler, update_metadata_handler, upload_handler,
};
use processing::{
    cancel_file_handler, clear_failed_handler, get_batch_handler, get_file_chunks_handler,
    get_file_handler, get_file_text_handler, list_batches_handler, process_batch_handler,
    retry_file_handler, stats_handler,
};
use review::{approve_file_handler, reject_file_handler};
use webhooks::processing_status_handler;

/// Header carrying the acting user's id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Headroom for multipart framing on top of the file bytes
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state
pub struct AppState {
    pub service: Arc<DocketService>,
    pub metrics: PrometheusHandle,
    pub start_time: Instant,
}

/// Acting user, taken from the `X-User-Id` header set by the auth proxy
#[derive(Debug, Clone, PartialEq)]
pub struct ActingUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| ActingUser(v.to_string()))
            .ok_or_else(|| ServiceError::Unauthorized {
                message: "Missing X-User-Id header".to_string(),
            })
    }
}

/// Build the API router
pub fn router(service: Arc<DocketService>, metrics: PrometheusHandle) -> Router {
    let limits = &service.config.limits;
    let max_upload_size = usize::try_from(limits.max_file_size_bytes)
        .unwrap_or(usize::MAX)
        .saturating_mul(limits.max_files_per_batch)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let request_timeout = service.config.server.request_timeout();

    let state = Arc::new(AppState {
        service,
        metrics,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let document_routes = Router::new()
        .route("/", get(list_library_handler))
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/review-queue", get(review_queue_handler))
        .route("/search", post(search_handler))
        .route("/{id}", get(get_document_handler))
        .route("/{id}", delete(delete_document_handler))
        .route("/{id}/metadata", put(update_metadata_handler));

    let processing_routes = Router::new()
        .route("/batches", get(list_batches_handler))
        .route("/batches/{id}", get(get_batch_handler))
        .route("/batches/{id}/process", post(process_batch_handler))
        .route("/files/failed", delete(clear_failed_handler))
        .route("/files/{id}", get(get_file_handler))
        .route("/files/{id}/text", get(get_file_text_handler))
        .route("/files/{id}/chunks", get(get_file_chunks_handler))
        .route("/files/{id}/retry", post(retry_file_handler))
        .route("/files/{id}/cancel", post(cancel_file_handler))
        .route("/files/{id}/approve", post(approve_file_handler))
        .route("/files/{id}/reject", post(reject_file_handler))
        .route("/stats", get(stats_handler));

    let api_routes = Router::new()
        .nest("/documents", document_routes)
        .nest("/processing", processing_routes)
        .route("/webhooks/processing/status", post(processing_status_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let llm_provider = state.service.llm_provider();
    let embedding_provider = state.service.embedding_provider();

    // Without an embedder nothing becomes searchable
    let status = if embedding_provider.is_some() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        llm_provider,
        embedding_provider,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    llm_provider: Option<&'static str>,
    embedding_provider: Option<&'static str>,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract_user(request: Request<()>) -> Result<ActingUser, ServiceError> {
        let (mut parts, _) = request.into_parts();
        ActingUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_acting_user_from_header() {
        let request = Request::builder()
            .header("X-User-Id", " paralegal-7 ")
            .body(())
            .unwrap();
        assert_eq!(
            extract_user(request).await.unwrap(),
            ActingUser("paralegal-7".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_or_blank_user_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(
            extract_user(request).await,
            Err(ServiceError::Unauthorized { .. })
        ));

        let request = Request::builder().header("X-User-Id", "  ").body(()).unwrap();
        assert!(matches!(
            extract_user(request).await,
            Err(ServiceError::Unauthorized { .. })
        ));
    }
}
