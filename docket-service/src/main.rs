use std::sync::Arc;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod api;
mod config;
mod db;
mod error;
mod ingestion;
mod llm;
mod metadata;
mod service;
mod storage;

use crate::config::load_config;
use crate::db::Database;
use crate::error::format_error_chain;
use crate::service::DocketService;
use crate::storage::FsBlobStore;

/// Histogram buckets for stage durations, in seconds
const STAGE_DURATION_BUCKETS: [f64; 10] = [0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting docket service v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(load_config()?);
    info!(
        host = %config.server.host,
        port = config.server.port,
        data_dir = %config.storage.data_dir.display(),
        "Configuration loaded"
    );

    let metrics = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("docket_stage_duration_seconds".to_string()),
            &STAGE_DURATION_BUCKETS,
        )?
        .install_recorder()?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.storage.data_dir)?;

    // Initialize database
    let db_path = config.storage.database_path();
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    let blobs = Arc::new(FsBlobStore::new(config.storage.blob_dir())?);
    let providers = llm::select_providers(&config.llm, &config.metadata)?;
    if providers.embedder.is_none() {
        warn!("No embedding provider configured; documents will not be searchable");
    }

    let service = Arc::new(DocketService::new(config.clone(), db, blobs, providers));

    // Files caught mid-stage by the last shutdown can only be retried manually
    match service.recover_stranded_files() {
        Ok(count) if count > 0 => info!(count, "Failed stranded files"),
        Err(e) => warn!(error = %format_error_chain(&e), "Stranded file recovery failed"),
        _ => {}
    }

    // Start document processing workers (picks up anything still queued)
    let shutdown = CancellationToken::new();
    let workers = DocketService::start_workers(service.clone(), shutdown.clone());

    let app = api::router(service, metrics);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            server_shutdown.cancel();
        })
        .await?;

    // Let in-progress pipeline runs finish
    shutdown.cancel();
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "Worker task ended abnormally");
        }
    }

    info!("Docket service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docket_service=info"));

    let json = std::env::var("DOCKET_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        let format = fmt::format()
            .with_target(true)
            .with_thread_ids(true)
            .compact();
        registry.with(fmt::layer().event_format(format)).init();
    }
}
