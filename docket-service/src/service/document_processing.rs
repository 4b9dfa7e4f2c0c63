//! Document processing pipeline.
//!
//! This module coordinates a file's journey from upload to review:
//! - Upload with validation and duplicate detection
//! - Durable queue and background workers
//! - Extraction, metadata and embedding stages
//! - Batch aggregation
//! - Retry, cancellation and cleanup

mod analysis;
mod completion;
mod embedding;
mod extraction;
mod locks;
mod pipeline;
mod retry;
mod upload;
mod workers;

pub use pipeline::BatchRunSummary;
pub use upload::{FileUploadResult, UploadOutcome, UploadedFile};
