//! Per-source ingestion failures.
//!
//! A failure of one source is isolated: it is reported in the batch outcome
//! and never corrupts registry or store state for other sources.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("rasterization failed: {0}")]
    Rasterize(String),

    #[error("text recognition failed: {0}")]
    Recognition(String),
}
