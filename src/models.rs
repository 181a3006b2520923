//! Core data models used throughout docdex.
//!
//! These types represent the sources, chunks, and rendered results that flow
//! through the ingestion and search pipeline.

use serde::Serialize;

/// One segmented unit of a source's content — the atomic unit of search
/// and display.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub source_name: String,
    pub chunk_index: i64,
    pub content: String,
    /// Path to a persisted crop image. Present only for visually
    /// segmented chunks.
    pub image_ref: Option<String>,
}

/// A chunk row matched by a substring scan.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub content: String,
    pub image_ref: Option<String>,
    pub source_name: String,
}

/// Pre-formatted search output plus the set of source names it references,
/// retained so cache invalidation can target entries by source.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedResult {
    pub html: String,
    pub sources: Vec<String>,
}

/// Per-source result of an ingestion batch.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub source_name: String,
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Imported { chunks: usize },
    Replaced { chunks: usize },
    Unchanged,
    Failed { reason: String },
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Imported { chunks } => write!(f, "imported ({} chunks)", chunks),
            OutcomeStatus::Replaced { chunks } => write!(f, "replaced ({} chunks)", chunks),
            OutcomeStatus::Unchanged => write!(f, "unchanged"),
            OutcomeStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}
