//! Ingestion pipeline orchestration.
//!
//! Composes the full import flow per source: fingerprint → registry
//! classification → extraction (text splitting, or the visual pipeline for
//! scanned documents) → chunk commit. Sources are processed sequentially;
//! each source's purge+commit pair is one SQLite transaction, so a concurrent
//! search observes all of a replacement or none of it. Per-source failures
//! are aggregated into the batch outcome and never touch other sources.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::db;
use crate::error::SourceError;
use crate::extract;
use crate::fingerprint;
use crate::models::{Chunk, IngestOutcome, OutcomeStatus};
use crate::registry::{self, Classification};
use crate::splitter;
use crate::store;
use crate::visual::VisualSegmenter;

/// Readiness of the search surface's cache. Search against the store itself
/// is always safe; caching waits until no batch is mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Ready,
    Importing,
}

impl ImportState {
    fn as_str(self) -> &'static str {
        match self {
            ImportState::Ready => "ready",
            ImportState::Importing => "importing",
        }
    }
}

pub async fn import_state(pool: &SqlitePool) -> Result<ImportState> {
    let value: Option<String> =
        sqlx::query_scalar("SELECT value FROM meta WHERE key = 'import_state'")
            .fetch_optional(pool)
            .await?;

    Ok(match value.as_deref() {
        Some("importing") => ImportState::Importing,
        _ => ImportState::Ready,
    })
}

async fn set_import_state(pool: &SqlitePool, state: ImportState) -> Result<()> {
    sqlx::query(
        "INSERT INTO meta (key, value) VALUES ('import_state', ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(state.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Ingests a batch of candidate source paths. An empty `paths` slice scans
/// the configured import root and also reconciles the registry against it,
/// purging sources whose file has disappeared.
pub async fn ingest_batch(
    pool: &SqlitePool,
    config: &Config,
    paths: &[PathBuf],
) -> Result<Vec<IngestOutcome>> {
    let scan_root = paths.is_empty();
    let candidates = if scan_root {
        scan_import_root(config)?
    } else {
        paths.to_vec()
    };

    set_import_state(pool, ImportState::Importing).await?;
    let result = ingest_candidates(pool, config, &candidates, scan_root).await;
    set_import_state(pool, ImportState::Ready).await?;
    result
}

async fn ingest_candidates(
    pool: &SqlitePool,
    config: &Config,
    candidates: &[PathBuf],
    reconcile: bool,
) -> Result<Vec<IngestOutcome>> {
    let mut outcomes = Vec::with_capacity(candidates.len());

    for path in candidates {
        let name = source_name_for(path);
        let status = match ingest_one(pool, config, path, &name).await {
            Ok(status) => {
                info!(source = %name, status = %status, "source processed");
                status
            }
            Err(e) => {
                warn!(source = %name, error = %e, "source failed");
                OutcomeStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };
        outcomes.push(IngestOutcome {
            source_name: name,
            status,
        });
    }

    if reconcile {
        reconcile_missing_files(pool).await?;
    }

    Ok(outcomes)
}

async fn ingest_one(
    pool: &SqlitePool,
    config: &Config,
    path: &Path,
    name: &str,
) -> Result<OutcomeStatus> {
    let digest = fingerprint::fingerprint_file(path).map_err(SourceError::Io)?;

    let classification = registry::classify(pool, name, &digest).await?;
    if classification == Classification::Unchanged {
        return Ok(OutcomeStatus::Unchanged);
    }

    let chunks = extract_chunks(config, path, name)?;
    let chunk_count = chunks.len();

    // Purge (on replace), insert, and commit as one unit, so old and new
    // chunks for this name never coexist and readers see all or none.
    let mut tx = pool.begin().await?;
    let stale_refs = if classification == Classification::Replace {
        registry::purge(&mut tx, name).await?
    } else {
        Vec::new()
    };
    store::insert_all(&mut tx, &chunks).await?;
    registry::commit(&mut tx, name, &digest).await?;
    tx.commit().await?;

    remove_artifacts(&stale_refs);

    Ok(match classification {
        Classification::New => OutcomeStatus::Imported {
            chunks: chunk_count,
        },
        Classification::Replace => OutcomeStatus::Replaced {
            chunks: chunk_count,
        },
        Classification::Unchanged => unreachable!("handled above"),
    })
}

/// Text extraction first; documents with no recognizable text fall back to
/// the visual pipeline when they can be rasterized.
fn extract_chunks(config: &Config, path: &Path, name: &str) -> Result<Vec<Chunk>, SourceError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    match extract::extract_text(path) {
        Ok(text) if extract::has_alphabetic(&text) => {
            let chunks = splitter::split_chunks(&text)
                .into_iter()
                .enumerate()
                .map(|(index, content)| make_chunk(name, index as i64, content, None))
                .collect();
            Ok(chunks)
        }
        Ok(_) | Err(SourceError::Extraction(_)) if is_pdf => visual_chunks(config, path, name),
        Ok(_) => Err(SourceError::Extraction(
            "document contains no extractable text".to_string(),
        )),
        Err(e) => Err(e),
    }
}

fn visual_chunks(config: &Config, path: &Path, name: &str) -> Result<Vec<Chunk>, SourceError> {
    info!(source = name, "no text layer, using visual segmentation");
    let segmenter = VisualSegmenter::from_config(&config.visual);
    let regions = segmenter.segment(path, name, &config.import.artifacts_dir)?;

    Ok(regions
        .into_iter()
        .enumerate()
        .map(|(index, region)| {
            make_chunk(
                name,
                index as i64,
                region.text,
                Some(region.image_ref.to_string_lossy().into_owned()),
            )
        })
        .collect())
}

fn make_chunk(name: &str, index: i64, content: String, image_ref: Option<String>) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        source_name: name.to_string(),
        chunk_index: index,
        content,
        image_ref,
    }
}

/// The `onSourceRemoved` hook: purges a source's chunks, registry row, crop
/// artifacts, and every cached query that cited it. Returns whether the
/// source was registered.
pub async fn remove_source(pool: &SqlitePool, name: &str) -> Result<bool> {
    let existed: Option<i64> = sqlx::query_scalar("SELECT 1 FROM sources WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    let mut tx = pool.begin().await?;
    let refs = registry::purge(&mut tx, name).await?;
    tx.commit().await?;

    remove_artifacts(&refs);
    if existed.is_some() {
        info!(source = name, "source removed");
    }
    Ok(existed.is_some())
}

/// Registered sources whose file no longer exists are purged so the index
/// mirrors the import directory.
async fn reconcile_missing_files(pool: &SqlitePool) -> Result<()> {
    for name in registry::list_names(pool).await? {
        if !Path::new(&name).exists() {
            info!(source = %name, "file gone from import root, purging");
            remove_source(pool, &name).await?;
        }
    }
    Ok(())
}

/// Crop files are deleted only after the purge transaction commits;
/// a failure here leaves an orphaned file, not a dangling reference.
fn remove_artifacts(refs: &[String]) {
    for image_ref in refs {
        if let Err(e) = std::fs::remove_file(image_ref) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %image_ref, error = %e, "failed to remove crop artifact");
            }
        }
    }
}

fn source_name_for(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn scan_import_root(config: &Config) -> Result<Vec<PathBuf>> {
    let root = &config.import.root;
    if !root.exists() {
        anyhow::bail!("Import root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.import.include_globs)?;
    let exclude_set = build_globset(&config.import.exclude_globs)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        paths.push(path.to_path_buf());
    }

    // Sort for deterministic ordering
    paths.sort();
    Ok(paths)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// CLI entry point for `docdex ingest`.
pub async fn run_ingest(config: &Config, paths: &[PathBuf], dry_run: bool) -> Result<()> {
    let pool = db::connect(config).await?;

    if dry_run {
        let candidates = if paths.is_empty() {
            scan_import_root(config)?
        } else {
            paths.to_vec()
        };
        println!("ingest (dry-run)");
        println!("  candidates: {}", candidates.len());
        for path in &candidates {
            let name = source_name_for(path);
            let line = match fingerprint::fingerprint_file(path) {
                Ok(digest) => match registry::classify(&pool, &name, &digest).await? {
                    Classification::New => "new".to_string(),
                    Classification::Unchanged => "unchanged".to_string(),
                    Classification::Replace => "replace".to_string(),
                },
                Err(e) => format!("unreadable: {}", e),
            };
            println!("  {}: {}", name, line);
        }
        pool.close().await;
        return Ok(());
    }

    let outcomes = ingest_batch(&pool, config, paths).await?;

    println!("ingest batch");
    println!("  candidates: {}", outcomes.len());

    let mut imported = 0usize;
    let mut unchanged = 0usize;
    let mut replaced = 0usize;
    let mut failed = 0usize;
    for outcome in &outcomes {
        match outcome.status {
            OutcomeStatus::Imported { .. } => imported += 1,
            OutcomeStatus::Unchanged => unchanged += 1,
            OutcomeStatus::Replaced { .. } => replaced += 1,
            OutcomeStatus::Failed { .. } => failed += 1,
        }
        println!("  {}: {}", outcome.source_name, outcome.status);
    }

    println!(
        "  imported: {}  unchanged: {}  replaced: {}  failed: {}",
        imported, unchanged, replaced, failed
    );
    println!("ok");

    pool.close().await;
    Ok(())
}

/// CLI entry point for `docdex remove`.
pub async fn run_remove(config: &Config, name: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let existed = remove_source(&pool, name).await?;
    if existed {
        println!("removed {}", name);
    } else {
        println!("{} was not registered; nothing to remove", name);
    }
    pool.close().await;
    Ok(())
}
