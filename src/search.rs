//! Substring search over the chunk store, fronted by the query cache.
//!
//! A cache hit returns the rendered result immediately. On a miss the store
//! is scanned, the hits are rendered to display HTML, and the result is
//! cached for next time — but only once the ingestion pipeline reports
//! ready, so a half-imported corpus is never memoized. Scanning the store
//! directly is safe in every state.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use tracing::debug;

use crate::cache;
use crate::config::Config;
use crate::db;
use crate::models::{ChunkHit, RenderedResult};
use crate::pipeline::{self, ImportState};
use crate::store;

/// Serves a query from the cache when possible, otherwise scans and renders.
/// The result has the same shape either way.
pub async fn execute_search(pool: &SqlitePool, query: &str) -> Result<RenderedResult> {
    let ready = pipeline::import_state(pool).await? == ImportState::Ready;

    if ready {
        if let Some(hit) = cache::get(pool, query).await? {
            return Ok(hit);
        }
    }

    let hits = store::search_chunks(pool, query).await?;
    let rendered = render_results(&hits);

    if ready && !hits.is_empty() {
        cache::put(pool, query, &rendered).await?;
        debug!(query, sources = rendered.sources.len(), "query result cached");
    }

    Ok(rendered)
}

/// Formats hits for the result viewer: content, the crop image when the
/// chunk came from visual segmentation, and a link to the owning source,
/// separated by rules.
pub fn render_results(hits: &[ChunkHit]) -> RenderedResult {
    let mut sources: BTreeSet<String> = BTreeSet::new();
    let mut html = String::from("<html><body>");

    for (i, hit) in hits.iter().enumerate() {
        if let Some(ref image_ref) = hit.image_ref {
            html.push_str(&format!("<div><img src=\"{}\"></div>", image_ref));
        }
        html.push_str(&format!("<div>{}</div>", hit.content));
        html.push_str(&format!(
            "<div><a href=\"{}\">{}</a></div>",
            hit.source_name, hit.source_name
        ));
        if i < hits.len() - 1 {
            html.push_str("<hr>");
        }
        sources.insert(hit.source_name.clone());
    }

    html.push_str("</body></html>");

    RenderedResult {
        html,
        sources: sources.into_iter().collect(),
    }
}

/// CLI entry point for `docdex search`.
pub async fn run_search(config: &Config, query: &str, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = execute_search(&pool, query).await?;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.sources.is_empty() {
        println!("No results for {}...", query);
    } else {
        println!("{}", result.html);
    }

    Ok(())
}
