//! Warm query-result cache.
//!
//! Memoizes rendered results per literal query string, persisted alongside
//! the chunks so warmth survives restarts. Each entry keeps the set of source
//! names it references in a side index, so invalidating a source drops
//! exactly the entries that cited it — whole entries, never patched — and
//! leaves the rest of the cache intact.

use anyhow::Result;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::models::RenderedResult;

pub async fn get(pool: &SqlitePool, query: &str) -> Result<Option<RenderedResult>> {
    let rendered: Option<String> =
        sqlx::query_scalar("SELECT rendered FROM query_cache WHERE query = ?")
            .bind(query)
            .fetch_optional(pool)
            .await?;

    let Some(html) = rendered else {
        return Ok(None);
    };

    let sources: Vec<String> = sqlx::query_scalar(
        "SELECT source_name FROM query_cache_sources WHERE query = ? ORDER BY source_name",
    )
    .bind(query)
    .fetch_all(pool)
    .await?;

    debug!(query, "query cache hit");
    Ok(Some(RenderedResult { html, sources }))
}

pub async fn put(pool: &SqlitePool, query: &str, result: &RenderedResult) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO query_cache (query, rendered, created_at) VALUES (?, ?, ?)
        ON CONFLICT(query) DO UPDATE SET
            rendered = excluded.rendered,
            created_at = excluded.created_at
        "#,
    )
    .bind(query)
    .bind(&result.html)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM query_cache_sources WHERE query = ?")
        .bind(query)
        .execute(&mut *tx)
        .await?;

    for source in &result.sources {
        sqlx::query("INSERT INTO query_cache_sources (query, source_name) VALUES (?, ?)")
            .bind(query)
            .bind(source)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Drops every cached entry whose result references `source_name`. Runs in
/// the caller's transaction so invalidation lands atomically with the purge
/// that triggered it.
pub async fn invalidate_by_source(conn: &mut SqliteConnection, source_name: &str) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM query_cache WHERE query IN \
         (SELECT query FROM query_cache_sources WHERE source_name = ?)",
    )
    .bind(source_name)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "DELETE FROM query_cache_sources WHERE query IN \
         (SELECT query FROM query_cache_sources WHERE source_name = ?)",
    )
    .bind(source_name)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

pub async fn clear_all(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM query_cache").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM query_cache_sources")
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn count_entries(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM query_cache")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        pool
    }

    fn result_for(sources: &[&str]) -> RenderedResult {
        RenderedResult {
            html: "<html><body>hit</body></html>".to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let pool = test_pool().await;
        put(&pool, "dog", &result_for(&["a.docx"])).await.unwrap();

        let hit = get(&pool, "dog").await.unwrap().unwrap();
        assert_eq!(hit.html, "<html><body>hit</body></html>");
        assert_eq!(hit.sources, vec!["a.docx".to_string()]);
    }

    #[tokio::test]
    async fn miss_for_unseen_query() {
        let pool = test_pool().await;
        assert!(get(&pool, "never cached").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidation_drops_entries_naming_the_source() {
        let pool = test_pool().await;
        put(&pool, "dog", &result_for(&["a.docx"])).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        invalidate_by_source(&mut conn, "a.docx").await.unwrap();
        drop(conn);

        assert!(get(&pool, "dog").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidation_spares_unrelated_entries() {
        let pool = test_pool().await;
        put(&pool, "dog", &result_for(&["a.docx", "b.docx"]))
            .await
            .unwrap();
        put(&pool, "cat", &result_for(&["c.docx"])).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let dropped = invalidate_by_source(&mut conn, "a.docx").await.unwrap();
        drop(conn);

        assert_eq!(dropped, 1);
        assert!(get(&pool, "dog").await.unwrap().is_none());
        assert!(get(&pool, "cat").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalidating_an_unknown_source_is_a_no_op() {
        let pool = test_pool().await;
        put(&pool, "dog", &result_for(&["a.docx"])).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let dropped = invalidate_by_source(&mut conn, "zzz.docx").await.unwrap();
        drop(conn);

        assert_eq!(dropped, 0);
        assert!(get(&pool, "dog").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn clear_all_empties_the_cache() {
        let pool = test_pool().await;
        put(&pool, "dog", &result_for(&["a.docx"])).await.unwrap();
        put(&pool, "cat", &result_for(&["b.docx"])).await.unwrap();

        clear_all(&pool).await.unwrap();
        assert_eq!(count_entries(&pool).await.unwrap(), 0);
        assert!(get(&pool, "dog").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_overwrites_previous_entry_and_index() {
        let pool = test_pool().await;
        put(&pool, "dog", &result_for(&["a.docx"])).await.unwrap();
        put(&pool, "dog", &result_for(&["b.docx"])).await.unwrap();

        let hit = get(&pool, "dog").await.unwrap().unwrap();
        assert_eq!(hit.sources, vec!["b.docx".to_string()]);

        // Old source no longer invalidates the refreshed entry
        let mut conn = pool.acquire().await.unwrap();
        invalidate_by_source(&mut conn, "a.docx").await.unwrap();
        drop(conn);
        assert!(get(&pool, "dog").await.unwrap().is_some());
    }
}
