//! Source registry: which names have been imported, at what fingerprint.
//!
//! Classification is read-only; the pipeline explicitly commits a source row
//! after successful extraction and purges before re-committing on a replace,
//! so old and new chunks for one name never coexist.

use anyhow::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

/// How an incoming (name, fingerprint) pair relates to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No source row with this name exists.
    New,
    /// A row exists with an identical fingerprint.
    Unchanged,
    /// A row exists with a different fingerprint.
    Replace,
}

pub async fn classify(
    pool: &SqlitePool,
    name: &str,
    fingerprint: &str,
) -> Result<Classification> {
    let existing: Option<String> =
        sqlx::query_scalar("SELECT fingerprint FROM sources WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;

    Ok(match existing {
        None => Classification::New,
        Some(current) if current == fingerprint => Classification::Unchanged,
        Some(_) => Classification::Replace,
    })
}

/// Records (or refreshes) the source row. Runs inside the caller's
/// transaction, alongside the chunk insert it accounts for.
pub async fn commit(conn: &mut SqliteConnection, name: &str, fingerprint: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO sources (name, fingerprint, imported_at) VALUES (?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            fingerprint = excluded.fingerprint,
            imported_at = excluded.imported_at
        "#,
    )
    .bind(name)
    .bind(fingerprint)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Removes every trace of a source: its chunks, its registry row, and every
/// cached query it contributed to. Idempotent — purging an unknown name is
/// a no-op.
///
/// Returns the image refs of the purged chunks so the caller can delete the
/// crop files once the transaction has committed.
pub async fn purge(conn: &mut SqliteConnection, name: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(
        "SELECT image_ref FROM chunks WHERE source_name = ? AND image_ref IS NOT NULL",
    )
    .bind(name)
    .fetch_all(&mut *conn)
    .await?;
    let image_refs: Vec<String> = rows.iter().map(|row| row.get("image_ref")).collect();

    crate::store::delete_by_source(conn, name).await?;

    sqlx::query("DELETE FROM sources WHERE name = ?")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    crate::cache::invalidate_by_source(conn, name).await?;

    Ok(image_refs)
}

pub async fn count_sources(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn list_names(pool: &SqlitePool) -> Result<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM sources ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(names)
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

    #[tokio::test]
    async fn unseen_name_is_new() {
        let pool = test_pool().await;
        let class = classify(&pool, "a.docx", "abc123").await.unwrap();
        assert_eq!(class, Classification::New);
    }

    #[tokio::test]
    async fn same_fingerprint_is_unchanged() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        commit(&mut conn, "a.docx", "abc123").await.unwrap();
        drop(conn);

        let class = classify(&pool, "a.docx", "abc123").await.unwrap();
        assert_eq!(class, Classification::Unchanged);
    }

    #[tokio::test]
    async fn different_fingerprint_is_replace() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        commit(&mut conn, "a.docx", "abc123").await.unwrap();
        drop(conn);

        let class = classify(&pool, "a.docx", "fff999").await.unwrap();
        assert_eq!(class, Classification::Replace);
    }

    #[tokio::test]
    async fn purge_is_idempotent_on_unknown_names() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let refs = purge(&mut conn, "never-imported.pdf").await.unwrap();
        assert!(refs.is_empty());
    }

    #[tokio::test]
    async fn purge_removes_the_source_row() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        commit(&mut conn, "a.docx", "abc123").await.unwrap();
        purge(&mut conn, "a.docx").await.unwrap();
        drop(conn);

        assert_eq!(classify(&pool, "a.docx", "abc123").await.unwrap(), Classification::New);
        assert_eq!(count_sources(&pool).await.unwrap(), 0);
    }
}
