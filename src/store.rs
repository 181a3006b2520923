//! Durable chunk storage keyed by source name.
//!
//! Inserts run inside the ingestion transaction, so a concurrent search
//! observes either all of a source's new chunks or none of them. Search is
//! literal substring containment — case-sensitive, no tokenization, no
//! ranking — with an ordering that is stable for a given store state.

use anyhow::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::models::{Chunk, ChunkHit};

/// Inserts a source's chunks within the caller's transaction.
pub async fn insert_all(conn: &mut SqliteConnection, chunks: &[Chunk]) -> Result<()> {
    for chunk in chunks {
        sqlx::query(
            "INSERT INTO chunks (id, source_name, chunk_index, content, image_ref) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.source_name)
        .bind(chunk.chunk_index)
        .bind(&chunk.content)
        .bind(&chunk.image_ref)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Removes all chunks for a source. Idempotent.
pub async fn delete_by_source(conn: &mut SqliteConnection, source_name: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM chunks WHERE source_name = ?")
        .bind(source_name)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Scans for chunks whose content contains `substring` literally. The empty
/// substring matches everything. `instr` keeps the match case-sensitive,
/// unlike SQLite's LIKE.
pub async fn search_chunks(pool: &SqlitePool, substring: &str) -> Result<Vec<ChunkHit>> {
    let rows = sqlx::query(
        r#"
        SELECT content, image_ref, source_name
        FROM chunks
        WHERE ? = '' OR instr(content, ?) > 0
        ORDER BY source_name, chunk_index
        "#,
    )
    .bind(substring)
    .bind(substring)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ChunkHit {
            content: row.get("content"),
            image_ref: row.get("image_ref"),
            source_name: row.get("source_name"),
        })
        .collect())
}

pub async fn count_chunks(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
