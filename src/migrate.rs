use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Source registry: one row per imported document name
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            name TEXT PRIMARY KEY,
            fingerprint TEXT NOT NULL,
            imported_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Chunk store: bulk-inserted per source, bulk-deleted on purge
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source_name TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            content TEXT NOT NULL,
            image_ref TEXT,
            UNIQUE(source_name, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Query cache: rendered result per literal query string
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS query_cache (
            query TEXT PRIMARY KEY,
            rendered TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Source name -> cache key index, so invalidation by source touches
    // only the contributing entries
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS query_cache_sources (
            query TEXT NOT NULL,
            source_name TEXT NOT NULL,
            PRIMARY KEY (query, source_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Pipeline state that must survive the process boundary between
    // `ingest` and `search` invocations
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO meta (key, value) VALUES ('import_state', 'ready') \
         ON CONFLICT(key) DO NOTHING",
    )
    .execute(pool)
    .await?;

    // Indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source_name ON chunks(source_name)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cache_sources_source ON query_cache_sources(source_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
