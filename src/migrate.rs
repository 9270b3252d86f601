//! Schema creation for `srag init`.
//!
//! - `staged_records`: one row per chunk file, unique on
//!   `(file_name, sheet_name)`.
//! - `records_fts`: FTS5 index over the staged JSON. Only `search_text`
//!   (the JSON with CJK characters segmented) is tokenized; the other
//!   columns ride along for result mapping.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables if they do not exist. Idempotent.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS staged_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            sheet_name TEXT NOT NULL,
            json_content TEXT NOT NULL,
            UNIQUE(file_name, sheet_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_staged_records_doc_id ON staged_records(doc_id)")
        .execute(pool)
        .await?;

    // FTS5 CREATE has no IF NOT EXISTS in older SQLite builds; check first.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='records_fts'",
    )
    .fetch_one(pool)
    .await?;

    // An index without `search_text` predates CJK segmentation. It only holds
    // derived data, so it is dropped and left for `srag index` to refill.
    let mut create = !fts_exists;
    if fts_exists {
        let segmented: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('records_fts') WHERE name = 'search_text'",
        )
        .fetch_one(pool)
        .await?;
        if !segmented {
            tracing::warn!("dropping records_fts created without search_text");
            sqlx::query("DROP TABLE records_fts").execute(pool).await?;
            create = true;
        }
    }

    if create {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE records_fts USING fts5(
                record_id UNINDEXED,
                file_name UNINDEXED,
                sheet_name UNINDEXED,
                json_content UNINDEXED,
                search_text,
                tokenize = 'unicode61'
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    Ok(())
}
