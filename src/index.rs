//! `srag index`: staged records → FTS5 index.
//!
//! Without `--clear` only records not yet in the index are added, so the
//! command can be re-run after each `srag stage`.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;

use crate::config::Config;
use crate::db;
use crate::migrate::ensure_schema;
use crate::search::segment_cjk;
use crate::stage::compact_json;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub cleared: bool,
    pub indexed: usize,
    pub already_indexed: usize,
}

/// Index staged records in batches of `batch_size`.
pub async fn index_records(pool: &SqlitePool, clear: bool, batch_size: usize) -> Result<IndexReport> {
    ensure_schema(pool).await?;
    let mut report = IndexReport {
        cleared: clear,
        ..IndexReport::default()
    };

    if clear {
        sqlx::query("DELETE FROM records_fts").execute(pool).await?;
    }

    let indexed: HashSet<i64> = sqlx::query_scalar("SELECT record_id FROM records_fts")
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

    let batch_size = batch_size.max(1) as i64;
    let mut last_id = 0i64;
    loop {
        let batch: Vec<(i64, String, String, String)> = sqlx::query_as(
            r#"
            SELECT id, file_name, sheet_name, json_content
            FROM staged_records
            WHERE id > ?
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(last_id)
        .bind(batch_size)
        .fetch_all(pool)
        .await?;

        let Some(last) = batch.last() else {
            break;
        };
        last_id = last.0;

        let mut tx = pool.begin().await?;
        for (id, file_name, sheet_name, json_content) in &batch {
            if indexed.contains(id) {
                report.already_indexed += 1;
                continue;
            }
            let content = compact_json(json_content);
            sqlx::query(
                "INSERT INTO records_fts (record_id, file_name, sheet_name, json_content, search_text) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(file_name)
            .bind(sheet_name)
            .bind(&content)
            .bind(segment_cjk(&content))
            .execute(&mut *tx)
            .await?;
            report.indexed += 1;
        }
        tx.commit().await?;
        tracing::debug!(up_to = last_id, indexed = report.indexed, "indexed batch");
    }

    Ok(report)
}

/// CLI entry point for `srag index`.
pub async fn run_index(config: &Config, clear: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let report = index_records(&pool, clear, config.staging.batch_size).await;
    pool.close().await;
    let report = report?;

    if report.cleared {
        println!("index: cleared existing entries");
    }
    println!(
        "index: {} record(s) indexed, {} already present",
        report.indexed, report.already_indexed
    );
    Ok(())
}
