//! `srag stage`: chunk files → `staged_records`.
//!
//! Each chunk file becomes one row keyed by `(file_name, sheet_name)`.
//! Identity comes from the sidecar manifest when one exists, otherwise from
//! the file name. Rows already present are left untouched.
//!
//! `doc_id` groups the rows of one source document. A file already staged
//! keeps its id; a new file takes the next integer after the largest
//! numeric id in the table.

use anyhow::{Context, Result};
use serde::de::IgnoredAny;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;
use crate::db;
use crate::migrate::ensure_schema;
use crate::models::Document;
use crate::output::{manifest_path_for, parse_chunk_file_name, ChunkManifest, MANIFEST_SUFFIX};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub files_seen: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Files skipped because their name or content could not be decoded.
    pub invalid: usize,
}

/// Compact JSON for storage. Document-shaped content goes through the
/// model; any other JSON is compacted with its key order preserved. Text
/// that is not JSON is stored trimmed but otherwise verbatim.
pub fn compact_json(text: &str) -> String {
    let compacted = match serde_json::from_str::<Document>(text) {
        Ok(document) => serde_json::to_string(&document),
        Err(_) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => serde_json::to_string(&value),
            Err(_) => return text.trim().to_string(),
        },
    };
    compacted.unwrap_or_else(|_| text.trim().to_string())
}

/// `(file_name, sheet_name)` for a chunk file.
fn chunk_identity(path: &Path) -> Result<(String, String)> {
    let manifest_path = manifest_path_for(path);
    if manifest_path.is_file() {
        let text = std::fs::read_to_string(&manifest_path)?;
        let manifest: ChunkManifest = serde_json::from_str(&text)
            .with_context(|| format!("invalid manifest {}", manifest_path.display()))?;
        return Ok((manifest.file_name.clone(), manifest.staging_sheet_name()));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let decoded = parse_chunk_file_name(&name)?;
    Ok((decoded.file_name, decoded.sheet_name))
}

struct DocIds {
    assigned: HashMap<String, String>,
    next: i64,
}

impl DocIds {
    async fn load(pool: &SqlitePool) -> Result<Self> {
        let max: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(CAST(doc_id AS INTEGER)) FROM staged_records WHERE doc_id GLOB '[0-9]*'",
        )
        .fetch_one(pool)
        .await?;
        Ok(Self {
            assigned: HashMap::new(),
            next: max.unwrap_or(0) + 1,
        })
    }

    async fn for_file(&mut self, pool: &SqlitePool, file_name: &str) -> Result<String> {
        if let Some(id) = self.assigned.get(file_name) {
            return Ok(id.clone());
        }
        let existing: Option<String> =
            sqlx::query_scalar("SELECT doc_id FROM staged_records WHERE file_name = ? LIMIT 1")
                .bind(file_name)
                .fetch_optional(pool)
                .await?;
        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.next.to_string();
                self.next += 1;
                id
            }
        };
        self.assigned.insert(file_name.to_string(), id.clone());
        Ok(id)
    }
}

/// Stage every chunk file under `dir`, in file-name order.
pub async fn stage_directory(pool: &SqlitePool, dir: &Path) -> Result<StageReport> {
    if !dir.is_dir() {
        anyhow::bail!("Chunk directory does not exist: {}", dir.display());
    }
    ensure_schema(pool).await?;

    let mut report = StageReport::default();
    let mut doc_ids = DocIds::load(pool).await?;

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(".json") || name.ends_with(MANIFEST_SUFFIX) {
            continue;
        }
        report.files_seen += 1;

        let (file_name, sheet_name) = match chunk_identity(path) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %format!("{:#}", e), "skipping chunk file");
                report.invalid += 1;
                continue;
            }
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if serde_json::from_str::<IgnoredAny>(&text).is_err() {
            tracing::warn!(path = %path.display(), "skipping chunk file with invalid JSON");
            report.invalid += 1;
            continue;
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM staged_records WHERE file_name = ? AND sheet_name = ?",
        )
        .bind(&file_name)
        .bind(&sheet_name)
        .fetch_one(pool)
        .await?;
        if exists {
            tracing::info!(file = %file_name, sheet = %sheet_name, "already staged, skipping");
            report.duplicates += 1;
            continue;
        }

        let doc_id = doc_ids.for_file(pool, &file_name).await?;
        sqlx::query(
            "INSERT INTO staged_records (doc_id, file_name, sheet_name, json_content) VALUES (?, ?, ?, ?)",
        )
        .bind(&doc_id)
        .bind(&file_name)
        .bind(&sheet_name)
        .bind(compact_json(&text))
        .execute(pool)
        .await?;
        tracing::debug!(doc_id = %doc_id, file = %file_name, sheet = %sheet_name, "staged");
        report.inserted += 1;
    }

    Ok(report)
}

/// CLI entry point for `srag stage`.
pub async fn run_stage(config: &Config, dir: &Path) -> Result<()> {
    let pool = db::connect(config).await?;
    let report = stage_directory(&pool, dir).await;
    pool.close().await;
    let report = report?;

    println!(
        "stage: {} file(s) seen, {} inserted, {} already staged, {} invalid",
        report.files_seen, report.inserted, report.duplicates, report.invalid
    );
    Ok(())
}
