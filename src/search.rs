//! Free-text search over staged records.
//!
//! [`SearchIndex`] is the seam between retrieval and whatever answers
//! free-text queries. [`SqliteIndex`] queries the FTS5 table built by
//! `srag index`; [`MemoryIndex`] is a plain in-process implementation for
//! tests and small embedded uses.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use crate::config::Config;
use crate::db;
use crate::models::ScoredHit;
use crate::retry::{Failure, RetryPolicy};

/// Retry policy for index queries.
pub const SEARCH_RETRY: RetryPolicy = RetryPolicy {
    attempts: 3,
    backoff: Duration::from_millis(500),
};

/// Something that answers free-text queries with scored hits.
///
/// Hits come back in the index's own order; callers rank them.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredHit>>;
}

/// Han ideographs and kana. The unicode61 tokenizer keeps a run of these as
/// one token, so they are split into single characters before indexing
/// and querying.
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

/// Put a space on both sides of every CJK character, so each one becomes
/// its own FTS token (`"60度"` → `"60 度"`).
pub fn segment_cjk(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    let mut prev_cjk = false;
    for c in text.chars() {
        let cjk = is_cjk(c);
        if (cjk || prev_cjk)
            && !c.is_whitespace()
            && out.chars().next_back().is_some_and(|p| !p.is_whitespace())
        {
            out.push(' ');
        }
        out.push(c);
        prev_cjk = cjk;
    }
    out
}

/// Turn free text into an FTS5 query: every whitespace-separated term is
/// quoted (inner quotes doubled) and the terms are OR-ed, so user input is
/// never parsed as FTS syntax. CJK characters inside a term are segmented
/// the same way as indexed text, which makes the quoted term a phrase
/// matching that exact character sequence. Terms without a letter or digit
/// are dropped. Returns `None` when no term is left.
pub fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"", segment_cjk(t).replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// FTS5 index over `staged_records.json_content`. Matching runs against the
/// segmented `search_text` column; hits carry the stored `json_content`.
/// Score is the negated bm25 rank, so higher is better.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SearchIndex for SqliteIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredHit>> {
        let Some(fts) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT file_name, sheet_name, json_content, rank
            FROM records_fts
            WHERE records_fts MATCH ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(&fts)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                ScoredHit {
                    file_name: row.get("file_name"),
                    sheet_name: row.get("sheet_name"),
                    content: row.get("json_content"),
                    score: -rank,
                }
            })
            .collect())
    }
}

/// In-memory index. Score is the number of case-insensitive term
/// occurrences in the content; records without any occurrence are not hits.
#[derive(Debug, Default, Clone)]
pub struct MemoryIndex {
    records: Vec<(String, String, String)>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        file_name: impl Into<String>,
        sheet_name: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.records
            .push((file_name.into(), sheet_name.into(), content.into()));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredHit>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<ScoredHit> = self
            .records
            .iter()
            .filter_map(|(file_name, sheet_name, content)| {
                let haystack = content.to_lowercase();
                let score: usize = terms.iter().map(|t| haystack.matches(t.as_str()).count()).sum();
                (score > 0).then(|| ScoredHit {
                    file_name: file_name.clone(),
                    sheet_name: sheet_name.clone(),
                    content: content.clone(),
                    score: score as f64,
                })
            })
            .collect();
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Search with [`SEARCH_RETRY`].
pub async fn search_with_retry(
    index: &dyn SearchIndex,
    query: &str,
    limit: usize,
) -> Result<Vec<ScoredHit>> {
    SEARCH_RETRY
        .run("search", move || async move {
            index.search(query, limit).await.map_err(Failure::Retry)
        })
        .await
}

/// CLI entry point for `srag search`.
pub async fn run_search(config: &Config, query: &str, limit: Option<i64>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let limit = limit.unwrap_or(config.retrieval.result_limit).max(1) as usize;
    let index = SqliteIndex::new(db::connect(config).await?);
    let result = search_with_retry(&index, query, limit).await;
    index.pool().close().await;
    let mut hits = result?;
    crate::context::rank_hits(&mut hits);

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let preview: String = hit.content.chars().take(120).collect();
        println!(
            "{}. [{:.4}] {}_{}",
            i + 1,
            hit.score,
            hit.file_name,
            hit.sheet_name
        );
        println!("    {}", preview.replace('\n', " "));
    }
    Ok(())
}
