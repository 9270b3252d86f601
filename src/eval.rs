//! `srag eval`: retrieval recall over a question set.
//!
//! The question set is a spreadsheet whose first non-empty sheet has a
//! question column (`问题` or `question`) and an expected-source column
//! (`文档名_表名` or `source`) holding `{file_name}_{sheet_name}`. Each
//! question is searched, hits are ranked, and the 1-based rank of the
//! expected source within the top five is counted into Recall@1/3/5.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::context::rank_hits;
use crate::db;
use crate::extract::read_xlsx;
use crate::models::{DocType, Provenance, ScoredHit};
use crate::search::{search_with_retry, SearchIndex, SqliteIndex};
use crate::table::table_from_grid;

pub const QUESTION_COLUMNS: [&str; 2] = ["问题", "question"];
pub const SOURCE_COLUMNS: [&str; 2] = ["文档名_表名", "source"];

/// Ranks counted: a hit at rank `r` counts for every cutoff `>= r`.
pub const RECALL_CUTOFFS: [usize; 3] = [1, 3, 5];

/// One question and the source that should answer it.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalCase {
    pub question: String,
    pub expected: Provenance,
}

/// Split `{file_name}_{sheet_name}`. The split falls right after the first
/// `.xlsx_`/`.pptx_`/`.docx_`, so underscores inside either part survive;
/// without a known extension it falls on the last `_`.
pub fn parse_source(text: &str) -> Option<Provenance> {
    let text = text.trim();
    let split = [DocType::Excel, DocType::Ppt, DocType::Word]
        .iter()
        .filter_map(|t| {
            let marker = format!(".{}_", t.extension());
            text.find(&marker).map(|i| i + marker.len() - 1)
        })
        .min()
        .or_else(|| text.rfind('_'))?;
    let (file_name, sheet_name) = (&text[..split], &text[split + 1..]);
    if file_name.is_empty() || sheet_name.is_empty() {
        return None;
    }
    Some(Provenance {
        file_name: file_name.to_string(),
        sheet_name: sheet_name.to_string(),
    })
}

fn find_column<'a>(columns: &'a [String], names: &[&str]) -> Option<&'a str> {
    columns
        .iter()
        .find(|c| names.iter().any(|n| c.trim().eq_ignore_ascii_case(n)))
        .map(String::as_str)
}

/// Read the question set from `.xlsx` bytes. Missing columns, an empty
/// question set, and malformed expected sources are errors; rows with a
/// blank question are skipped.
pub fn load_cases(bytes: &[u8]) -> Result<Vec<EvalCase>> {
    let mut table = None;
    for sheet in read_xlsx(bytes)? {
        if let Some(t) = table_from_grid(&sheet.name, &sheet.grid, None)? {
            table = Some(t);
            break;
        }
    }
    let Some(table) = table else {
        bail!("question set has no non-empty sheet");
    };
    let Some(first) = table.rows.first() else {
        bail!("sheet '{}' has a header but no questions", table.sheet);
    };

    let columns: Vec<String> = first.columns().map(str::to_string).collect();
    let (Some(question_col), Some(source_col)) = (
        find_column(&columns, &QUESTION_COLUMNS),
        find_column(&columns, &SOURCE_COLUMNS),
    ) else {
        bail!(
            "sheet '{}' is missing required columns: expected one of {:?} and one of {:?}, found {:?}",
            table.sheet,
            QUESTION_COLUMNS,
            SOURCE_COLUMNS,
            columns
        );
    };

    let mut cases = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        let question = row.get(question_col).unwrap_or_default().trim();
        if question.is_empty() {
            continue;
        }
        let source = row.get(source_col).unwrap_or_default();
        // Header is spreadsheet row 1.
        let expected = parse_source(source).with_context(|| {
            format!("row {}: expected source '{}' is not file_sheet", i + 2, source)
        })?;
        cases.push(EvalCase {
            question: question.to_string(),
            expected,
        });
    }
    Ok(cases)
}

/// 1-based rank of `expected` among the first `depth` ranked hits.
pub fn hit_rank(hits: &[ScoredHit], expected: &Provenance, depth: usize) -> Option<usize> {
    hits.iter()
        .take(depth)
        .position(|h| h.file_name == expected.file_name && h.sheet_name == expected.sheet_name)
        .map(|i| i + 1)
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecallReport {
    pub questions: usize,
    /// Questions whose search failed after retries. They count as misses.
    pub failed: usize,
    /// Per cutoff in [`RECALL_CUTOFFS`], questions answered at or above it.
    pub hits: [usize; 3],
}

impl RecallReport {
    /// Count one question found at `rank` (or not found).
    pub fn record(&mut self, rank: Option<usize>) {
        self.questions += 1;
        if let Some(rank) = rank {
            for (count, cutoff) in self.hits.iter_mut().zip(RECALL_CUTOFFS) {
                if rank <= cutoff {
                    *count += 1;
                }
            }
        }
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
        self.record(None);
    }

    /// Recall per cutoff; zero for an empty question set.
    pub fn recall(&self) -> [f64; 3] {
        self.hits.map(|h| {
            if self.questions == 0 {
                0.0
            } else {
                h as f64 / self.questions as f64
            }
        })
    }
}

/// Run every case against `index`.
pub async fn evaluate(
    index: &dyn SearchIndex,
    cases: &[EvalCase],
    limit: usize,
) -> RecallReport {
    let depth = RECALL_CUTOFFS[RECALL_CUTOFFS.len() - 1];
    let mut report = RecallReport::default();
    for case in cases {
        match search_with_retry(index, &case.question, limit.max(depth)).await {
            Ok(mut hits) => {
                rank_hits(&mut hits);
                let rank = hit_rank(&hits, &case.expected, depth);
                match rank {
                    Some(r) => tracing::info!(question = %case.question, rank = r, expected = %case.expected, "hit"),
                    None => tracing::warn!(question = %case.question, expected = %case.expected, "no hit in top {}", depth),
                }
                report.record(rank);
            }
            Err(e) => {
                tracing::error!(question = %case.question, error = %e, "search failed");
                report.record_failure();
            }
        }
    }
    report
}

/// CLI entry point for `srag eval`.
pub async fn run_eval(config: &Config, questions: &Path) -> Result<()> {
    let bytes = std::fs::read(questions)
        .with_context(|| format!("failed to read {}", questions.display()))?;
    let cases = load_cases(&bytes)
        .with_context(|| format!("invalid question set {}", questions.display()))?;

    let index = SqliteIndex::new(db::connect(config).await?);
    let report = evaluate(&index, &cases, config.retrieval.result_limit.max(1) as usize).await;
    index.pool().close().await;

    println!(
        "eval: {} question(s), {} search failure(s)",
        report.questions, report.failed
    );
    for (cutoff, recall) in RECALL_CUTOFFS.iter().zip(report.recall()) {
        println!("Recall@{}: {:.4}", cutoff, recall);
    }
    Ok(())
}
