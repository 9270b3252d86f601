//! `srag parse`: office documents → chunk files.
//!
//! Paths given on the command line may be files or directories. Directories
//! are walked and filtered through the `[ingest]` include/exclude globs;
//! files named explicitly only need a supported extension. Each document is
//! parsed and written on the blocking pool, one task per document, so a
//! failing document never stops the others.

use anyhow::{anyhow, bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::chunk::RowSampleEstimator;
use crate::config::Config;
use crate::models::DocType;
use crate::output::write_document_chunks;
use crate::parse::parse_document;

/// Outcome for one document.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    /// Chunk files written, or the error that stopped this document.
    pub result: std::result::Result<Vec<PathBuf>, String>,
}

#[derive(Debug, Default)]
pub struct ParseReport {
    pub outcomes: Vec<DocumentOutcome>,
}

impl ParseReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn files_written(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(Vec::len)
            .sum()
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Expand `inputs` into the sorted list of documents to parse.
pub fn collect_documents(config: &Config, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&config.ingest.include_globs)?;

    // Office lock files ("~$report.xlsx") are never real documents.
    let mut default_excludes = vec!["**/~$*".to_string(), "**/.git/**".to_string()];
    default_excludes.extend(config.ingest.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();
    for input in inputs {
        if input.is_file() {
            if DocType::from_path(input).is_none() {
                bail!("Unsupported document type: {}", input.display());
            }
            documents.push(input.clone());
            continue;
        }
        if !input.is_dir() {
            bail!("Input path does not exist: {}", input.display());
        }

        for entry in WalkDir::new(input) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(input).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            if DocType::from_path(path).is_none() {
                continue;
            }
            documents.push(path.to_path_buf());
        }
    }

    documents.sort();
    documents.dedup();
    Ok(documents)
}

fn process_document(
    path: &Path,
    output_dir: &Path,
    planner: &RowSampleEstimator,
    target_chars: usize,
    max_file_bytes: u64,
) -> Result<Vec<PathBuf>> {
    let size = std::fs::metadata(path)?.len();
    if size > max_file_bytes {
        bail!("file is {} bytes, over the {} byte limit", size, max_file_bytes);
    }
    let document = parse_document(path)?;
    let written = write_document_chunks(&document, output_dir, planner, target_chars)?;
    Ok(written.into_iter().map(|w| w.path).collect())
}

/// Parse every document under `inputs` and write chunk files to
/// `output_dir`. Returns one outcome per document, sorted by path.
pub async fn parse_documents(
    config: &Config,
    inputs: &[PathBuf],
    output_dir: &Path,
) -> Result<ParseReport> {
    let documents = collect_documents(config, inputs)?;
    let planner = Arc::new(RowSampleEstimator {
        sample_rows: config.chunking.sample_rows,
    });
    let target_chars = config.chunking.target_chars;
    let max_file_bytes = config.ingest.max_file_bytes;
    let output_dir = Arc::new(output_dir.to_path_buf());

    let mut tasks = JoinSet::new();
    for path in documents {
        let planner = Arc::clone(&planner);
        let output_dir = Arc::clone(&output_dir);
        tasks.spawn_blocking(move || {
            // A panic in one reader fails that document only.
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                process_document(&path, &output_dir, &planner, target_chars, max_file_bytes)
            }))
            .unwrap_or_else(|_| Err(anyhow!("document reader panicked")))
            .map_err(|e| format!("{:#}", e));
            if let Err(e) = &result {
                tracing::warn!(path = %path.display(), error = %e, "document failed");
            }
            DocumentOutcome { path, result }
        });
    }

    let mut report = ParseReport::default();
    while let Some(joined) = tasks.join_next().await {
        report.outcomes.push(joined?);
    }
    report.outcomes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(report)
}

/// CLI entry point for `srag parse`.
pub async fn run_parse(
    config: &Config,
    inputs: &[PathBuf],
    output_dir: Option<&Path>,
) -> Result<()> {
    let output_dir = output_dir.unwrap_or(&config.chunking.output_dir);
    let report = parse_documents(config, inputs, output_dir).await?;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(files) => println!("  {} → {} file(s)", outcome.path.display(), files.len()),
            Err(e) => eprintln!("  {} FAILED: {}", outcome.path.display(), e),
        }
    }
    println!(
        "parse: {} document(s), {} chunk file(s) written to {}, {} failed",
        report.outcomes.len(),
        report.files_written(),
        output_dir.display(),
        report.failures()
    );

    if report.failures() > 0 {
        bail!("{} document(s) failed to parse", report.failures());
    }
    Ok(())
}
