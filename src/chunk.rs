//! Row-boundary table chunker.
//!
//! Splits a [`Table`]'s rows into contiguous [`Chunk`]s so that each
//! chunk's serialized size (document wrapper + one table) lands near a
//! target character budget. Splitting never breaks a row.
//!
//! Sizing is delegated to a [`ChunkPlanner`]. The default
//! [`RowSampleEstimator`] is a heuristic: it samples the first rows to
//! estimate an average row size and refines a row count per chunk until the
//! estimate fits. It does not model row-size variance, so chunks built from
//! very uneven rows may land above or below the target. A single row larger
//! than the budget still becomes its own (over-budget) chunk.
//!
//! The estimate covers the `rows` payload and the fixed document wrapper;
//! the per-chunk `data` rendering is not counted.

use serde::Serialize;

use crate::error::Result;
use crate::models::{Chunk, DocType, Document, RowRecord, Table};
use crate::table::sub_table;

/// Default number of leading rows sampled for the size estimate.
pub const DEFAULT_SAMPLE_ROWS: usize = 10;

/// Identity of the document a table belongs to; part of every chunk's
/// serialized overhead.
#[derive(Debug, Clone, Copy)]
pub struct DocumentFrame<'a> {
    pub doc_type: DocType,
    pub file_name: &'a str,
}

/// Outcome of sizing one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    /// Serialized size of the wrapper with an empty row list.
    pub base_chars: usize,
    /// Estimated serialized size of one row.
    pub avg_row_chars: f64,
    /// Rows in every chunk but possibly the last.
    pub rows_per_chunk: usize,
}

impl ChunkPlan {
    /// Estimated serialized size of a full chunk.
    pub fn estimated_chars(&self) -> f64 {
        self.base_chars as f64 + self.rows_per_chunk as f64 * self.avg_row_chars
    }

    /// Number of chunks this plan yields for `total_rows` rows.
    pub fn chunk_count(&self, total_rows: usize) -> usize {
        total_rows.div_ceil(self.rows_per_chunk.max(1)).max(1)
    }
}

/// Decides how many rows go into each chunk.
///
/// Kept behind a trait so an exact packing strategy can replace the
/// sampling estimator without touching callers.
pub trait ChunkPlanner: Send + Sync {
    fn plan(&self, frame: DocumentFrame<'_>, table: &Table, target_chars: usize)
        -> Result<ChunkPlan>;
}

/// Sampling estimator: average row size from the first rows, then a
/// row count refined until `base + rows * avg` fits the budget.
#[derive(Debug, Clone)]
pub struct RowSampleEstimator {
    pub sample_rows: usize,
}

impl Default for RowSampleEstimator {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }
}

impl ChunkPlanner for RowSampleEstimator {
    fn plan(
        &self,
        frame: DocumentFrame<'_>,
        table: &Table,
        target_chars: usize,
    ) -> Result<ChunkPlan> {
        let total_rows = table.rows.len();
        let sample = self.sample_rows.max(1).min(total_rows);

        let avg_row_chars = if sample == 0 {
            0.0
        } else {
            json_chars(&table.rows[..sample])? as f64 / sample as f64
        };

        let template = Document::with_tables(
            frame.doc_type,
            frame.file_name,
            vec![Table {
                sheet: table.sheet.clone(),
                data: String::new(),
                rows: Vec::new(),
                text: table.text.clone(),
            }],
        );
        let base_chars = json_chars(&template)?;

        let target = target_chars.max(1) as f64;
        let total_chars = base_chars as f64 + avg_row_chars * total_rows as f64;
        let mut chunk_count = ((total_chars / target).floor() as usize + 1).max(1);
        let mut rows_per_chunk = (total_rows / chunk_count).max(1);

        while base_chars as f64 + rows_per_chunk as f64 * avg_row_chars > target
            && rows_per_chunk > 1
        {
            chunk_count += 1;
            rows_per_chunk = (total_rows / chunk_count).max(1);
        }

        Ok(ChunkPlan {
            base_chars,
            avg_row_chars,
            rows_per_chunk,
        })
    }
}

/// Character count of the compact JSON serialization of `value`.
pub fn json_chars<T: Serialize + ?Sized>(value: &T) -> Result<usize> {
    Ok(serde_json::to_string(value)?.chars().count())
}

/// Split `table` into chunks of at most `plan.rows_per_chunk` rows.
///
/// A table without rows is returned unchanged as a single chunk. Chunks are
/// numbered from 1 only when more than one is produced; each carries a
/// `data` rendering rebuilt from its own rows.
pub fn split_table(
    planner: &dyn ChunkPlanner,
    frame: DocumentFrame<'_>,
    table: &Table,
    target_chars: usize,
) -> Result<Vec<Chunk>> {
    if table.rows.is_empty() {
        return Ok(vec![Chunk {
            index: None,
            table: table.clone(),
        }]);
    }

    let plan = planner.plan(frame, table, target_chars)?;
    let groups: Vec<&[RowRecord]> = table.rows.chunks(plan.rows_per_chunk.max(1)).collect();
    let numbered = groups.len() > 1;

    groups
        .into_iter()
        .enumerate()
        .map(|(i, rows)| {
            Ok(Chunk {
                index: numbered.then_some(i + 1),
                table: sub_table(table, rows)?,
            })
        })
        .collect()
}
