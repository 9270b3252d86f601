//! Raw cell grids and merge-region resolution.
//!
//! Readers produce a [`RawGrid`]: typed cell values plus the merge regions
//! declared by the source document. [`normalize`] turns it into a dense grid
//! of canonical text in which every merged cell carries the value of its
//! region's top-left cell.
//!
//! Merge regions are applied in ascending `(row_start, col_start)` order, so
//! when two regions overlap the one anchored later wins for the shared
//! cells. Each region always takes its value from the *raw* top-left cell,
//! never from a value written by an earlier region.

use chrono::{NaiveDateTime, Timelike};

use crate::error::{Error, Result};

/// Largest row count a worksheet can declare.
pub const MAX_ROWS: usize = 1_048_576;
/// Largest column count a worksheet can declare (`XFD`).
pub const MAX_COLS: usize = 16_384;
/// Upper bound on `rows × cols` for a dense grid.
pub const MAX_GRID_CELLS: usize = 10_000_000;

/// A typed cell value as read from a source document.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Canonical text form: ISO-8601 for temporal values, the natural text
    /// rendering for everything else, and `""` for blanks.
    pub fn canonical_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::DateTime(dt) => {
                if dt.nanosecond() == 0 {
                    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
                } else {
                    dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
                }
            }
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

/// Integral floats print without a fractional part (`3`, not `3.0`).
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A rectangular merged range, 0-based and inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MergeRegion {
    pub row_start: usize,
    pub col_start: usize,
    pub row_end: usize,
    pub col_end: usize,
}

impl MergeRegion {
    pub fn new(row_start: usize, col_start: usize, row_end: usize, col_end: usize) -> Self {
        Self {
            row_start,
            col_start,
            row_end,
            col_end,
        }
    }

    /// Parse an A1-style range such as `"B2:D4"`. A single reference
    /// (`"C3"`) yields a one-cell region.
    pub fn from_a1_range(range: &str) -> Option<Self> {
        let (start, end) = match range.split_once(':') {
            Some((a, b)) => (a, b),
            None => (range, range),
        };
        let (r1, c1) = parse_cell_ref(start)?;
        let (r2, c2) = parse_cell_ref(end)?;
        Some(Self::new(r1.min(r2), c1.min(c2), r1.max(r2), c1.max(c2)))
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_start..=self.row_end).contains(&row)
            && (self.col_start..=self.col_end).contains(&col)
    }
}

/// Parse an A1 cell reference into 0-based `(row, col)`. `$` anchors are
/// ignored. References beyond `XFD1048576` are rejected.
pub fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.trim().replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut col = 0usize;
    for c in letters.chars() {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
        if col > MAX_COLS {
            return None;
        }
    }
    let row: usize = digits.parse().ok()?;
    if row == 0 || row > MAX_ROWS {
        return None;
    }
    Some((row - 1, col - 1))
}

/// A raw `rows × cols` grid of typed cells plus its merge regions.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGrid {
    cells: Vec<Vec<CellValue>>,
    cols: usize,
    merges: Vec<MergeRegion>,
}

impl RawGrid {
    /// Build a grid, rejecting ragged rows and merge regions that fall
    /// outside the grid.
    pub fn new(cells: Vec<Vec<CellValue>>, merges: Vec<MergeRegion>) -> Result<Self> {
        let cols = cells.first().map(Vec::len).unwrap_or(0);
        if let Some((i, row)) = cells.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(Error::Grid(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                cols
            )));
        }
        for m in &merges {
            if m.row_end >= cells.len() || m.col_end >= cols {
                return Err(Error::Grid(format!(
                    "merge region ({},{})-({},{}) outside {}x{} grid",
                    m.row_start,
                    m.col_start,
                    m.row_end,
                    m.col_end,
                    cells.len(),
                    cols
                )));
            }
        }
        Ok(Self {
            cells,
            cols,
            merges,
        })
    }

    /// Build a grid from sparse `(row, col, value)` cells, sized to cover
    /// every cell and every merge region. Fails with [`Error::Grid`] when
    /// that size exceeds [`MAX_GRID_CELLS`].
    pub fn from_sparse(
        cells: impl IntoIterator<Item = (usize, usize, CellValue)>,
        merges: Vec<MergeRegion>,
    ) -> Result<Self> {
        let cells: Vec<(usize, usize, CellValue)> = cells.into_iter().collect();
        let rows = cells
            .iter()
            .map(|(r, _, _)| r.saturating_add(1))
            .chain(merges.iter().map(|m| m.row_end.saturating_add(1)))
            .max()
            .unwrap_or(0);
        let cols = cells
            .iter()
            .map(|(_, c, _)| c.saturating_add(1))
            .chain(merges.iter().map(|m| m.col_end.saturating_add(1)))
            .max()
            .unwrap_or(0);
        match rows.checked_mul(cols) {
            Some(n) if n <= MAX_GRID_CELLS => {}
            _ => {
                return Err(Error::Grid(format!(
                    "{}x{} grid exceeds the {} cell limit",
                    rows, cols, MAX_GRID_CELLS
                )))
            }
        }
        let mut dense = vec![vec![CellValue::Empty; cols]; rows];
        for (r, c, v) in cells {
            dense[r][c] = v;
        }
        Self::new(dense, merges)
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        &self.cells[row][col]
    }

    pub fn merges(&self) -> &[MergeRegion] {
        &self.merges
    }
}

/// Resolve merge regions and canonicalize every cell to text.
pub fn normalize(grid: &RawGrid) -> Vec<Vec<String>> {
    let mut resolved: Vec<Vec<Option<String>>> = vec![vec![None; grid.cols()]; grid.rows()];

    let mut merges = grid.merges().to_vec();
    merges.sort();
    for m in &merges {
        let value = grid.cell(m.row_start, m.col_start).canonical_text();
        for row in resolved.iter_mut().take(m.row_end + 1).skip(m.row_start) {
            for cell in row.iter_mut().take(m.col_end + 1).skip(m.col_start) {
                *cell = Some(value.clone());
            }
        }
    }

    resolved
        .into_iter()
        .enumerate()
        .map(|(r, row)| {
            row.into_iter()
                .enumerate()
                .map(|(c, cell)| cell.unwrap_or_else(|| grid.cell(r, c).canonical_text()))
                .collect()
        })
        .collect()
}

/// Drop rows in which every cell is the empty string.
pub fn drop_empty_rows(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    rows.into_iter()
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    #[test]
    fn canonical_text_forms() {
        let dt = NaiveDate::from_ymd_opt(2024, 6, 28)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert_eq!(CellValue::DateTime(dt).canonical_text(), "2024-06-28T09:05:00");
        assert_eq!(CellValue::Number(3.0).canonical_text(), "3");
        assert_eq!(CellValue::Number(2.5).canonical_text(), "2.5");
        assert_eq!(CellValue::Number(-0.125).canonical_text(), "-0.125");
        assert_eq!(CellValue::Bool(true).canonical_text(), "TRUE");
        assert_eq!(CellValue::Empty.canonical_text(), "");
    }

    #[test]
    fn parse_a1_references() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("$C$7"), Some((6, 2)));
        assert_eq!(parse_cell_ref("AA10"), Some((9, 26)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(
            MergeRegion::from_a1_range("B2:C3"),
            Some(MergeRegion::new(1, 1, 2, 2))
        );
    }

    #[test]
    fn cell_refs_beyond_sheet_limits_are_rejected() {
        assert_eq!(parse_cell_ref("XFD1048576"), Some((1_048_575, 16_383)));
        assert_eq!(parse_cell_ref("XFE1"), None);
        assert_eq!(parse_cell_ref("A1048577"), None);
        assert_eq!(parse_cell_ref("AAAAAAAAAAAAAAAA1"), None);
        assert_eq!(parse_cell_ref("A99999999999999999999999"), None);
        assert_eq!(MergeRegion::from_a1_range("A1:ZZZZZZZZZZZZZZ2"), None);
    }

    #[test]
    fn oversized_sparse_grid_is_rejected() {
        let far = RawGrid::from_sparse(vec![(1_048_575, 16_383, text("x"))], vec![]);
        assert!(matches!(far, Err(Error::Grid(_))));

        let merged = RawGrid::from_sparse(
            vec![(0, 0, text("x"))],
            vec![MergeRegion::new(0, 0, 1_048_575, 16_383)],
        );
        assert!(matches!(merged, Err(Error::Grid(_))));

        let overflow = RawGrid::from_sparse(vec![(usize::MAX, usize::MAX, text("x"))], vec![]);
        assert!(matches!(overflow, Err(Error::Grid(_))));
    }

    #[test]
    fn merged_cells_take_top_left_value() {
        let grid = RawGrid::new(
            vec![
                vec![text("Group"), text(""), text("x")],
                vec![text(""), text("stale"), text("y")],
                vec![text("a"), text("b"), text("c")],
            ],
            vec![MergeRegion::new(0, 0, 1, 1)],
        )
        .unwrap();
        let out = normalize(&grid);
        for r in 0..=1 {
            for c in 0..=1 {
                assert_eq!(out[r][c], "Group");
            }
        }
        assert_eq!(out[0][2], "x");
        assert_eq!(out[2], vec!["a", "b", "c"]);
    }

    #[test]
    fn overlapping_merges_apply_in_row_col_order() {
        let grid = RawGrid::new(
            vec![
                vec![text("first"), text(""), text("")],
                vec![text(""), text("second"), text("")],
            ],
            // Listed out of order on purpose; (1,1) is applied last.
            vec![MergeRegion::new(1, 1, 1, 2), MergeRegion::new(0, 0, 1, 1)],
        )
        .unwrap();
        let out = normalize(&grid);
        assert_eq!(out[0], vec!["first", "first", ""]);
        assert_eq!(out[1], vec!["first", "second", "second"]);
    }

    #[test]
    fn ragged_grid_is_rejected() {
        let err = RawGrid::new(vec![vec![text("a"), text("b")], vec![text("c")]], vec![])
            .unwrap_err();
        assert!(matches!(err, Error::Grid(_)));
    }

    #[test]
    fn out_of_bounds_merge_is_rejected() {
        let err = RawGrid::new(vec![vec![text("a")]], vec![MergeRegion::new(0, 0, 0, 1)])
            .unwrap_err();
        assert!(matches!(err, Error::Grid(_)));
    }

    #[test]
    fn sparse_grid_covers_merges() {
        let grid = RawGrid::from_sparse(
            vec![(0, 0, text("h"))],
            vec![MergeRegion::new(0, 0, 2, 1)],
        )
        .unwrap();
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.cols(), 2);
        let out = normalize(&grid);
        assert!(out.iter().flatten().all(|c| c == "h"));
    }

    #[test]
    fn empty_rows_are_dropped() {
        let rows = vec![
            vec!["".to_string(), "".to_string()],
            vec!["a".to_string(), "".to_string()],
            vec!["".to_string(), "".to_string()],
        ];
        assert_eq!(drop_empty_rows(rows), vec![vec!["a".to_string(), "".to_string()]]);
    }
}
