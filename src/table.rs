//! Table record building and delimited-text rendering.
//!
//! A normalized grid becomes a [`Table`]: the first non-empty row supplies
//! the (deduplicated) headers, every later row becomes a [`RowRecord`], and
//! `data` holds a CSV rendering of the same rows. `data` is always rebuilt
//! from `rows` alone so the two can never disagree.

use crate::error::{Error, Result};
use crate::grid::{drop_empty_rows, normalize, RawGrid};
use crate::header::dedup_headers;
use crate::models::{RowRecord, Table};

/// Zip each grid row with the headers, preserving row order.
pub fn build_records(headers: &[String], rows: &[Vec<String>]) -> Vec<RowRecord> {
    rows.iter()
        .map(|cells| RowRecord::from_pairs(headers, cells))
        .collect()
}

/// Render `rows` as CSV: one header line from `columns`, then one line per
/// row. Fields containing the delimiter, a quote, or a line break are
/// quoted, with embedded quotes doubled.
///
/// An empty row set renders as the empty string: without rows there is
/// nothing the rendering could be derived from.
pub fn render_delimited(columns: &[String], rows: &[RowRecord]) -> Result<String> {
    if rows.is_empty() {
        // No header line either: `data` must be derivable from `rows`, and an
        // empty `rows` carries no column names.
        return Ok(String::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        let record: Vec<&str> = columns
            .iter()
            .map(|c| row.get(c).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Csv(csv::Error::from(e.into_error())))?;
    String::from_utf8(bytes).map_err(|e| Error::Grid(format!("non-UTF-8 cell text: {}", e)))
}

/// Build a [`Table`] for `sheet` from an already-normalized grid.
///
/// Returns `None` when the grid has no non-empty rows.
pub fn table_from_rows(
    sheet: &str,
    rows: Vec<Vec<String>>,
    text: Option<String>,
) -> Result<Option<Table>> {
    let rows = drop_empty_rows(rows);
    let Some((header_row, body)) = rows.split_first() else {
        return Ok(None);
    };

    let headers = dedup_headers(header_row);
    let records = build_records(&headers, body);
    let data = render_delimited(&headers, &records)?;

    Ok(Some(Table {
        sheet: sheet.to_string(),
        data,
        rows: records,
        text,
    }))
}

/// Normalize a raw grid and build its [`Table`].
pub fn table_from_grid(sheet: &str, grid: &RawGrid, text: Option<String>) -> Result<Option<Table>> {
    table_from_rows(sheet, normalize(grid), text)
}

/// Re-render `data` for a subset of a table's rows.
pub fn sub_table(source: &Table, rows: &[RowRecord]) -> Result<Table> {
    let columns: Vec<String> = rows
        .first()
        .map(|r| r.columns().map(str::to_string).collect())
        .unwrap_or_default();
    Ok(Table {
        sheet: source.sheet.clone(),
        data: render_delimited(&columns, rows)?,
        rows: rows.to_vec(),
        text: source.text.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellValue, MergeRegion};

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    /// Parse `data` back into records with a standard CSV reader.
    fn reparse(data: &str) -> Vec<RowRecord> {
        let mut reader = csv::ReaderBuilder::new().from_reader(data.as_bytes());
        let headers: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        reader
            .records()
            .map(|r| {
                let r = r.unwrap();
                let cells: Vec<String> = r.iter().map(str::to_string).collect();
                RowRecord::from_pairs(&headers, &cells)
            })
            .collect()
    }

    #[test]
    fn first_row_becomes_headers() {
        let table = table_from_rows(
            "Parts",
            vec![
                strings(&["Part", "", "Part"]),
                strings(&["R1", "10k", "0603"]),
                strings(&["", "", ""]),
                strings(&["C1", "1uF", "0402"]),
            ],
            None,
        )
        .unwrap()
        .unwrap();

        assert_eq!(table.sheet, "Parts");
        assert_eq!(table.columns(), strings(&["Part", "Column_2", "Part_1"]));
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].get("Column_2"), Some("1uF"));
        assert_eq!(table.data, "Part,Column_2,Part_1\nR1,10k,0603\nC1,1uF,0402\n");
    }

    #[test]
    fn all_empty_grid_has_no_table() {
        let out = table_from_rows("S", vec![strings(&["", ""]), strings(&["", ""])], None).unwrap();
        assert!(out.is_none());
        assert!(table_from_rows("S", vec![], None).unwrap().is_none());
    }

    #[test]
    fn header_only_table_has_empty_data() {
        let table = table_from_rows("S", vec![strings(&["a", "b"])], None)
            .unwrap()
            .unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.data, "");
    }

    #[test]
    fn quoting_round_trips() {
        let table = table_from_rows(
            "Q",
            vec![
                strings(&["note", "size, mm"]),
                strings(&["say \"hi\"", "1,5"]),
                strings(&["two\nlines", "plain"]),
                strings(&["", "trailing"]),
            ],
            None,
        )
        .unwrap()
        .unwrap();

        assert!(table.data.contains("\"say \"\"hi\"\"\""));
        assert!(table.data.contains("\"size, mm\""));
        assert_eq!(reparse(&table.data), table.rows);
    }

    #[test]
    fn merged_header_is_replicated() {
        let grid = RawGrid::new(
            vec![
                vec![CellValue::from("Spec"), CellValue::Empty, CellValue::from("Id")],
                vec![CellValue::from("min"), CellValue::from("max"), CellValue::Empty],
                vec![CellValue::Number(1.0), CellValue::Number(2.5), CellValue::from("a")],
            ],
            vec![MergeRegion::new(0, 0, 0, 1)],
        )
        .unwrap();
        let table = table_from_grid("S", &grid, None).unwrap().unwrap();
        assert_eq!(table.columns(), strings(&["Spec", "Spec_1", "Id"]));
        assert_eq!(table.rows[0].get("Spec"), Some("min"));
        assert_eq!(table.rows[1].get("Spec_1"), Some("2.5"));
        assert_eq!(table.rows[1].get("Spec"), Some("1"));
    }

    #[test]
    fn sub_table_rerenders_data() {
        let table = table_from_rows(
            "S",
            vec![strings(&["k", "v"]), strings(&["a", "1"]), strings(&["b", "2"])],
            Some("note".into()),
        )
        .unwrap()
        .unwrap();
        let sub = sub_table(&table, &table.rows[1..]).unwrap();
        assert_eq!(sub.data, "k,v\nb,2\n");
        assert_eq!(sub.text.as_deref(), Some("note"));
        assert_eq!(reparse(&sub.data), sub.rows);
    }
}
