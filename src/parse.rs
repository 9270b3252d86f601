//! Office document → normalized [`Document`].
//!
//! Dispatches on the file extension to the raw readers in
//! [`crate::extract`] and runs their output through grid normalization and
//! record building. Spreadsheet sheets without any non-empty row are left
//! out; every slide produces a table entry, with empty `rows` and `data`
//! when the slide carries no usable table.

use std::path::Path;

use crate::error::{Error, Result};
use crate::extract::{read_docx, read_pptx, read_xlsx};
use crate::models::{DocType, Document, Table};
use crate::table::table_from_grid;

/// Read and parse the document at `path`.
pub fn parse_document(path: &Path) -> Result<Document> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
    let bytes = std::fs::read(path)?;
    parse_bytes(file_name, &bytes)
}

/// Parse document bytes. `file_name` selects the format and becomes the
/// document's `file_name`.
pub fn parse_bytes(file_name: &str, bytes: &[u8]) -> Result<Document> {
    let doc_type = DocType::from_path(Path::new(file_name))
        .ok_or_else(|| Error::UnsupportedFormat(file_name.to_string()))?;

    let document = match doc_type {
        DocType::Excel => {
            let mut tables = Vec::new();
            for sheet in read_xlsx(bytes)? {
                match table_from_grid(&sheet.name, &sheet.grid, None)? {
                    Some(table) => tables.push(table),
                    None => tracing::debug!(sheet = %sheet.name, "skipping empty sheet"),
                }
            }
            Document::with_tables(DocType::Excel, file_name, tables)
        }
        DocType::Ppt => {
            let mut tables = Vec::new();
            for page in read_pptx(bytes)? {
                let table = match &page.table {
                    Some(grid) => table_from_grid(&page.title, grid, Some(page.text.clone()))?,
                    None => None,
                };
                tables.push(table.unwrap_or(Table {
                    sheet: page.title,
                    data: String::new(),
                    rows: Vec::new(),
                    text: Some(page.text),
                }));
            }
            Document::with_tables(DocType::Ppt, file_name, tables)
        }
        DocType::Word => Document::with_content(file_name, read_docx(bytes)?),
    };

    tracing::info!(
        file = file_name,
        doc_type = %doc_type,
        tables = document.tables().len(),
        "parsed document"
    );
    Ok(document)
}
