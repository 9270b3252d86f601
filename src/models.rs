//! Core data models used throughout sheetrag.
//!
//! These types represent the normalized documents, tables, chunks, and
//! search results that flow through the ingestion and retrieval pipeline.
//! The JSON shape of [`Document`] is the on-disk chunk file format.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

/// Source document family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Excel,
    Ppt,
    Word,
}

impl DocType {
    /// Numeric tag used as the last segment of chunk file names.
    pub fn format_tag(self) -> u8 {
        match self {
            DocType::Excel => 0,
            DocType::Word => 1,
            DocType::Ppt => 2,
        }
    }

    pub fn from_format_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(DocType::Excel),
            1 => Some(DocType::Word),
            2 => Some(DocType::Ppt),
            _ => None,
        }
    }

    /// Detect the document family from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" => Some(DocType::Excel),
            "pptx" => Some(DocType::Ppt),
            "docx" => Some(DocType::Word),
            _ => None,
        }
    }

    /// Canonical extension, used when a file name has to be reconstructed
    /// from a legacy chunk file name.
    pub fn extension(self) -> &'static str {
        match self {
            DocType::Excel => "xlsx",
            DocType::Ppt => "pptx",
            DocType::Word => "docx",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocType::Excel => "excel",
            DocType::Ppt => "ppt",
            DocType::Word => "word",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table row: column name → cell text, in header order.
///
/// Serialized as a JSON object whose keys keep the column order of the
/// source table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRecord {
    fields: Vec<(String, String)>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zip a header sequence with one row of cell text. Missing trailing
    /// cells become empty strings; surplus cells are dropped.
    pub fn from_pairs(headers: &[String], cells: &[String]) -> Self {
        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), cells.get(i).cloned().unwrap_or_default()))
            .collect();
        Self { fields }
    }

    /// Append a field. Callers are responsible for key uniqueness.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.push((column.into(), value.into()));
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for RowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RowRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = RowRecord;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object of column name to cell text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RowRecord, A::Error> {
                let mut row = RowRecord::new();
                while let Some((k, v)) = access.next_entry::<String, serde_json::Value>()? {
                    // Corrected chunk files occasionally carry numbers or nulls;
                    // fold them back to text.
                    let text = match v {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    row.push(k, text);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// A normalized table: one spreadsheet sheet or one slide page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Logical page / sheet name. Not unique across a document.
    pub sheet: String,
    /// Delimited-text rendering of `rows`.
    pub data: String,
    pub rows: Vec<RowRecord>,
    /// Free text co-located with the page (slides only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Table {
    /// Column names, taken from the first row.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|r| r.columns().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Payload of a [`Document`]: spreadsheets and decks carry tables, word
/// documents carry a single content string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentBody {
    Tables { tables: Vec<Table> },
    Content { content: String },
}

/// A parsed office document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_type: DocType,
    pub file_name: String,
    #[serde(flatten)]
    pub body: DocumentBody,
}

impl Document {
    pub fn with_tables(doc_type: DocType, file_name: impl Into<String>, tables: Vec<Table>) -> Self {
        Self {
            doc_type,
            file_name: file_name.into(),
            body: DocumentBody::Tables { tables },
        }
    }

    pub fn with_content(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            doc_type: DocType::Word,
            file_name: file_name.into(),
            body: DocumentBody::Content {
                content: content.into(),
            },
        }
    }

    /// Tables of the document; empty for word documents.
    pub fn tables(&self) -> &[Table] {
        match &self.body {
            DocumentBody::Tables { tables } => tables,
            DocumentBody::Content { .. } => &[],
        }
    }

    /// File name without its extension.
    pub fn base_name(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }
}

/// A contiguous run of one table's rows, sized for downstream processing.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 1-based position when a table was split into several chunks;
    /// `None` when the table fit in one.
    pub index: Option<usize>,
    pub table: Table,
}

/// One search-index result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    pub file_name: String,
    pub sheet_name: String,
    pub content: String,
    pub score: f64,
}

/// Where a piece of retrieval context came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub file_name: String,
    pub sheet_name: String,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.file_name, self.sheet_name)
    }
}

/// Assembled, length-budgeted context for a generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBundle {
    pub context: String,
    /// Hits whose (possibly truncated) content appears in `context`, in
    /// inclusion order.
    pub sources: Vec<Provenance>,
    pub truncated: bool,
}

impl ContextBundle {
    /// The "nothing found" sentinel.
    pub fn not_found(message: &str) -> Self {
        Self {
            context: message.to_string(),
            sources: Vec::new(),
            truncated: false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.sources.is_empty()
    }
}
