//! Chunk files and their sidecar manifests.
//!
//! A parsed [`Document`] is written to an output directory as one JSON file
//! per logical unit, named after the document, page, and format tag:
//!
//! | Type  | File                          | Notes                                  |
//! |-------|-------------------------------|----------------------------------------|
//! | excel | `{base}_{sheet}_0.json`       | sheet fits the target size             |
//! | excel | `{base}_{sheet}{i}_0.json`    | chunk `i` (1-based) of an oversized sheet |
//! | ppt   | `{base}_{page}_2.json`        | one per slide, never chunked           |
//! | word  | `{base}_1.json`               | whole document                         |
//!
//! Each chunk file gets a `{stem}.manifest.json` sidecar that records its
//! identity explicitly, so downstream stages do not have to decode file
//! names. [`parse_chunk_file_name`] still decodes the naming convention for
//! chunk files that arrive without a manifest.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chunk::{json_chars, split_table, ChunkPlanner, DocumentFrame};
use crate::error::{Error, Result};
use crate::models::{DocType, Document, Table};

/// File name suffix of sidecar manifests.
pub const MANIFEST_SUFFIX: &str = ".manifest.json";

/// Legacy excel suffix left behind by the external correction step.
const CORRECTED_EXCEL_SUFFIX: &str = "_llm_output_0";

/// Identity and integrity data for one chunk file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    /// Source document file name, extension included.
    pub file_name: String,
    /// Sheet or page name; the file name again for word documents.
    pub sheet_name: String,
    pub doc_type: DocType,
    pub format_tag: u8,
    /// 1-based chunk number when the sheet was split.
    pub chunk_index: Option<usize>,
    pub chunk_count: usize,
    pub row_count: usize,
    /// Hex SHA-256 of the chunk file's bytes.
    pub content_sha256: String,
    pub char_count: usize,
}

impl ChunkManifest {
    /// Sheet name under which the chunk is staged: the chunk number is
    /// appended directly, so every chunk of a split sheet keeps a distinct
    /// identity (`Sheet1` chunk 2 becomes `Sheet12`).
    pub fn staging_sheet_name(&self) -> String {
        match self.chunk_index {
            Some(i) => format!("{}{}", self.sheet_name, i),
            None => self.sheet_name.clone(),
        }
    }
}

/// A chunk file ready to be written.
#[derive(Debug, Clone)]
pub struct ChunkFile {
    /// File name without `.json`.
    pub stem: String,
    /// Pretty-printed document JSON.
    pub json: String,
    pub manifest: ChunkManifest,
}

/// A chunk file on disk.
#[derive(Debug, Clone)]
pub struct WrittenChunk {
    pub path: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: ChunkManifest,
}

/// Replace path-hostile characters (`/`, `\`, `:`) with `_`.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

/// Make page names unique: the first occurrence is kept, later ones get a
/// counter appended (`Title`, `Title1`, `Title2`, ...).
pub fn dedup_page_names(names: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let count = seen.entry(name.as_str()).or_insert(0);
        let mut candidate = if *count == 0 {
            name.clone()
        } else {
            format!("{}{}", name, count)
        };
        while used.contains(&candidate) {
            *count += 1;
            candidate = format!("{}{}", name, count);
        }
        *count += 1;
        used.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn chunk_file(
    stem: String,
    document: &Document,
    sheet_name: &str,
    chunk_index: Option<usize>,
    chunk_count: usize,
) -> Result<ChunkFile> {
    let json = serde_json::to_string_pretty(document)?;
    let row_count = document.tables().iter().map(|t| t.rows.len()).sum();
    let manifest = ChunkManifest {
        file_name: document.file_name.clone(),
        sheet_name: sheet_name.to_string(),
        doc_type: document.doc_type,
        format_tag: document.doc_type.format_tag(),
        chunk_index,
        chunk_count,
        row_count,
        content_sha256: sha256_hex(&json),
        char_count: json.chars().count(),
    };
    Ok(ChunkFile {
        stem,
        json,
        manifest,
    })
}

fn single_table(document: &Document, table: Table) -> Document {
    Document::with_tables(document.doc_type, document.file_name.clone(), vec![table])
}

/// Lay out the chunk files for `document` without touching the disk.
pub fn plan_document_files(
    document: &Document,
    planner: &dyn ChunkPlanner,
    target_chars: usize,
) -> Result<Vec<ChunkFile>> {
    let base = sanitize_component(document.base_name());
    let tag = document.doc_type.format_tag();
    let mut files = Vec::new();

    match document.doc_type {
        DocType::Word => {
            files.push(chunk_file(
                format!("{}_{}", base, tag),
                document,
                &document.file_name,
                None,
                1,
            )?);
        }
        DocType::Ppt => {
            let names: Vec<String> = document
                .tables()
                .iter()
                .map(|t| sanitize_component(&t.sheet))
                .collect();
            for (table, page) in document.tables().iter().zip(dedup_page_names(&names)) {
                let single = single_table(document, table.clone());
                files.push(chunk_file(
                    format!("{}_{}_{}", base, page, tag),
                    &single,
                    &page,
                    None,
                    1,
                )?);
            }
        }
        DocType::Excel => {
            for table in document.tables() {
                let sheet = sanitize_component(&table.sheet);
                let whole = single_table(document, table.clone());
                if json_chars(&whole)? <= target_chars {
                    files.push(chunk_file(
                        format!("{}_{}_{}", base, sheet, tag),
                        &whole,
                        &sheet,
                        None,
                        1,
                    )?);
                    continue;
                }

                let frame = DocumentFrame {
                    doc_type: document.doc_type,
                    file_name: &document.file_name,
                };
                let chunks = split_table(planner, frame, table, target_chars)?;
                let count = chunks.len();
                tracing::debug!(sheet = %table.sheet, chunks = count, "splitting oversized sheet");
                for chunk in chunks {
                    let stem = match chunk.index {
                        Some(i) => format!("{}_{}{}_{}", base, sheet, i, tag),
                        None => format!("{}_{}_{}", base, sheet, tag),
                    };
                    let part = single_table(document, chunk.table);
                    files.push(chunk_file(stem, &part, &sheet, chunk.index, count)?);
                }
            }
        }
    }

    Ok(files)
}

fn write_chunk_file(output_dir: &Path, file: ChunkFile) -> Result<WrittenChunk> {
    let path = output_dir.join(format!("{}.json", file.stem));
    let manifest_path = output_dir.join(format!("{}{}", file.stem, MANIFEST_SUFFIX));
    std::fs::write(&path, &file.json)?;
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&file.manifest)?)?;
    tracing::debug!(path = %path.display(), chars = file.manifest.char_count, "wrote chunk file");
    Ok(WrittenChunk {
        path,
        manifest_path,
        manifest: file.manifest,
    })
}

/// Write `document`'s chunk files and manifests into `output_dir`
/// (created if missing). Existing files with the same names are replaced.
///
/// If any write fails, files already written for this document are removed
/// so a failed document leaves no partial output behind.
pub fn write_document_chunks(
    document: &Document,
    output_dir: &Path,
    planner: &dyn ChunkPlanner,
    target_chars: usize,
) -> Result<Vec<WrittenChunk>> {
    let files = plan_document_files(document, planner, target_chars)?;
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        match write_chunk_file(output_dir, file) {
            Ok(chunk) => written.push(chunk),
            Err(e) => {
                for chunk in &written {
                    let _ = std::fs::remove_file(&chunk.path);
                    let _ = std::fs::remove_file(&chunk.manifest_path);
                }
                return Err(e);
            }
        }
    }
    Ok(written)
}

/// Path of the sidecar manifest for a chunk file.
pub fn manifest_path_for(chunk_path: &Path) -> PathBuf {
    let stem = chunk_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    chunk_path.with_file_name(format!("{}{}", stem, MANIFEST_SUFFIX))
}

/// Identity decoded from a chunk file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFileName {
    pub doc_type: DocType,
    /// Source file name with its extension restored.
    pub file_name: String,
    pub sheet_name: String,
}

/// Decode `{base}_{sheet}_0.json` (excel, also `..._llm_output_0.json`),
/// `{base}_1.json` (word), or `{base}_{page}_2.json` (ppt).
///
/// Base and sheet are split on the last `_`, so a sheet name containing
/// `_` is misattributed; manifests avoid that ambiguity.
pub fn parse_chunk_file_name(name: &str) -> Result<ChunkFileName> {
    let invalid = |reason: &str| Error::FileName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let stem = name
        .strip_suffix(".json")
        .ok_or_else(|| invalid("not a .json file"))?;

    let (rest, doc_type) = if let Some(rest) = stem.strip_suffix(CORRECTED_EXCEL_SUFFIX) {
        (rest, DocType::Excel)
    } else if let Some((rest, tag)) = stem.rsplit_once('_') {
        let doc_type = tag
            .parse::<u8>()
            .ok()
            .and_then(DocType::from_format_tag)
            .ok_or_else(|| invalid("unknown format tag"))?;
        (rest, doc_type)
    } else {
        return Err(invalid("missing format tag"));
    };

    if rest.is_empty() {
        return Err(invalid("empty base name"));
    }

    if doc_type == DocType::Word {
        let file_name = format!("{}.{}", rest, doc_type.extension());
        return Ok(ChunkFileName {
            doc_type,
            sheet_name: file_name.clone(),
            file_name,
        });
    }

    let (base, sheet) = rest
        .rsplit_once('_')
        .ok_or_else(|| invalid("missing sheet name"))?;
    if base.is_empty() || sheet.is_empty() {
        return Err(invalid("empty base or sheet name"));
    }
    Ok(ChunkFileName {
        doc_type,
        file_name: format!("{}.{}", base, doc_type.extension()),
        sheet_name: sheet.to_string(),
    })
}
