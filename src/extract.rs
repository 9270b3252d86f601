//! Raw readers for OOXML office documents.
//!
//! Each reader takes the file bytes and returns the raw material the
//! normalization core works from:
//!
//! - [`read_xlsx`] → one [`RawSheet`] (typed cell grid + merge regions) per
//!   worksheet, in workbook order;
//! - [`read_pptx`] → one [`SlidePage`] per slide (title, free text, first
//!   table as a grid);
//! - [`read_docx`] → the document's paragraph and table text.
//!
//! Malformed input returns an error; readers never panic on bad bytes.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::grid::{parse_cell_ref, CellValue, MergeRegion, RawGrid, MAX_ROWS};

/// Maximum worksheets read from one workbook.
const XLSX_MAX_SHEETS: usize = 256;
/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

/// Slide page name used when a slide has no title text.
pub const UNTITLED_SLIDE: &str = "Untitled";

/// One worksheet's raw grid.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name: String,
    pub grid: RawGrid,
}

/// One slide: its title, the text of its non-table shapes, and its first
/// table if any.
#[derive(Debug, Clone)]
pub struct SlidePage {
    pub title: String,
    pub text: String,
    pub table: Option<RawGrid>,
}

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>> {
    Ok(zip::ZipArchive::new(Cursor::new(bytes))?)
}

/// Read a ZIP entry, bounded by [`MAX_XML_ENTRY_BYTES`]. Returns `None` if
/// the entry does not exist.
fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Option<Vec<u8>>> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut out)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(Error::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(Some(out))
}

fn require_entry(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>> {
    read_entry(archive, name)?.ok_or_else(|| Error::Ooxml(format!("{} not found", name)))
}

/// Entries under `prefix` named `{prefix}{n}.xml`, sorted by `n`.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .filter(|n| {
            let number = &n[prefix.len()..n.len() - 4];
            !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
        })
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name[prefix.len()..name.len() - 4]
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn xml_reader(xml: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    reader
}

// ============ XLSX ============

/// Read every worksheet of an `.xlsx` workbook.
pub fn read_xlsx(bytes: &[u8]) -> Result<Vec<RawSheet>> {
    let mut archive = open_archive(bytes)?;

    let shared_strings = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let date_styles = match read_entry(&mut archive, "xl/styles.xml")? {
        Some(xml) => parse_date_styles(&xml)?,
        None => Vec::new(),
    };
    let workbook = match read_entry(&mut archive, "xl/workbook.xml")? {
        Some(xml) => parse_workbook(&xml)?,
        None => WorkbookInfo::default(),
    };
    let targets = match read_entry(&mut archive, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => parse_relationships(&xml, "xl/")?,
        None => HashMap::new(),
    };

    let mut sheets: Vec<(String, String)> = workbook
        .sheets
        .iter()
        .filter_map(|(name, rel_id)| {
            targets
                .get(rel_id)
                .map(|path| (name.clone(), path.clone()))
        })
        .collect();
    if sheets.is_empty() {
        sheets = numbered_entries(&archive, "xl/worksheets/sheet")
            .into_iter()
            .enumerate()
            .map(|(i, path)| (format!("Sheet{}", i + 1), path))
            .collect();
    }

    let ctx = CellContext {
        shared_strings: &shared_strings,
        date_styles: &date_styles,
        date1904: workbook.date1904,
    };

    let mut out = Vec::new();
    for (name, path) in sheets.into_iter().take(XLSX_MAX_SHEETS) {
        let xml = require_entry(&mut archive, &path)?;
        let grid = parse_worksheet(&xml, &ctx)?;
        tracing::debug!(sheet = %name, rows = grid.rows(), cols = grid.cols(), "read worksheet");
        out.push(RawSheet { name, grid });
    }
    Ok(out)
}

#[derive(Debug, Default)]
struct WorkbookInfo {
    /// `(sheet name, relationship id)` in workbook order.
    sheets: Vec<(String, String)>,
    date1904: bool,
}

fn parse_workbook(xml: &[u8]) -> Result<WorkbookInfo> {
    let mut info = WorkbookInfo::default();
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"sheet" => {
                    if let (Some(name), Some(id)) = (attr(&e, b"name"), attr(&e, b"id")) {
                        info.sheets.push((name, id));
                    }
                }
                b"workbookPr" => {
                    info.date1904 = matches!(
                        attr(&e, b"date1904").as_deref(),
                        Some("1") | Some("true")
                    );
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(info)
}

/// Map relationship ids to archive paths. Relative targets resolve against
/// `base_dir`; absolute targets (`/xl/...`) are taken from the archive root.
fn parse_relationships(xml: &[u8], base_dir: &str) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    let path = match target.strip_prefix('/') {
                        Some(abs) => abs.to_string(),
                        None => format!("{}{}", base_dir, target),
                    };
                    out.insert(id, path);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Shared strings, concatenating rich-text runs and skipping phonetic
/// (`rPh`) hints.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_t = !in_phonetic,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(te) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Built-in number formats that display as dates or times.
fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// Whether a custom number format code displays a date or time.
fn is_date_format_code(code: &str) -> bool {
    let mut cleaned = String::new();
    let mut chars = code.chars();
    let mut in_quote = false;
    let mut in_bracket = false;
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quote = !in_quote,
            '[' if !in_quote => in_bracket = true,
            ']' if in_bracket => in_bracket = false,
            '\\' | '_' | '*' if !in_quote => {
                chars.next();
            }
            _ if in_quote || in_bracket => {}
            _ => cleaned.push(c.to_ascii_lowercase()),
        }
    }
    // Elapsed-time formats such as [h]:mm keep their letters in brackets.
    let bracketed_time = ["[h]", "[hh]", "[m]", "[mm]", "[s]", "[ss]"]
        .iter()
        .any(|t| code.to_ascii_lowercase().contains(t));
    bracketed_time || cleaned.chars().any(|c| matches!(c, 'y' | 'd' | 'h' | 's'))
}

/// For each cell style index (`s` attribute), whether it formats as a date.
fn parse_date_styles(xml: &[u8]) -> Result<Vec<bool>> {
    let mut custom: HashMap<u32, bool> = HashMap::new();
    let mut styles = Vec::new();
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"numFmt" => {
                    if let (Some(id), Some(code)) = (attr(&e, b"numFmtId"), attr(&e, b"formatCode"))
                    {
                        if let Ok(id) = id.parse::<u32>() {
                            custom.insert(id, is_date_format_code(&code));
                        }
                    }
                }
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    let id = attr(&e, b"numFmtId")
                        .and_then(|v| v.parse::<u32>().ok())
                        .unwrap_or(0);
                    let is_date = custom
                        .get(&id)
                        .copied()
                        .unwrap_or_else(|| is_builtin_date_format(id));
                    styles.push(is_date);
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(styles)
}

/// Convert an Excel serial date to a timestamp, rounded to the millisecond.
pub fn excel_serial_to_datetime(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if serial < 60.0 {
        // Serials before the phantom 1900-02-29 are one day off.
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::milliseconds(millis))
}

struct CellContext<'a> {
    shared_strings: &'a [String],
    date_styles: &'a [bool],
    date1904: bool,
}

impl CellContext<'_> {
    fn value(&self, kind: Option<&str>, style: Option<usize>, raw: &str) -> CellValue {
        match kind {
            Some("s") => raw
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| self.shared_strings.get(i))
                .map(|s| CellValue::from(s.as_str()))
                .unwrap_or(CellValue::Empty),
            Some("b") => CellValue::Bool(raw.trim() == "1"),
            Some("str") | Some("inlineStr") | Some("e") => CellValue::from(raw),
            Some("d") => NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S%.f")
                .map(CellValue::DateTime)
                .unwrap_or_else(|_| CellValue::from(raw)),
            _ => {
                let Ok(n) = raw.trim().parse::<f64>() else {
                    return CellValue::from(raw);
                };
                let is_date = style
                    .and_then(|s| self.date_styles.get(s))
                    .copied()
                    .unwrap_or(false);
                if is_date {
                    if let Some(dt) = excel_serial_to_datetime(n, self.date1904) {
                        return CellValue::DateTime(dt);
                    }
                }
                CellValue::Number(n)
            }
        }
    }
}

fn parse_worksheet(xml: &[u8], ctx: &CellContext<'_>) -> Result<RawGrid> {
    let mut cells: Vec<(usize, usize, CellValue)> = Vec::new();
    let mut merges: Vec<MergeRegion> = Vec::new();

    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();

    let mut row_idx: usize = 0;
    let mut next_row: usize = 0;
    let mut next_col: usize = 0;

    // Current cell state.
    let mut cell_pos: Option<(usize, usize)> = None;
    let mut cell_kind: Option<String> = None;
    let mut cell_style: Option<usize> = None;
    let mut cell_text = String::new();
    let mut in_value = false;
    let mut in_inline = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row_idx = attr(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .filter(|r| (1..=MAX_ROWS).contains(r))
                        .map(|r| r - 1)
                        .unwrap_or(next_row);
                    next_row = row_idx + 1;
                    next_col = 0;
                }
                b"c" => {
                    let pos = attr(&e, b"r")
                        .and_then(|r| parse_cell_ref(&r))
                        .unwrap_or((row_idx, next_col));
                    next_col = pos.1 + 1;
                    cell_pos = Some(pos);
                    cell_kind = attr(&e, b"t");
                    cell_style = attr(&e, b"s").and_then(|s| s.parse().ok());
                    cell_text.clear();
                }
                b"v" => in_value = true,
                b"is" => in_inline = true,
                b"t" if in_inline => in_value = true,
                b"rPh" if in_inline => in_value = false,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"c" => {
                    let pos = attr(&e, b"r")
                        .and_then(|r| parse_cell_ref(&r))
                        .unwrap_or((row_idx, next_col));
                    next_col = pos.1 + 1;
                }
                b"row" => {
                    row_idx = attr(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .filter(|r| (1..=MAX_ROWS).contains(r))
                        .map(|r| r - 1)
                        .unwrap_or(next_row);
                    next_row = row_idx + 1;
                }
                b"mergeCell" => {
                    if let Some(region) = attr(&e, b"ref").and_then(|r| MergeRegion::from_a1_range(&r))
                    {
                        merges.push(region);
                    }
                }
                _ => {}
            },
            Event::Text(te) if in_value => cell_text.push_str(&te.unescape()?),
            Event::CData(cd) if in_value => {
                cell_text.push_str(&String::from_utf8_lossy(&cd.into_inner()));
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"is" => in_inline = false,
                b"c" => {
                    if let Some((r, c)) = cell_pos.take() {
                        let value = ctx.value(cell_kind.as_deref(), cell_style, &cell_text);
                        if value != CellValue::Empty {
                            cells.push((r, c, value));
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    RawGrid::from_sparse(cells, merges)
}

// ============ PPTX ============

/// Read every slide of a `.pptx` deck, ordered by slide number.
pub fn read_pptx(bytes: &[u8]) -> Result<Vec<SlidePage>> {
    let mut archive = open_archive(bytes)?;
    let slide_names = numbered_entries(&archive, "ppt/slides/slide");
    let mut out = Vec::with_capacity(slide_names.len());
    for name in slide_names {
        let xml = require_entry(&mut archive, &name)?;
        out.push(parse_slide(&xml)?);
    }
    Ok(out)
}

/// A table cell as declared in DrawingML, before merge resolution.
struct SlideCell {
    text: String,
    grid_span: usize,
    row_span: usize,
}

#[derive(Default)]
struct ShapeState {
    placeholder: bool,
    paragraphs: Vec<String>,
}

fn span_attr(e: &BytesStart<'_>, key: &[u8]) -> usize {
    attr(e, key)
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1)
        .min(MAX_ROWS)
}

fn parse_slide(xml: &[u8]) -> Result<SlidePage> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();

    let mut title: Option<String> = None;
    let mut texts: Vec<String> = Vec::new();

    let mut shape: Option<ShapeState> = None;
    let mut paragraph: Option<String> = None;
    let mut in_t = false;

    let mut tables_seen = 0usize;
    let mut in_first_table = false;
    let mut table_rows: Vec<Vec<SlideCell>> = Vec::new();
    let mut cell: Option<SlideCell> = None;
    let mut cell_paragraphs: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sp" => shape = Some(ShapeState::default()),
                b"ph" => {
                    if let Some(s) = shape.as_mut() {
                        s.placeholder = true;
                    }
                }
                b"tbl" => {
                    tables_seen += 1;
                    in_first_table = tables_seen == 1;
                }
                b"tr" if in_first_table => table_rows.push(Vec::new()),
                b"tc" if in_first_table => {
                    cell = Some(SlideCell {
                        text: String::new(),
                        grid_span: span_attr(&e, b"gridSpan"),
                        row_span: span_attr(&e, b"rowSpan"),
                    });
                    cell_paragraphs.clear();
                }
                b"p" if shape.is_some() || cell.is_some() => paragraph = Some(String::new()),
                b"t" if paragraph.is_some() => in_t = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"ph" => {
                    if let Some(s) = shape.as_mut() {
                        s.placeholder = true;
                    }
                }
                b"tc" if in_first_table => {
                    if let Some(row) = table_rows.last_mut() {
                        row.push(SlideCell {
                            text: String::new(),
                            grid_span: span_attr(&e, b"gridSpan"),
                            row_span: span_attr(&e, b"rowSpan"),
                        });
                    }
                }
                b"br" => {
                    if let Some(p) = paragraph.as_mut() {
                        p.push('\n');
                    }
                }
                _ => {}
            },
            Event::Text(te) if in_t => {
                if let Some(p) = paragraph.as_mut() {
                    p.push_str(&te.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => {
                    if let Some(p) = paragraph.take() {
                        if cell.is_some() {
                            cell_paragraphs.push(p);
                        } else if let Some(s) = shape.as_mut() {
                            s.paragraphs.push(p);
                        }
                    }
                }
                b"tc" => {
                    if let Some(mut c) = cell.take() {
                        c.text = cell_paragraphs.join("\n").trim().to_string();
                        if let Some(row) = table_rows.last_mut() {
                            row.push(c);
                        }
                    }
                }
                b"tbl" => in_first_table = false,
                b"sp" => {
                    if let Some(s) = shape.take() {
                        let text = s.paragraphs.join("\n").trim().to_string();
                        if !text.is_empty() {
                            if s.placeholder && title.is_none() {
                                title = Some(text.clone());
                            }
                            texts.push(text);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let table = if table_rows.is_empty() {
        None
    } else {
        Some(slide_table_grid(table_rows)?)
    };

    Ok(SlidePage {
        title: title.unwrap_or_else(|| UNTITLED_SLIDE.to_string()),
        text: texts.join("\n"),
        table,
    })
}

/// Lay DrawingML table cells out on a grid. Every row lists one `tc` per
/// grid column (spanned positions included), so cells map positionally;
/// origin cells with `gridSpan`/`rowSpan` contribute merge regions.
fn slide_table_grid(rows: Vec<Vec<SlideCell>>) -> Result<RawGrid> {
    let mut cells = Vec::new();
    let mut merges = Vec::new();
    for (r, row) in rows.into_iter().enumerate() {
        for (c, cell) in row.into_iter().enumerate() {
            if cell.grid_span > 1 || cell.row_span > 1 {
                merges.push(MergeRegion::new(
                    r,
                    c,
                    r + cell.row_span - 1,
                    c + cell.grid_span - 1,
                ));
            }
            cells.push((r, c, CellValue::from(cell.text.as_str())));
        }
    }
    RawGrid::from_sparse(cells, merges)
}

// ============ DOCX ============

/// Extract the text of a `.docx` document: non-empty body paragraphs in
/// order, then each table row's non-empty cells joined by tabs. Parts are
/// joined by newlines.
pub fn read_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = open_archive(bytes)?;
    let xml = require_entry(&mut archive, "word/document.xml")?;

    let mut reader = xml_reader(&xml);
    let mut buf = Vec::new();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut table_lines: Vec<String> = Vec::new();

    let mut table_depth = 0usize;
    let mut row_cells: Vec<String> = Vec::new();
    let mut cell_paragraphs: Vec<String> = Vec::new();
    let mut paragraph: Option<String> = None;
    let mut in_run = false;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"r" => in_run = true,
                b"tr" if table_depth == 1 => row_cells.clear(),
                b"tc" if table_depth == 1 => cell_paragraphs.clear(),
                b"p" => paragraph = Some(String::new()),
                b"t" if paragraph.is_some() => in_t = true,
                _ => {}
            },
            Event::Empty(e) if in_run => {
                if let Some(p) = paragraph.as_mut() {
                    match e.local_name().as_ref() {
                        b"tab" => p.push('\t'),
                        b"br" | b"cr" => p.push('\n'),
                        _ => {}
                    }
                }
            }
            Event::Text(te) if in_t => {
                if let Some(p) = paragraph.as_mut() {
                    p.push_str(&te.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"r" => in_run = false,
                b"p" => {
                    if let Some(p) = paragraph.take() {
                        if table_depth == 0 {
                            let trimmed = p.trim();
                            if !trimmed.is_empty() {
                                paragraphs.push(trimmed.to_string());
                            }
                        } else {
                            cell_paragraphs.push(p);
                        }
                    }
                }
                b"tc" if table_depth == 1 => {
                    let text = cell_paragraphs.join("\n").trim().to_string();
                    if !text.is_empty() {
                        row_cells.push(text);
                    }
                }
                b"tr" if table_depth == 1 => {
                    if !row_cells.is_empty() {
                        table_lines.push(row_cells.join("\t"));
                    }
                }
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    paragraphs.extend(table_lines);
    Ok(paragraphs.join("\n"))
}
