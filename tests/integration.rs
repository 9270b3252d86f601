use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn srag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("srag");
    path
}

fn zip_of(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn column_letter(col: usize) -> char {
    (b'A' + col as u8) as char
}

/// Worksheet XML with inline-string cells; empty strings are omitted.
fn sheet_xml(rows: &[Vec<&str>], merges: &[&str]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            xml.push_str(&format!(
                r#"<c r="{}{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                column_letter(c),
                r + 1,
                value
            ));
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");
    if !merges.is_empty() {
        xml.push_str(&format!(r#"<mergeCells count="{}">"#, merges.len()));
        for m in merges {
            xml.push_str(&format!(r#"<mergeCell ref="{}"/>"#, m));
        }
        xml.push_str("</mergeCells>");
    }
    xml.push_str("</worksheet>");
    xml
}

fn workbook(sheets: &[(&str, String)]) -> Vec<u8> {
    let mut workbook = String::from(
        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    let mut entries = Vec::new();
    for (i, (name, xml)) in sheets.iter().enumerate() {
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            name,
            i + 1,
            i + 1
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i + 1,
            i + 1
        ));
        entries.push((format!("xl/worksheets/sheet{}.xml", i + 1), xml.clone()));
    }
    workbook.push_str("</sheets></workbook>");
    rels.push_str("</Relationships>");

    let mut all: Vec<(&str, String)> = vec![
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", rels),
    ];
    for (name, xml) in &entries {
        all.push((name.as_str(), xml.clone()));
    }
    zip_of(&all)
}

fn parts_workbook() -> Vec<u8> {
    let parts = sheet_xml(
        &[
            vec!["Part", "Spec", "", ""],
            vec!["R1", "10k", "1%", "resistor"],
            vec!["", "", "", ""],
            vec!["C1", "1uF", "10%", "capacitor"],
        ],
        &["B1:C1"],
    );
    let empty = sheet_xml(&[], &[]);
    workbook(&[("Parts", parts), ("Blank", empty)])
}

fn manual_docx() -> Vec<u8> {
    let body = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Maintenance manual</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Step 1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Disconnect power</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
</w:body></w:document>"#;
    zip_of(&[("word/document.xml", body.to_string())])
}

fn roadmap_pptx() -> Vec<u8> {
    let slide = |title: &str| {
        format!(
            r#"<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:cSld><p:spTree><p:sp><p:nvSpPr><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
            title
        )
    };
    zip_of(&[
        ("ppt/slides/slide1.xml", slide("Roadmap")),
        ("ppt/slides/slide2.xml", slide("Roadmap")),
    ])
}

fn setup_test_env(extra_config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let inbox = root.join("inbox");
    fs::create_dir_all(&inbox).unwrap();
    fs::write(inbox.join("parts.xlsx"), parts_workbook()).unwrap();
    fs::write(inbox.join("manual.docx"), manual_docx()).unwrap();
    fs::write(inbox.join("deck.pptx"), roadmap_pptx()).unwrap();
    fs::write(inbox.join("readme.txt"), "not an office document").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/srag.sqlite"

[chunking]
output_dir = "{root}/output"

{extra}
"#,
        root = root.display().to_string().replace('\\', "/"),
        extra = extra_config
    );

    let config_path = config_dir.join("srag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_srag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = srag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run srag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn inbox(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("inbox")
        .to_string_lossy()
        .to_string()
}

fn output_dir(config_path: &Path) -> PathBuf {
    config_path.parent().unwrap().parent().unwrap().join("output")
}

/// init → parse → stage → index.
fn prepare(config_path: &Path) {
    let (stdout, stderr, ok) = run_srag(config_path, &["init"]);
    assert!(ok, "init failed: stdout={}, stderr={}", stdout, stderr);
    let (stdout, stderr, ok) = run_srag(config_path, &["parse", &inbox(config_path)]);
    assert!(ok, "parse failed: stdout={}, stderr={}", stdout, stderr);
    let out = output_dir(config_path);
    let (stdout, stderr, ok) = run_srag(config_path, &["stage", out.to_str().unwrap()]);
    assert!(ok, "stage failed: stdout={}, stderr={}", stdout, stderr);
    let (stdout, stderr, ok) = run_srag(config_path, &["index"]);
    assert!(ok, "index failed: stdout={}, stderr={}", stdout, stderr);
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, _, success1) = run_srag(&config_path, &["init"]);
    assert!(success1, "First init failed");
    assert!(stdout.contains("initialized"));

    let (_, _, success2) = run_srag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_parse_writes_chunk_files() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_srag(&config_path, &["parse", &inbox(&config_path)]);
    assert!(success, "parse failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("3 document(s)"), "got: {}", stdout);

    let out = output_dir(&config_path);
    for name in [
        "parts_Parts_0.json",
        "parts_Parts_0.manifest.json",
        "manual_1.json",
        "deck_Roadmap_2.json",
        "deck_Roadmap1_2.json",
    ] {
        assert!(out.join(name).exists(), "missing {}", name);
    }
    assert!(!out.join("parts_Blank_0.json").exists());

    let sheet: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("parts_Parts_0.json")).unwrap())
            .unwrap();
    assert_eq!(sheet["doc_type"], "excel");
    assert_eq!(sheet["file_name"], "parts.xlsx");
    let table = &sheet["tables"][0];
    assert_eq!(table["sheet"], "Parts");
    assert_eq!(
        table["data"],
        "Part,Spec,Spec_1,Column_4\nR1,10k,1%,resistor\nC1,1uF,10%,capacitor\n"
    );
    assert_eq!(table["rows"].as_array().unwrap().len(), 2);
    assert_eq!(table["rows"][1]["Column_4"], "capacitor");

    let word: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("manual_1.json")).unwrap()).unwrap();
    assert_eq!(word["doc_type"], "word");
    assert_eq!(word["content"], "Maintenance manual\nStep 1\tDisconnect power");
}

#[test]
fn test_parse_reports_failures_and_continues() {
    let (tmp, config_path) = setup_test_env("");
    fs::write(tmp.path().join("inbox/broken.xlsx"), b"not a zip").unwrap();

    let (stdout, stderr, success) = run_srag(&config_path, &["parse", &inbox(&config_path)]);
    assert!(!success, "parse should fail when a document fails");
    assert!(stderr.contains("broken.xlsx"), "stderr: {}", stderr);
    assert!(stdout.contains("1 failed"), "stdout: {}", stdout);
    assert!(output_dir(&config_path).join("manual_1.json").exists());
}

#[test]
fn test_parse_chunks_oversized_sheets() {
    let (tmp, config_path) = setup_test_env("");
    let content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("[chunking]", "[chunking]\ntarget_chars = 2000");
    fs::write(&config_path, content).unwrap();

    let mut rows = vec![vec!["id", "description"]];
    let ids: Vec<String> = (0..120).map(|i| format!("ITEM-{:04}", i)).collect();
    for id in &ids {
        rows.push(vec![id.as_str(), "a fairly long description for this item"]);
    }
    let big = workbook(&[("Big", sheet_xml(&rows, &[]))]);
    let input = tmp.path().join("big.xlsx");
    fs::write(&input, big).unwrap();

    let (stdout, stderr, success) =
        run_srag(&config_path, &["parse", input.to_str().unwrap()]);
    assert!(success, "parse failed: stdout={}, stderr={}", stdout, stderr);

    let out = output_dir(&config_path);
    assert!(out.join("big_Big1_0.json").exists());
    assert!(out.join("big_Big2_0.json").exists());
    assert!(!out.join("big_Big_0.json").exists());

    let manifest: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(out.join("big_Big1_0.manifest.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest["chunk_index"], 1);
    assert_eq!(manifest["sheet_name"], "Big");
    assert!(manifest["chunk_count"].as_u64().unwrap() >= 2);
}

#[test]
fn test_stage_is_idempotent() {
    let (_tmp, config_path) = setup_test_env("");
    prepare(&config_path);

    let out = output_dir(&config_path);
    let (stdout, _, success) = run_srag(&config_path, &["stage", out.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("0 inserted"), "got: {}", stdout);
    assert!(stdout.contains("4 already staged"), "got: {}", stdout);
}

#[test]
fn test_search_finds_sheet_content() {
    let (_tmp, config_path) = setup_test_env("");
    prepare(&config_path);

    let (stdout, _, success) = run_srag(&config_path, &["search", "capacitor"]);
    assert!(success, "search failed");
    assert!(stdout.contains("parts.xlsx_Parts"), "got: {}", stdout);

    let (stdout, _, success) = run_srag(&config_path, &["search", "zzqx"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_context_tags_sources() {
    let (_tmp, config_path) = setup_test_env("");
    prepare(&config_path);

    let (stdout, _, success) = run_srag(&config_path, &["context", "Disconnect power"]);
    assert!(success, "context failed");
    assert!(stdout.contains("- manual.docx_manual.docx"), "got: {}", stdout);
    assert!(stdout.contains("[source: manual.docx_manual.docx]"), "got: {}", stdout);
}

#[test]
fn test_ask_without_generator() {
    let (tmp, config_path) = setup_test_env("");
    prepare(&config_path);

    let answer_path = tmp.path().join("answer.txt");
    let (stdout, _, success) = run_srag(
        &config_path,
        &["ask", "resistor", "--output", answer_path.to_str().unwrap()],
    );
    assert!(success, "ask failed");
    assert!(stdout.contains("- parts.xlsx_Parts"), "got: {}", stdout);
    assert!(stdout.contains("generation failed"), "got: {}", stdout);
    let saved = fs::read_to_string(&answer_path).unwrap();
    assert!(saved.contains("generation failed"));

    let (stdout, _, success) = run_srag(&config_path, &["ask", "zzqx"]);
    assert!(success);
    assert!(stdout.contains("No relevant content found"), "got: {}", stdout);
    assert!(!stdout.contains("generation failed"));
}

#[test]
fn test_eval_reports_recall() {
    let (tmp, config_path) = setup_test_env("");
    prepare(&config_path);

    let questions = tmp.path().join("questions.xlsx");
    let sheet = sheet_xml(
        &[
            vec!["question", "source"],
            vec!["capacitor", "parts.xlsx_Parts"],
            vec!["Disconnect power", "manual.docx_manual.docx"],
            vec!["zzqx", "parts.xlsx_Parts"],
            vec!["resistor", "parts.xlsx_Missing"],
        ],
        &[],
    );
    fs::write(&questions, workbook(&[("Questions", sheet)])).unwrap();

    let (stdout, stderr, success) = run_srag(&config_path, &["eval", questions.to_str().unwrap()]);
    assert!(success, "eval failed: {}", stderr);
    assert!(stdout.contains("4 question(s)"), "got: {}", stdout);
    assert!(stdout.contains("Recall@1: 0.5000"), "got: {}", stdout);
    assert!(stdout.contains("Recall@5: 0.5000"), "got: {}", stdout);

    let bad = tmp.path().join("bad.xlsx");
    let sheet = sheet_xml(&[vec!["question", "answer"], vec!["q", "a"]], &[]);
    fs::write(&bad, workbook(&[("Questions", sheet)])).unwrap();
    let (_, stderr, success) = run_srag(&config_path, &["eval", bad.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("missing required columns"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) =
        setup_test_env("[retrieval]\nmin_chars = 100\nmax_chars = 10\n");
    let (_, stderr, success) = run_srag(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("min_chars"), "stderr: {}", stderr);
}
