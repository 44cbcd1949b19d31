mod common;

use common::{SheetXml, checkbox_sdt, docx, dropdown_sdt, para, xlsx};
use ooxml_roundtrip::fidelity::{self, Severity, Stage};
use ooxml_roundtrip::xlsx::CellValue;
use ooxml_roundtrip::{Block, ContainerKind, InlineContent, docx as wp, edit};

fn plain() -> Vec<u8> {
    let body = format!(
        "{}<w:p><w:r><w:t>Bold</w:t></w:r><w:hyperlink r:id=\"rId9\"><w:r><w:t xml:space=\"preserve\"> link &amp; more</w:t></w:r></w:hyperlink></w:p><w:tbl><w:tr><w:tc>{}</w:tc><w:tc>{}</w:tc></w:tr></w:tbl>",
        para("Intro"),
        para("A"),
        para("B"),
    );
    docx(&body)
}

fn with_controls() -> Vec<u8> {
    let body = format!(
        "<w:p>{}<w:r><w:t xml:space=\"preserve\"> I accept</w:t></w:r></w:p><w:p>{}</w:p>{}",
        checkbox_sdt(1, false, ""),
        dropdown_sdt(2, &["Red", "Green"], "Red"),
        para("End"),
    );
    docx(&body)
}

#[test]
fn clean_document_validates_without_drift() {
    common::init_logging();
    let bytes = plain();
    assert_eq!(ooxml_roundtrip::detect_kind(&bytes).unwrap(), ContainerKind::WordProcessing);
    let report = ooxml_roundtrip::validate(&bytes, "plain").unwrap();
    assert!(report.issues.is_empty(), "{:?}", report.issues);
    assert_eq!(report.worst(), None);

    let stages: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, [Stage::RawContainer, Stage::ParsedDocument, Stage::ExportedContainer]);
    let raw = &report.stages[0];
    assert_eq!((raw.paragraphs, raw.tables, raw.rows, raw.cells, raw.runs), (4, 1, 1, 2, 5));
    assert_eq!(raw, &report.stages[2]);
}

#[test]
fn control_state_counts_as_info_not_loss() {
    let bytes = with_controls();
    let doc = wp::parse(&bytes, "controls").unwrap().value;
    let report = fidelity::validate_parse(&bytes, &doc).unwrap();
    assert!(!report.has_errors(), "{:?}", report.issues);

    let raw = &report.stages[0];
    assert_eq!((raw.checkboxes, raw.dropdowns), (1, 1));
    let missing = report
        .issues
        .iter()
        .find(|i| i.category == "missing_text")
        .unwrap();
    assert_eq!(missing.severity, Severity::Info);
    let chars = report.issues.iter().find(|i| i.category == "char_count").unwrap();
    assert_eq!(chars.severity, Severity::Info);
}

#[test]
fn addresses_that_drift_are_reported() {
    let bytes = plain();
    let mut doc = wp::parse(&bytes, "plain").unwrap().value;
    assert!(fidelity::check_addresses(&doc, &bytes).unwrap().is_empty());

    let Block::Paragraph(p) = &mut doc.blocks[0] else { panic!() };
    let InlineContent::TextRun(run) = &mut p.content[0] else { panic!() };
    run.address = "p[1]/r[0]".parse().unwrap();
    let Block::Table(table) = &mut doc.blocks[2] else { panic!() };
    table.rows[0].cells[1].address = "tbl[0]/tr[0]/tc[5]".parse().unwrap();

    let issues = fidelity::check_addresses(&doc, &bytes).unwrap();
    assert_eq!(issues.len(), 2, "{issues:?}");
    assert!(issues.iter().all(|i| i.severity == Severity::Error && i.category == "address"));
    assert!(issues[0].message.contains("\"Bold\""));
    assert!(issues[1].message.contains("does not resolve"));
}

#[test]
fn duplicate_ids_are_structural_errors() {
    let bytes = plain();
    let mut doc = wp::parse(&bytes, "plain").unwrap().value;
    let Block::Paragraph(second) = doc.blocks[1].clone() else { panic!() };
    let Block::Paragraph(first) = &mut doc.blocks[0] else { panic!() };
    first.id = second.id;
    let issues = fidelity::validate_document(&doc);
    assert_eq!(issues.len(), 1);
    assert!(issues[0].message.starts_with("duplicate id p:p[1]"));
}

#[test]
fn edited_export_shows_replaced_text() {
    let bytes = plain();
    let mut doc = wp::parse(&bytes, "plain").unwrap().value;
    edit::set_run_text(&mut doc, "r:p[0]/r[0]", "Introduction").unwrap();
    let out = wp::apply(&doc, &bytes).unwrap().value;
    let report = fidelity::validate_roundtrip(&bytes, &doc, &out).unwrap();

    let export: Vec<_> = report
        .issues
        .iter()
        .filter(|i| i.stage == "raw_container -> exported_container")
        .collect();
    let categories: Vec<&str> = export.iter().map(|i| i.category).collect();
    assert_eq!(categories, ["char_count", "missing_text", "extra_text"]);
    assert_eq!(export[0].severity, Severity::Warning);
    assert!(export[1..].iter().all(|i| i.severity == Severity::Error));
}

#[test]
fn workbook_roundtrip_and_losses() {
    let sheet = r#"<sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><f>1+1</f><v>2</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="A2:B2"/></mergeCells>"#;
    let bytes = xlsx(&[SheetXml { name: "S", body: sheet }], Some(&["hello"][..]));
    assert_eq!(ooxml_roundtrip::detect_kind(&bytes).unwrap(), ContainerKind::Spreadsheet);
    let report = ooxml_roundtrip::validate(&bytes, "book").unwrap();
    assert!(report.issues.is_empty(), "{:?}", report.issues);

    let mut wb = ooxml_roundtrip::xlsx::parse(&bytes, "book").unwrap().value;
    let before = fidelity::snapshot_workbook(&wb);
    assert_eq!((before.cells, before.formulas, before.merged_ranges), (2, 1, 1));
    edit::set_cell_value(&mut wb, "S", "B1", CellValue::Number(3.0)).unwrap();
    edit::set_cell_value(&mut wb, "S", "A1", CellValue::Text("bye".into())).unwrap();
    wb.sheets[0].merged_ranges.clear();

    let issues = fidelity::compare_workbooks(&before, &fidelity::snapshot_workbook(&wb));
    let got: Vec<(&str, Severity)> = issues.iter().map(|i| (i.category, i.severity)).collect();
    assert_eq!(
        got,
        [
            ("structure", Severity::Error),
            ("formula", Severity::Warning),
            ("missing_text", Severity::Warning),
        ]
    );
}
