//! Structural snapshots taken on either side of a parse or export, and the
//! drift between them.
//!
//! Nothing here fails an operation. Issues carry a severity and the caller
//! decides what blocks.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::Error;
use crate::address::Address;
use crate::docx::{self, walk};
use crate::model::{Block, InlineContent, StructuredDocument};
use crate::xlsx::Workbook;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RawContainer,
    ParsedDocument,
    ExportedContainer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::RawContainer => "raw_container",
            Stage::ParsedDocument => "parsed_document",
            Stage::ExportedContainer => "exported_container",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub stage: Stage,
    pub chars: usize,
    pub paragraphs: usize,
    pub tables: usize,
    pub rows: usize,
    pub cells: usize,
    pub runs: usize,
    pub checkboxes: usize,
    pub dropdowns: usize,
    /// Non-empty run texts in document order.
    #[serde(skip)]
    pub texts: Vec<String>,
}

impl Snapshot {
    fn empty(stage: Stage) -> Self {
        Snapshot {
            stage,
            chars: 0,
            paragraphs: 0,
            tables: 0,
            rows: 0,
            cells: 0,
            runs: 0,
            checkboxes: 0,
            dropdowns: 0,
            texts: Vec::new(),
        }
    }

    fn has_controls(&self) -> bool {
        self.checkboxes + self.dropdowns > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// `before -> after` stage pair, or the check that raised it.
    pub stage: String,
    pub severity: Severity,
    pub category: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub document_id: String,
    pub stages: Vec<Snapshot>,
    pub issues: Vec<Issue>,
}

impl Report {
    pub fn new(document_id: &str) -> Self {
        Report {
            document_id: document_id.to_string(),
            stages: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    pub fn worst(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}

/// Counts taken straight from the main part's XML.
pub fn snapshot_container(bytes: &[u8], stage: Stage) -> Result<Snapshot, Error> {
    let part = docx::read_main_part(bytes)?;
    let xml = roxmltree::Document::parse(&part.text)?;
    let Ok(body) = docx::find_body(&xml) else {
        return Ok(Snapshot::empty(stage));
    };

    let mut snap = Snapshot::empty(stage);
    for node in body.descendants().filter(|n| n.is_element()) {
        if node.tag_name().namespace() != Some(docx::WML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "p" => snap.paragraphs += 1,
            "tbl" => snap.tables += 1,
            "tr" => snap.rows += 1,
            "tc" => snap.cells += 1,
            "r" => {
                snap.runs += 1;
                let text = walk::run_text(node);
                if !text.is_empty() {
                    snap.chars += text.chars().count();
                    snap.texts.push(text);
                }
            }
            "sdt" => match walk::classify(node) {
                walk::SdtKind::Checkbox => snap.checkboxes += 1,
                walk::SdtKind::Dropdown => snap.dropdowns += 1,
                walk::SdtKind::Plain => {}
            },
            _ => {}
        }
    }
    Ok(snap)
}

/// Counts over a parsed tree. Synthesized control paragraphs have no
/// counterpart in the XML and are left out.
pub fn snapshot_document(doc: &StructuredDocument, stage: Stage) -> Snapshot {
    let mut snap = Snapshot::empty(stage);
    count_blocks(&doc.blocks, &mut snap);
    snap.checkboxes = doc.checkboxes.len();
    snap.dropdowns = doc.dropdowns.len();
    snap
}

fn count_blocks(blocks: &[Block], snap: &mut Snapshot) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                if p.synthetic {
                    continue;
                }
                snap.paragraphs += 1;
                for item in &p.content {
                    if let InlineContent::TextRun(run) = item {
                        snap.runs += 1;
                        if !run.text.is_empty() {
                            snap.chars += run.text.chars().count();
                            snap.texts.push(run.text.clone());
                        }
                    }
                }
            }
            Block::Table(t) => {
                snap.tables += 1;
                for row in &t.rows {
                    snap.rows += 1;
                    for cell in &row.cells {
                        snap.cells += 1;
                        count_blocks(&cell.blocks, snap);
                    }
                }
            }
            Block::Drawing(_) => {}
        }
    }
}

fn multiset(texts: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for t in texts {
        *counts.entry(t.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Elements of `a` not matched one-for-one in `b`.
fn surplus(a: &HashMap<&str, usize>, b: &HashMap<&str, usize>) -> usize {
    a.iter()
        .map(|(text, &n)| n.saturating_sub(b.get(text).copied().unwrap_or(0)))
        .sum()
}

pub fn compare(before: &Snapshot, after: &Snapshot) -> Vec<Issue> {
    let stage = format!("{} -> {}", before.stage, after.stage);
    let mut issues = Vec::new();
    let mut push = |severity, category, message: String| {
        issues.push(Issue {
            stage: stage.clone(),
            severity,
            category,
            message,
        })
    };
    let controls = before.has_controls();

    if before.chars != after.chars {
        let diff = after.chars as i64 - before.chars as i64;
        let severity = if controls && diff < 0 {
            // Control glyphs and selections are state now, not run text.
            let allowance = (before.checkboxes + before.dropdowns * 10) * 3;
            if diff.unsigned_abs() as usize <= allowance {
                Severity::Info
            } else {
                Severity::Warning
            }
        } else if diff.abs() > 10 {
            Severity::Error
        } else {
            Severity::Warning
        };
        push(
            severity,
            "char_count",
            format!("character count changed: {} -> {} ({diff:+})", before.chars, after.chars),
        );
    }

    if before.paragraphs != after.paragraphs {
        push(
            Severity::Warning,
            "structure",
            format!("paragraph count changed: {} -> {}", before.paragraphs, after.paragraphs),
        );
    }
    for (what, b, a) in [
        ("table", before.tables, after.tables),
        ("row", before.rows, after.rows),
        ("cell", before.cells, after.cells),
    ] {
        if b != a {
            push(Severity::Error, "structure", format!("{what} count changed: {b} -> {a}"));
        }
    }
    if before.runs != after.runs {
        push(
            Severity::Warning,
            "structure",
            format!("run count changed: {} -> {}", before.runs, after.runs),
        );
    }
    for (what, b, a) in [
        ("checkbox", before.checkboxes, after.checkboxes),
        ("dropdown", before.dropdowns, after.dropdowns),
    ] {
        if a < b {
            push(Severity::Error, "controls", format!("{what} count dropped: {b} -> {a}"));
        } else if a > b {
            push(Severity::Warning, "controls", format!("{what} count grew: {b} -> {a}"));
        }
    }

    let (b, a) = (multiset(&before.texts), multiset(&after.texts));
    let missing = surplus(&b, &a);
    if missing > 0 {
        let severity = if !controls {
            Severity::Error
        } else if missing <= (before.checkboxes + before.dropdowns) * 2 {
            Severity::Info
        } else {
            Severity::Warning
        };
        push(severity, "missing_text", format!("{missing} text elements missing"));
    }
    let extra = surplus(&a, &b);
    if extra > 0 {
        push(Severity::Error, "extra_text", format!("{extra} text elements added"));
    }
    issues
}

/// Ids must be unique and addresses non-empty across the whole tree.
pub fn validate_document(doc: &StructuredDocument) -> Vec<Issue> {
    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    visit(&doc.blocks, &mut |id: &str, address: &Address| {
        if !seen.insert(id.to_string()) {
            issues.push(structure_issue(format!("duplicate id {id}")));
        }
        if address.is_empty() {
            issues.push(structure_issue(format!("{id} has an empty address")));
        }
    });
    let controls = doc
        .checkboxes
        .iter()
        .map(|c| (&c.id, &c.address))
        .chain(doc.dropdowns.iter().map(|d| (&d.id, &d.address)));
    for (id, address) in controls {
        if address.is_empty() {
            issues.push(structure_issue(format!("{id} has an empty address")));
        }
    }
    issues
}

fn structure_issue(message: String) -> Issue {
    Issue {
        stage: "document".into(),
        severity: Severity::Error,
        category: "identity",
        message,
    }
}

fn visit(blocks: &[Block], check: &mut impl FnMut(&str, &Address)) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                check(&p.id, &p.address);
                for item in &p.content {
                    match item {
                        InlineContent::TextRun(r) => check(&r.id, &r.address),
                        // Inline controls share their id with the legacy lists.
                        InlineContent::Checkbox(_) | InlineContent::Dropdown(_) => {}
                    }
                }
            }
            Block::Table(t) => {
                check(&t.id, &t.address);
                for row in &t.rows {
                    check(&row.id, &row.address);
                    for cell in &row.cells {
                        check(&cell.id, &cell.address);
                        visit(&cell.blocks, check);
                    }
                }
            }
            Block::Drawing(d) => check(&d.id, &d.address),
        }
    }
}

/// Every parsed address must resolve, in `bytes`, to the element kind it
/// names, and every run address to a run holding the parsed text.
pub fn check_addresses(doc: &StructuredDocument, bytes: &[u8]) -> Result<Vec<Issue>, Error> {
    let mut expected: Vec<(Address, &'static str, Option<&str>)> = Vec::new();
    collect_expected(&doc.blocks, &mut expected);
    let addresses: Vec<Address> = expected.iter().map(|(a, _, _)| a.clone()).collect();
    let located = docx::locate(bytes, &addresses)?;

    let mut issues = Vec::new();
    for ((address, tag, text), found) in expected.iter().zip(located) {
        let problem = match found {
            None => Some(format!("{address} does not resolve")),
            Some(found) if found.tag != *tag => {
                Some(format!("{address} resolves to <{}>, expected <{tag}>", found.tag))
            }
            Some(found) => text
                .filter(|t| *t != found.text)
                .map(|t| format!("{address} holds {:?}, parsed as {t:?}", found.text)),
        };
        if let Some(message) = problem {
            issues.push(Issue {
                stage: "addresses".into(),
                severity: Severity::Error,
                category: "address",
                message,
            });
        }
    }
    Ok(issues)
}

fn collect_expected<'d>(blocks: &'d [Block], out: &mut Vec<(Address, &'static str, Option<&'d str>)>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                let tag = if p.synthetic { "sdt" } else { "p" };
                out.push((p.address.clone(), tag, None));
                for run in p.text_runs() {
                    out.push((run.address.clone(), "r", Some(&run.text)));
                }
            }
            Block::Table(t) => {
                out.push((t.address.clone(), "tbl", None));
                for row in &t.rows {
                    out.push((row.address.clone(), "tr", None));
                    for cell in &row.cells {
                        out.push((cell.address.clone(), "tc", None));
                        collect_expected(&cell.blocks, out);
                    }
                }
            }
            Block::Drawing(_) => {}
        }
    }
}

/// Raw container against the tree parsed from it, plus address and
/// identity checks on the tree.
pub fn validate_parse(bytes: &[u8], doc: &StructuredDocument) -> Result<Report, Error> {
    let mut report = Report::new(&doc.id);
    let raw = snapshot_container(bytes, Stage::RawContainer)?;
    let parsed = snapshot_document(doc, Stage::ParsedDocument);
    report.issues.extend(compare(&raw, &parsed));
    report.issues.extend(validate_document(doc));
    report.issues.extend(check_addresses(doc, bytes)?);
    report.stages.extend([raw, parsed]);
    Ok(report)
}

/// Full cycle: base container, parsed tree and exported container.
pub fn validate_roundtrip(
    base: &[u8],
    doc: &StructuredDocument,
    exported: &[u8],
) -> Result<Report, Error> {
    let mut report = Report::new(&doc.id);
    let raw = snapshot_container(base, Stage::RawContainer)?;
    let parsed = snapshot_document(doc, Stage::ParsedDocument);
    let out = snapshot_container(exported, Stage::ExportedContainer)?;
    report.issues.extend(compare(&raw, &parsed));
    report.issues.extend(compare(&raw, &out));
    report.stages.extend([raw, parsed, out]);
    log::debug!(
        "Fidelity for {}: {} issues, worst {:?}",
        doc.id,
        report.issues.len(),
        report.worst()
    );
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkbookSnapshot {
    pub sheets: usize,
    pub cells: usize,
    pub formulas: usize,
    pub merged_ranges: usize,
    pub validations: usize,
    pub form_controls: usize,
    /// Non-empty text values in sheet and cell order.
    #[serde(skip)]
    pub texts: Vec<String>,
}

pub fn snapshot_workbook(workbook: &Workbook) -> WorkbookSnapshot {
    let sheets = &workbook.sheets;
    WorkbookSnapshot {
        sheets: sheets.len(),
        cells: sheets.iter().map(|s| s.cells.len()).sum(),
        formulas: sheets
            .iter()
            .flat_map(|s| s.cells.values())
            .filter(|c| c.formula.is_some())
            .count(),
        merged_ranges: sheets.iter().map(|s| s.merged_ranges.len()).sum(),
        validations: sheets.iter().map(|s| s.validations.len()).sum(),
        form_controls: sheets.iter().map(|s| s.form_controls.len()).sum(),
        texts: sheets
            .iter()
            .flat_map(|s| s.cells.values())
            .filter_map(|c| match &c.value {
                crate::xlsx::CellValue::Text(t) if !t.is_empty() => Some(t.clone()),
                _ => None,
            })
            .collect(),
    }
}

/// Workbook drift. Anything lost is an error; formulas cleared by edits
/// show up as a warning.
pub fn compare_workbooks(before: &WorkbookSnapshot, after: &WorkbookSnapshot) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut push = |severity, category, message: String| {
        issues.push(Issue {
            stage: "workbook".into(),
            severity,
            category,
            message,
        })
    };
    for (what, b, a) in [
        ("sheet", before.sheets, after.sheets),
        ("cell", before.cells, after.cells),
        ("merged range", before.merged_ranges, after.merged_ranges),
        ("validation", before.validations, after.validations),
        ("form control", before.form_controls, after.form_controls),
    ] {
        if a < b {
            push(Severity::Error, "structure", format!("{what} count dropped: {b} -> {a}"));
        } else if a > b {
            push(Severity::Info, "structure", format!("{what} count grew: {b} -> {a}"));
        }
    }
    if after.formulas < before.formulas {
        push(
            Severity::Warning,
            "formula",
            format!("formula count dropped: {} -> {}", before.formulas, after.formulas),
        );
    }
    let missing = surplus(&multiset(&before.texts), &multiset(&after.texts));
    if missing > 0 {
        push(Severity::Warning, "missing_text", format!("{missing} text values changed or removed"));
    }
    issues
}
