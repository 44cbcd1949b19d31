mod address;
pub mod docx;
pub mod edit;
mod error;
pub mod fidelity;
mod model;
mod package;
pub mod xlsx;
mod xml;

pub use address::{Address, AddressParseError, Step, StepKind};
pub use error::Error;
pub use model::*;

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::xlsx::Workbook;

/// Which kind of office package a container holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    WordProcessing,
    Spreadsheet,
}

/// Tell a word-processing package from a spreadsheet by its main part.
pub fn detect_kind(bytes: &[u8]) -> Result<ContainerKind, Error> {
    let mut zip = package::open(bytes)?;
    let main = package::main_part(&mut zip, "");
    if main.starts_with("xl/") || (main.is_empty() && package::has_part(&zip, "xl/workbook.xml")) {
        return Ok(ContainerKind::Spreadsheet);
    }
    if main.starts_with("word/") || (main.is_empty() && package::has_part(&zip, "word/document.xml"))
    {
        return Ok(ContainerKind::WordProcessing);
    }
    Err(Error::MissingPart(
        "word/document.xml or xl/workbook.xml (not a DOCX or XLSX package)".into(),
    ))
}

/// A parsed tree of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Parsed {
    Document(StructuredDocument),
    Workbook(Workbook),
}

impl Parsed {
    pub fn kind(&self) -> ContainerKind {
        match self {
            Parsed::Document(_) => ContainerKind::WordProcessing,
            Parsed::Workbook(_) => ContainerKind::Spreadsheet,
        }
    }
}

fn ms(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Parse a container of the given kind.
pub fn parse_as(bytes: &[u8], id: &str, kind: ContainerKind) -> Result<Outcome<Parsed>, Error> {
    let t0 = Instant::now();
    let (value, notices) = match kind {
        ContainerKind::WordProcessing => {
            let out = docx::parse(bytes, id)?;
            (Parsed::Document(out.value), out.notices)
        }
        ContainerKind::Spreadsheet => {
            let out = xlsx::parse(bytes, id)?;
            (Parsed::Workbook(out.value), out.notices)
        }
    };
    log::info!(
        "Timing: parse={:.1}ms ({} bytes, {} notices)",
        ms(t0.elapsed()),
        bytes.len(),
        notices.len()
    );
    Ok(Outcome { value, notices })
}

/// Parse a container, detecting its kind first.
pub fn parse(bytes: &[u8], id: &str) -> Result<Outcome<Parsed>, Error> {
    parse_as(bytes, id, detect_kind(bytes)?)
}

/// Write a tree back over the container it was parsed from.
pub fn export(parsed: &Parsed, base: &[u8]) -> Result<Outcome<Vec<u8>>, Error> {
    let t0 = Instant::now();
    let out = match parsed {
        Parsed::Document(doc) => docx::apply(doc, base)?,
        Parsed::Workbook(workbook) => xlsx::apply(workbook, base)?,
    };
    log::info!(
        "Timing: export={:.1}ms (output {} bytes, {} notices)",
        ms(t0.elapsed()),
        out.value.len(),
        out.notices.len()
    );
    Ok(out)
}

/// Parse, export without edits and compare the stages.
///
/// For word-processing packages the report covers raw, parsed and exported
/// snapshots plus the address checks; for spreadsheets it compares the
/// workbook parsed before and after the export.
pub fn validate(bytes: &[u8], id: &str) -> Result<fidelity::Report, Error> {
    let t0 = Instant::now();
    let parsed = parse(bytes, id)?.value;
    let t_parse = t0.elapsed();
    let exported = export(&parsed, bytes)?.value;
    let t_export = t0.elapsed();

    let report = match &parsed {
        Parsed::Document(doc) => {
            let mut report = fidelity::validate_roundtrip(bytes, doc, &exported)?;
            report.issues.extend(fidelity::validate_document(doc));
            report.issues.extend(fidelity::check_addresses(doc, &exported)?);
            report
        }
        Parsed::Workbook(before) => {
            let after = xlsx::parse(&exported, id)?.value;
            let mut report = fidelity::Report::new(id);
            report.issues = fidelity::compare_workbooks(
                &fidelity::snapshot_workbook(before),
                &fidelity::snapshot_workbook(&after),
            );
            report
        }
    };
    log::info!(
        "Timing: parse={:.1}ms, export={:.1}ms, validate={:.1}ms ({} issues)",
        ms(t_parse),
        ms(t_export - t_parse),
        ms(t0.elapsed() - t_export),
        report.issues.len()
    );
    Ok(report)
}
