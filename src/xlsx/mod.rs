mod cellref;
mod model;
mod parts;
mod sheet;
mod styles;
mod writer;

use crate::Error;
use crate::model::{Notice, NoticeKind, Outcome};
use crate::package;

pub use cellref::{CellRange, CellRef, col_index, col_letters, parse_sqref};
pub use model::*;
pub use styles::{Alignment, Border, BorderSide, CellFormat, CellStyle, Fill, Font, StyleTables};
pub use writer::apply;

pub(crate) const SML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const SML_STRICT_NS: &str = "http://purl.oclc.org/ooxml/spreadsheetml/main";

const SHARED_STRINGS_REL: &str = "/sharedStrings";
const STYLES_REL: &str = "/styles";

pub(crate) type XNode<'a> = roxmltree::Node<'a, 'a>;

pub(crate) fn is_sml(node: XNode, name: &str) -> bool {
    node.tag_name().name() == name
        && matches!(node.tag_name().namespace(), Some(SML_NS | SML_STRICT_NS))
}

pub(crate) fn sml<'a>(node: XNode<'a>, name: &str) -> Option<XNode<'a>> {
    node.children().find(|n| is_sml(*n, name))
}

pub(crate) fn sml_children<'a>(node: XNode<'a>, name: &str) -> impl Iterator<Item = XNode<'a>> {
    node.children().filter(move |n| is_sml(*n, name))
}

/// Package locations of the workbook-level parts.
pub(crate) struct WorkbookParts {
    pub(crate) workbook: String,
    pub(crate) rels: std::collections::HashMap<String, package::Relationship>,
    pub(crate) shared_strings: Option<String>,
    pub(crate) styles: Option<String>,
}

impl WorkbookParts {
    pub(crate) fn locate(zip: &mut package::Archive) -> Self {
        let workbook = package::main_part(zip, "xl/workbook.xml");
        let rels = package::part_relationships(zip, &workbook);
        let find = |suffix: &str, fallback: &str| {
            rels.values()
                .find(|r| r.kind.ends_with(suffix) && !r.external)
                .map(|r| package::resolve_target(&workbook, &r.target))
                .unwrap_or_else(|| fallback.to_string())
        };
        let shared_strings = Some(find(SHARED_STRINGS_REL, "xl/sharedStrings.xml"))
            .filter(|name| package::has_part(&*zip, name));
        let styles = Some(find(STYLES_REL, "xl/styles.xml")).filter(|name| package::has_part(&*zip, name));
        WorkbookParts {
            workbook,
            rels,
            shared_strings,
            styles,
        }
    }

    /// Worksheet part a `<sheet r:id>` points at.
    pub(crate) fn sheet_part(&self, rel_id: &str) -> Option<String> {
        self.rels
            .get(rel_id)
            .filter(|r| !r.external)
            .map(|r| package::resolve_target(&self.workbook, &r.target))
    }
}

/// Parse a spreadsheet container into a workbook tree.
///
/// Sheets whose part cannot be found or read are left out and reported as
/// [`NoticeKind::SkippedSheet`].
pub fn parse(bytes: &[u8], id: &str) -> Result<Outcome<Workbook>, Error> {
    let mut zip = package::open(bytes)?;
    let layout = WorkbookParts::locate(&mut zip);
    let workbook_xml = package::read_zip_text(&mut zip, &layout.workbook).ok_or_else(|| {
        Error::MissingPart(format!("{} (is this an XLSX file?)", layout.workbook))
    })?;
    let workbook_doc = roxmltree::Document::parse(&workbook_xml)?;
    let info = parts::read_workbook(workbook_doc.root_element());

    let shared_strings = layout
        .shared_strings
        .as_deref()
        .and_then(|name| package::read_zip_text(&mut zip, name))
        .map(|xml| parts::read_shared_strings(&xml))
        .unwrap_or_default();
    let styles = layout
        .styles
        .as_deref()
        .and_then(|name| package::read_zip_text(&mut zip, name))
        .map(|xml| styles::parse_styles(&xml))
        .unwrap_or_default();
    let properties = package::read_zip_text(&mut zip, "docProps/core.xml")
        .map(|xml| parts::read_properties(&xml))
        .unwrap_or_default();

    let mut notices = Vec::new();
    let mut sheets = Vec::new();
    for (index, entry) in info.sheets.iter().enumerate() {
        let sheet_id = format!("sheet-{index}");
        let part = layout
            .sheet_part(&entry.rel_id)
            .filter(|name| package::has_part(&zip, name));
        let Some(part) = part else {
            log::warn!("Sheet '{}' has no worksheet part, skipping", entry.name);
            notices.push(Notice::new(
                NoticeKind::SkippedSheet,
                format!("sheet '{}' has no worksheet part", entry.name),
            ));
            continue;
        };
        let Some(xml) = package::read_zip_text(&mut zip, &part) else {
            notices.push(Notice::new(
                NoticeKind::SkippedSheet,
                format!("sheet '{}' part {part} is unreadable", entry.name),
            ));
            continue;
        };
        let doc = match roxmltree::Document::parse(&xml) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Sheet '{}' ({}) is not well-formed: {}", entry.name, part, e);
                notices.push(Notice::new(
                    NoticeKind::SkippedSheet,
                    format!("sheet '{}' part {part} is not well-formed: {e}", entry.name),
                ));
                continue;
            }
        };

        let rels = package::part_relationships(&mut zip, &part);
        let source = sheet::SheetSource {
            id: &sheet_id,
            name: &entry.name,
            index,
            part: &part,
            hidden: entry.hidden,
            shared_strings: &shared_strings,
            styles: &styles,
            rels: &rels,
        };
        let mut sheet = sheet::parse_sheet(doc.root_element(), &source);
        parts::attach_related(&mut zip, &source, &mut sheet);
        log::debug!(
            "Parsed sheet '{}' ({}): {} cells, {} merges, {} validations, {} form controls",
            sheet.name,
            part,
            sheet.cells.len(),
            sheet.merged_ranges.len(),
            sheet.validations.len(),
            sheet.form_controls.len()
        );
        sheets.push(sheet);
    }

    let active_sheet_index = info.active_tab.min(info.sheets.len().saturating_sub(1));
    Ok(Outcome {
        value: Workbook {
            id: id.to_string(),
            sheets,
            active_sheet_index,
            shared_strings,
            defined_names: info.defined_names,
            styles,
            properties,
        },
        notices,
    })
}
