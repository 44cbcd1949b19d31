use std::collections::{BTreeMap, HashMap};

use crate::Error;
use crate::model::{Notice, NoticeKind, Outcome};
use crate::package::{self, XmlPart};
use crate::xml::{self, Splicer};

use super::cellref::CellRef;
use super::model::{Cell, CellValue, Workbook};
use super::sheet::{RowNode, sheet_rows};
use super::{WorkbookParts, XNode, parts, sml};

/// Write the dirty cells of `workbook` into a copy of `base`.
///
/// With no dirty cells the base bytes are returned unchanged. Otherwise only
/// the worksheet parts holding dirty cells, and the shared-strings part when
/// the pool grows, are rewritten.
pub fn apply(workbook: &Workbook, base: &[u8]) -> Result<Outcome<Vec<u8>>, Error> {
    let mut notices = Vec::new();
    if workbook.dirty_cells() == 0 {
        log::debug!("No dirty cells in {}, returning base container", workbook.id);
        return Ok(Outcome {
            value: base.to_vec(),
            notices,
        });
    }

    let mut zip = package::open(base)?;
    let layout = WorkbookParts::locate(&mut zip);
    let sst = match &layout.shared_strings {
        Some(name) => Some(XmlPart::read(&mut zip, name)?),
        None => None,
    };
    let mut pool = StringPool::new(sst.as_ref().map(|p| parts::read_shared_strings(&p.text)));

    let mut replacements = HashMap::new();
    for sheet in &workbook.sheets {
        let dirty: BTreeMap<CellRef, &Cell> = sheet
            .cells
            .values()
            .filter(|c| c.dirty)
            .map(|c| (c.reference, c))
            .collect();
        if dirty.is_empty() {
            continue;
        }
        let part = match XmlPart::read(&mut zip, &sheet.part_name) {
            Ok(part) => part,
            Err(Error::MissingPart(_)) => {
                log::warn!("Sheet '{}' part {} is missing, edits skipped", sheet.name, sheet.part_name);
                notices.push(Notice::new(
                    NoticeKind::SkippedSheet,
                    format!("sheet '{}' part {} is missing; its edits were skipped", sheet.name, sheet.part_name),
                ));
                continue;
            }
            Err(e) => return Err(e),
        };
        let xml = roxmltree::Document::parse(&part.text)?;
        match patch_sheet(&part.text, xml.root_element(), &dirty, &mut pool) {
            Some(text) => {
                log::debug!("Rewrote {} dirty cells in {}", dirty.len(), part.name);
                replacements.insert(part.name.clone(), part.into_bytes_with(text));
            }
            None => notices.push(Notice::new(
                NoticeKind::SkippedSheet,
                format!("sheet '{}' has no sheetData; its edits were skipped", sheet.name),
            )),
        }
    }

    if let Some(sst) = &sst
        && !pool.added.is_empty()
    {
        let xml = roxmltree::Document::parse(&sst.text)?;
        let text = grow_shared_strings(&sst.text, xml.root_element(), &pool.added);
        log::debug!("Appended {} shared strings to {}", pool.added.len(), sst.name);
        replacements.insert(sst.name.clone(), sst.into_bytes_with(text));
    }

    if replacements.is_empty() {
        return Ok(Outcome {
            value: base.to_vec(),
            notices,
        });
    }
    Ok(Outcome {
        value: package::rewrite(base, &replacements)?,
        notices,
    })
}

/// Shared-string pool as found in the base container, growing by append.
/// `None` means the package has no pool and strings are written inline.
struct StringPool {
    index: Option<HashMap<String, usize>>,
    len: usize,
    added: Vec<String>,
}

impl StringPool {
    fn new(existing: Option<Vec<super::SharedString>>) -> Self {
        let len = existing.as_ref().map_or(0, Vec::len);
        let index = existing.map(|strings| {
            let mut index = HashMap::new();
            for ss in strings {
                index.entry(ss.text).or_insert(ss.index);
            }
            index
        });
        StringPool {
            index,
            len,
            added: Vec::new(),
        }
    }

    /// Index for `text`, appending it when no entry matches.
    fn index_of(&mut self, text: &str) -> Option<usize> {
        let index = self.index.as_mut()?;
        if let Some(&i) = index.get(text) {
            return Some(i);
        }
        let i = self.len + self.added.len();
        index.insert(text.to_string(), i);
        self.added.push(text.to_string());
        Some(i)
    }
}

fn prefix_of(source: &str, node: XNode) -> String {
    match xml::qualified_name(source, node).split_once(':') {
        Some((prefix, _)) => format!("{prefix}:"),
        None => String::new(),
    }
}

fn patch_sheet(
    source: &str,
    root: XNode,
    dirty: &BTreeMap<CellRef, &Cell>,
    pool: &mut StringPool,
) -> Option<String> {
    let sheet_data = sml(root, "sheetData")?;
    let prefix = prefix_of(source, root);
    let rows = sheet_rows(sheet_data);
    let mut splicer = Splicer::new(source);

    let mut existing = HashMap::new();
    for row in &rows {
        for c in &row.cells {
            existing.insert(c.reference, c.node);
        }
    }

    let mut new_rows: BTreeMap<u32, Vec<&Cell>> = BTreeMap::new();
    for (reference, cell) in dirty {
        match existing.get(reference) {
            Some(&node) => {
                let markup = cell_markup(source, Some(node), cell, pool, &prefix);
                splicer.replace(node.range(), markup);
            }
            None if cell.value.is_empty() => {}
            None => new_rows.entry(reference.row).or_default().push(*cell),
        }
    }

    let mut sheet_tail = String::new();
    for (row_num, cells) in new_rows {
        match rows.iter().find(|r| r.row == row_num) {
            Some(row) => insert_into_row(&mut splicer, source, row, &cells, pool, &prefix),
            None => {
                let mut markup = format!("<{prefix}row r=\"{row_num}\">");
                for cell in &cells {
                    markup.push_str(&cell_markup(source, None, cell, pool, &prefix));
                }
                markup.push_str(&format!("</{prefix}row>"));
                match rows.iter().find(|r| r.row > row_num) {
                    Some(next) => splicer.insert(next.node.range().start, &markup),
                    None => sheet_tail.push_str(&markup),
                }
            }
        }
    }
    if !sheet_tail.is_empty() {
        splicer.append_child(sheet_data, &sheet_tail);
    }
    Some(splicer.apply())
}

fn insert_into_row(
    splicer: &mut Splicer,
    source: &str,
    row: &RowNode,
    cells: &[&Cell],
    pool: &mut StringPool,
    prefix: &str,
) {
    let mut tail = String::new();
    for cell in cells {
        let markup = cell_markup(source, None, cell, pool, prefix);
        match row.cells.iter().find(|c| c.reference.col > cell.col) {
            Some(next) => splicer.insert(next.node.range().start, &markup),
            None => tail.push_str(&markup),
        }
    }
    if !tail.is_empty() {
        splicer.append_child(row.node, &tail);
    }
}

/// Markup for a dirty cell. An existing cell keeps its attributes other
/// than `t`, and its formula element only while the tree still has one.
fn cell_markup(
    source: &str,
    existing: Option<XNode>,
    cell: &Cell,
    pool: &mut StringPool,
    prefix: &str,
) -> String {
    let mut attrs = String::new();
    match existing {
        Some(node) => {
            for (name, value) in xml::raw_attributes(source, node) {
                if name != "t" {
                    attrs.push_str(&format!(" {name}=\"{value}\""));
                }
            }
        }
        None => {
            attrs.push_str(&format!(" r=\"{}\"", cell.reference));
            if let Some(s) = cell.style_index {
                attrs.push_str(&format!(" s=\"{s}\""));
            }
        }
    }

    let formula = cell
        .formula
        .as_ref()
        .and(existing)
        .and_then(|node| sml(node, "f"))
        .map(|f| &source[f.range()])
        .unwrap_or("");

    let (t, body) = match &cell.value {
        CellValue::Empty => (None, String::new()),
        CellValue::Number(n) if n.is_finite() => (None, format!("<{prefix}v>{n}</{prefix}v>")),
        CellValue::Number(_) => (Some("e"), format!("<{prefix}v>#NUM!</{prefix}v>")),
        CellValue::Boolean(b) => (Some("b"), format!("<{prefix}v>{}</{prefix}v>", u8::from(*b))),
        CellValue::Error(e) => (Some("e"), format!("<{prefix}v>{}</{prefix}v>", xml::escape_text(e))),
        CellValue::Text(s) => match pool.index_of(s) {
            Some(i) => (Some("s"), format!("<{prefix}v>{i}</{prefix}v>")),
            None => {
                let space = if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
                    " xml:space=\"preserve\""
                } else {
                    ""
                };
                (
                    Some("inlineStr"),
                    format!("<{prefix}is><{prefix}t{space}>{}</{prefix}t></{prefix}is>", xml::escape_text(s)),
                )
            }
        },
    };
    if let Some(t) = t {
        attrs.push_str(&format!(" t=\"{t}\""));
    }

    if formula.is_empty() && body.is_empty() {
        format!("<{prefix}c{attrs}/>")
    } else {
        format!("<{prefix}c{attrs}>{formula}{body}</{prefix}c>")
    }
}

fn grow_shared_strings(source: &str, root: XNode, added: &[String]) -> String {
    let bump = |attr: &str| {
        let current: usize = root.attribute(attr).and_then(|v| v.parse().ok()).unwrap_or(0);
        (current + added.len()).to_string()
    };
    let prefix = prefix_of(source, root);
    let mut splicer = Splicer::new(source);
    splicer.set_plain_attribute(root, "count", &bump("count"));
    splicer.set_plain_attribute(root, "uniqueCount", &bump("uniqueCount"));
    let mut items = String::new();
    for text in added {
        let space = if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
            " xml:space=\"preserve\""
        } else {
            ""
        };
        items.push_str(&format!(
            "<{prefix}si><{prefix}t{space}>{}</{prefix}t></{prefix}si>",
            xml::escape_text(text)
        ));
    }
    splicer.append_child(root, &items);
    splicer.apply()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:x14ac="http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac" mc:Ignorable="x14ac"><sheetData><row r="2" spans="1:3"><c r="A2"><v>1</v></c><c r="B2" s="4"><f>A2*2</f><v>2</v></c><c r="D2"><v>9</v></c></row></sheetData></worksheet>"#;

    fn dirty(reference: &str, value: CellValue) -> Cell {
        let mut cell = Cell::new("sheet-0", reference.parse().unwrap());
        cell.value = value;
        cell.dirty = true;
        cell
    }

    fn patch(cells: &[Cell], pool: &mut StringPool) -> String {
        let doc = roxmltree::Document::parse(SHEET).unwrap();
        let map: BTreeMap<CellRef, &Cell> = cells.iter().map(|c| (c.reference, c)).collect();
        patch_sheet(SHEET, doc.root_element(), &map, pool).unwrap()
    }

    #[test]
    fn literal_write_drops_formula_keeps_style() {
        let out = patch(&[dirty("B2", CellValue::Number(42.0))], &mut StringPool::new(None));
        assert!(out.contains(r#"<c r="B2" s="4"><v>42</v></c>"#), "{out}");
        assert!(out.contains(r#"xmlns:x14ac="http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac" mc:Ignorable="x14ac""#));
        assert!(out.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
    }

    #[test]
    fn new_cells_and_rows_land_in_order() {
        let cells = [
            dirty("A1", CellValue::Boolean(true)),
            dirty("C2", CellValue::Text("mid".into())),
            dirty("E2", CellValue::Number(0.5)),
            dirty("A5", CellValue::Text(" pad".into())),
        ];
        let out = patch(&cells, &mut StringPool::new(None));
        let a1 = out.find(r#"<row r="1"><c r="A1" t="b"><v>1</v></c></row>"#).unwrap();
        let row2 = out.find(r#"<row r="2""#).unwrap();
        assert!(a1 < row2);
        let b2 = out.find(r#"r="B2""#).unwrap();
        let c2 = out.find(r#"<c r="C2" t="inlineStr"><is><t>mid</t></is></c>"#).unwrap();
        let d2 = out.find(r#"r="D2""#).unwrap();
        let e2 = out.find(r#"<c r="E2"><v>0.5</v></c>"#).unwrap();
        assert!(b2 < c2 && c2 < d2 && d2 < e2);
        assert!(out.contains(r#"<row r="5"><c r="A5" t="inlineStr"><is><t xml:space="preserve"> pad</t></is></c></row></sheetData>"#));
        roxmltree::Document::parse(&out).unwrap();
    }

    #[test]
    fn pool_reuses_and_appends() {
        let mut pool = StringPool::new(Some(vec![
            super::super::SharedString { index: 0, text: "a".into(), rich_text: false },
            super::super::SharedString { index: 1, text: "b".into(), rich_text: false },
        ]));
        assert_eq!(pool.index_of("b"), Some(1));
        assert_eq!(pool.index_of("new"), Some(2));
        assert_eq!(pool.index_of("new"), Some(2));
        assert_eq!(pool.added, ["new"]);
    }

    #[test]
    fn shared_strings_grow_with_counts() {
        let src = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="2"><si><t>a</t></si></sst>"#;
        let doc = roxmltree::Document::parse(src).unwrap();
        let out = grow_shared_strings(src, doc.root_element(), &["x & y".to_string()]);
        assert_eq!(
            out,
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="3"><si><t>a</t></si><si><t>x &amp; y</t></si></sst>"#
        );
    }

    #[test]
    fn clearing_a_cell_removes_its_value() {
        let out = patch(&[dirty("A2", CellValue::Empty)], &mut StringPool::new(None));
        assert!(out.contains(r#"<c r="A2"/>"#));
    }
}
