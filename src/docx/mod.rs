mod controls;
mod resolve;
pub(crate) mod walk;
mod writer;

use std::collections::HashMap;

use crate::Error;
use crate::address::{Address, StepKind};
use crate::model::{
    Block, CellBorder, CellBorders, Drawing, DrawingKind, InlineContent, Notice, NoticeKind,
    Outcome, Paragraph, StructuredDocument, Table, TableCell, TableRow, TextRun, VMerge,
};
use crate::package::{self, XmlPart};

pub use writer::apply;

use walk::{BlockNode, CellSlot, InlineNode, SdtKind};

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(crate) const W14_NS: &str = "http://schemas.microsoft.com/office/word/2010/wordml";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const WPD_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const WPG_NS: &str = "http://schemas.microsoft.com/office/word/2010/wordprocessingGroup";
const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

const EMU_PER_INCH: f64 = 914_400.0;

pub(crate) type XNode<'a> = roxmltree::Node<'a, 'a>;

pub(crate) fn is_w(node: XNode, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

pub(crate) fn wml<'a>(node: XNode<'a>, name: &str) -> Option<XNode<'a>> {
    node.children().find(|n| is_w(*n, name))
}

pub(crate) fn wml_attr<'a>(node: XNode<'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

/// Parse a WML boolean toggle element (e.g., w:b, w:i).
/// Present with no val or val != "0"/"false" means true.
pub(crate) fn wml_bool(parent: XNode, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        n.attribute((WML_NS, "val"))
            .is_none_or(|v| v != "0" && v != "false")
    })
}

pub(crate) fn read_main_part(bytes: &[u8]) -> Result<XmlPart, Error> {
    let mut zip = package::open(bytes)?;
    let name = package::main_part(&mut zip, "word/document.xml");
    XmlPart::read(&mut zip, &name).map_err(|e| match e {
        Error::MissingPart(part) => {
            Error::MissingPart(format!("{part} (is this a DOCX file?)"))
        }
        other => other,
    })
}

pub(crate) fn find_body<'a>(xml: &'a roxmltree::Document<'a>) -> Result<XNode<'a>, Error> {
    wml(xml.root_element(), "body").ok_or_else(|| Error::MissingPart("w:body".into()))
}

/// Parse the main document part of a word-processing container.
pub fn parse(bytes: &[u8], id: &str) -> Result<Outcome<StructuredDocument>, Error> {
    let mut zip = package::open(bytes)?;
    let title = package::read_zip_text(&mut zip, "docProps/core.xml").and_then(|xml| core_title(&xml));
    drop(zip);

    let part = read_main_part(bytes)?;
    let xml = roxmltree::Document::parse(&part.text)?;
    let body = find_body(&xml)?;

    let mut parser = Parser::default();
    parser.note_unknown_body_elements(body);
    let mut blocks = Vec::new();
    let root = Address::root();
    let (mut p_idx, mut tbl_idx) = (0, 0);
    for item in walk::body_items(body) {
        match item {
            BlockNode::Paragraph(p) => {
                let addr = root.child(StepKind::Paragraph, p_idx);
                p_idx += 1;
                parser.paragraph_blocks(p, addr, &mut blocks);
            }
            BlockNode::Table(tbl) => {
                let addr = root.child(StepKind::Table, tbl_idx);
                tbl_idx += 1;
                blocks.push(Block::Table(parser.table(tbl, addr)));
            }
            BlockNode::Control(_) => {}
        }
    }
    let (checkboxes, dropdowns) = parser.document_controls(body);

    log::debug!(
        "Parsed {}: {} top-level blocks, {} checkboxes, {} dropdowns",
        part.name,
        blocks.len(),
        checkboxes.len(),
        dropdowns.len()
    );

    Ok(Outcome {
        value: StructuredDocument {
            id: id.to_string(),
            title,
            blocks,
            checkboxes,
            dropdowns,
        },
        notices: parser.notices,
    })
}

fn core_title(xml: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(xml).ok()?;
    doc.descendants()
        .find(|n| n.tag_name().name() == "title" && n.tag_name().namespace() == Some(DC_NS))
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Default)]
struct Parser {
    notices: Vec<Notice>,
    /// Address minted for each paragraph, cell or control node.
    minted: HashMap<roxmltree::NodeId, Address>,
}

impl Parser {
    fn note_unknown_body_elements(&mut self, parent: XNode) {
        for child in parent.children().filter(|n| n.is_element()) {
            if child.tag_name().namespace() == Some(WML_NS) {
                match child.tag_name().name() {
                    "p" | "tbl" | "sectPr" | "bookmarkStart" | "bookmarkEnd" | "proofErr"
                    | "permStart" | "permEnd" | "sdtPr" | "sdtEndPr" => continue,
                    "sdt" => {
                        if let Some(content) = wml(child, "sdtContent") {
                            self.note_unknown_body_elements(content);
                        }
                        continue;
                    }
                    _ => {}
                }
            }
            let name = child.tag_name().name();
            log::debug!("Skipping unsupported body element <{}>", name);
            self.notices.push(Notice::new(
                NoticeKind::SkippedElement,
                format!("unsupported body element <{name}> kept as-is"),
            ));
        }
    }

    /// A paragraph followed by one drawing block per drawing it contains.
    fn paragraph_blocks(&mut self, p: XNode, addr: Address, blocks: &mut Vec<Block>) {
        let paragraph = self.paragraph(p, addr.clone());
        blocks.push(Block::Paragraph(paragraph));
        let drawings = p.descendants().filter(|n| is_w(*n, "drawing"));
        for (n, drawing) in drawings.enumerate() {
            match read_drawing(drawing, &addr, n) {
                Some(d) => blocks.push(Block::Drawing(d)),
                None => self.notices.push(Notice::new(
                    NoticeKind::SkippedElement,
                    format!("drawing {n} in {addr} has no inline or anchor container"),
                )),
            }
        }
    }

    fn paragraph(&mut self, p: XNode, addr: Address) -> Paragraph {
        self.minted.insert(p.id(), addr.clone());
        let mut content = Vec::new();
        let mut run_idx = 0;
        for item in walk::inline_items(p) {
            match item {
                InlineNode::Run(r) => {
                    let run_addr = addr.child(StepKind::Run, run_idx);
                    run_idx += 1;
                    content.push(InlineContent::TextRun(read_run(r, run_addr)));
                }
                InlineNode::Control(sdt) => {
                    if let Some(control) = self.control(sdt, &addr) {
                        content.push(control);
                    }
                }
            }
        }
        let style = wml(p, "pPr")
            .and_then(|ppr| wml_attr(ppr, "pStyle"))
            .map(str::to_string);
        Paragraph {
            id: format!("p:{addr}"),
            address: addr,
            style,
            content,
            synthetic: false,
        }
    }

    fn control(&mut self, sdt: XNode, addr: &Address) -> Option<InlineContent> {
        self.minted.insert(sdt.id(), addr.clone());
        match walk::classify(sdt) {
            SdtKind::Checkbox => controls::read_checkbox(sdt, addr).map(InlineContent::Checkbox),
            SdtKind::Dropdown => controls::read_dropdown(sdt, addr).map(InlineContent::Dropdown),
            SdtKind::Plain => None,
        }
    }

    fn table(&mut self, tbl: XNode, addr: Address) -> Table {
        let grid_columns = wml(tbl, "tblGrid")
            .map(|g| g.children().filter(|n| is_w(*n, "gridCol")).count())
            .unwrap_or(0);

        let mut rows = Vec::new();
        let mut offsets = Vec::new();
        for (ri, tr) in walk::table_rows(tbl).into_iter().enumerate() {
            let row_addr = addr.child(StepKind::Row, ri);
            let cells = walk::row_cells(tr)
                .iter()
                .enumerate()
                .map(|(ci, slot)| self.cell(slot, row_addr.child(StepKind::Cell, ci)))
                .collect();
            offsets.push(
                wml(tr, "trPr")
                    .and_then(|pr| wml_attr(pr, "gridBefore"))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0),
            );
            rows.push(TableRow {
                id: format!("tr:{row_addr}"),
                address: row_addr,
                cells,
            });
        }

        let columns = grid_positions(&rows, &offsets);
        compute_row_spans(&mut rows, &columns);
        for warning in structure_warnings(&rows, &columns, grid_columns) {
            log::warn!("Table {}: {}", addr, warning);
            self.notices
                .push(Notice::new(NoticeKind::StructureWarning, format!("table {addr}: {warning}")));
        }

        Table {
            id: format!("tbl:{addr}"),
            address: addr,
            grid_columns,
            rows,
        }
    }

    fn cell(&mut self, slot: &CellSlot, addr: Address) -> TableCell {
        self.minted.insert(slot.node.id(), addr.clone());
        let tc_pr = wml(slot.node, "tcPr");
        let col_span = tc_pr
            .and_then(|pr| wml_attr(pr, "gridSpan"))
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1)
            .max(1);
        let v_merge = match tc_pr.and_then(|pr| wml(pr, "vMerge")) {
            None => VMerge::None,
            Some(vm) => match vm.attribute((WML_NS, "val")) {
                Some("restart") => VMerge::Start,
                _ => VMerge::Continuation,
            },
        };
        let background = tc_pr
            .and_then(|pr| wml(pr, "shd"))
            .and_then(|shd| shd.attribute((WML_NS, "fill")))
            .filter(|fill| !fill.eq_ignore_ascii_case("auto"))
            .map(str::to_string);
        let borders = tc_pr
            .and_then(|pr| wml(pr, "tcBorders"))
            .map(read_borders)
            .unwrap_or_default();

        let mut blocks = Vec::new();
        let (mut p_idx, mut tbl_idx) = (0, 0);
        for item in walk::cell_items(slot) {
            match item {
                BlockNode::Paragraph(p) => {
                    let p_addr = addr.child(StepKind::Paragraph, p_idx);
                    p_idx += 1;
                    self.paragraph_blocks(p, p_addr, &mut blocks);
                }
                BlockNode::Control(sdt) => {
                    let p_addr = addr.child(StepKind::Paragraph, p_idx);
                    p_idx += 1;
                    if let Some(control) = self.control(sdt, &p_addr) {
                        blocks.push(Block::Paragraph(Paragraph {
                            id: format!("p:{p_addr}"),
                            address: p_addr,
                            style: None,
                            content: vec![control],
                            synthetic: true,
                        }));
                    }
                }
                BlockNode::Table(tbl) => {
                    let t_addr = addr.child(StepKind::Table, tbl_idx);
                    tbl_idx += 1;
                    blocks.push(Block::Table(self.table(tbl, t_addr)));
                }
            }
        }

        TableCell {
            id: format!("tc:{addr}"),
            address: addr,
            row_span: 1,
            col_span,
            v_merge,
            background,
            borders,
            blocks,
        }
    }

    /// Flat lists of every checkbox and dropdown in the body, each stamped
    /// with the nearest minted address around or inside it.
    fn document_controls(
        &self,
        body: XNode,
    ) -> (Vec<crate::model::CheckboxControl>, Vec<crate::model::DropdownControl>) {
        let mut checkboxes = Vec::new();
        let mut dropdowns = Vec::new();
        for sdt in body.descendants().filter(|n| is_w(*n, "sdt")) {
            let kind = walk::classify(sdt);
            if !kind.is_control() {
                continue;
            }
            let addr = self.nearest_address(sdt);
            match kind {
                SdtKind::Checkbox => checkboxes.extend(controls::read_checkbox(sdt, &addr)),
                SdtKind::Dropdown => dropdowns.extend(controls::read_dropdown(sdt, &addr)),
                SdtKind::Plain => {}
            }
        }
        (checkboxes, dropdowns)
    }

    fn nearest_address(&self, node: XNode) -> Address {
        node.ancestors()
            .find_map(|n| self.minted.get(&n.id()))
            .or_else(|| node.descendants().find_map(|n| self.minted.get(&n.id())))
            .cloned()
            .unwrap_or_default()
    }
}

fn read_run(r: XNode, address: Address) -> TextRun {
    let rpr = wml(r, "rPr");
    TextRun {
        id: format!("r:{address}"),
        address,
        text: walk::run_text(r),
        bold: rpr.and_then(|pr| wml_bool(pr, "b")).unwrap_or(false),
        italic: rpr.and_then(|pr| wml_bool(pr, "i")).unwrap_or(false),
        color: rpr
            .and_then(|pr| wml_attr(pr, "color"))
            .filter(|c| !c.eq_ignore_ascii_case("auto"))
            .map(str::to_string),
    }
}

fn read_borders(tc_borders: XNode) -> CellBorders {
    let side = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| wml(tc_borders, name))
            .map(read_border)
    };
    CellBorders {
        top: side(&["top"]),
        bottom: side(&["bottom"]),
        left: side(&["left", "start"]),
        right: side(&["right", "end"]),
    }
}

fn read_border(node: XNode) -> CellBorder {
    let style = match node.attribute((WML_NS, "val")) {
        None | Some("nil") => "none",
        Some(v) => v,
    };
    CellBorder {
        style: style.to_string(),
        size: node.attribute((WML_NS, "sz")).and_then(|v| v.parse().ok()),
        color: node
            .attribute((WML_NS, "color"))
            .filter(|c| !c.eq_ignore_ascii_case("auto"))
            .map(str::to_string),
    }
}

fn read_drawing(drawing: XNode, addr: &Address, n: usize) -> Option<Drawing> {
    let container = drawing.children().find(|c| {
        c.tag_name().namespace() == Some(WPD_NS)
            && matches!(c.tag_name().name(), "inline" | "anchor")
    })?;
    let wpd = |name: &str| {
        container
            .children()
            .find(|c| c.tag_name().name() == name && c.tag_name().namespace() == Some(WPD_NS))
    };
    let extent = wpd("extent");
    let emu = |attr: &str| {
        extent
            .and_then(|e| e.attribute(attr))
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v / EMU_PER_INCH)
    };
    let has = |ns: &str, name: &str| {
        container
            .descendants()
            .any(|d| d.tag_name().name() == name && d.tag_name().namespace() == Some(ns))
    };
    let kind = if has(WPG_NS, "wgp") {
        DrawingKind::VectorGroup
    } else if has(PIC_NS, "pic") {
        DrawingKind::Image
    } else {
        DrawingKind::Unknown
    };
    let relationship_id = container
        .descendants()
        .find(|d| d.tag_name().name() == "blip" && d.tag_name().namespace() == Some(DML_NS))
        .and_then(|b| b.attribute((package::REL_NS, "embed")))
        .map(str::to_string);

    Some(Drawing {
        id: format!("drawing:{addr}#{n}"),
        address: addr.clone(),
        kind,
        name: wpd("docPr").and_then(|d| d.attribute("name")).map(str::to_string),
        width_in: emu("cx"),
        height_in: emu("cy"),
        relationship_id,
    })
}

/// Grid column at which each cell starts, honouring `w:gridBefore`.
fn grid_positions(rows: &[TableRow], offsets: &[usize]) -> Vec<Vec<usize>> {
    rows.iter()
        .zip(offsets)
        .map(|(row, &offset)| {
            let mut col = offset;
            row.cells
                .iter()
                .map(|cell| {
                    let start = col;
                    col += cell.col_span;
                    start
                })
                .collect()
        })
        .collect()
}

fn cell_at(row: &TableRow, positions: &[usize], col: usize) -> Option<usize> {
    positions
        .iter()
        .position(|&p| p == col)
        .filter(|&i| i < row.cells.len())
}

fn compute_row_spans(rows: &mut [TableRow], columns: &[Vec<usize>]) {
    for r in 0..rows.len() {
        for c in 0..rows[r].cells.len() {
            if rows[r].cells[c].v_merge != VMerge::Start {
                continue;
            }
            let col = columns[r][c];
            let mut span = 1;
            for below in r + 1..rows.len() {
                let continues = cell_at(&rows[below], &columns[below], col)
                    .is_some_and(|i| rows[below].cells[i].v_merge == VMerge::Continuation);
                if !continues {
                    break;
                }
                span += 1;
            }
            rows[r].cells[c].row_span = span;
        }
    }
}

fn structure_warnings(rows: &[TableRow], columns: &[Vec<usize>], grid_columns: usize) -> Vec<String> {
    let mut warnings = Vec::new();
    let widths: Vec<usize> = rows
        .iter()
        .zip(columns)
        .map(|(row, cols)| match (row.cells.last(), cols.last()) {
            (Some(cell), Some(&start)) => start + cell.col_span,
            _ => 0,
        })
        .collect();
    for (r, &width) in widths.iter().enumerate() {
        if grid_columns > 0 && width > grid_columns {
            warnings.push(format!(
                "row {r} spans {width} columns but the grid has {grid_columns}"
            ));
        }
    }
    if let Some(&first) = widths.first()
        && widths.iter().any(|&w| w != first)
    {
        warnings.push(format!("rows have inconsistent logical widths {widths:?}"));
    }

    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.cells.iter().enumerate() {
            if cell.v_merge != VMerge::Continuation {
                continue;
            }
            let col = columns[r][c];
            let started = (0..r).rev().any(|above| {
                cell_at(&rows[above], &columns[above], col)
                    .is_some_and(|i| rows[above].cells[i].v_merge == VMerge::Start)
            });
            if !started {
                warnings.push(format!(
                    "cell {} continues a vertical merge with no start above",
                    cell.address
                ));
            }
        }
    }
    warnings
}

/// An element reached by resolving an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// Local name of the element, e.g. `p`, `tc` or `sdt`.
    pub tag: String,
    /// Concatenated `w:t` text below the element.
    pub text: String,
}

/// Resolve each address against the main part of `bytes`.
pub fn locate(bytes: &[u8], addresses: &[Address]) -> Result<Vec<Option<Located>>, Error> {
    let part = read_main_part(bytes)?;
    let xml = roxmltree::Document::parse(&part.text)?;
    let body = find_body(&xml)?;
    Ok(addresses
        .iter()
        .map(|addr| {
            resolve::resolve(body, addr).map(|target| {
                let node = target.node();
                Located {
                    tag: node.tag_name().name().to_string(),
                    text: node
                        .descendants()
                        .filter(|n| is_w(*n, "t"))
                        .filter_map(|n| n.text())
                        .collect(),
                }
            })
        })
        .collect())
}
