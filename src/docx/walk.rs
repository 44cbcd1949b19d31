//! Child selection shared by the parser (which mints addresses) and the
//! resolver (which follows them). Both sides call exactly these functions,
//! so an index assigned at parse time always names the same node when it is
//! resolved against the same part.

use super::{W14_NS, WML_NS, XNode, is_w, wml};

#[derive(Debug, Clone, Copy)]
pub(crate) enum BlockNode<'a> {
    Paragraph(XNode<'a>),
    Table(XNode<'a>),
    /// A checkbox or dropdown wrapper standing in a paragraph slot of a cell.
    Control(XNode<'a>),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum InlineNode<'a> {
    Run(XNode<'a>),
    Control(XNode<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SdtKind {
    Checkbox,
    Dropdown,
    Plain,
}

impl SdtKind {
    pub(crate) fn is_control(self) -> bool {
        self != SdtKind::Plain
    }
}

pub(crate) fn classify(sdt: XNode) -> SdtKind {
    let Some(pr) = wml(sdt, "sdtPr") else {
        return SdtKind::Plain;
    };
    if pr
        .children()
        .any(|n| n.tag_name().name() == "checkbox" && n.tag_name().namespace() == Some(W14_NS))
    {
        SdtKind::Checkbox
    } else if wml(pr, "dropDownList").is_some() || wml(pr, "comboBox").is_some() {
        SdtKind::Dropdown
    } else {
        SdtKind::Plain
    }
}

fn sdt_content<'a>(sdt: XNode<'a>) -> impl Iterator<Item = XNode<'a>> {
    wml(sdt, "sdtContent")
        .into_iter()
        .flat_map(|c| c.children())
        .filter(|n| n.is_element())
}

/// Body-level paragraphs and tables. Every wrapper is unwrapped in place,
/// depth first, whatever its kind.
pub(crate) fn body_items<'a>(parent: XNode<'a>) -> Vec<BlockNode<'a>> {
    let mut items = Vec::new();
    collect_body_items(parent.children().filter(|n| n.is_element()), &mut items);
    items
}

fn collect_body_items<'a>(children: impl Iterator<Item = XNode<'a>>, items: &mut Vec<BlockNode<'a>>) {
    for child in children {
        if is_w(child, "p") {
            items.push(BlockNode::Paragraph(child));
        } else if is_w(child, "tbl") {
            items.push(BlockNode::Table(child));
        } else if is_w(child, "sdt") {
            collect_body_items(sdt_content(child), items);
        }
    }
}

pub(crate) fn table_rows<'a>(tbl: XNode<'a>) -> Vec<XNode<'a>> {
    let mut rows = Vec::new();
    collect_rows(tbl.children().filter(|n| n.is_element()), &mut rows);
    rows
}

fn collect_rows<'a>(children: impl Iterator<Item = XNode<'a>>, rows: &mut Vec<XNode<'a>>) {
    for child in children {
        if is_w(child, "tr") {
            rows.push(child);
        } else if is_w(child, "sdt") {
            collect_rows(sdt_content(child), rows);
        }
    }
}

/// A cell as seen from its row, with the control wrapper it sits in, if any.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CellSlot<'a> {
    pub(crate) node: XNode<'a>,
    pub(crate) wrapper: Option<XNode<'a>>,
    /// First cell inside `wrapper`; the control is surfaced on this cell only.
    pub(crate) leads_wrapper: bool,
}

pub(crate) fn row_cells<'a>(tr: XNode<'a>) -> Vec<CellSlot<'a>> {
    let mut cells = Vec::new();
    collect_cells(tr.children().filter(|n| n.is_element()), None, &mut cells);
    cells
}

fn collect_cells<'a>(
    children: impl Iterator<Item = XNode<'a>>,
    wrapper: Option<XNode<'a>>,
    cells: &mut Vec<CellSlot<'a>>,
) {
    for child in children {
        if is_w(child, "tc") {
            let leads_wrapper = wrapper.is_some_and(|w| !cells.iter().any(|c| c.wrapper == Some(w)));
            cells.push(CellSlot {
                node: child,
                wrapper,
                leads_wrapper,
            });
        } else if is_w(child, "sdt") {
            let inner = if classify(child).is_control() {
                Some(child)
            } else {
                wrapper
            };
            collect_cells(sdt_content(child), inner, cells);
        }
    }
}

/// Blocks of a cell. Paragraph slots hold paragraphs (direct or inside plain
/// wrappers) and control wrappers; tables are direct children only.
pub(crate) fn cell_items<'a>(slot: &CellSlot<'a>) -> Vec<BlockNode<'a>> {
    let mut items = Vec::new();
    if slot.leads_wrapper
        && let Some(wrapper) = slot.wrapper
    {
        items.push(BlockNode::Control(wrapper));
    }
    for child in slot.node.children().filter(|n| n.is_element()) {
        if is_w(child, "p") {
            items.push(BlockNode::Paragraph(child));
        } else if is_w(child, "tbl") {
            items.push(BlockNode::Table(child));
        } else if is_w(child, "sdt") {
            if classify(child).is_control() {
                items.push(BlockNode::Control(child));
            } else {
                collect_wrapped_paragraphs(child, &mut items);
            }
        }
    }
    items
}

fn collect_wrapped_paragraphs<'a>(sdt: XNode<'a>, items: &mut Vec<BlockNode<'a>>) {
    for child in sdt_content(sdt) {
        if is_w(child, "p") {
            items.push(BlockNode::Paragraph(child));
        } else if is_w(child, "sdt") && !classify(child).is_control() {
            collect_wrapped_paragraphs(child, items);
        }
    }
}

/// Inline stream of a paragraph: runs and controls, with hyperlinks, smart
/// tags, tracked insertions and plain wrappers spliced in place.
pub(crate) fn inline_items<'a>(p: XNode<'a>) -> Vec<InlineNode<'a>> {
    let mut items = Vec::new();
    collect_inline(p, &mut items);
    items
}

fn collect_inline<'a>(parent: XNode<'a>, items: &mut Vec<InlineNode<'a>>) {
    for child in parent.children().filter(|n| n.is_element()) {
        if child.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match child.tag_name().name() {
            "r" => items.push(InlineNode::Run(child)),
            "sdt" => {
                if classify(child).is_control() {
                    items.push(InlineNode::Control(child));
                } else if let Some(content) = wml(child, "sdtContent") {
                    collect_inline(content, items);
                }
            }
            "hyperlink" | "smartTag" | "ins" | "fldSimple" => collect_inline(child, items),
            _ => {}
        }
    }
}

/// Runs of a paragraph in address order.
pub(crate) fn paragraph_runs<'a>(p: XNode<'a>) -> Vec<XNode<'a>> {
    inline_items(p)
        .into_iter()
        .filter_map(|item| match item {
            InlineNode::Run(r) => Some(r),
            InlineNode::Control(_) => None,
        })
        .collect()
}

/// Text of a run: its `w:t` children joined.
pub(crate) fn run_text(r: XNode) -> String {
    r.children()
        .filter(|n| is_w(*n, "t"))
        .filter_map(|t| t.text())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml""#;

    fn body<'a>(doc: &'a roxmltree::Document<'a>) -> XNode<'a> {
        doc.descendants().find(|n| n.tag_name().name() == "body").unwrap()
    }

    #[test]
    fn body_unwraps_nested_wrappers_in_place() {
        let xml = format!(
            r#"<w:document {W}><w:body><w:p/><w:sdt><w:sdtContent><w:sdt><w:sdtContent><w:tbl/></w:sdtContent></w:sdt><w:p/></w:sdtContent></w:sdt><w:sectPr/></w:body></w:document>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let items = body_items(body(&doc));
        let kinds: Vec<&str> = items
            .iter()
            .map(|i| match i {
                BlockNode::Paragraph(_) => "p",
                BlockNode::Table(_) => "tbl",
                BlockNode::Control(_) => "ctl",
            })
            .collect();
        assert_eq!(kinds, ["p", "tbl", "p"]);
    }

    #[test]
    fn wrapped_cells_carry_control_on_first_cell_only() {
        let xml = format!(
            r#"<w:document {W}><w:body><w:tbl><w:tr><w:tc/><w:sdt><w:sdtPr><w:id w:val="7"/><w14:checkbox/></w:sdtPr><w:sdtContent><w:tc/><w:tc/></w:sdtContent></w:sdt></w:tr></w:tbl></w:body></w:document>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let tr = doc.descendants().find(|n| n.tag_name().name() == "tr").unwrap();
        let cells = row_cells(tr);
        assert_eq!(cells.len(), 3);
        assert!(cells[0].wrapper.is_none());
        assert!(cells[1].leads_wrapper);
        assert!(cells[2].wrapper.is_some() && !cells[2].leads_wrapper);
        assert!(matches!(cell_items(&cells[1])[0], BlockNode::Control(_)));
        assert!(cell_items(&cells[2]).is_empty());
    }

    #[test]
    fn inline_stream_splices_hyperlinks_and_plain_wrappers() {
        let xml = format!(
            r#"<w:p {W}><w:r><w:t>a</w:t></w:r><w:hyperlink><w:r><w:t>b</w:t></w:r></w:hyperlink><w:sdt><w:sdtContent><w:r><w:t>c</w:t></w:r></w:sdtContent></w:sdt><w:sdt><w:sdtPr><w:dropDownList/></w:sdtPr><w:sdtContent><w:r><w:t>d</w:t></w:r></w:sdtContent></w:sdt></w:p>"#
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let p = doc.root_element();
        let texts: Vec<String> = paragraph_runs(p).into_iter().map(run_text).collect();
        assert_eq!(texts, ["a", "b", "c"]);
        assert_eq!(inline_items(p).len(), 4);
    }
}
