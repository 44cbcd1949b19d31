use crate::address::{Address, StepKind};

use super::XNode;
use super::walk::{self, BlockNode, CellSlot};

/// What an address step landed on.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    Body(XNode<'a>),
    Paragraph(XNode<'a>),
    /// Paragraph slot filled by a control wrapper inside a cell.
    Control(XNode<'a>),
    Table(XNode<'a>),
    Row(XNode<'a>),
    Cell(CellSlot<'a>),
    Run(XNode<'a>),
}

impl<'a> Target<'a> {
    pub(crate) fn node(&self) -> XNode<'a> {
        match *self {
            Target::Body(n)
            | Target::Paragraph(n)
            | Target::Control(n)
            | Target::Table(n)
            | Target::Row(n)
            | Target::Run(n) => n,
            Target::Cell(slot) => slot.node,
        }
    }
}

/// Follow `address` from the body element. Any step whose index is out of
/// range, or whose kind cannot occur at that depth, yields `None`.
pub(crate) fn resolve<'a>(body: XNode<'a>, address: &Address) -> Option<Target<'a>> {
    let mut current = Target::Body(body);
    for step in address.steps() {
        current = select(current, step.kind, step.index)?;
    }
    Some(current)
}

fn select<'a>(current: Target<'a>, kind: StepKind, index: usize) -> Option<Target<'a>> {
    match (current, kind) {
        (Target::Body(body), StepKind::Paragraph) => walk::body_items(body)
            .into_iter()
            .filter_map(|item| match item {
                BlockNode::Paragraph(p) => Some(Target::Paragraph(p)),
                _ => None,
            })
            .nth(index),
        (Target::Body(body), StepKind::Table) => nth_table(walk::body_items(body), index),
        (Target::Table(tbl), StepKind::Row) => {
            walk::table_rows(tbl).get(index).copied().map(Target::Row)
        }
        (Target::Row(tr), StepKind::Cell) => {
            walk::row_cells(tr).get(index).copied().map(Target::Cell)
        }
        (Target::Cell(slot), StepKind::Paragraph) => walk::cell_items(&slot)
            .into_iter()
            .filter_map(|item| match item {
                BlockNode::Paragraph(p) => Some(Target::Paragraph(p)),
                BlockNode::Control(sdt) => Some(Target::Control(sdt)),
                BlockNode::Table(_) => None,
            })
            .nth(index),
        (Target::Cell(slot), StepKind::Table) => nth_table(walk::cell_items(&slot), index),
        (Target::Paragraph(p), StepKind::Run) => {
            walk::paragraph_runs(p).get(index).copied().map(Target::Run)
        }
        _ => None,
    }
}

fn nth_table(items: Vec<BlockNode<'_>>, index: usize) -> Option<Target<'_>> {
    items
        .into_iter()
        .filter_map(|item| match item {
            BlockNode::Table(t) => Some(Target::Table(t)),
            _ => None,
        })
        .nth(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>zero</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r><w:r><w:t>second</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>inner</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:tc></w:tr></w:tbl>
<w:sdt><w:sdtContent><w:p><w:r><w:t>wrapped</w:t></w:r></w:p></w:sdtContent></w:sdt>
</w:body></w:document>"#;

    fn resolve_text(address: &str) -> Option<String> {
        let doc = roxmltree::Document::parse(XML).unwrap();
        let body = doc.descendants().find(|n| n.tag_name().name() == "body").unwrap();
        let target = resolve(body, &address.parse().unwrap())?;
        Some(
            target
                .node()
                .descendants()
                .filter(|n| n.tag_name().name() == "t")
                .filter_map(|n| n.text())
                .collect(),
        )
    }

    #[test]
    fn resolves_through_wrappers_and_nested_tables() {
        assert_eq!(resolve_text("p[0]").as_deref(), Some("zero"));
        assert_eq!(resolve_text("p[1]").as_deref(), Some("wrapped"));
        assert_eq!(resolve_text("tbl[0]/tr[0]/tc[0]/p[0]/r[1]").as_deref(), Some("second"));
        assert_eq!(
            resolve_text("tbl[0]/tr[0]/tc[0]/tbl[0]/tr[0]/tc[0]/p[0]").as_deref(),
            Some("inner")
        );
    }

    #[test]
    fn out_of_range_or_misplaced_steps_are_not_found() {
        assert!(resolve_text("p[2]").is_none());
        assert!(resolve_text("tbl[0]/tr[1]").is_none());
        assert!(resolve_text("tr[0]").is_none());
        assert!(resolve_text("p[0]/r[0]/r[0]").is_none());
    }
}
