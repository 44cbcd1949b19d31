use std::collections::HashMap;

use crate::Error;
use crate::model::{
    Block, CheckboxControl, DropdownControl, InlineContent, Notice, NoticeKind, Outcome, Paragraph,
    StructuredDocument,
};
use crate::package;
use crate::xml::{self, Splicer};

use super::resolve::{self, Target};
use super::walk::{self, SdtKind};
use super::{XNode, controls, is_w, read_main_part};

/// Apply the edited tree to `base`, returning new container bytes.
///
/// Addresses are resolved against the base container's main part. Only
/// text and control state are rewritten; every other entry is copied raw.
/// When nothing differs from the base, the base bytes are returned as-is.
pub fn apply(doc: &StructuredDocument, base: &[u8]) -> Result<Outcome<Vec<u8>>, Error> {
    let part = read_main_part(base)?;
    let xml = roxmltree::Document::parse(&part.text)?;
    let body = super::find_body(&xml)?;

    let mut patch = Patch {
        splicer: Splicer::new(&part.text),
        notices: Vec::new(),
        prefix: prefix_of(&part.text, body),
    };

    patch.blocks(body, &doc.blocks);

    let mut checkboxes: HashMap<&str, &CheckboxControl> = HashMap::new();
    let mut dropdowns: HashMap<&str, &DropdownControl> = HashMap::new();
    for cb in &doc.checkboxes {
        checkboxes.insert(&cb.id, cb);
    }
    for dd in &doc.dropdowns {
        dropdowns.insert(&dd.id, dd);
    }
    // Inline controls override the document-level lists.
    collect_inline_controls(&doc.blocks, &mut checkboxes, &mut dropdowns);
    patch.controls(xml.root_element(), &checkboxes, &dropdowns);

    let Patch {
        splicer, notices, ..
    } = patch;
    if splicer.is_empty() {
        log::debug!("No changes against {}, returning base container", part.name);
        return Ok(Outcome {
            value: base.to_vec(),
            notices,
        });
    }

    log::debug!("Applying {} edits to {}", splicer.len(), part.name);
    let bytes = part.into_bytes_with(splicer.apply());
    let replacements = HashMap::from([(part.name.clone(), bytes)]);
    Ok(Outcome {
        value: package::rewrite(base, &replacements)?,
        notices,
    })
}

struct Patch<'s> {
    splicer: Splicer<'s>,
    notices: Vec<Notice>,
    /// Prefix bound to the WordprocessingML namespace in this part.
    prefix: String,
}

impl<'s> Patch<'s> {
    fn blocks(&mut self, body: XNode, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(p) if !p.synthetic => self.paragraph(body, p),
                Block::Paragraph(_) | Block::Drawing(_) => {}
                Block::Table(t) => {
                    for row in &t.rows {
                        for cell in &row.cells {
                            self.blocks(body, &cell.blocks);
                        }
                    }
                }
            }
        }
    }

    fn unresolved(&mut self, what: &str, address: &crate::Address) {
        log::warn!("Skipping edit: {} {} does not resolve", what, address);
        self.notices.push(Notice::new(
            NoticeKind::UnresolvedAddress,
            format!("{what} {address} does not resolve; edit skipped"),
        ));
    }

    fn run_markup(&self, text: &str) -> String {
        let w = &self.prefix;
        format!(
            "<{w}r><{w}t xml:space=\"preserve\">{}</{w}t></{w}r>",
            xml::escape_text(text)
        )
    }

    fn paragraph(&mut self, body: XNode, para: &Paragraph) {
        let p = match resolve::resolve(body, &para.address) {
            Some(Target::Paragraph(p)) => p,
            _ => {
                self.unresolved("paragraph", &para.address);
                return;
            }
        };
        let live = walk::paragraph_runs(p);
        let runs: Vec<&str> = para.text_runs().map(|r| r.text.as_str()).collect();

        for (i, text) in runs.iter().enumerate() {
            let Some(&r) = live.get(i) else {
                if !text.is_empty() {
                    let markup = self.run_markup(text);
                    self.splicer.append_child(p, &markup);
                }
                continue;
            };
            let t_nodes: Vec<XNode> = r.children().filter(|n| is_w(*n, "t")).collect();
            let Some((&first, rest)) = t_nodes.split_first() else {
                if !text.is_empty() {
                    let w = &self.prefix;
                    let markup = format!(
                        "<{w}t xml:space=\"preserve\">{}</{w}t>",
                        xml::escape_text(text)
                    );
                    self.splicer.append_child(r, &markup);
                }
                continue;
            };
            if walk::run_text(r) == *text {
                continue;
            }
            self.splicer.set_element_text(first, text);
            for &extra in rest {
                if extra.text().is_some_and(|s| !s.is_empty()) {
                    self.splicer.set_element_text(extra, "");
                }
            }
        }
    }

    fn controls(
        &mut self,
        root: XNode,
        checkboxes: &HashMap<&str, &CheckboxControl>,
        dropdowns: &HashMap<&str, &DropdownControl>,
    ) {
        for sdt in root.descendants().filter(|n| is_w(*n, "sdt")) {
            match walk::classify(sdt) {
                SdtKind::Checkbox => {
                    let id = controls::control_id(sdt, "checkbox");
                    if let Some(cb) = checkboxes.get(id.as_str()) {
                        self.checkbox(sdt, cb.checked);
                    }
                }
                SdtKind::Dropdown => {
                    let id = controls::control_id(sdt, "dropdown");
                    if let Some(selected) = dropdowns.get(id.as_str()).and_then(|d| d.selected.as_deref()) {
                        self.dropdown(sdt, selected);
                    }
                }
                SdtKind::Plain => {}
            }
        }
    }

    fn checkbox(&mut self, sdt: XNode, checked: bool) {
        if controls::is_checked(sdt) == checked {
            return;
        }
        let val = if checked { "1" } else { "0" };
        match controls::checked_element(sdt) {
            Some(node) => self.splicer.set_attribute(node, "val", val),
            None => {
                if let Some(cb) = controls::checkbox_element(sdt) {
                    let qname = xml::qualified_name(self.splicer_source(), cb);
                    let markup = match qname.split_once(':') {
                        Some((prefix, _)) => format!("<{prefix}:checked {prefix}:val=\"{val}\"/>"),
                        None => format!("<checked val=\"{val}\"/>"),
                    };
                    self.splicer.prepend_child(cb, &markup);
                }
            }
        }
        let (on, off) = controls::checkbox_glyphs(sdt);
        // Only a text that is one of the glyphs is the visible state.
        if let Some(t) = sdt_content_text(sdt)
            && let Some(shown) = t.text().map(str::trim)
            && shown.chars().count() == 1
            && shown.starts_with([on, off])
        {
            let glyph = if checked { on } else { off };
            self.splicer.set_element_text(t, &glyph.to_string());
        }
    }

    fn dropdown(&mut self, sdt: XNode, selected: &str) {
        let Some(t) = controls::display_text_node(sdt) else {
            return;
        };
        if t.text().unwrap_or("") == selected {
            return;
        }
        self.splicer.set_element_text(t, selected);
        if let Some(list) = controls::list_element(sdt)
            && list.has_attribute((super::WML_NS, "lastValue"))
        {
            let value = controls::list_items(list)
                .into_iter()
                .find(|(display, value)| *display == selected || *value == selected)
                .map(|(display, value)| if value.is_empty() { display } else { value })
                .unwrap_or(selected);
            self.splicer.set_attribute(list, "lastValue", value);
        }
    }

    fn splicer_source(&self) -> &'s str {
        self.splicer.source()
    }
}

/// First `w:t` in a wrapper's content, where the visible glyph lives.
fn sdt_content_text(sdt: XNode) -> Option<XNode> {
    super::wml(sdt, "sdtContent")?
        .descendants()
        .find(|n| is_w(*n, "t"))
}

fn collect_inline_controls<'d>(
    blocks: &'d [Block],
    checkboxes: &mut HashMap<&'d str, &'d CheckboxControl>,
    dropdowns: &mut HashMap<&'d str, &'d DropdownControl>,
) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => {
                for item in &p.content {
                    match item {
                        InlineContent::Checkbox(cb) => {
                            checkboxes.insert(&cb.id, cb);
                        }
                        InlineContent::Dropdown(dd) => {
                            dropdowns.insert(&dd.id, dd);
                        }
                        InlineContent::TextRun(_) => {}
                    }
                }
            }
            Block::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| &r.cells) {
                    collect_inline_controls(&cell.blocks, checkboxes, dropdowns);
                }
            }
            Block::Drawing(_) => {}
        }
    }
}

/// `w:` style prefix (with colon) the part binds to WordprocessingML, read
/// from the body element's own name.
fn prefix_of(source: &str, body: XNode) -> String {
    match xml::qualified_name(source, body).split_once(':') {
        Some((prefix, _)) => format!("{prefix}:"),
        None => String::new(),
    }
}
