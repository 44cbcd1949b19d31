//! Minimal-diff editing of XML part text.
//!
//! Edits are byte-range replacements against the original text, located
//! through roxmltree node ranges. Everything outside an edited range,
//! including the XML declaration and every namespace binding on the root
//! element, is emitted exactly as it was read.

use std::collections::BTreeMap;
use std::ops::Range;

pub(crate) struct Splicer<'s> {
    source: &'s str,
    edits: BTreeMap<(usize, usize), String>,
}

impl<'s> Splicer<'s> {
    pub(crate) fn new(source: &'s str) -> Self {
        Splicer {
            source,
            edits: BTreeMap::new(),
        }
    }

    pub(crate) fn source(&self) -> &'s str {
        self.source
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.edits.len()
    }

    /// Replace `range` with `text`. A later replacement of the same range wins.
    pub(crate) fn replace(&mut self, range: Range<usize>, text: String) {
        self.edits.insert((range.start, range.end), text);
    }

    /// Insert `text` at `pos`. Inserts at the same position keep call order.
    pub(crate) fn insert(&mut self, pos: usize, text: &str) {
        self.edits.entry((pos, pos)).or_default().push_str(text);
    }

    pub(crate) fn apply(self) -> String {
        let mut out = String::with_capacity(self.source.len() + 256);
        let mut cursor = 0;
        for ((start, end), text) in self.edits {
            if start < cursor {
                log::warn!("Dropping overlapping XML edit at {}..{}", start, end);
                continue;
            }
            out.push_str(&self.source[cursor..start]);
            out.push_str(&text);
            cursor = end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }

    /// Set the text content of an element, rebuilding it from its own start
    /// tag. Adds `xml:space="preserve"` when the value has edge whitespace.
    pub(crate) fn set_element_text(&mut self, node: roxmltree::Node, value: &str) {
        let range = node.range();
        let qname = qualified_name(self.source, node);
        let Some(tag_end) = start_tag_end(self.source, range.start) else {
            return;
        };
        let start_tag = &self.source[range.start..=tag_end];
        let open = start_tag
            .strip_suffix("/>")
            .or_else(|| start_tag.strip_suffix('>'))
            .unwrap_or(start_tag)
            .trim_end();
        let mut rebuilt = String::with_capacity(start_tag.len() + value.len() + qname.len() + 24);
        rebuilt.push_str(open);
        if needs_preserve(value) && !open.contains("xml:space") {
            rebuilt.push_str(" xml:space=\"preserve\"");
        }
        rebuilt.push('>');
        rebuilt.push_str(&escape_text(value));
        rebuilt.push_str("</");
        rebuilt.push_str(qname);
        rebuilt.push('>');
        self.replace(range, rebuilt);
    }

    /// Set (or add) an attribute identified by its local name on an element,
    /// leaving the rest of the start tag untouched. A new attribute takes the
    /// element's own prefix.
    pub(crate) fn set_attribute(&mut self, node: roxmltree::Node, local: &str, value: &str) {
        self.set_attr(node, local, value, true);
    }

    /// Like [`Splicer::set_attribute`], but a new attribute is written
    /// without a prefix, as SpreadsheetML attributes are.
    pub(crate) fn set_plain_attribute(&mut self, node: roxmltree::Node, local: &str, value: &str) {
        self.set_attr(node, local, value, false);
    }

    fn set_attr(&mut self, node: roxmltree::Node, local: &str, value: &str, qualify: bool) {
        let start = node.range().start;
        let Some(tag_end) = start_tag_end(self.source, start) else {
            return;
        };
        let escaped = escape_attr(value);
        if let Some(span) = start_tag_attributes(self.source, start, tag_end)
            .into_iter()
            .find(|a| local_part(&self.source[a.name.clone()]) == local)
        {
            self.replace(span.value, escaped);
            return;
        }
        let qname = qualified_name(self.source, node);
        let attr = match qname.split_once(':').filter(|_| qualify) {
            Some((prefix, _)) => format!(" {}:{}=\"{}\"", prefix, local, escaped),
            None => format!(" {}=\"{}\"", local, escaped),
        };
        let close = if self.source[..tag_end].ends_with('/') {
            tag_end - 1
        } else {
            tag_end
        };
        self.insert(close, &attr);
    }

    /// Insert markup just before an element's end tag. Self-closing elements
    /// are expanded to hold the new content; repeated appends to the same
    /// element keep call order inside the one expansion.
    pub(crate) fn append_child(&mut self, node: roxmltree::Node, markup: &str) {
        let range = node.range();
        if let Some(pos) = end_tag_start(self.source, range.clone()) {
            self.insert(pos, markup);
            return;
        }
        let Some(tag_end) = start_tag_end(self.source, range.start) else {
            return;
        };
        // Only the `/>` bytes are rewritten, so attribute edits on the start
        // tag still land in front of them.
        let close = format!("</{}>", qualified_name(self.source, node));
        let expansion = self
            .edits
            .entry((tag_end - 1, range.end))
            .or_insert_with(|| format!(">{close}"));
        let at = expansion.len() - close.len();
        expansion.insert_str(at, markup);
    }

    /// Insert markup right after an element's start tag.
    pub(crate) fn prepend_child(&mut self, node: roxmltree::Node, markup: &str) {
        let range = node.range();
        match (
            start_tag_end(self.source, range.start),
            end_tag_start(self.source, range),
        ) {
            (Some(tag_end), Some(_)) => self.insert(tag_end + 1, markup),
            _ => self.append_child(node, markup),
        }
    }
}

struct AttrSpan {
    name: Range<usize>,
    value: Range<usize>,
}

/// Prefixed element name as written in the source, e.g. `w:t`.
pub(crate) fn qualified_name<'s>(source: &'s str, node: roxmltree::Node) -> &'s str {
    let start = node.range().start + 1;
    let rest = &source[start..];
    let len = rest
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(rest.len());
    &rest[..len]
}

/// Index of the `>` closing the start tag that begins at `start`.
pub(crate) fn start_tag_end(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

/// Start of the end tag of an element, or None for a self-closing element.
pub(crate) fn end_tag_start(source: &str, range: Range<usize>) -> Option<usize> {
    let text = &source[range.clone()];
    if text.ends_with("/>") && start_tag_end(source, range.start) == Some(range.end - 1) {
        return None;
    }
    text.rfind("</").map(|i| range.start + i)
}

/// Attributes of an element's start tag as written: name and still-escaped
/// value, in source order.
pub(crate) fn raw_attributes<'s>(source: &'s str, node: roxmltree::Node) -> Vec<(&'s str, &'s str)> {
    let start = node.range().start;
    let Some(tag_end) = start_tag_end(source, start) else {
        return Vec::new();
    };
    start_tag_attributes(source, start, tag_end)
        .into_iter()
        .map(|a| (&source[a.name], &source[a.value]))
        .collect()
}

fn start_tag_attributes(source: &str, start: usize, tag_end: usize) -> Vec<AttrSpan> {
    let bytes = source.as_bytes();
    let mut spans = Vec::new();
    let mut i = start + 1;
    while i < tag_end && !bytes[i].is_ascii_whitespace() && bytes[i] != b'/' {
        i += 1;
    }
    loop {
        while i < tag_end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= tag_end || bytes[i] == b'/' {
            break;
        }
        let name_start = i;
        while i < tag_end && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let name = name_start..i;
        while i < tag_end && (bytes[i] == b'=' || bytes[i].is_ascii_whitespace()) {
            i += 1;
        }
        if i >= tag_end {
            break;
        }
        let quote = bytes[i];
        i += 1;
        let value_start = i;
        while i < tag_end && bytes[i] != quote {
            i += 1;
        }
        spans.push(AttrSpan {
            name,
            value: value_start..i,
        });
        i += 1;
    }
    spans
}

fn local_part(qname: &str) -> &str {
    qname.rsplit_once(':').map_or(qname, |(_, local)| local)
}

fn needs_preserve(value: &str) -> bool {
    value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace)
}

pub(crate) fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
