use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Word-processing document as an editable tree. Every element carries the
/// address it was parsed from; the writer re-resolves those addresses
/// against the base container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub blocks: Vec<Block>,
    /// Every checkbox control in the body, in document order.
    #[serde(default)]
    pub checkboxes: Vec<CheckboxControl>,
    #[serde(default)]
    pub dropdowns: Vec<DropdownControl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    Drawing(Drawing),
}

impl Block {
    pub fn id(&self) -> &str {
        match self {
            Block::Paragraph(p) => &p.id,
            Block::Table(t) => &t.id,
            Block::Drawing(d) => &d.id,
        }
    }

    pub fn address(&self) -> &Address {
        match self {
            Block::Paragraph(p) => &p.address,
            Block::Table(t) => &t.address,
            Block::Drawing(d) => &d.address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: String,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub content: Vec<InlineContent>,
    /// Created to carry a control that wraps a whole row or cell; there is
    /// no `w:p` behind it and its address resolves to the wrapper.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                InlineContent::TextRun(r) => Some(r.text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn text_runs(&self) -> impl Iterator<Item = &TextRun> {
        self.content.iter().filter_map(|c| match c {
            InlineContent::TextRun(r) => Some(r),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineContent {
    TextRun(TextRun),
    Checkbox(CheckboxControl),
    Dropdown(DropdownControl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub id: String,
    pub address: Address,
    pub text: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckboxControl {
    /// `checkbox-<w:id>`.
    pub id: String,
    pub address: Address,
    pub label: String,
    pub checked: bool,
    pub checked_glyph: char,
    pub unchecked_glyph: char,
}

impl CheckboxControl {
    pub fn glyph(&self) -> char {
        if self.checked {
            self.checked_glyph
        } else {
            self.unchecked_glyph
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropdownControl {
    /// `dropdown-<w:id>`.
    pub id: String,
    pub address: Address,
    pub label: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub address: Address,
    /// Number of `w:gridCol` entries; zero when the table has no grid.
    pub grid_columns: usize,
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Logical width of a row: the sum of its cells' column spans.
    pub fn row_width(&self, row: usize) -> usize {
        self.rows
            .get(row)
            .map(|r| r.cells.iter().map(|c| c.col_span.max(1)).sum())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub id: String,
    pub address: Address,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub id: String,
    pub address: Address,
    pub row_span: usize,
    pub col_span: usize,
    pub v_merge: VMerge,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "CellBorders::is_empty")]
    pub borders: CellBorders,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VMerge {
    #[default]
    None,
    Start,
    Continuation,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellBorders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<CellBorder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<CellBorder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<CellBorder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<CellBorder>,
}

impl CellBorders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.bottom.is_none() && self.left.is_none() && self.right.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellBorder {
    pub style: String,
    /// Eighths of a point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub id: String,
    /// Address of the paragraph that anchors the drawing.
    pub address: Address,
    pub kind: DrawingKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawingKind {
    Image,
    VectorGroup,
    Unknown,
}

/// A recoverable condition met while parsing or exporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    SkippedElement,
    UnresolvedAddress,
    SkippedSheet,
    StructureWarning,
    FormulaCleared,
    /// An edit changed tree state that has no place in the exported package.
    NotPersisted,
}

impl Notice {
    pub(crate) fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Notice {
            kind,
            message: message.into(),
        }
    }
}

/// A successful result plus the recoverable conditions met producing it.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub notices: Vec<Notice>,
}

impl<T> Outcome<T> {
    pub fn notices_of(&self, kind: NoticeKind) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(move |n| n.kind == kind)
    }
}
