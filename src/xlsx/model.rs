use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cellref::CellRef;
use super::styles::{CellStyle, StyleTables};

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub id: String,
    pub sheets: Vec<Sheet>,
    #[serde(default)]
    pub active_sheet_index: usize,
    /// Pool as read from the package; the writer appends, never reorders.
    #[serde(default)]
    pub shared_strings: Vec<SharedString>,
    #[serde(default)]
    pub defined_names: Vec<DefinedName>,
    #[serde(default)]
    pub styles: StyleTables,
    #[serde(default)]
    pub properties: Properties,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn defined_name(&self, name: &str) -> Option<&DefinedName> {
        self.defined_names.iter().find(|d| d.name == name)
    }

    pub fn dirty_cells(&self) -> usize {
        self.sheets
            .iter()
            .map(|s| s.cells.values().filter(|c| c.dirty).count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedString {
    pub index: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub rich_text: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinedName {
    pub name: String,
    pub value: String,
    /// Sheet index the name is scoped to; `None` for workbook scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_sheet_id: Option<usize>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    /// `_xlnm.` names such as print areas.
    #[serde(default, skip_serializing_if = "is_false")]
    pub builtin: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sheet {
    pub id: String,
    pub name: String,
    pub index: usize,
    /// Worksheet part inside the package, e.g. `xl/worksheets/sheet1.xml`.
    pub part_name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    pub cells: BTreeMap<CellRef, Cell>,
    #[serde(default)]
    pub merged_ranges: Vec<MergedRange>,
    #[serde(default)]
    pub validations: Vec<DataValidation>,
    #[serde(default)]
    pub conditional_formats: Vec<ConditionalFormatting>,
    #[serde(default)]
    pub form_controls: Vec<FormControl>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub hyperlinks: Vec<Hyperlink>,
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub sparkline_groups: Vec<SparklineGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<SheetView>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub rows: Vec<RowInfo>,
}

impl Sheet {
    pub fn cell(&self, reference: &str) -> Option<&Cell> {
        self.cells.get(&reference.parse().ok()?)
    }

    pub fn cell_mut(&mut self, reference: &str) -> Option<&mut Cell> {
        self.cells.get_mut(&reference.parse().ok()?)
    }

    /// Validation rule covering `cell`, if any.
    pub fn validation_for(&self, cell: CellRef) -> Option<&DataValidation> {
        self.validations.iter().find(|v| {
            super::cellref::parse_sqref(&v.sqref)
                .iter()
                .any(|r| r.contains(cell))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Value as it would be shown in a linked cell or error message.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) | CellValue::Error(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

/// The `t` attribute of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellDataType {
    #[serde(rename = "s")]
    SharedString,
    #[serde(rename = "n")]
    Number,
    #[serde(rename = "b")]
    Boolean,
    #[serde(rename = "e")]
    Error,
    #[serde(rename = "inlineStr")]
    InlineString,
    #[serde(rename = "str")]
    FormulaString,
    #[serde(rename = "d")]
    Date,
}

impl CellDataType {
    pub(crate) fn from_attr(t: &str) -> Option<Self> {
        Some(match t {
            "s" => CellDataType::SharedString,
            "n" => CellDataType::Number,
            "b" => CellDataType::Boolean,
            "e" => CellDataType::Error,
            "inlineStr" => CellDataType::InlineString,
            "str" => CellDataType::FormulaString,
            "d" => CellDataType::Date,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaKind {
    #[default]
    Normal,
    Shared,
    Array,
    DataTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Formula text without the leading `=`. Empty for shared-formula
    /// followers, which take their text from the master.
    pub text: String,
    #[serde(default)]
    pub kind: FormulaKind,
    /// Range covered by a shared or array formula master.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// `<sheet id>-<reference>`.
    pub id: String,
    pub reference: CellRef,
    pub row: u32,
    pub col: u32,
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<CellDataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<Formula>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<CellStyle>,
    /// Merged range this cell belongs to, e.g. `A1:C3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_range: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub merge_origin: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_validation: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_hyperlink: bool,
    /// Set by the edit layer; the writer touches dirty cells only.
    #[serde(default, skip_serializing_if = "is_false")]
    pub dirty: bool,
    /// Value at parse time, recorded on the first edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<CellValue>,
}

impl Cell {
    pub fn new(sheet_id: &str, reference: CellRef) -> Self {
        Cell {
            id: format!("{sheet_id}-{reference}"),
            reference,
            row: reference.row,
            col: reference.col,
            value: CellValue::Empty,
            raw_value: None,
            data_type: None,
            formula: None,
            style_index: None,
            style: None,
            merge_range: None,
            merge_origin: false,
            has_validation: false,
            has_hyperlink: false,
            dirty: false,
            original_value: None,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.merge_range.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRange {
    pub id: String,
    pub reference: String,
    pub start: CellRef,
    pub end: CellRef,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValidation {
    pub id: String,
    pub sqref: String,
    /// `list`, `whole`, `decimal`, `date`, `time`, `textLength` or `custom`.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula2: Option<String>,
    #[serde(default)]
    pub allow_blank: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Literal options of a `list` rule written as `"a,b,c"`.
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalFormatting {
    pub id: String,
    pub sqref: String,
    pub rules: Vec<ConditionalRule>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub id: String,
    pub kind: String,
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default)]
    pub formulas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dxf_id: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub stop_if_true: bool,
    /// Colours of a colour scale, low to high.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub color_scale: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_bar_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_set: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormControlKind {
    Checkbox,
    Radio,
    Button,
    Dropdown,
    Listbox,
    Spinner,
    Scrollbar,
    Groupbox,
    Label,
}

impl FormControlKind {
    pub(crate) fn from_object_type(t: &str) -> Option<Self> {
        Some(match t {
            "Checkbox" => FormControlKind::Checkbox,
            "Radio" => FormControlKind::Radio,
            "Button" => FormControlKind::Button,
            "Drop" => FormControlKind::Dropdown,
            "List" => FormControlKind::Listbox,
            "Spin" => FormControlKind::Spinner,
            "Scroll" => FormControlKind::Scrollbar,
            "GBox" => FormControlKind::Groupbox,
            "Label" => FormControlKind::Label,
            _ => return None,
        })
    }
}

/// Zero-based cell anchor of a drawing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Anchor {
    pub from_col: u32,
    pub from_row: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_col: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_row: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormControl {
    pub id: String,
    pub kind: FormControlKind,
    /// VML shape id, e.g. `_x0000_s1025`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_cell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub anchor: Anchor,
    /// Media part, e.g. `xl/media/image1.png`.
    pub media_path: String,
    pub relationship_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub cell: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperlink {
    pub id: String,
    pub cell: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub reference: String,
    pub header_row_count: u32,
    pub totals_row_count: u32,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparklineGroup {
    pub id: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_series: Option<String>,
    pub sparklines: Vec<Sparkline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sparkline {
    pub location: String,
    pub data_range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetView {
    pub zoom: u32,
    pub show_gridlines: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub tab_selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_cell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeze: Option<FreezePane>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreezePane {
    /// Frozen columns.
    pub x_split: u32,
    /// Frozen rows.
    pub y_split: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_left_cell: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub min: u32,
    pub max: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub custom_width: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowInfo {
    pub row: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub custom_height: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_index: Option<u32>,
}
