use std::collections::{BTreeMap, HashMap};

use crate::package::Relationship;

use super::cellref::{CellRange, CellRef, parse_sqref};
use super::model::{
    Cell, CellDataType, CellValue, ColumnInfo, ConditionalFormatting, ConditionalRule,
    DataValidation, Formula, FormulaKind, FreezePane, Hyperlink, MergedRange, RowInfo,
    SharedString, Sheet, SheetView, Sparkline, SparklineGroup,
};
use super::styles::StyleTables;
use super::{XNode, sml, sml_children};

/// Everything a worksheet needs from the rest of the package.
pub(crate) struct SheetSource<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) index: usize,
    pub(crate) part: &'a str,
    pub(crate) hidden: bool,
    pub(crate) shared_strings: &'a [SharedString],
    pub(crate) styles: &'a StyleTables,
    pub(crate) rels: &'a HashMap<String, Relationship>,
}

pub(crate) struct RowNode<'a> {
    pub(crate) node: XNode<'a>,
    pub(crate) row: u32,
    pub(crate) cells: Vec<CellNode<'a>>,
}

pub(crate) struct CellNode<'a> {
    pub(crate) node: XNode<'a>,
    pub(crate) reference: CellRef,
}

/// Rows and cells of `sheetData` with their positions. A row or cell that
/// omits `r` sits right after its predecessor.
pub(crate) fn sheet_rows<'a>(sheet_data: XNode<'a>) -> Vec<RowNode<'a>> {
    let mut rows = Vec::new();
    let mut last_row = 0;
    for node in sml_children(sheet_data, "row") {
        let row = node
            .attribute("r")
            .and_then(|v| v.parse().ok())
            .unwrap_or(last_row + 1);
        last_row = row;
        let mut last_col = 0;
        let cells = sml_children(node, "c")
            .map(|c| {
                let reference = c
                    .attribute("r")
                    .and_then(|v| v.parse::<CellRef>().ok())
                    .unwrap_or(CellRef::new(row, last_col + 1));
                last_col = reference.col;
                CellNode { node: c, reference }
            })
            .collect();
        rows.push(RowNode { node, row, cells });
    }
    rows
}

/// Text of a string item (`<si>` or `<is>`): plain `<t>` or the runs of
/// rich text joined. Phonetic runs are not part of the value.
pub(crate) fn string_item_text(item: XNode) -> (String, bool) {
    let mut text = String::new();
    let mut rich = false;
    for child in item.children() {
        if super::is_sml(child, "t") {
            text.push_str(child.text().unwrap_or(""));
        } else if super::is_sml(child, "r") {
            rich = true;
            if let Some(t) = sml(child, "t") {
                text.push_str(t.text().unwrap_or(""));
            }
        }
    }
    (text, rich)
}

fn flag(node: XNode, name: &str) -> bool {
    matches!(node.attribute(name), Some("1" | "true"))
}

fn owned(node: XNode, name: &str) -> Option<String> {
    node.attribute(name).map(str::to_string)
}

pub(crate) fn parse_sheet(root: XNode, source: &SheetSource) -> Sheet {
    let merged_ranges = read_merges(root, source.id);
    let merge_map = merge_lookup(&merged_ranges);

    let mut cells = BTreeMap::new();
    let mut rows = Vec::new();
    if let Some(sheet_data) = sml(root, "sheetData") {
        for row in sheet_rows(sheet_data) {
            if let Some(info) = read_row_info(row.node, row.row) {
                rows.push(info);
            }
            for c in row.cells {
                let mut cell = read_cell(c.node, c.reference, source);
                if let Some((range, origin)) = merge_map.get(c.reference) {
                    cell.merge_range = Some(range.to_string());
                    cell.merge_origin = origin;
                }
                cells.insert(c.reference, cell);
            }
        }
    }

    let validations = read_validations(root, source.id);
    let hyperlinks = read_hyperlinks(root, source.id, source.rels);
    for cell in cells.values_mut() {
        cell.has_validation = validations
            .iter()
            .any(|v| parse_sqref(&v.sqref).iter().any(|r| r.contains(cell.reference)));
        cell.has_hyperlink = hyperlinks.iter().any(|h| {
            parse_sqref(&h.cell)
                .iter()
                .any(|r| r.contains(cell.reference))
        });
    }

    Sheet {
        id: source.id.to_string(),
        name: source.name.to_string(),
        index: source.index,
        part_name: source.part.to_string(),
        hidden: source.hidden,
        dimension: sml(root, "dimension").and_then(|d| owned(d, "ref")),
        cells,
        merged_ranges,
        validations,
        conditional_formats: read_conditional_formats(root, source.id),
        form_controls: Vec::new(),
        images: Vec::new(),
        comments: Vec::new(),
        hyperlinks,
        tables: Vec::new(),
        sparkline_groups: read_sparklines(root, source.id),
        view: read_view(root),
        columns: read_columns(root),
        rows,
    }
}

fn read_cell(node: XNode, reference: CellRef, source: &SheetSource) -> Cell {
    let mut cell = Cell::new(source.id, reference);
    cell.data_type = node.attribute("t").and_then(CellDataType::from_attr);
    cell.raw_value = sml(node, "v").and_then(|v| v.text()).map(str::to_string);
    cell.style_index = node.attribute("s").and_then(|s| s.parse().ok());
    cell.style = cell.style_index.and_then(|s| source.styles.resolve(s));
    cell.formula = sml(node, "f").map(read_formula);

    let raw = cell.raw_value.as_deref();
    cell.value = match cell.data_type {
        Some(CellDataType::SharedString) => {
            let text = raw
                .and_then(|v| v.trim().parse::<usize>().ok())
                .and_then(|i| source.shared_strings.get(i));
            match text {
                Some(ss) => CellValue::Text(ss.text.clone()),
                None => {
                    log::warn!(
                        "Cell {}!{} points at missing shared string {:?}",
                        source.name,
                        reference,
                        raw
                    );
                    CellValue::Empty
                }
            }
        }
        Some(CellDataType::Boolean) => match raw {
            Some(v) => CellValue::Boolean(v.trim() == "1"),
            None => CellValue::Empty,
        },
        Some(CellDataType::InlineString) => sml(node, "is")
            .map(|is| CellValue::Text(string_item_text(is).0))
            .unwrap_or(CellValue::Empty),
        Some(CellDataType::Error) => raw
            .map(|v| CellValue::Error(v.to_string()))
            .unwrap_or(CellValue::Empty),
        Some(CellDataType::FormulaString | CellDataType::Date) => raw
            .map(|v| CellValue::Text(v.to_string()))
            .unwrap_or(CellValue::Empty),
        Some(CellDataType::Number) | None => match raw {
            None => CellValue::Empty,
            Some(v) => v
                .trim()
                .parse::<f64>()
                .map(CellValue::Number)
                .unwrap_or_else(|_| CellValue::Text(v.to_string())),
        },
    };
    cell
}

fn read_formula(f: XNode) -> Formula {
    Formula {
        text: f.text().unwrap_or("").to_string(),
        kind: match f.attribute("t") {
            Some("shared") => FormulaKind::Shared,
            Some("array") => FormulaKind::Array,
            Some("dataTable") => FormulaKind::DataTable,
            _ => FormulaKind::Normal,
        },
        shared_ref: owned(f, "ref"),
        shared_index: f.attribute("si").and_then(|v| v.parse().ok()),
    }
}

fn read_row_info(row: XNode, index: u32) -> Option<RowInfo> {
    let height = row.attribute("ht").and_then(|v| v.parse().ok());
    let hidden = flag(row, "hidden");
    let custom_height = flag(row, "customHeight");
    let style_index = row
        .attribute("s")
        .filter(|_| flag(row, "customFormat"))
        .and_then(|v| v.parse().ok());
    if height.is_none() && !hidden && !custom_height && style_index.is_none() {
        return None;
    }
    Some(RowInfo {
        row: index,
        height,
        hidden,
        custom_height,
        style_index,
    })
}

fn read_columns(root: XNode) -> Vec<ColumnInfo> {
    let Some(cols) = sml(root, "cols") else {
        return Vec::new();
    };
    sml_children(cols, "col")
        .filter_map(|col| {
            let min = col.attribute("min")?.parse().ok()?;
            Some(ColumnInfo {
                min,
                max: col.attribute("max").and_then(|v| v.parse().ok()).unwrap_or(min),
                width: col.attribute("width").and_then(|v| v.parse().ok()),
                hidden: flag(col, "hidden"),
                custom_width: flag(col, "customWidth"),
                style_index: col.attribute("style").and_then(|v| v.parse().ok()),
            })
        })
        .collect()
}

fn read_merges(root: XNode, sheet_id: &str) -> Vec<MergedRange> {
    let Some(merges) = sml(root, "mergeCells") else {
        return Vec::new();
    };
    sml_children(merges, "mergeCell")
        .filter_map(|m| m.attribute("ref"))
        .filter_map(|r| match r.parse::<CellRange>() {
            Ok(range) => Some(range),
            Err(_) => {
                log::debug!("Ignoring malformed merge range {:?}", r);
                None
            }
        })
        .enumerate()
        .map(|(i, range)| MergedRange {
            id: format!("{sheet_id}-merge-{i}"),
            reference: range.to_string(),
            start: range.start,
            end: range.end,
        })
        .collect()
}

/// Ranges up to this many cells are expanded into the lookup table.
const EXPANDED_MERGE_LIMIT: u64 = 4096;

/// Covered cells mapped to their range and whether they are the origin.
/// Whole-column or whole-row merges stay as ranges and are tested per cell.
struct MergeLookup<'a> {
    cells: HashMap<CellRef, (&'a str, bool)>,
    large: Vec<(CellRange, &'a str)>,
}

impl<'a> MergeLookup<'a> {
    fn get(&self, at: CellRef) -> Option<(&'a str, bool)> {
        if let Some(&hit) = self.cells.get(&at) {
            return Some(hit);
        }
        self.large
            .iter()
            .find(|(range, _)| range.contains(at))
            .map(|&(range, reference)| (reference, at == range.start))
    }
}

fn merge_lookup(merges: &[MergedRange]) -> MergeLookup<'_> {
    let mut lookup = MergeLookup {
        cells: HashMap::new(),
        large: Vec::new(),
    };
    for m in merges {
        let range = CellRange {
            start: m.start,
            end: m.end,
        };
        let rows = u64::from(m.end.row - m.start.row) + 1;
        let cols = u64::from(m.end.col - m.start.col) + 1;
        if rows * cols > EXPANDED_MERGE_LIMIT {
            lookup.large.push((range, m.reference.as_str()));
            continue;
        }
        for cell in range.cells() {
            lookup.cells.insert(cell, (m.reference.as_str(), cell == m.start));
        }
    }
    lookup
}

/// Options of a literal list rule such as `"Yes,No,Maybe"`.
fn list_options(formula: &str) -> Vec<String> {
    let Some(inner) = formula
        .trim()
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
    else {
        return Vec::new();
    };
    inner
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

fn read_validations(root: XNode, sheet_id: &str) -> Vec<DataValidation> {
    let Some(container) = sml(root, "dataValidations") else {
        return Vec::new();
    };
    let text_of = |dv: XNode, name: &str| sml(dv, name).and_then(|n| n.text()).map(str::to_string);
    sml_children(container, "dataValidation")
        .enumerate()
        .map(|(i, dv)| {
            let kind = dv.attribute("type").unwrap_or("none").to_string();
            let formula1 = text_of(dv, "formula1");
            let options = match (&*kind, &formula1) {
                ("list", Some(f)) => list_options(f),
                _ => Vec::new(),
            };
            DataValidation {
                id: format!("{sheet_id}-dv-{i}"),
                sqref: dv.attribute("sqref").unwrap_or("").to_string(),
                kind,
                operator: owned(dv, "operator"),
                formula1,
                formula2: text_of(dv, "formula2"),
                allow_blank: flag(dv, "allowBlank"),
                error_title: owned(dv, "errorTitle"),
                error_message: owned(dv, "error"),
                prompt_title: owned(dv, "promptTitle"),
                prompt: owned(dv, "prompt"),
                options,
            }
        })
        .collect()
}

fn read_conditional_formats(root: XNode, sheet_id: &str) -> Vec<ConditionalFormatting> {
    sml_children(root, "conditionalFormatting")
        .enumerate()
        .map(|(i, cf)| {
            let id = format!("{sheet_id}-cf-{i}");
            let rules = sml_children(cf, "cfRule")
                .enumerate()
                .map(|(j, rule)| read_cf_rule(rule, format!("{id}-{j}")))
                .collect();
            ConditionalFormatting {
                id,
                sqref: cf.attribute("sqref").unwrap_or("").to_string(),
                rules,
            }
        })
        .collect()
}

fn read_cf_rule(rule: XNode, id: String) -> ConditionalRule {
    let colors = |node: XNode| -> Vec<String> {
        sml_children(node, "color")
            .filter_map(|c| c.attribute("rgb").or_else(|| c.attribute("theme")))
            .map(str::to_string)
            .collect()
    };
    ConditionalRule {
        id,
        kind: rule.attribute("type").unwrap_or("").to_string(),
        priority: rule.attribute("priority").and_then(|v| v.parse().ok()).unwrap_or(0),
        operator: owned(rule, "operator"),
        formulas: sml_children(rule, "formula")
            .filter_map(|f| f.text())
            .map(str::to_string)
            .collect(),
        dxf_id: rule.attribute("dxfId").and_then(|v| v.parse().ok()),
        stop_if_true: flag(rule, "stopIfTrue"),
        color_scale: sml(rule, "colorScale").map(colors).unwrap_or_default(),
        data_bar_color: sml(rule, "dataBar").and_then(|bar| colors(bar).into_iter().next()),
        icon_set: sml(rule, "iconSet").map(|s| s.attribute("iconSet").unwrap_or("3TrafficLights1").to_string()),
    }
}

fn read_hyperlinks(root: XNode, sheet_id: &str, rels: &HashMap<String, Relationship>) -> Vec<Hyperlink> {
    let Some(container) = sml(root, "hyperlinks") else {
        return Vec::new();
    };
    sml_children(container, "hyperlink")
        .enumerate()
        .filter_map(|(i, link)| {
            let cell = link.attribute("ref")?.to_string();
            let target = link
                .attribute((crate::package::REL_NS, "id"))
                .and_then(|rid| rels.get(rid))
                .map(|r| r.target.clone());
            Some(Hyperlink {
                id: format!("{sheet_id}-link-{i}"),
                cell,
                target,
                location: owned(link, "location"),
                display: owned(link, "display"),
                tooltip: owned(link, "tooltip"),
            })
        })
        .collect()
}

fn read_view(root: XNode) -> Option<SheetView> {
    let view = sml(root, "sheetViews").and_then(|v| sml(v, "sheetView"))?;
    let freeze = sml(view, "pane")
        .filter(|p| matches!(p.attribute("state"), Some("frozen" | "frozenSplit")))
        .map(|pane| {
            let split = |name: &str| {
                pane.attribute(name)
                    .and_then(|v| v.parse::<f64>().ok())
                    .map_or(0, |v| v as u32)
            };
            FreezePane {
                x_split: split("xSplit"),
                y_split: split("ySplit"),
                top_left_cell: owned(pane, "topLeftCell"),
            }
        });
    Some(SheetView {
        zoom: view.attribute("zoomScale").and_then(|v| v.parse().ok()).unwrap_or(100),
        show_gridlines: !matches!(view.attribute("showGridLines"), Some("0" | "false")),
        tab_selected: flag(view, "tabSelected"),
        active_cell: sml(view, "selection").and_then(|s| owned(s, "activeCell")),
        freeze,
    })
}

/// Sparkline groups live in the `x14` worksheet extension.
fn read_sparklines(root: XNode, sheet_id: &str) -> Vec<SparklineGroup> {
    let Some(ext_list) = sml(root, "extLst") else {
        return Vec::new();
    };
    let local = |node: XNode, name: &str| node.is_element() && node.tag_name().name() == name;
    ext_list
        .descendants()
        .filter(|n| local(*n, "sparklineGroup"))
        .enumerate()
        .map(|(i, group)| {
            let sparklines = group
                .children()
                .filter(|n| local(*n, "sparklines"))
                .flat_map(|s| s.children().filter(|n| local(*n, "sparkline")))
                .map(|line| {
                    let text = |name: &str| {
                        line.children()
                            .find(|n| local(*n, name))
                            .and_then(|n| n.text())
                            .unwrap_or("")
                            .to_string()
                    };
                    Sparkline {
                        location: text("sqref"),
                        data_range: text("f"),
                    }
                })
                .collect();
            SparklineGroup {
                id: format!("{sheet_id}-sparkline-{i}"),
                kind: group.attribute("type").unwrap_or("line").to_string(),
                color_series: group
                    .children()
                    .find(|n| local(*n, "colorSeries"))
                    .and_then(|c| owned(c, "rgb")),
                sparklines,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:x14="http://schemas.microsoft.com/office/spreadsheetml/2009/9/main" xmlns:xm="http://schemas.microsoft.com/office/excel/2006/main">
<dimension ref="A1:C3"/>
<sheetViews><sheetView tabSelected="1" zoomScale="85" workbookViewId="0"><pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/><selection pane="bottomLeft" activeCell="B2"/></sheetView></sheetViews>
<cols><col min="1" max="2" width="12.5" customWidth="1"/></cols>
<sheetData>
<row r="1" ht="30" customHeight="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="b"><v>1</v></c><c t="inlineStr"><is><t>inline</t></is></c></row>
<row r="2"><c r="A2"><v>3.5</v></c><c r="B2"><f>A2*12</f><v>42</v></c><c r="C2"><f t="shared" ref="C2:C3" si="0">A2+1</f><v>4.5</v></c></row>
<row><c r="C3"><f t="shared" si="0"/><v>1</v></c><c r="D3" t="e"><v>#DIV/0!</v></c></row>
</sheetData>
<mergeCells count="1"><mergeCell ref="A3:B3"/></mergeCells>
<conditionalFormatting sqref="A2:A10"><cfRule type="cellIs" dxfId="0" priority="1" operator="greaterThan"><formula>3</formula></cfRule></conditionalFormatting>
<dataValidations count="1"><dataValidation type="list" allowBlank="1" sqref="A1 D1:D5"><formula1>"Yes, No,Maybe"</formula1></dataValidation></dataValidations>
<hyperlinks><hyperlink ref="B1" r:id="rId1" display="site"/></hyperlinks>
<extLst><ext uri="{05C60535-1F16-4fd2-B633-F4F36F0B64E0}"><x14:sparklineGroups><x14:sparklineGroup type="column" displayEmptyCellsAs="gap"><x14:colorSeries rgb="FF376092"/><x14:sparklines><x14:sparkline><xm:f>Sheet1!A2:C2</xm:f><xm:sqref>D2</xm:sqref></x14:sparkline></x14:sparklines></x14:sparklineGroup></x14:sparklineGroups></ext></extLst>
</worksheet>"#;

    fn parse_fixture() -> Sheet {
        let doc = roxmltree::Document::parse(SHEET).unwrap();
        let shared = vec![SharedString {
            index: 0,
            text: "hello".into(),
            rich_text: false,
        }];
        let styles = StyleTables::default();
        let rels = crate::package::parse_rels_xml(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/></Relationships>"#,
        );
        let source = SheetSource {
            id: "sheet-0",
            name: "Sheet1",
            index: 0,
            part: "xl/worksheets/sheet1.xml",
            hidden: false,
            shared_strings: &shared,
            styles: &styles,
            rels: &rels,
        };
        parse_sheet(doc.root_element(), &source)
    }

    #[test]
    fn values_follow_type_tags() {
        let sheet = parse_fixture();
        assert_eq!(sheet.cell("A1").unwrap().value, CellValue::Text("hello".into()));
        assert_eq!(sheet.cell("B1").unwrap().value, CellValue::Boolean(true));
        assert_eq!(sheet.cell("C1").unwrap().value, CellValue::Text("inline".into()));
        assert_eq!(sheet.cell("A2").unwrap().value, CellValue::Number(3.5));
        assert_eq!(sheet.cell("D3").unwrap().value, CellValue::Error("#DIV/0!".into()));
        assert_eq!(sheet.cell("B2").unwrap().id, "sheet-0-B2");
    }

    #[test]
    fn formulas_keep_shared_master_reference() {
        let sheet = parse_fixture();
        let b2 = sheet.cell("B2").unwrap().formula.clone().unwrap();
        assert_eq!(b2.text, "A2*12");
        assert_eq!(b2.kind, FormulaKind::Normal);
        let c2 = sheet.cell("C2").unwrap().formula.clone().unwrap();
        assert_eq!((c2.kind, c2.shared_ref.as_deref(), c2.shared_index), (FormulaKind::Shared, Some("C2:C3"), Some(0)));
        let c3 = sheet.cell("C3").unwrap().formula.clone().unwrap();
        assert_eq!((c3.text.as_str(), c3.shared_index), ("", Some(0)));
    }

    #[test]
    fn rows_without_r_follow_previous_row() {
        let sheet = parse_fixture();
        assert_eq!(sheet.cell("C3").unwrap().row, 3);
    }

    #[test]
    fn membership_flags_are_denormalized() {
        let sheet = parse_fixture();
        assert!(sheet.cell("A1").unwrap().has_validation);
        assert!(!sheet.cell("B1").unwrap().has_validation);
        assert!(sheet.cell("B1").unwrap().has_hyperlink);
        assert_eq!(sheet.validations[0].options, ["Yes", "No", "Maybe"]);
        assert_eq!(sheet.hyperlinks[0].target.as_deref(), Some("https://example.com/"));
        assert_eq!(sheet.merged_ranges[0].reference, "A3:B3");
    }

    #[test]
    fn view_columns_and_extensions() {
        let sheet = parse_fixture();
        let view = sheet.view.unwrap();
        assert_eq!(view.zoom, 85);
        assert_eq!(view.active_cell.as_deref(), Some("B2"));
        let freeze = view.freeze.unwrap();
        assert_eq!((freeze.x_split, freeze.y_split), (0, 1));
        assert_eq!(sheet.columns[0].width, Some(12.5));
        assert_eq!(sheet.rows[0].height, Some(30.0));
        assert_eq!(sheet.conditional_formats[0].rules[0].formulas, ["3"]);
        let group = &sheet.sparkline_groups[0];
        assert_eq!(group.kind, "column");
        assert_eq!(group.sparklines[0].data_range, "Sheet1!A2:C2");
        assert_eq!(group.sparklines[0].location, "D2");
        assert_eq!(sheet.dimension.as_deref(), Some("A1:C3"));
    }

    #[test]
    fn merged_cells_know_their_range() {
        let src = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1"><v>1</v></c><c r="B1"/></row></sheetData><mergeCells><mergeCell ref="A1:B1"/></mergeCells></worksheet>"#;
        let doc = roxmltree::Document::parse(src).unwrap();
        let styles = StyleTables::default();
        let rels = HashMap::new();
        let source = SheetSource {
            id: "sheet-0",
            name: "S",
            index: 0,
            part: "xl/worksheets/sheet1.xml",
            hidden: false,
            shared_strings: &[],
            styles: &styles,
            rels: &rels,
        };
        let sheet = parse_sheet(doc.root_element(), &source);
        let a1 = sheet.cell("A1").unwrap();
        let b1 = sheet.cell("B1").unwrap();
        assert_eq!(a1.merge_range.as_deref(), Some("A1:B1"));
        assert!(a1.merge_origin && !b1.merge_origin);
        assert_eq!(b1.merge_range.as_deref(), Some("A1:B1"));
        assert_eq!(b1.value, CellValue::Empty);
    }

    #[test]
    fn whole_column_merge_is_checked_by_range() {
        let merges = [
            MergedRange {
                id: "m0".into(),
                reference: "A1:A1048576".into(),
                start: CellRef::new(1, 1),
                end: CellRef::new(1_048_576, 1),
            },
            MergedRange {
                id: "m1".into(),
                reference: "C2:D3".into(),
                start: CellRef::new(2, 3),
                end: CellRef::new(3, 4),
            },
        ];
        let lookup = merge_lookup(&merges);
        assert_eq!(lookup.cells.len(), 4);
        assert_eq!(lookup.large.len(), 1);

        assert_eq!(lookup.get(CellRef::new(1, 1)), Some(("A1:A1048576", true)));
        assert_eq!(lookup.get(CellRef::new(900_000, 1)), Some(("A1:A1048576", false)));
        assert_eq!(lookup.get(CellRef::new(3, 4)), Some(("C2:D3", false)));
        assert_eq!(lookup.get(CellRef::new(5, 2)), None);
    }
}
