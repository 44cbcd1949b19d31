//! Workbook-level parts and the parts a worksheet reaches through its
//! relationships: drawings, comments, legacy VML controls and tables.

use crate::package::{self, Archive, REL_NS};

use super::model::{
    Anchor, Comment, DefinedName, FormControl, FormControlKind, Image, Properties, SharedString,
    Sheet, TableDef,
};
use super::sheet::{SheetSource, string_item_text};
use super::{XNode, is_sml, sml, sml_children};

const XDR_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const DCTERMS_NS: &str = "http://purl.org/dc/terms/";
const CP_NS: &str = "http://schemas.openxmlformats.org/package/2006/metadata/core-properties";

pub(crate) struct SheetEntry {
    pub(crate) name: String,
    pub(crate) rel_id: String,
    pub(crate) hidden: bool,
}

pub(crate) struct WorkbookInfo {
    pub(crate) sheets: Vec<SheetEntry>,
    pub(crate) active_tab: usize,
    pub(crate) defined_names: Vec<DefinedName>,
}

pub(crate) fn read_workbook(root: XNode) -> WorkbookInfo {
    let sheets = sml(root, "sheets")
        .map(|s| {
            sml_children(s, "sheet")
                .map(|sheet| SheetEntry {
                    name: sheet.attribute("name").unwrap_or("").to_string(),
                    rel_id: sheet.attribute((REL_NS, "id")).unwrap_or("").to_string(),
                    hidden: matches!(sheet.attribute("state"), Some("hidden" | "veryHidden")),
                })
                .collect()
        })
        .unwrap_or_default();
    let active_tab = sml(root, "bookViews")
        .and_then(|v| sml(v, "workbookView"))
        .and_then(|v| v.attribute("activeTab"))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let defined_names = sml(root, "definedNames")
        .map(|d| {
            sml_children(d, "definedName")
                .map(|dn| {
                    let name = dn.attribute("name").unwrap_or("").to_string();
                    DefinedName {
                        builtin: name.starts_with("_xlnm."),
                        name,
                        value: dn.text().unwrap_or("").to_string(),
                        local_sheet_id: dn.attribute("localSheetId").and_then(|v| v.parse().ok()),
                        hidden: matches!(dn.attribute("hidden"), Some("1" | "true")),
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    WorkbookInfo {
        sheets,
        active_tab,
        defined_names,
    }
}

pub(crate) fn read_shared_strings(xml_content: &str) -> Vec<SharedString> {
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("shared strings part is not well-formed; string cells will be empty");
        return Vec::new();
    };
    sml_children(xml.root_element(), "si")
        .enumerate()
        .map(|(index, si)| {
            let (text, rich_text) = string_item_text(si);
            SharedString {
                index,
                text,
                rich_text,
            }
        })
        .collect()
}

pub(crate) fn read_properties(xml_content: &str) -> Properties {
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        return Properties::default();
    };
    let field = |ns: &str, name: &str| {
        xml.root_element()
            .children()
            .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(ns))
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    Properties {
        title: field(DC_NS, "title"),
        creator: field(DC_NS, "creator"),
        last_modified_by: field(CP_NS, "lastModifiedBy"),
        created: field(DCTERMS_NS, "created"),
        modified: field(DCTERMS_NS, "modified"),
    }
}

/// Parts a worksheet relationship of kind `suffix` points at.
fn related_parts(source: &SheetSource, suffix: &str) -> Vec<String> {
    let mut parts: Vec<(&String, String)> = source
        .rels
        .iter()
        .filter(|(_, r)| !r.external && r.kind.ends_with(suffix))
        .map(|(id, r)| (id, package::resolve_target(source.part, &r.target)))
        .collect();
    parts.sort();
    parts.into_iter().map(|(_, part)| part).collect()
}

/// Fill in the per-sheet collections that live in separate parts.
pub(crate) fn attach_related(zip: &mut Archive, source: &SheetSource, sheet: &mut Sheet) {
    for part in related_parts(source, "/drawing") {
        if let Some(xml) = package::read_zip_text(zip, &part) {
            let rels = package::part_relationships(zip, &part);
            sheet
                .images
                .extend(read_images(&xml, &part, &rels, source.id, sheet.images.len()));
        }
    }
    for part in related_parts(source, "/comments") {
        if let Some(xml) = package::read_zip_text(zip, &part) {
            sheet.comments.extend(read_comments(&xml, source.id));
        }
    }
    for part in related_parts(source, "/vmlDrawing") {
        if let Some(vml) = package::read_zip_text(zip, &part) {
            let start = sheet.form_controls.len();
            sheet.form_controls.extend(read_form_controls(&vml, source.id, start));
        }
    }
    for part in related_parts(source, "/table") {
        if let Some(xml) = package::read_zip_text(zip, &part) {
            sheet.tables.extend(read_table(&xml, source.id));
        }
    }
}

fn child_ns<'a>(node: XNode<'a>, ns: &str, name: &str) -> Option<XNode<'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(ns))
}

fn marker(anchor: XNode, name: &str) -> Option<(u32, u32)> {
    let m = child_ns(anchor, XDR_NS, name)?;
    let value = |field: &str| child_ns(m, XDR_NS, field)?.text()?.trim().parse().ok();
    Some((value("col")?, value("row")?))
}

fn read_images(
    xml_content: &str,
    part: &str,
    rels: &std::collections::HashMap<String, package::Relationship>,
    sheet_id: &str,
    first: usize,
) -> Vec<Image> {
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::debug!("Drawing part {} is not well-formed, skipping images", part);
        return Vec::new();
    };
    let mut images = Vec::new();
    let anchors = xml.root_element().children().filter(|n| {
        n.tag_name().namespace() == Some(XDR_NS) && n.tag_name().name().ends_with("Anchor")
    });
    for anchor in anchors {
        let Some(pic) = anchor
            .descendants()
            .find(|n| n.tag_name().name() == "pic" && n.tag_name().namespace() == Some(XDR_NS))
        else {
            continue;
        };
        let Some(embed) = pic
            .descendants()
            .find(|n| n.tag_name().name() == "blip" && n.tag_name().namespace() == Some(DML_NS))
            .and_then(|b| b.attribute((REL_NS, "embed")))
        else {
            continue;
        };
        let c_nv_pr = child_ns(pic, XDR_NS, "nvPicPr").and_then(|nv| child_ns(nv, XDR_NS, "cNvPr"));
        let (from_col, from_row) = marker(anchor, "from").unwrap_or_default();
        let to = marker(anchor, "to");
        images.push(Image {
            id: format!("{sheet_id}-img-{}", first + images.len()),
            name: c_nv_pr.and_then(|n| n.attribute("name")).map(str::to_string),
            description: c_nv_pr.and_then(|n| n.attribute("descr")).map(str::to_string),
            anchor: Anchor {
                from_col,
                from_row,
                to_col: to.map(|t| t.0),
                to_row: to.map(|t| t.1),
            },
            media_path: rels
                .get(embed)
                .map(|r| package::resolve_target(part, &r.target))
                .unwrap_or_default(),
            relationship_id: embed.to_string(),
        });
    }
    images
}

fn read_comments(xml_content: &str, sheet_id: &str) -> Vec<Comment> {
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        return Vec::new();
    };
    let root = xml.root_element();
    let authors: Vec<&str> = sml(root, "authors")
        .map(|a| sml_children(a, "author").map(|n| n.text().unwrap_or("")).collect())
        .unwrap_or_default();
    let Some(list) = sml(root, "commentList") else {
        return Vec::new();
    };
    sml_children(list, "comment")
        .enumerate()
        .map(|(i, comment)| Comment {
            id: format!("{sheet_id}-comment-{i}"),
            cell: comment.attribute("ref").unwrap_or("").to_string(),
            author: comment
                .attribute("authorId")
                .and_then(|v| v.parse::<usize>().ok())
                .and_then(|a| authors.get(a))
                .map(|s| s.to_string()),
            text: sml(comment, "text")
                .map(|t| string_item_text(t).0)
                .unwrap_or_default(),
        })
        .collect()
}

/// Inner text of the first `<tag>...</tag>` in `text`.
fn tag_text<'t>(text: &'t str, tag: &str) -> Option<&'t str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim())
}

fn attr_value<'t>(tag: &'t str, name: &str) -> Option<&'t str> {
    let needle = format!("{name}=");
    let mut search = 0;
    while let Some(found) = tag[search..].find(&needle) {
        let at = search + found;
        let preceded = tag[..at].ends_with(char::is_whitespace);
        let rest = &tag[at + needle.len()..];
        if preceded && let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') {
            let value = &rest[1..];
            return value.find(quote).map(|end| &value[..end]);
        }
        search = at + needle.len();
    }
    None
}

/// Form controls from legacy VML. VML is frequently not well-formed XML, so
/// shapes are located by scanning for `<v:shape` and `<x:ClientData`.
fn read_form_controls(vml: &str, sheet_id: &str, first: usize) -> Vec<FormControl> {
    let mut controls = Vec::new();
    let mut rest = vml;
    while let Some(start) = rest.find("<v:shape") {
        let shape_text = &rest[start..];
        // `<v:shapetype` is a template, not a shape.
        if shape_text[8..].starts_with(|c: char| c.is_alphanumeric()) {
            rest = &shape_text[8..];
            continue;
        }
        let end = shape_text
            .find("</v:shape>")
            .map_or(shape_text.len(), |e| e + "</v:shape>".len());
        let shape = &shape_text[..end];
        rest = &shape_text[end..];

        let open_tag = &shape[..shape.find('>').unwrap_or(shape.len())];
        let Some(cd_start) = shape.find("<x:ClientData") else {
            continue;
        };
        let client = &shape[cd_start..];
        let cd_tag = &client[..client.find('>').unwrap_or(client.len())];
        let Some(kind) = attr_value(cd_tag, "ObjectType").and_then(FormControlKind::from_object_type) else {
            continue;
        };
        let client = &client[..client.find("</x:ClientData>").unwrap_or(client.len())];

        let checked = if client.contains("<x:Checked/>") {
            Some(true)
        } else {
            tag_text(client, "x:Checked").map(|v| v != "0")
        };
        let anchor = tag_text(client, "x:Anchor").and_then(|a| {
            let parts: Vec<u32> = a.split(',').filter_map(|p| p.trim().parse().ok()).collect();
            (parts.len() >= 8).then(|| Anchor {
                from_col: parts[0],
                from_row: parts[2],
                to_col: Some(parts[4]),
                to_row: Some(parts[6]),
            })
        });

        controls.push(FormControl {
            id: format!("{sheet_id}-ctrl-{}", first + controls.len()),
            kind,
            shape_id: attr_value(open_tag, "id").map(str::to_string),
            checked,
            linked_cell: tag_text(client, "x:FmlaLink").map(str::to_string),
            input_range: tag_text(client, "x:FmlaRange").map(str::to_string),
            anchor,
        });
    }
    controls
}

fn read_table(xml_content: &str, sheet_id: &str) -> Option<TableDef> {
    let xml = roxmltree::Document::parse(xml_content).ok()?;
    let root = xml.root_element();
    if !is_sml(root, "table") {
        return None;
    }
    let name = root.attribute("name").unwrap_or("").to_string();
    let count = |attr: &str, default: u32| root.attribute(attr).and_then(|v| v.parse().ok()).unwrap_or(default);
    Some(TableDef {
        id: format!("{sheet_id}-table-{}", root.attribute("id").unwrap_or("")),
        display_name: root.attribute("displayName").map_or_else(|| name.clone(), str::to_string),
        name,
        reference: root.attribute("ref").unwrap_or("").to_string(),
        header_row_count: count("headerRowCount", 1),
        totals_row_count: count("totalsRowCount", 0),
        columns: sml(root, "tableColumns")
            .map(|cols| {
                sml_children(cols, "tableColumn")
                    .map(|c| c.attribute("name").unwrap_or("").to_string())
                    .collect()
            })
            .unwrap_or_default(),
        style_name: sml(root, "tableStyleInfo")
            .and_then(|s| s.attribute("name"))
            .map(str::to_string),
    })
}
