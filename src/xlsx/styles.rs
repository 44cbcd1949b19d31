use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{XNode, sml, sml_children};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Font {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strike: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderSide {
    pub style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Border {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<BorderSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<BorderSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<BorderSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<BorderSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagonal: Option<BorderSide>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Alignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<String>,
    #[serde(default)]
    pub wrap_text: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_rotation: Option<i32>,
}

/// One `cellXfs/xf` record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellFormat {
    pub font_id: u32,
    pub fill_id: u32,
    pub border_id: u32,
    pub num_fmt_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StyleTables {
    pub fonts: Vec<Font>,
    pub fills: Vec<Fill>,
    pub borders: Vec<Border>,
    pub cell_formats: Vec<CellFormat>,
    /// Custom number formats by id.
    pub number_formats: BTreeMap<u32, String>,
}

/// The formatting a cell's `s` index resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellStyle {
    pub style_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
}

/// Format codes Excel implies for ids below 164 without writing them out.
fn builtin_number_format(id: u32) -> Option<&'static str> {
    Some(match id {
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

impl StyleTables {
    pub fn number_format(&self, id: u32) -> Option<String> {
        self.number_formats
            .get(&id)
            .cloned()
            .or_else(|| builtin_number_format(id).map(str::to_string))
    }

    pub fn resolve(&self, style_id: u32) -> Option<CellStyle> {
        let xf = self.cell_formats.get(style_id as usize)?;
        Some(CellStyle {
            style_id,
            font: self.fonts.get(xf.font_id as usize).cloned(),
            fill: self.fills.get(xf.fill_id as usize).cloned(),
            border: self.borders.get(xf.border_id as usize).cloned(),
            alignment: xf.alignment.clone(),
            number_format: self.number_format(xf.num_fmt_id),
        })
    }
}

fn color_of(node: XNode) -> Option<String> {
    ["rgb", "theme", "indexed"]
        .iter()
        .find_map(|attr| node.attribute(*attr))
        .map(|v| v.to_string())
}

fn uint_attr(node: XNode, name: &str) -> u32 {
    node.attribute(name).and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn read_font(font: XNode) -> Font {
    let flag = |name: &str| {
        sml(font, name).is_some_and(|n| n.attribute("val").is_none_or(|v| v != "0" && v != "false"))
    };
    Font {
        name: sml(font, "name").and_then(|n| n.attribute("val")).map(str::to_string),
        size: sml(font, "sz").and_then(|n| n.attribute("val")).and_then(|v| v.parse().ok()),
        bold: flag("b"),
        italic: flag("i"),
        underline: sml(font, "u").is_some_and(|n| n.attribute("val") != Some("none")),
        strike: flag("strike"),
        color: sml(font, "color").and_then(color_of),
    }
}

fn read_fill(fill: XNode) -> Fill {
    let Some(pattern) = sml(fill, "patternFill") else {
        return Fill::default();
    };
    Fill {
        pattern: pattern.attribute("patternType").map(str::to_string),
        fg_color: sml(pattern, "fgColor").and_then(color_of),
        bg_color: sml(pattern, "bgColor").and_then(color_of),
    }
}

fn read_border(border: XNode) -> Border {
    let side = |name: &str| {
        let node = sml(border, name)?;
        Some(BorderSide {
            style: node.attribute("style")?.to_string(),
            color: sml(node, "color").and_then(color_of),
        })
    };
    Border {
        left: side("left").or_else(|| side("start")),
        right: side("right").or_else(|| side("end")),
        top: side("top"),
        bottom: side("bottom"),
        diagonal: side("diagonal"),
    }
}

fn read_cell_format(xf: XNode) -> CellFormat {
    CellFormat {
        font_id: uint_attr(xf, "fontId"),
        fill_id: uint_attr(xf, "fillId"),
        border_id: uint_attr(xf, "borderId"),
        num_fmt_id: uint_attr(xf, "numFmtId"),
        alignment: sml(xf, "alignment").map(|a| Alignment {
            horizontal: a.attribute("horizontal").map(str::to_string),
            vertical: a.attribute("vertical").map(str::to_string),
            wrap_text: matches!(a.attribute("wrapText"), Some("1" | "true")),
            text_rotation: a.attribute("textRotation").and_then(|v| v.parse().ok()),
        }),
    }
}

fn list<'a>(root: XNode<'a>, container: &str, item: &str) -> Vec<XNode<'a>> {
    sml(root, container)
        .map(|c| sml_children(c, item).collect())
        .unwrap_or_default()
}

/// Parse `xl/styles.xml`. Missing or malformed tables come back empty.
pub(crate) fn parse_styles(xml_content: &str) -> StyleTables {
    let mut tables = StyleTables::default();
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("styles part is not well-formed; cell styles will be omitted");
        return tables;
    };
    let root = xml.root_element();

    tables.fonts = list(root, "fonts", "font").into_iter().map(read_font).collect();
    tables.fills = list(root, "fills", "fill").into_iter().map(read_fill).collect();
    tables.borders = list(root, "borders", "border").into_iter().map(read_border).collect();
    tables.cell_formats = list(root, "cellXfs", "xf").into_iter().map(read_cell_format).collect();
    for fmt in list(root, "numFmts", "numFmt") {
        if let Some(code) = fmt.attribute("formatCode") {
            tables.number_formats.insert(uint_attr(fmt, "numFmtId"), code.to_string());
        }
    }

    log::debug!(
        "Styles: {} fonts, {} fills, {} borders, {} cell formats, {} number formats",
        tables.fonts.len(),
        tables.fills.len(),
        tables.borders.len(),
        tables.cell_formats.len(),
        tables.number_formats.len()
    );
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="0.000"/></numFmts>
<fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><i val="0"/><u/><sz val="14"/><color rgb="FFFF0000"/><name val="Arial"/></font></fonts>
<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/><bgColor indexed="64"/></patternFill></fill></fills>
<borders count="2"><border><left/><right/><top/><bottom/></border><border><left style="thin"><color auto="1" indexed="64"/></left><bottom style="double"/></border></borders>
<cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/><xf numFmtId="164" fontId="1" fillId="1" borderId="1"><alignment horizontal="center" wrapText="1"/></xf><xf numFmtId="10" fontId="0" fillId="0" borderId="0"/></cellXfs>
</styleSheet>"#;

    #[test]
    fn resolves_cell_format_through_tables() {
        let tables = parse_styles(STYLES);
        let style = tables.resolve(1).unwrap();
        let font = style.font.unwrap();
        assert_eq!(font.name.as_deref(), Some("Arial"));
        assert!(font.bold && font.underline && !font.italic);
        assert_eq!(font.color.as_deref(), Some("FFFF0000"));
        assert_eq!(style.fill.unwrap().fg_color.as_deref(), Some("FFFFFF00"));
        let border = style.border.unwrap();
        assert_eq!(border.left.unwrap().color.as_deref(), Some("64"));
        assert_eq!(border.bottom.unwrap().style, "double");
        assert!(border.top.is_none());
        assert_eq!(style.number_format.as_deref(), Some("0.000"));
        assert!(style.alignment.unwrap().wrap_text);
    }

    #[test]
    fn builtin_formats_fill_in_for_low_ids() {
        let tables = parse_styles(STYLES);
        assert_eq!(tables.resolve(2).unwrap().number_format.as_deref(), Some("0.00%"));
        assert_eq!(tables.resolve(0).unwrap().number_format, None);
        assert!(tables.resolve(9).is_none());
    }

    #[test]
    fn malformed_styles_are_empty() {
        assert_eq!(parse_styles("<styleSheet"), StyleTables::default());
    }
}
