#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const W: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/></Types>"#;

const DOCX_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const XLSX_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Normal"><w:name w:val="Normal"/></w:style></w:styles>"#;

const SML: &str = r#"xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

/// Deflated ZIP with the entries in the order given.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Word-processing package around `body`, the children of `w:body`.
pub fn docx(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document {W} mc:Ignorable="w14" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"><w:body>{body}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#
    );
    zip_bytes(&[
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", DOCX_RELS.as_bytes()),
        ("word/document.xml", document.as_bytes()),
        ("word/styles.xml", STYLES.as_bytes()),
        ("docProps/core.xml", br#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Fixture</dc:title></cp:coreProperties>"#),
    ])
}

pub fn para(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

pub fn checkbox_sdt(id: u32, checked: bool, content: &str) -> String {
    let (val, glyph) = if checked { ("1", "\u{2612}") } else { ("0", "\u{2610}") };
    let content = if content.is_empty() {
        format!("<w:r><w:t>{glyph}</w:t></w:r>")
    } else {
        content.to_string()
    };
    format!(
        r#"<w:sdt><w:sdtPr><w:alias w:val="Check {id}"/><w:id w:val="{id}"/><w14:checkbox><w14:checked w14:val="{val}"/><w14:checkedState w14:val="2612"/><w14:uncheckedState w14:val="2610"/></w14:checkbox></w:sdtPr><w:sdtContent>{content}</w:sdtContent></w:sdt>"#
    )
}

pub fn dropdown_sdt(id: u32, options: &[&str], shown: &str) -> String {
    let items: String = options
        .iter()
        .map(|o| format!(r#"<w:listItem w:displayText="{o}" w:value="{o}"/>"#))
        .collect();
    format!(
        r#"<w:sdt><w:sdtPr><w:alias w:val="Pick"/><w:id w:val="{id}"/><w:dropDownList w:lastValue="{shown}">{items}</w:dropDownList></w:sdtPr><w:sdtContent><w:r><w:t>{shown}</w:t></w:r></w:sdtContent></w:sdt>"#
    )
}

/// One sheet of a spreadsheet fixture: name and the children of `worksheet`.
pub struct SheetXml<'a> {
    pub name: &'a str,
    pub body: &'a str,
}

/// Spreadsheet package. `shared` of `None` leaves out the shared-strings part.
pub fn xlsx(sheets: &[SheetXml], shared: Option<&[&str]>) -> Vec<u8> {
    xlsx_with(sheets, shared, &[])
}

/// Spreadsheet package with extra entries such as sheet relationships.
pub fn xlsx_with(sheets: &[SheetXml], shared: Option<&[&str]>, extra: &[(&str, &str)]) -> Vec<u8> {
    let sheet_list: String = sheets
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                s.name,
                i + 1,
                i + 1
            )
        })
        .collect();
    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook {SML}><bookViews><workbookView activeTab="0"/></bookViews><sheets>{sheet_list}</sheets></workbook>"#
    );

    let mut rels: String = (0..sheets.len())
        .map(|i| {
            format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                i + 1,
                i + 1
            )
        })
        .collect();
    if shared.is_some() {
        rels.push_str(r#"<Relationship Id="rIdSst" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#);
    }
    let workbook_rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
    );

    let mut owned: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".into(), CONTENT_TYPES.as_bytes().to_vec()),
        ("_rels/.rels".into(), XLSX_RELS.as_bytes().to_vec()),
        ("xl/workbook.xml".into(), workbook.into_bytes()),
        ("xl/_rels/workbook.xml.rels".into(), workbook_rels.into_bytes()),
    ];
    for (i, sheet) in sheets.iter().enumerate() {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet {SML}>{}</worksheet>"#,
            sheet.body
        );
        owned.push((format!("xl/worksheets/sheet{}.xml", i + 1), xml.into_bytes()));
    }
    if let Some(strings) = shared {
        let items: String = strings.iter().map(|s| format!("<si><t>{s}</t></si>")).collect();
        let sst = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst {SML} count="{n}" uniqueCount="{n}">{items}</sst>"#,
            n = strings.len()
        );
        owned.push(("xl/sharedStrings.xml".into(), sst.into_bytes()));
    }
    for (name, text) in extra {
        owned.push((name.to_string(), text.as_bytes().to_vec()));
    }
    let entries: Vec<(&str, &[u8])> = owned.iter().map(|(n, d)| (n.as_str(), d.as_slice())).collect();
    zip_bytes(&entries)
}

/// Copy of a package without the entry `name`.
pub fn without_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..archive.len() {
        let file = archive.by_index(i).unwrap();
        if file.name() != name {
            zip.raw_copy_file(file).unwrap();
        }
    }
    zip.finish().unwrap().into_inner()
}

pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

pub fn entry_text(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut text = String::new();
    archive.by_name(name).unwrap().read_to_string(&mut text).unwrap();
    text
}

/// Compression method, CRC and decompressed bytes of an entry.
pub fn entry_fingerprint(bytes: &[u8], name: &str) -> (CompressionMethod, u32, Vec<u8>) {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut data = Vec::new();
    file.read_to_end(&mut data).unwrap();
    (file.compression(), file.crc32(), data)
}

/// Element named `local` (any namespace) with attribute `r` equal to `cell`,
/// rendered as source text.
pub fn cell_xml(sheet_xml: &str, cell: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(sheet_xml).unwrap();
    doc.descendants()
        .find(|n| n.tag_name().name() == "c" && n.attribute("r") == Some(cell))
        .map(|n| sheet_xml[n.range()].to_string())
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
