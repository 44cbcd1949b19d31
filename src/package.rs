use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};

use zip::ZipArchive;
use zip::write::SimpleFileOptions;

use crate::Error;

pub(crate) const REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

pub(crate) type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn open(bytes: &[u8]) -> Result<Archive<'_>, Error> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|_| Error::InvalidContainer("input is not a ZIP archive".into()))
}

pub(crate) fn read_zip_text<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> Option<String> {
    let mut content = String::new();
    zip.by_name(name).ok()?.read_to_string(&mut content).ok()?;
    Some(content)
}

pub(crate) fn has_part<R: Read + Seek>(zip: &ZipArchive<R>, name: &str) -> bool {
    zip.index_for_name(name).is_some()
}

/// Text of an XML part with any UTF-8 byte order mark split off, so that
/// byte offsets reported by the parser line up with `text`.
pub(crate) struct XmlPart {
    pub(crate) name: String,
    pub(crate) bom: bool,
    pub(crate) text: String,
}

impl XmlPart {
    pub(crate) fn read<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> Result<Self, Error> {
        let mut file = zip
            .by_name(name)
            .map_err(|_| Error::MissingPart(name.to_string()))?;
        let mut text = String::new();
        file.read_to_string(&mut text)?;
        let bom = text.starts_with('\u{feff}');
        if bom {
            text.drain(..'\u{feff}'.len_utf8());
        }
        Ok(XmlPart {
            name: name.to_string(),
            bom,
            text,
        })
    }

    pub(crate) fn into_bytes_with(&self, body: String) -> Vec<u8> {
        let mut out = Vec::with_capacity(body.len() + 3);
        if self.bom {
            out.extend_from_slice("\u{feff}".as_bytes());
        }
        out.extend_from_slice(body.as_bytes());
        out
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Relationship {
    pub(crate) target: String,
    pub(crate) kind: String,
    pub(crate) external: bool,
}

pub(crate) fn parse_rels_xml(xml_content: &str) -> HashMap<String, Relationship> {
    let mut rels = HashMap::new();
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        return rels;
    };
    for node in xml.root_element().children() {
        if node.tag_name().name() == "Relationship"
            && let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target"))
        {
            rels.insert(
                id.to_string(),
                Relationship {
                    target: target.to_string(),
                    kind: node.attribute("Type").unwrap_or("").to_string(),
                    external: node.attribute("TargetMode") == Some("External"),
                },
            );
        }
    }
    rels
}

/// "xl/worksheets/sheet1.xml" -> "xl/worksheets/_rels/sheet1.xml.rels"
pub(crate) fn rels_path(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_path),
    }
}

pub(crate) fn part_relationships<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    part_path: &str,
) -> HashMap<String, Relationship> {
    let Some(xml_content) = read_zip_text(zip, &rels_path(part_path)) else {
        return HashMap::new();
    };
    parse_rels_xml(&xml_content)
}

/// Resolve a relationship target relative to the part that owns the
/// relationship. Absolute targets ("/xl/media/a.png") are package-rooted.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Locate the main part through the package relationships, falling back to
/// the conventional location when `_rels/.rels` is absent or silent.
pub(crate) fn main_part<R: Read + Seek>(zip: &mut ZipArchive<R>, fallback: &str) -> String {
    let rels = read_zip_text(zip, "_rels/.rels")
        .map(|xml| parse_rels_xml(&xml))
        .unwrap_or_default();
    rels.values()
        .find(|r| r.kind.ends_with(OFFICE_DOCUMENT_REL) && !r.external)
        .map(|r| resolve_target("", &r.target))
        .filter(|name| has_part(zip, name))
        .unwrap_or_else(|| fallback.to_string())
}

/// Write a new container: entries named in `replacements` get the new bytes,
/// compressed with the method of the entry they replace; every other entry
/// is raw-copied without decompression.
pub(crate) fn rewrite(base: &[u8], replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, Error> {
    let mut archive = open(base)?;
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::with_capacity(base.len())));

    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        let name = file.name().to_string();
        match replacements.get(&name) {
            Some(bytes) => {
                let mut options = SimpleFileOptions::default().compression_method(file.compression());
                if let Some(modified) = file.last_modified() {
                    options = options.last_modified_time(modified);
                }
                drop(file);
                log::debug!("Rewriting part {} ({} bytes)", name, bytes.len());
                zip.start_file(name, options)?;
                zip.write_all(bytes)?;
            }
            None => zip.raw_copy_file(file)?,
        }
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_targets() {
        assert_eq!(
            resolve_target("xl/worksheets/sheet1.xml", "../drawings/drawing1.xml"),
            "xl/drawings/drawing1.xml"
        );
        assert_eq!(resolve_target("xl/workbook.xml", "worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(resolve_target("xl/workbook.xml", "/xl/worksheets/sheet3.xml"), "xl/worksheets/sheet3.xml");
        assert_eq!(resolve_target("", "word/document.xml"), "word/document.xml");
    }

    #[test]
    fn rels_path_for_nested_and_root_parts() {
        assert_eq!(rels_path("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_path("root.xml"), "_rels/root.xml.rels");
    }
}
