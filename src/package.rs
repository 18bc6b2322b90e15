//! Package relationship resolver.
//!
//! An xlsx file is a zip of XML parts linked by `.rels` files. Every hop
//! (workbook -> sheet, sheet -> drawing / pivot table, drawing -> chart,
//! workbook -> pivot cache) is the same three steps: find the source part's
//! `.rels`, pick the relationship by id or type, resolve its target against
//! the source part's directory. Any missing hop comes back as `None` or an
//! empty list so callers can skip just that branch.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use zip::ZipArchive;

use crate::error::{ImportError, Result, SkipReason};
use crate::xml_helpers::{attr_string, attr_string_local, xml_reader};

pub const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Relationship type suffixes (the part after the last `/` of the type URI).
pub mod rel_type {
    pub const WORKSHEET: &str = "worksheet";
    pub const DRAWING: &str = "drawing";
    pub const CHART: &str = "chart";
    pub const IMAGE: &str = "image";
    pub const HYPERLINK: &str = "hyperlink";
    pub const PIVOT_TABLE: &str = "pivotTable";
    pub const PIVOT_CACHE_DEFINITION: &str = "pivotCacheDefinition";
    pub const SHARED_STRINGS: &str = "sharedStrings";
    pub const STYLES: &str = "styles";
    pub const THEME: &str = "theme";
}

/// One `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    /// Full type URI.
    pub rel_type: String,
    /// Raw `Target` attribute.
    pub target: String,
    /// `TargetMode="External"`: `target` is a URL, not a part.
    pub external: bool,
    /// Target resolved to a package part name (empty for external targets).
    pub path: String,
}

impl Relationship {
    /// Compare the last segment of the type URI, which is stable across
    /// transitional and strict namespaces.
    pub fn is_type(&self, kind: &str) -> bool {
        self.rel_type.rsplit('/').next() == Some(kind)
    }
}

/// A `<sheet>` entry from the workbook manifest, joined with its part path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub r_id: String,
    pub state: Option<String>,
    /// Worksheet part, when the relationship resolves.
    pub path: Option<String>,
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns the `.rels`.
///
/// Handles `../media/image1.png` relative to `xl/drawings/drawing1.xml`,
/// and absolute `/xl/...` targets.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(stripped) = target.strip_prefix('/') {
        return stripped.to_string();
    }
    let base_dir = source_part.rsplit_once('/').map_or("", |(dir, _)| dir);
    let mut components: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for part in target.split('/') {
        match part {
            ".." => {
                components.pop();
            }
            "." | "" => {}
            _ => components.push(part),
        }
    }
    components.join("/")
}

/// Parse a `.rels` part. Malformed XML ends the list early.
pub fn parse_relationships(xml: &[u8], source_part: &str) -> Vec<Relationship> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let id = attr_string(e, b"Id").unwrap_or_default();
                let target = attr_string(e, b"Target").unwrap_or_default();
                let external = attr_string(e, b"TargetMode")
                    .is_some_and(|m| m.eq_ignore_ascii_case("External"));
                if id.is_empty() || target.is_empty() {
                    buf.clear();
                    continue;
                }
                let path = if external {
                    String::new()
                } else {
                    resolve_target(source_part, &target)
                };
                rels.push(Relationship {
                    id,
                    rel_type: attr_string(e, b"Type").unwrap_or_default(),
                    target,
                    external,
                    path,
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("malformed relationships for {source_part}: {e}");
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    rels
}

/// Read-only view over an in-memory xlsx package.
#[derive(Clone)]
pub struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Package<'a> {
    /// Open the zip container. This is the one fatal step.
    pub fn open(data: &'a [u8]) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data))?;
        Ok(Self { archive })
    }

    pub fn has_part(&self, path: &str) -> bool {
        self.archive.file_names().any(|name| name == path)
    }

    /// Part names matching a predicate, sorted for stable output.
    pub fn part_names(&self, filter: impl Fn(&str) -> bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|name| filter(name))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    /// Read a part's bytes; `None` if absent or unreadable.
    pub fn read_part(&mut self, path: &str) -> Option<Vec<u8>> {
        let mut file = self.archive.by_name(path).ok()?;
        let mut bytes = Vec::new();
        match file.read_to_end(&mut bytes) {
            Ok(_) => Some(bytes),
            Err(e) => {
                log::warn!("failed to read part {path}: {e}");
                None
            }
        }
    }

    /// Like [`Self::read_part`] but a miss is a typed skip.
    pub fn require_part(&mut self, path: &str) -> std::result::Result<Vec<u8>, SkipReason> {
        self.read_part(path)
            .ok_or_else(|| SkipReason::MissingPart(path.to_string()))
    }

    /// Relationships owned by `part`; empty when the `.rels` is absent.
    pub fn relationships(&mut self, part: &str) -> Vec<Relationship> {
        self.read_part(&rels_path_for(part))
            .map(|xml| parse_relationships(&xml, part))
            .unwrap_or_default()
    }

    /// Resolve one relationship id owned by `part` to a part path.
    pub fn resolve_id(
        &mut self,
        part: &str,
        r_id: &str,
    ) -> std::result::Result<String, SkipReason> {
        self.relationships(part)
            .into_iter()
            .find(|rel| rel.id == r_id && !rel.external)
            .map(|rel| rel.path)
            .ok_or_else(|| SkipReason::MissingRelationship(format!("{part}#{r_id}")))
    }

    /// Internal targets of `part` with the given relationship type.
    pub fn related_parts(&mut self, part: &str, kind: &str) -> Vec<String> {
        self.relationships(part)
            .into_iter()
            .filter(|rel| rel.is_type(kind) && !rel.external)
            .map(|rel| rel.path)
            .collect()
    }

    /// First internal target of `part` with the given type.
    pub fn related_part(&mut self, part: &str, kind: &str) -> Option<String> {
        self.related_parts(part, kind).into_iter().next()
    }

    /// Sheet manifest: name -> relationship id -> worksheet part, in
    /// document order. Fails only when the workbook part itself is missing.
    pub fn workbook_sheets(&mut self) -> Result<Vec<SheetEntry>> {
        let xml = self
            .read_part(WORKBOOK_PART)
            .ok_or_else(|| ImportError::MissingPart(WORKBOOK_PART.to_string()))?;
        let rels = self.relationships(WORKBOOK_PART);

        let mut reader = xml_reader(&xml);
        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Empty(ref e) | Event::Start(ref e) if e.local_name().as_ref() == b"sheet" => {
                    let Some(name) = attr_string(e, b"name") else {
                        buf.clear();
                        continue;
                    };
                    let r_id = attr_string_local(e, b"id").unwrap_or_default();
                    let path = rels
                        .iter()
                        .find(|rel| rel.id == r_id && !rel.external)
                        .map(|rel| rel.path.clone());
                    sheets.push(SheetEntry {
                        name,
                        r_id,
                        state: attr_string(e, b"state"),
                        path,
                    });
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(sheets)
    }

    /// `workbookPr/@date1904`.
    pub fn uses_1904_dates(&mut self) -> bool {
        let Some(xml) = self.read_part(WORKBOOK_PART) else {
            return false;
        };
        let mut reader = xml_reader(&xml);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e) | Event::Start(ref e))
                    if e.local_name().as_ref() == b"workbookPr" =>
                {
                    return crate::xml_helpers::attr_bool_default(e, b"date1904", false);
                }
                Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"sheets" => return false,
                Ok(Event::Eof) | Err(_) => return false,
                _ => {}
            }
            buf.clear();
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    const WB_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/data.xml"/>
</Relationships>"#;

    const WB: &str = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr date1904="1"/>
<sheets><sheet name="First" sheetId="1" r:id="rId2"/><sheet name="R&amp;D" sheetId="2" r:id="rId1" state="hidden"/><sheet name="Lost" sheetId="3" r:id="rId9"/></sheets>
</workbook>"#;

    #[test]
    fn test_rels_path_for() {
        assert_eq!(
            rels_path_for("xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
        assert_eq!(rels_path_for("workbook.xml"), "_rels/workbook.xml.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("xl/drawings/drawing1.xml", "../charts/chart1.xml"),
            "xl/charts/chart1.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/styles.xml"),
            "xl/styles.xml"
        );
        assert_eq!(
            resolve_target("xl/worksheets/sheet1.xml", "./../media/./a.png"),
            "xl/media/a.png"
        );
    }

    #[test]
    fn test_workbook_sheets_in_order() {
        let data = build(&[
            ("xl/workbook.xml", WB),
            ("xl/_rels/workbook.xml.rels", WB_RELS),
        ]);
        let mut pkg = Package::open(&data).unwrap();
        let sheets = pkg.workbook_sheets().unwrap();
        assert_eq!(sheets.len(), 3);
        assert_eq!(sheets[0].name, "First");
        assert_eq!(sheets[0].path.as_deref(), Some("xl/worksheets/data.xml"));
        assert_eq!(sheets[1].name, "R&D");
        assert_eq!(sheets[1].state.as_deref(), Some("hidden"));
        assert_eq!(sheets[2].path, None);
        assert!(pkg.uses_1904_dates());
    }

    #[test]
    fn test_missing_workbook_is_fatal() {
        let data = build(&[("docProps/app.xml", "<Properties/>")]);
        let mut pkg = Package::open(&data).unwrap();
        assert!(matches!(
            pkg.workbook_sheets(),
            Err(ImportError::MissingPart(_))
        ));
    }

    #[test]
    fn test_missing_rels_is_empty() {
        let data = build(&[("xl/workbook.xml", WB)]);
        let mut pkg = Package::open(&data).unwrap();
        assert!(pkg.relationships("xl/worksheets/sheet1.xml").is_empty());
        assert_eq!(pkg.related_part("xl/worksheets/sheet1.xml", rel_type::DRAWING), None);
        assert!(matches!(
            pkg.resolve_id("xl/workbook.xml", "rId1"),
            Err(SkipReason::MissingRelationship(_))
        ));
    }

    #[test]
    fn test_external_relationship() {
        let rels = parse_relationships(
            br#"<Relationships><Relationship Id="rId1" Type="http://x/hyperlink" Target="https://example.com/a?b=1&amp;c=2" TargetMode="External"/></Relationships>"#,
            "xl/worksheets/sheet1.xml",
        );
        assert_eq!(rels.len(), 1);
        assert!(rels[0].external);
        assert!(rels[0].is_type(rel_type::HYPERLINK));
        assert_eq!(rels[0].target, "https://example.com/a?b=1&c=2");
        assert!(rels[0].path.is_empty());
    }

    #[test]
    fn test_not_a_zip_is_fatal() {
        assert!(matches!(
            Package::open(b"definitely not a zip"),
            Err(ImportError::Zip(_))
        ));
    }
}
