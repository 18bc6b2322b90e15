//! Cell-hosted pictures.
//!
//! Some producers store pictures that live inside a single cell in
//! `xl/cellimages.xml`, one `cellImage` per picture, and put a marker formula
//! such as `_xlfn.DISPIMG("ID_3F2A",1)` in the cell. The `IMAGE("url")`
//! function is the other marker form; its picture is external.

use std::collections::HashMap;

use quick_xml::events::Event;

use crate::package::{rel_type, Package, WORKBOOK_PART};
use crate::source::MediaFile;
use crate::xml_helpers::{attr_string, attr_string_local, xml_reader};

const CELL_IMAGES_PART: &str = "xl/cellimages.xml";

/// A marker formula that stands for a picture instead of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellImageMarker {
    /// Name (or id) of a picture in the cell-images part.
    Embedded(String),
    /// External picture URL.
    Url(String),
}

/// Recognize a cell-image marker formula, with or without a leading `=`.
pub fn parse_image_marker(formula: &str) -> Option<CellImageMarker> {
    let body = formula.trim().trim_start_matches('=').trim_start();
    let body = body.strip_prefix("_xlfn.").unwrap_or(body);

    let (func, rest) = body.split_once('(')?;
    let arg = first_string_arg(rest)?;
    if func.eq_ignore_ascii_case("DISPIMG") {
        Some(CellImageMarker::Embedded(arg))
    } else if func.eq_ignore_ascii_case("IMAGE") {
        Some(CellImageMarker::Url(arg))
    } else {
        None
    }
}

/// The first argument when it is a string literal; `""` escapes a quote.
fn first_string_arg(args: &str) -> Option<String> {
    let mut chars = args.trim_start().chars().peekable();
    if chars.next() != Some('"') {
        return None;
    }
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            if chars.peek() == Some(&'"') {
                out.push('"');
                chars.next();
            } else {
                return Some(out).filter(|s| !s.is_empty());
            }
        } else {
            out.push(ch);
        }
    }
    None
}

/// Locate the cell-images part: through a workbook relationship when one
/// points at it, else at its conventional path.
fn find_cell_images_part(pkg: &mut Package) -> Option<String> {
    let from_rels = pkg
        .relationships(WORKBOOK_PART)
        .into_iter()
        .find(|r| !r.external && r.path.to_ascii_lowercase().ends_with("cellimages.xml"))
        .map(|r| r.path);
    from_rels.or_else(|| {
        pkg.has_part(CELL_IMAGES_PART)
            .then(|| CELL_IMAGES_PART.to_string())
    })
}

/// Read every cell-hosted picture, keyed by its `cNvPr` name and by its id.
pub fn read_cell_images(pkg: &mut Package) -> HashMap<String, MediaFile> {
    let mut images = HashMap::new();
    let Some(part) = find_cell_images_part(pkg) else {
        return images;
    };
    let Some(xml) = pkg.read_part(&part) else {
        return images;
    };
    let rels = pkg.relationships(&part);

    let mut reader = xml_reader(&xml);
    let mut buf = Vec::new();
    let mut keys: Vec<String> = Vec::new();
    let mut embed: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"cellImage" => {
                    keys.clear();
                    embed = None;
                }
                b"cNvPr" => {
                    keys.extend(attr_string(e, b"name").filter(|s| !s.is_empty()));
                    keys.extend(attr_string(e, b"id").filter(|s| !s.is_empty()));
                }
                b"blip" => embed = attr_string_local(e, b"embed"),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"cellImage" => {
                let target = embed.take().and_then(|id| {
                    rels.iter()
                        .find(|r| r.id == id && r.is_type(rel_type::IMAGE) && !r.external)
                });
                match target {
                    Some(rel) => {
                        if let Some(bytes) = pkg.read_part(&rel.path) {
                            let media = MediaFile {
                                path: rel.path.clone(),
                                bytes,
                            };
                            for key in keys.drain(..) {
                                images.entry(key).or_insert_with(|| media.clone());
                            }
                        }
                    }
                    None => log::warn!("cell image {keys:?} has no resolvable picture"),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("{part}: {e}");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    images
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
    use std::io::{Cursor, Write};
    use test_case::test_case;

    #[test_case(r#"_xlfn.DISPIMG("ID_3F2A",1)"#, Some(CellImageMarker::Embedded("ID_3F2A".into())))]
    #[test_case(r#"=DISPIMG("pic ""1""",1)"#, Some(CellImageMarker::Embedded("pic \"1\"".into())))]
    #[test_case(r#"=IMAGE("https://example.com/a.png")"#, Some(CellImageMarker::Url("https://example.com/a.png".into())))]
    #[test_case(r#"_xlfn.IMAGE( "https://x.test/b.jpg", "alt")"#, Some(CellImageMarker::Url("https://x.test/b.jpg".into())))]
    #[test_case("SUM(A1:A3)", None)]
    #[test_case("IMAGE(A1)", None)]
    #[test_case(r#"DISPIMG("#, None)]
    fn test_parse_image_marker(formula: &str, expected: Option<CellImageMarker>) {
        assert_eq!(parse_image_marker(formula), expected);
    }

    #[test]
    fn test_read_cell_images() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = zip::write::FileOptions::default();
        zip.start_file("xl/workbook.xml", opts).unwrap();
        zip.write_all(b"<workbook><sheets/></workbook>").unwrap();
        zip.start_file("xl/cellimages.xml", opts).unwrap();
        zip.write_all(
            br#"<etc:cellImages xmlns:etc="http://www.wps.cn/officeDocument/2017/etCustomData" xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<etc:cellImage><xdr:pic><xdr:nvPicPr><xdr:cNvPr id="2" name="ID_3F2A"/></xdr:nvPicPr>
<xdr:blipFill><a:blip r:embed="rId1"/></xdr:blipFill></xdr:pic></etc:cellImage>
<etc:cellImage><xdr:pic><xdr:nvPicPr><xdr:cNvPr id="3" name="ID_MISSING"/></xdr:nvPicPr>
<xdr:blipFill><a:blip r:embed="rId7"/></xdr:blipFill></xdr:pic></etc:cellImage>
</etc:cellImages>"#,
        )
        .unwrap();
        zip.start_file("xl/_rels/cellimages.xml.rels", opts).unwrap();
        zip.write_all(
            br#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/></Relationships>"#,
        )
        .unwrap();
        zip.start_file("xl/media/image1.png", opts).unwrap();
        zip.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let mut pkg = Package::open(&bytes).unwrap();
        let images = read_cell_images(&mut pkg);
        assert_eq!(images.len(), 2);
        assert_eq!(images["ID_3F2A"].path, "xl/media/image1.png");
        assert_eq!(images["2"].bytes, vec![0x89, b'P', b'N', b'G']);
        assert!(!images.contains_key("ID_MISSING"));
    }
}
