//! Drawings parsing module
//!
//! Drawings are stored in `xl/drawings/drawing*.xml` and referenced from a
//! sheet's relationship file. Each anchor element carries a position and one
//! payload:
//! - `twoCellAnchor`: anchored to a `from` and a `to` cell
//! - `oneCellAnchor`: anchored to a `from` cell with an explicit `ext`
//! - `absoluteAnchor`: a `pos` in EMU, mapped onto cell (0, 0) with offsets
//!
//! Pictures (`pic`) reference their bytes via `r:embed`; chart frames
//! (`graphicFrame`) reference a chart part via `c:chart r:id`. Both ids are
//! resolved through `xl/drawings/_rels/drawing*.xml.rels`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use quick_xml::events::Event;

use crate::package::{rel_type, Package};
use crate::source::{AnchorPoint, MediaFile, SourceImage};
use crate::xml_helpers::{attr_string, attr_string_local, xml_reader};

/// What an anchor holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorContent {
    Picture { embed: String },
    Chart { r_id: String },
    Other,
}

/// One anchor block of a drawing part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingAnchor {
    pub from: AnchorPoint,
    pub to: Option<AnchorPoint>,
    /// `(cx, cy)` in EMU.
    pub extent: Option<(i64, i64)>,
    pub name: Option<String>,
    pub content: AnchorContent,
}

#[derive(Clone, Copy, PartialEq)]
enum Corner {
    From,
    To,
}

#[derive(Clone, Copy, PartialEq)]
enum Coord {
    Col,
    ColOff,
    Row,
    RowOff,
}

/// Builder for one anchor while its children stream past
struct AnchorBuilder {
    from: AnchorPoint,
    to: Option<AnchorPoint>,
    extent: Option<(i64, i64)>,
    name: Option<String>,
    content: AnchorContent,
    in_pic: bool,
    in_frame: bool,
}

impl AnchorBuilder {
    fn new() -> Self {
        Self {
            from: AnchorPoint::default(),
            to: None,
            extent: None,
            name: None,
            content: AnchorContent::Other,
            in_pic: false,
            in_frame: false,
        }
    }

    fn set_coord(&mut self, corner: Corner, coord: Coord, text: &str) {
        let Ok(value) = text.trim().parse::<i64>() else {
            return;
        };
        let point = match corner {
            Corner::From => &mut self.from,
            Corner::To => self.to.get_or_insert_with(AnchorPoint::default),
        };
        let index = u32::try_from(value.max(0)).unwrap_or(0);
        match coord {
            Coord::Col => point.col = index,
            Coord::Row => point.row = index,
            Coord::ColOff => point.col_off = value,
            Coord::RowOff => point.row_off = value,
        }
    }

    fn build(self) -> DrawingAnchor {
        DrawingAnchor {
            from: self.from,
            to: self.to,
            extent: self.extent,
            name: self.name,
            content: self.content,
        }
    }
}

/// Parse every anchor of a drawing part, in document order.
///
/// Malformed XML ends the scan; anchors completed before the error are kept.
pub fn parse_drawing_anchors(xml: &[u8]) -> Vec<DrawingAnchor> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut anchors = Vec::new();

    let mut current: Option<AnchorBuilder> = None;
    let mut corner: Option<Corner> = None;
    let mut coord: Option<Coord> = None;
    let mut in_xfrm = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"twoCellAnchor" | b"oneCellAnchor" | b"absoluteAnchor" => {
                        current = Some(AnchorBuilder::new());
                        in_xfrm = false;
                    }
                    b"from" => corner = Some(Corner::From),
                    b"to" => corner = Some(Corner::To),
                    b"col" if corner.is_some() => coord = Some(Coord::Col),
                    b"colOff" if corner.is_some() => coord = Some(Coord::ColOff),
                    b"row" if corner.is_some() => coord = Some(Coord::Row),
                    b"rowOff" if corner.is_some() => coord = Some(Coord::RowOff),
                    b"xfrm" => in_xfrm = true,
                    // only the anchor-level extent counts, not a shape transform's
                    b"ext" if !in_xfrm => {
                        if let Some(ref mut anchor) = current {
                            let cx = attr_string(e, b"cx").and_then(|s| s.parse().ok());
                            let cy = attr_string(e, b"cy").and_then(|s| s.parse().ok());
                            if let (Some(cx), Some(cy)) = (cx, cy) {
                                anchor.extent = Some((cx, cy));
                            }
                        }
                    }
                    b"pos" => {
                        if let Some(ref mut anchor) = current {
                            anchor.from.col_off =
                                attr_string(e, b"x").and_then(|s| s.parse().ok()).unwrap_or(0);
                            anchor.from.row_off =
                                attr_string(e, b"y").and_then(|s| s.parse().ok()).unwrap_or(0);
                        }
                    }
                    b"pic" => {
                        if let Some(ref mut anchor) = current {
                            anchor.in_pic = true;
                        }
                    }
                    b"graphicFrame" => {
                        if let Some(ref mut anchor) = current {
                            anchor.in_frame = true;
                        }
                    }
                    b"cNvPr" => {
                        if let Some(ref mut anchor) = current {
                            if anchor.name.is_none() {
                                anchor.name = attr_string(e, b"name").filter(|s| !s.is_empty());
                            }
                        }
                    }
                    b"blip" => {
                        if let Some(ref mut anchor) = current {
                            if anchor.in_pic {
                                if let Some(embed) = attr_string_local(e, b"embed") {
                                    anchor.content = AnchorContent::Picture { embed };
                                }
                            }
                        }
                    }
                    b"chart" => {
                        if let Some(ref mut anchor) = current {
                            if anchor.in_frame {
                                if let Some(r_id) = attr_string_local(e, b"id") {
                                    anchor.content = AnchorContent::Chart { r_id };
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref t)) => {
                if let (Some(anchor), Some(corner), Some(coord)) = (current.as_mut(), corner, coord)
                {
                    if let Ok(text) = t.unescape() {
                        anchor.set_coord(corner, coord, &text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"twoCellAnchor" | b"oneCellAnchor" | b"absoluteAnchor" => {
                    if let Some(anchor) = current.take() {
                        anchors.push(anchor.build());
                    }
                    corner = None;
                    coord = None;
                }
                b"from" | b"to" => corner = None,
                b"xfrm" => in_xfrm = false,
                b"col" | b"colOff" | b"row" | b"rowOff" => coord = None,
                b"pic" => {
                    if let Some(ref mut anchor) = current {
                        anchor.in_pic = false;
                    }
                }
                b"graphicFrame" => {
                    if let Some(ref mut anchor) = current {
                        anchor.in_frame = false;
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("drawing parse stopped after {} anchors: {e}", anchors.len());
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    anchors
}

/// Read the pictures of a drawing part together with their media bytes.
///
/// Pictures whose embed id does not resolve, or whose media part is absent,
/// are dropped.
pub fn read_drawing_images(pkg: &mut Package, drawing_path: &str) -> Vec<SourceImage> {
    let Some(xml) = pkg.read_part(drawing_path) else {
        return Vec::new();
    };
    let rels = pkg.relationships(drawing_path);

    parse_drawing_anchors(&xml)
        .into_iter()
        .filter_map(|anchor| {
            let AnchorContent::Picture { ref embed } = anchor.content else {
                return None;
            };
            let rel = rels
                .iter()
                .find(|r| &r.id == embed && r.is_type(rel_type::IMAGE) && !r.external)?;
            let bytes = pkg.read_part(&rel.path).filter(|b| !b.is_empty())?;
            Some(SourceImage {
                from: anchor.from,
                to: anchor.to,
                extent: anchor.extent,
                media: MediaFile {
                    path: rel.path.clone(),
                    bytes,
                },
                name: anchor.name,
            })
        })
        .collect()
}

/// MIME type from a part name's extension, `image/png` when unknown.
pub fn mime_for_path(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        _ => "image/png",
    }
}

/// Base64 `data:` URI for a media file.
pub fn data_uri(media: &MediaFile) -> String {
    format!(
        "data:{};base64,{}",
        mime_for_path(&media.path),
        BASE64.encode(&media.bytes)
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use test_case::test_case;

    const DRAWING: &str = r#"<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart">
<xdr:twoCellAnchor>
  <xdr:from><xdr:col>1</xdr:col><xdr:colOff>95250</xdr:colOff><xdr:row>2</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>
  <xdr:to><xdr:col>4</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>8</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to>
  <xdr:pic>
    <xdr:nvPicPr><xdr:cNvPr id="2" name="Logo"/></xdr:nvPicPr>
    <xdr:blipFill><a:blip r:embed="rId1"/></xdr:blipFill>
    <xdr:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="1" cy="1"/></a:xfrm></xdr:spPr>
  </xdr:pic>
</xdr:twoCellAnchor>
<xdr:oneCellAnchor>
  <xdr:from><xdr:col>6</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>0</xdr:row><xdr:rowOff>19050</xdr:rowOff></xdr:from>
  <xdr:ext cx="5715000" cy="3810000"/>
  <xdr:graphicFrame>
    <xdr:nvGraphicFramePr><xdr:cNvPr id="3" name="Chart 1"/></xdr:nvGraphicFramePr>
    <a:graphic><a:graphicData><c:chart r:id="rId2"/></a:graphicData></a:graphic>
  </xdr:graphicFrame>
</xdr:oneCellAnchor>
<xdr:twoCellAnchor>
  <xdr:from><xdr:col>0</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>0</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>
  <xdr:to><xdr:col>1</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>1</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to>
  <xdr:sp><xdr:nvSpPr><xdr:cNvPr id="4" name="Box"/></xdr:nvSpPr></xdr:sp>
</xdr:twoCellAnchor>
</xdr:wsDr>"#;

    #[test]
    fn test_parse_anchors() {
        let anchors = parse_drawing_anchors(DRAWING.as_bytes());
        assert_eq!(anchors.len(), 3);

        let pic = &anchors[0];
        assert_eq!(
            pic.from,
            AnchorPoint {
                col: 1,
                col_off: 95250,
                row: 2,
                row_off: 0
            }
        );
        assert_eq!(pic.to.map(|t| (t.col, t.row)), Some((4, 8)));
        assert_eq!(pic.name.as_deref(), Some("Logo"));
        assert!(pic.extent.is_none());
        assert_eq!(
            pic.content,
            AnchorContent::Picture {
                embed: "rId1".to_string()
            }
        );

        let chart = &anchors[1];
        assert!(chart.to.is_none());
        assert_eq!(chart.extent, Some((5_715_000, 3_810_000)));
        assert_eq!(chart.from.row_off, 19050);
        assert_eq!(
            chart.content,
            AnchorContent::Chart {
                r_id: "rId2".to_string()
            }
        );

        assert_eq!(anchors[2].content, AnchorContent::Other);
    }

    #[test]
    fn test_read_drawing_images() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = zip::write::FileOptions::default();
        zip.start_file("xl/drawings/drawing1.xml", opts).unwrap();
        zip.write_all(DRAWING.as_bytes()).unwrap();
        zip.start_file("xl/drawings/_rels/drawing1.xml.rels", opts)
            .unwrap();
        zip.write_all(
            br#"<Relationships>
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.jpeg"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/chart" Target="../charts/chart1.xml"/>
</Relationships>"#,
        )
        .unwrap();
        zip.start_file("xl/media/image1.jpeg", opts).unwrap();
        zip.write_all(&[0xFF, 0xD8, 0xFF]).unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let mut pkg = Package::open(&bytes).unwrap();
        let images = read_drawing_images(&mut pkg, "xl/drawings/drawing1.xml");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].media.path, "xl/media/image1.jpeg");
        assert_eq!(images[0].media.bytes, vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(data_uri(&images[0].media), "data:image/jpeg;base64,/9j/");
    }

    #[test_case("xl/media/image1.png", "image/png")]
    #[test_case("xl/media/photo.JPG", "image/jpeg")]
    #[test_case("xl/media/anim.gif", "image/gif")]
    #[test_case("xl/media/vector.emf", "image/x-emf")]
    #[test_case("xl/media/noext", "image/png")]
    fn test_mime_for_path(path: &str, expected: &str) {
        assert_eq!(mime_for_path(path), expected);
    }
}
