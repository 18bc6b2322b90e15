//! Parsing of xl/styles.xml
//!
//! This file contains number formats, fonts, fills, borders, cell formats
//! (xf) and differential formats (dxf). Colors are kept as raw
//! [`ColorSpec`]s; resolution happens once the theme is known.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};

use crate::color::normalize_rgb;
use crate::error::Result;
use crate::source::{ColorSpec, SourceBorderEdge, SourceBorders, SourceFont, SourceStyle};
use crate::xml_helpers::{
    attr_bool_default, attr_f64, attr_string, attr_u32, attr_val, parse_color_attrs, toggle_val,
    xml_reader,
};

/// A `<fill>` entry: pattern fills carry fg/bg colors, gradient fills are
/// reduced to their first stop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFill {
    pub pattern_type: Option<String>,
    pub fg_color: Option<ColorSpec>,
    pub bg_color: Option<ColorSpec>,
}

impl RawFill {
    /// The color a cell background shows, if any.
    pub fn background(&self) -> Option<&ColorSpec> {
        match self.pattern_type.as_deref() {
            None | Some("none") => None,
            Some("solid" | "gradient") => self.fg_color.as_ref().or(self.bg_color.as_ref()),
            Some(_) => self.bg_color.as_ref().or(self.fg_color.as_ref()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAlignment {
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub wrap_text: bool,
}

/// One `<xf>` from `cellXfs` or `cellStyleXfs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellXf {
    pub font_id: Option<u32>,
    pub fill_id: Option<u32>,
    pub border_id: Option<u32>,
    pub num_fmt_id: Option<u32>,
    pub xf_id: Option<u32>,
    pub apply_font: bool,
    pub apply_fill: bool,
    pub apply_border: bool,
    pub apply_alignment: bool,
    pub apply_number_format: bool,
    pub alignment: Option<RawAlignment>,
}

impl CellXf {
    fn from_element(e: &BytesStart) -> Self {
        Self {
            font_id: attr_u32(e, b"fontId"),
            fill_id: attr_u32(e, b"fillId"),
            border_id: attr_u32(e, b"borderId"),
            num_fmt_id: attr_u32(e, b"numFmtId"),
            xf_id: attr_u32(e, b"xfId"),
            apply_font: attr_bool_default(e, b"applyFont", false),
            apply_fill: attr_bool_default(e, b"applyFill", false),
            apply_border: attr_bool_default(e, b"applyBorder", false),
            apply_alignment: attr_bool_default(e, b"applyAlignment", false),
            apply_number_format: attr_bool_default(e, b"applyNumberFormat", false),
            alignment: None,
        }
    }
}

/// Raw stylesheet tables, indexed the way the XML indexes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSheet {
    pub num_fmts: HashMap<u32, String>,
    pub fonts: Vec<SourceFont>,
    pub fills: Vec<RawFill>,
    pub borders: Vec<SourceBorders>,
    pub cell_xfs: Vec<CellXf>,
    pub cell_style_xfs: Vec<CellXf>,
    /// Differential formats used by conditional formatting.
    pub dxfs: Vec<SourceStyle>,
    /// Custom legacy palette from `<colors><indexedColors>`.
    pub indexed_colors: Option<Vec<String>>,
}

fn parse_alignment(e: &BytesStart) -> RawAlignment {
    RawAlignment {
        horizontal: attr_string(e, b"horizontal"),
        vertical: attr_string(e, b"vertical"),
        wrap_text: attr_bool_default(e, b"wrapText", false),
    }
}

fn border_edge<'a>(
    border: &'a mut SourceBorders,
    side: &str,
) -> Option<&'a mut Option<SourceBorderEdge>> {
    match side {
        "left" | "start" => Some(&mut border.left),
        "right" | "end" => Some(&mut border.right),
        "top" => Some(&mut border.top),
        "bottom" => Some(&mut border.bottom),
        _ => None,
    }
}

/// Parse styles.xml content
#[allow(clippy::too_many_lines)]
#[allow(clippy::cognitive_complexity)]
pub fn parse_styles(xml: &[u8]) -> Result<StyleSheet> {
    let mut reader = xml_reader(xml);
    let mut stylesheet = StyleSheet::default();
    let mut buf = Vec::new();

    let mut in_num_fmts = false;
    let mut in_fonts = false;
    let mut in_fills = false;
    let mut in_borders = false;
    let mut in_cell_xfs = false;
    let mut in_cell_style_xfs = false;
    let mut in_indexed_colors = false;
    let mut in_dxfs = false;

    let mut current_font: Option<SourceFont> = None;
    let mut current_fill: Option<RawFill> = None;
    let mut in_gradient_stop = false;
    let mut current_border: Option<SourceBorders> = None;
    let mut current_side: Option<String> = None;
    let mut current_xf: Option<CellXf> = None;
    let mut current_dxf: Option<SourceStyle> = None;
    let mut indexed_colors: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(ref event @ (Event::Start(ref e) | Event::Empty(ref e))) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.local_name();
                let name_str = std::str::from_utf8(name.as_ref()).unwrap_or("");

                match name_str {
                    "numFmts" => in_num_fmts = !is_empty,
                    "fonts" => in_fonts = !is_empty,
                    "fills" => in_fills = !is_empty,
                    "borders" => in_borders = !is_empty,
                    "cellXfs" => in_cell_xfs = !is_empty,
                    "cellStyleXfs" => in_cell_style_xfs = !is_empty,
                    "indexedColors" => in_indexed_colors = !is_empty,
                    "dxfs" => in_dxfs = !is_empty,
                    "dxf" if in_dxfs => {
                        if is_empty {
                            stylesheet.dxfs.push(SourceStyle::default());
                        } else {
                            current_dxf = Some(SourceStyle::default());
                        }
                    }

                    "rgbColor" if in_indexed_colors => {
                        let color = attr_string(e, b"rgb")
                            .and_then(|rgb| normalize_rgb(&rgb))
                            .unwrap_or_else(|| "#000000".to_string());
                        indexed_colors.push(color);
                    }

                    "numFmt" if in_num_fmts || current_dxf.is_some() => {
                        let id = attr_u32(e, b"numFmtId");
                        let code = attr_string(e, b"formatCode");
                        if let Some(ref mut dxf) = current_dxf {
                            dxf.num_fmt = code;
                        } else if let (Some(id), Some(code)) = (id, code) {
                            stylesheet.num_fmts.insert(id, code);
                        }
                    }

                    "font" if in_fonts || current_dxf.is_some() => {
                        if is_empty {
                            if current_dxf.is_none() {
                                stylesheet.fonts.push(SourceFont::default());
                            }
                        } else {
                            current_font = Some(SourceFont::default());
                        }
                    }
                    "sz" if current_font.is_some() => {
                        if let Some(ref mut font) = current_font {
                            font.size = attr_f64(e, b"val");
                        }
                    }
                    "name" | "rFont" if current_font.is_some() => {
                        if let Some(ref mut font) = current_font {
                            font.name = attr_val(e);
                        }
                    }
                    "b" if current_font.is_some() => {
                        if let Some(ref mut font) = current_font {
                            font.bold = toggle_val(e);
                        }
                    }
                    "i" if current_font.is_some() => {
                        if let Some(ref mut font) = current_font {
                            font.italic = toggle_val(e);
                        }
                    }
                    "u" if current_font.is_some() => {
                        if let Some(ref mut font) = current_font {
                            font.underline = attr_val(e).map_or(true, |v| v != "none");
                        }
                    }
                    "strike" if current_font.is_some() => {
                        if let Some(ref mut font) = current_font {
                            font.strike = toggle_val(e);
                        }
                    }
                    "color" if current_font.is_some() => {
                        if let Some(ref mut font) = current_font {
                            font.color = Some(parse_color_attrs(e));
                        }
                    }

                    "fill" if in_fills || current_dxf.is_some() => {
                        if is_empty {
                            if current_dxf.is_none() {
                                stylesheet.fills.push(RawFill::default());
                            }
                        } else {
                            current_fill = Some(RawFill::default());
                        }
                    }
                    "patternFill" if current_fill.is_some() => {
                        if let Some(ref mut fill) = current_fill {
                            // dxf pattern fills omit patternType and mean solid
                            fill.pattern_type = attr_string(e, b"patternType")
                                .or_else(|| current_dxf.as_ref().map(|_| "solid".to_string()));
                        }
                    }
                    "gradientFill" if current_fill.is_some() => {
                        if let Some(ref mut fill) = current_fill {
                            fill.pattern_type = Some("gradient".to_string());
                        }
                    }
                    "stop" if current_fill.is_some() => in_gradient_stop = !is_empty,
                    "color" if in_gradient_stop => {
                        if let Some(ref mut fill) = current_fill {
                            if fill.fg_color.is_none() {
                                fill.fg_color = Some(parse_color_attrs(e));
                            }
                        }
                    }
                    "fgColor" if current_fill.is_some() => {
                        if let Some(ref mut fill) = current_fill {
                            fill.fg_color = Some(parse_color_attrs(e));
                        }
                    }
                    "bgColor" if current_fill.is_some() => {
                        if let Some(ref mut fill) = current_fill {
                            fill.bg_color = Some(parse_color_attrs(e));
                        }
                    }

                    "border" if in_borders || current_dxf.is_some() => {
                        if is_empty {
                            if current_dxf.is_none() {
                                stylesheet.borders.push(SourceBorders::default());
                            }
                        } else {
                            current_border = Some(SourceBorders::default());
                        }
                    }
                    "left" | "right" | "top" | "bottom" | "start" | "end"
                        if current_border.is_some() =>
                    {
                        let style = attr_string(e, b"style").filter(|s| s != "none");
                        if let (Some(style), Some(border)) = (style, current_border.as_mut()) {
                            if let Some(edge) = border_edge(border, name_str) {
                                *edge = Some(SourceBorderEdge { style, color: None });
                            }
                        }
                        if !is_empty {
                            current_side = Some(name_str.to_string());
                        }
                    }
                    "color" if current_side.is_some() => {
                        let color = parse_color_attrs(e);
                        if let (Some(border), Some(side)) =
                            (current_border.as_mut(), current_side.as_deref())
                        {
                            if let Some(Some(edge)) = border_edge(border, side) {
                                edge.color = Some(color);
                            }
                        }
                    }

                    "xf" if in_cell_xfs || in_cell_style_xfs => {
                        let xf = CellXf::from_element(e);
                        if is_empty {
                            if in_cell_xfs {
                                stylesheet.cell_xfs.push(xf);
                            } else {
                                stylesheet.cell_style_xfs.push(xf);
                            }
                        } else {
                            current_xf = Some(xf);
                        }
                    }
                    "alignment" => {
                        let align = parse_alignment(e);
                        if let Some(ref mut xf) = current_xf {
                            xf.alignment = Some(align);
                        } else if let Some(ref mut dxf) = current_dxf {
                            dxf.align_h = align.horizontal;
                            dxf.align_v = align.vertical;
                            dxf.wrap = align.wrap_text;
                        }
                    }

                    _ => {}
                }
            }

            Ok(Event::End(ref e)) => {
                let name = e.local_name();
                let name_str = std::str::from_utf8(name.as_ref()).unwrap_or("");

                match name_str {
                    "numFmts" => in_num_fmts = false,
                    "fonts" => in_fonts = false,
                    "fills" => in_fills = false,
                    "borders" => in_borders = false,
                    "cellXfs" => in_cell_xfs = false,
                    "cellStyleXfs" => in_cell_style_xfs = false,
                    "indexedColors" => in_indexed_colors = false,
                    "dxfs" => in_dxfs = false,
                    "dxf" => {
                        if let Some(dxf) = current_dxf.take() {
                            stylesheet.dxfs.push(dxf);
                        }
                    }
                    "font" => {
                        if let Some(font) = current_font.take() {
                            match current_dxf {
                                Some(ref mut dxf) => dxf.font = font,
                                None => stylesheet.fonts.push(font),
                            }
                        }
                    }
                    "fill" => {
                        if let Some(fill) = current_fill.take() {
                            match current_dxf {
                                Some(ref mut dxf) => dxf.fill = fill.background().cloned(),
                                None => stylesheet.fills.push(fill),
                            }
                        }
                    }
                    "stop" => in_gradient_stop = false,
                    "border" => {
                        if let Some(border) = current_border.take() {
                            match current_dxf {
                                Some(ref mut dxf) => dxf.borders = border,
                                None => stylesheet.borders.push(border),
                            }
                        }
                    }
                    "left" | "right" | "top" | "bottom" | "start" | "end" => current_side = None,
                    "xf" => {
                        if let Some(xf) = current_xf.take() {
                            if in_cell_xfs {
                                stylesheet.cell_xfs.push(xf);
                            } else if in_cell_style_xfs {
                                stylesheet.cell_style_xfs.push(xf);
                            }
                        }
                    }
                    _ => {}
                }
            }

            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }

        buf.clear();
    }

    if !indexed_colors.is_empty() {
        stylesheet.indexed_colors = Some(indexed_colors);
    }

    Ok(stylesheet)
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

    const STYLES: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="164" formatCode="#,##0.00&quot; kg&quot;"/></numFmts>
  <fonts count="2">
    <font><sz val="11"/><color theme="1"/><name val="Calibri"/></font>
    <font><b/><i val="0"/><u/><sz val="14"/><color rgb="FFFF0000"/><name val="Arial"/></font>
  </fonts>
  <fills count="3">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor theme="4" tint="0.4"/><bgColor indexed="64"/></patternFill></fill>
  </fills>
  <borders count="2">
    <border/>
    <border><left style="thin"><color rgb="FF000000"/></left><right/><top style="medium"/><bottom style="none"/></border>
  </borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="2">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="164" fontId="1" fillId="2" borderId="1" xfId="0" applyFont="1" applyFill="1" applyBorder="1" applyAlignment="1">
      <alignment horizontal="center" vertical="top" wrapText="1"/>
    </xf>
  </cellXfs>
  <dxfs count="1">
    <dxf><font><b/><color rgb="FF9C0006"/></font><fill><patternFill><bgColor rgb="FFFFC7CE"/></patternFill></fill></dxf>
  </dxfs>
  <colors><indexedColors><rgbColor rgb="FF010203"/><rgbColor rgb="FFFFFFFF"/></indexedColors></colors>
</styleSheet>"##;

    #[test]
    fn test_parse_tables() {
        let sheet = parse_styles(STYLES.as_bytes()).unwrap();
        assert_eq!(sheet.num_fmts.get(&164).map(String::as_str), Some("#,##0.00\" kg\""));
        assert_eq!(sheet.fonts.len(), 2);
        assert_eq!(sheet.fills.len(), 3);
        assert_eq!(sheet.borders.len(), 2);
        assert_eq!(sheet.cell_xfs.len(), 2);
        assert_eq!(sheet.cell_style_xfs.len(), 1);
        assert_eq!(sheet.dxfs.len(), 1);
        assert_eq!(
            sheet.indexed_colors,
            Some(vec!["#010203".to_string(), "#FFFFFF".to_string()])
        );
    }

    #[test]
    fn test_font_toggles() {
        let sheet = parse_styles(STYLES.as_bytes()).unwrap();
        let font = &sheet.fonts[1];
        assert!(font.bold);
        assert!(!font.italic);
        assert!(font.underline);
        assert_eq!(font.size, Some(14.0));
        assert_eq!(font.name.as_deref(), Some("Arial"));
        assert_eq!(
            font.color.as_ref().and_then(|c| c.rgb.as_deref()),
            Some("FFFF0000")
        );
    }

    #[test]
    fn test_fill_background() {
        let sheet = parse_styles(STYLES.as_bytes()).unwrap();
        assert_eq!(sheet.fills[0].background(), None);
        let solid = sheet.fills[2].background().unwrap();
        assert_eq!(solid.theme, Some(4));
        assert_eq!(solid.tint, Some(0.4));
    }

    #[test]
    fn test_border_edges() {
        let sheet = parse_styles(STYLES.as_bytes()).unwrap();
        let border = &sheet.borders[1];
        let left = border.left.as_ref().unwrap();
        assert_eq!(left.style, "thin");
        assert!(left.color.is_some());
        assert!(border.right.is_none());
        assert_eq!(border.top.as_ref().unwrap().style, "medium");
        assert!(border.bottom.is_none());
    }

    #[test]
    fn test_xf_alignment() {
        let sheet = parse_styles(STYLES.as_bytes()).unwrap();
        let xf = &sheet.cell_xfs[1];
        assert_eq!(xf.num_fmt_id, Some(164));
        assert!(xf.apply_font);
        let align = xf.alignment.as_ref().unwrap();
        assert_eq!(align.horizontal.as_deref(), Some("center"));
        assert!(align.wrap_text);
    }

    #[test]
    fn test_dxf() {
        let sheet = parse_styles(STYLES.as_bytes()).unwrap();
        let dxf = &sheet.dxfs[0];
        assert!(dxf.font.bold);
        assert_eq!(
            dxf.fill.as_ref().and_then(|c| c.rgb.as_deref()),
            Some("FFFFC7CE")
        );
    }

    #[test]
    fn test_malformed_is_error() {
        assert!(parse_styles(b"<styleSheet><fonts></styleSheet>").is_err());
    }
}
