//! Workbook-level part discovery and the theme color scheme.

use quick_xml::events::Event;

use crate::color::default_theme_colors;
use crate::package::{rel_type, Package, WORKBOOK_PART};
use crate::xml_helpers::{attr_string, xml_reader};

/// Paths of the workbook-wide parts, from `xl/_rels/workbook.xml.rels`
/// with the conventional locations as fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct WorkbookParts {
    pub shared_strings: Option<String>,
    pub styles: Option<String>,
    pub theme: Option<String>,
}

pub(super) fn workbook_parts(pkg: &mut Package) -> WorkbookParts {
    let mut locate = |kind: &str, fallback: &str| {
        pkg.related_part(WORKBOOK_PART, kind)
            .filter(|p| pkg.has_part(p))
            .or_else(|| pkg.has_part(fallback).then(|| fallback.to_string()))
    };
    WorkbookParts {
        shared_strings: locate(rel_type::SHARED_STRINGS, "xl/sharedStrings.xml"),
        styles: locate(rel_type::STYLES, "xl/styles.xml"),
        theme: locate(rel_type::THEME, "xl/theme/theme1.xml"),
    }
}

/// Theme color indices (ECMA-376 order):
/// 0 lt1, 1 dk1, 2 lt2, 3 dk2, 4-9 accent1-6, 10 hlink, 11 folHlink
const COLOR_SLOTS: [&str; 12] = [
    "lt1", "dk1", "lt2", "dk2", "accent1", "accent2", "accent3", "accent4", "accent5", "accent6",
    "hlink", "folHlink",
];

/// Read the `clrScheme` of a theme part. Slots the theme leaves out keep
/// the default Office palette.
pub(super) fn parse_theme_colors(xml: &[u8]) -> Vec<String> {
    let mut colors = default_theme_colors();
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut in_clr_scheme = false;
    let mut slot: Option<usize> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => {
                let local = e.local_name();
                let name = std::str::from_utf8(local.as_ref()).unwrap_or("");
                if name == "clrScheme" {
                    in_clr_scheme = true;
                } else if in_clr_scheme {
                    if let Some(pos) = COLOR_SLOTS.iter().position(|&n| n == name) {
                        slot = Some(pos);
                    } else if let Some(pos) = slot {
                        let value = match name {
                            "srgbClr" => attr_string(e, b"val"),
                            // System color: lastClr holds the rendered value
                            "sysClr" => attr_string(e, b"lastClr"),
                            _ => None,
                        };
                        if let (Some(val), Some(color)) = (value, colors.get_mut(pos)) {
                            if val.len() == 6 && val.bytes().all(|b| b.is_ascii_hexdigit()) {
                                *color = format!("#{}", val.to_ascii_uppercase());
                            }
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let local = e.local_name();
                if local.as_ref() == b"clrScheme" {
                    break;
                }
                if slot
                    .and_then(|pos| COLOR_SLOTS.get(pos))
                    .is_some_and(|n| n.as_bytes() == local.as_ref())
                {
                    slot = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("theme colors: {e}");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    colors
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_theme_colors() {
        let xml = r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
<a:themeElements><a:clrScheme name="Custom">
<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>
<a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>
<a:dk2><a:srgbClr val="1f497d"/></a:dk2>
<a:accent1><a:srgbClr val="C0504D"/></a:accent1>
</a:clrScheme></a:themeElements></a:theme>"#;
        let colors = parse_theme_colors(xml.as_bytes());
        assert_eq!(colors.len(), 12);
        assert_eq!(colors[0], "#FFFFFF");
        assert_eq!(colors[1], "#000000");
        assert_eq!(colors[3], "#1F497D");
        assert_eq!(colors[4], "#C0504D");
        // untouched slot keeps the default palette
        assert_eq!(colors[5], "#ED7D31");
    }

    #[test]
    fn test_malformed_theme_keeps_defaults() {
        let colors = parse_theme_colors(b"<a:theme><a:clrScheme><a:accent1><a:srgbClr val=");
        assert_eq!(colors, default_theme_colors());
    }
}
