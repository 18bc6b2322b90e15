//! Source style -> canonical [`Style`], resolving colors through the theme.

use crate::color::resolve_color;
use crate::numfmt::classify_number_format;
use crate::source::{ColorSpec, SourceBorderEdge, SourceFont, SourceStyle};
use crate::types::{Border, BorderSet, BorderStyle, HAlign, RunStyle, Style, VAlign};

/// Color used for border edges that name no color.
const DEFAULT_BORDER_COLOR: &str = "#000000";

/// Everything color resolution needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Palette<'a> {
    pub theme: &'a [String],
    pub indexed: Option<&'a [String]>,
}

impl Palette<'_> {
    pub(crate) fn resolve(&self, color: &ColorSpec) -> Option<String> {
        resolve_color(color, self.theme, self.indexed)
    }
}

/// The workbook's base font; style fields equal to it are left out.
#[derive(Debug, Clone, Default)]
pub(crate) struct BaseFont {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub color: Option<String>,
}

impl BaseFont {
    pub(crate) fn from_font(font: &SourceFont, palette: Palette) -> Self {
        Self {
            name: font.name.clone(),
            size: font.size,
            color: font.color.as_ref().and_then(|c| palette.resolve(c)),
        }
    }
}

fn flag(on: bool) -> Option<bool> {
    on.then_some(true)
}

/// Map a resolved cell style. Returns `None` when nothing differs from the
/// workbook defaults.
pub(crate) fn map_style(src: &SourceStyle, base: &BaseFont, palette: Palette) -> Option<Style> {
    let font = &src.font;
    let font_color = font.color.as_ref().and_then(|c| palette.resolve(c));

    let style = Style {
        bold: flag(font.bold),
        italic: flag(font.italic),
        underline: flag(font.underline),
        strike: flag(font.strike),
        font_size: font.size.filter(|s| Some(*s) != base.size),
        font_name: font.name.clone().filter(|n| Some(n) != base.name.as_ref()),
        font_color: font_color.filter(|c| Some(c) != base.color.as_ref()),
        background_color: src.fill.as_ref().and_then(|c| palette.resolve(c)),
        horizontal_align: src
            .align_h
            .as_deref()
            .and_then(HAlign::parse)
            .filter(|a| *a != HAlign::General),
        vertical_align: src.align_v.as_deref().and_then(VAlign::parse),
        wrap: flag(src.wrap),
        border: map_borders(src, palette),
        number_format: src.num_fmt.as_deref().map(classify_number_format),
    };

    (!style.is_empty()).then_some(style)
}

fn map_edge(edge: Option<&SourceBorderEdge>, palette: Palette) -> Option<Border> {
    let edge = edge?;
    Some(Border {
        style: BorderStyle::parse(&edge.style)?,
        color: edge
            .color
            .as_ref()
            .and_then(|c| palette.resolve(c))
            .unwrap_or_else(|| DEFAULT_BORDER_COLOR.to_string()),
    })
}

fn map_borders(src: &SourceStyle, palette: Palette) -> Option<BorderSet> {
    let b = &src.borders;
    let set = BorderSet {
        top: map_edge(b.top.as_ref(), palette),
        bottom: map_edge(b.bottom.as_ref(), palette),
        left: map_edge(b.left.as_ref(), palette),
        right: map_edge(b.right.as_ref(), palette),
    };
    (!set.is_empty()).then_some(set)
}

/// Style delta of a rich-text run. Every property the run states is kept.
pub(crate) fn map_run_style(font: &SourceFont, palette: Palette) -> RunStyle {
    RunStyle {
        bold: flag(font.bold),
        italic: flag(font.italic),
        underline: flag(font.underline),
        strike: flag(font.strike),
        font_size: font.size,
        font_name: font.name.clone(),
        font_color: font.color.as_ref().and_then(|c| palette.resolve(c)),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use crate::color::default_theme_colors;
    use crate::source::SourceBorders;

    fn palette(theme: &[String]) -> Palette<'_> {
        Palette {
            theme,
            indexed: None,
        }
    }

    #[test]
    fn test_default_style_is_none() {
        let theme = default_theme_colors();
        let font = SourceFont {
            name: Some("Calibri".to_string()),
            size: Some(11.0),
            color: Some(ColorSpec {
                theme: Some(1),
                ..ColorSpec::default()
            }),
            ..SourceFont::default()
        };
        let base = BaseFont::from_font(&font, palette(&theme));
        let src = SourceStyle {
            font,
            align_h: Some("general".to_string()),
            ..SourceStyle::default()
        };
        assert!(map_style(&src, &base, palette(&theme)).is_none());
    }

    #[test]
    fn test_theme_tint_fill_and_font() {
        let theme = default_theme_colors();
        let src = SourceStyle {
            font: SourceFont {
                bold: true,
                size: Some(14.0),
                ..SourceFont::default()
            },
            fill: Some(ColorSpec {
                theme: Some(4),
                tint: Some(0.4),
                ..ColorSpec::default()
            }),
            num_fmt: Some("0.00%".to_string()),
            ..SourceStyle::default()
        };
        let style = map_style(&src, &BaseFont::default(), palette(&theme)).unwrap();
        assert_eq!(style.bold, Some(true));
        assert_eq!(style.font_size, Some(14.0));
        assert_eq!(style.background_color.as_deref(), Some("#8FAADC"));
        let numfmt = style.number_format.unwrap();
        assert!(numfmt.is_percent);
        assert_eq!(numfmt.decimal_places, 2);
    }

    #[test]
    fn test_borders() {
        let theme = default_theme_colors();
        let src = SourceStyle {
            borders: SourceBorders {
                top: Some(SourceBorderEdge {
                    style: "thin".to_string(),
                    color: None,
                }),
                left: Some(SourceBorderEdge {
                    style: "double".to_string(),
                    color: Some(ColorSpec {
                        rgb: Some("FFFF0000".to_string()),
                        ..ColorSpec::default()
                    }),
                }),
                bottom: Some(SourceBorderEdge {
                    style: "none".to_string(),
                    color: None,
                }),
                right: None,
            },
            ..SourceStyle::default()
        };
        let style = map_style(&src, &BaseFont::default(), palette(&theme)).unwrap();
        let border = style.border.unwrap();
        assert_eq!(border.top.unwrap().color, "#000000");
        let left = border.left.unwrap();
        assert_eq!(left.style, BorderStyle::Double);
        assert_eq!(left.color, "#FF0000");
        assert!(border.bottom.is_none());
    }
}
