//! Source document model.
//!
//! Readers (xlsx, xls, csv) produce a [`SourceWorkbook`]; the mapper walks it
//! to build the canonical snapshot. Colors and styles stay in their raw
//! source form here and are resolved by the mapper.

use std::collections::{BTreeMap, HashMap};

use crate::cell_ref::CellRange;

/// Color reference as written in the source: direct RGB, theme slot with
/// tint, legacy palette index, or "automatic".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorSpec {
    pub rgb: Option<String>,
    pub theme: Option<u32>,
    pub tint: Option<f64>,
    pub indexed: Option<u32>,
    pub auto: bool,
}

/// Closed set of source-cell shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceCell {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Date(SourceDate),
    /// Formula text as stored (usually without a leading `=`) and the cached result.
    Formula {
        formula: String,
        cached: Option<Box<SourceCell>>,
    },
    RichText(Vec<SourceRun>),
    Hyperlink {
        text: String,
        url: String,
    },
    /// Covered by a merge but not its top-left cell.
    Merged,
    /// Error literal such as `#DIV/0!`.
    Error(String),
}

impl SourceCell {
    /// Plain display text, used for hyperlink labels.
    pub fn plain_text(&self) -> String {
        match self {
            Self::Empty | Self::Merged => String::new(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) | Self::Error(s) => s.clone(),
            Self::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Self::Date(SourceDate::Serial(n)) => format_number(*n),
            Self::Date(SourceDate::Text(s)) => s.clone(),
            Self::Formula { cached, .. } => cached
                .as_deref()
                .map(Self::plain_text)
                .unwrap_or_default(),
            Self::RichText(runs) => runs.iter().map(|r| r.text.as_str()).collect(),
            Self::Hyperlink { text, .. } => text.clone(),
        }
    }
}

/// Shortest display for a number: integers without a fraction.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

/// A date cell before conversion: a serial number, or ISO text from `t="d"`.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceDate {
    Serial(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceRun {
    pub text: String,
    pub font: Option<SourceFont>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFont {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub color: Option<ColorSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceBorderEdge {
    pub style: String,
    pub color: Option<ColorSpec>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBorders {
    pub top: Option<SourceBorderEdge>,
    pub bottom: Option<SourceBorderEdge>,
    pub left: Option<SourceBorderEdge>,
    pub right: Option<SourceBorderEdge>,
}

/// A fully resolved cell format (xf) with raw colors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceStyle {
    pub font: SourceFont,
    pub fill: Option<ColorSpec>,
    pub borders: SourceBorders,
    pub align_h: Option<String>,
    pub align_v: Option<String>,
    pub wrap: bool,
    /// Format code; `None` means General.
    pub num_fmt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceCellRecord {
    pub row: u32,
    pub col: u32,
    pub cell: SourceCell,
    /// Index into [`SourceWorkbook::styles`].
    pub style: Option<usize>,
    /// The untouched stored value text, kept for fallback display.
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    pub index: u32,
    /// Height in points as stored.
    pub height: Option<f64>,
    pub hidden: bool,
}

/// A `<col>` span, 0-based inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceColumn {
    pub min: u32,
    pub max: u32,
    /// Width in character units as stored.
    pub width: Option<f64>,
    pub hidden: bool,
}

/// First sheet view's pane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePane {
    pub x_split: f64,
    pub y_split: f64,
    pub top_left_cell: Option<String>,
    pub state: Option<String>,
}

/// Auto-filter reference in either of the shapes producers emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFilterRef {
    A1(String),
    /// 0-based `(row, col)` corners.
    Span { from: (u32, u32), to: (u32, u32) },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceCfValue {
    pub kind: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceCfRule {
    pub rule_type: String,
    pub priority: u32,
    pub stop_if_true: bool,
    pub operator: Option<String>,
    pub text: Option<String>,
    pub formulas: Vec<String>,
    pub dxf_id: Option<usize>,
    pub cfvos: Vec<SourceCfValue>,
    pub colors: Vec<ColorSpec>,
    pub icon_set: Option<String>,
    pub reverse: bool,
    pub show_value: bool,
    /// All `cfRule` attributes, verbatim.
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceConditionalFormat {
    pub sqref: String,
    pub rules: Vec<SourceCfRule>,
}

/// Image bytes plus the part name they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Cell-relative point in a drawing anchor. Offsets are in EMU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorPoint {
    pub col: u32,
    pub col_off: i64,
    pub row: u32,
    pub row_off: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub from: AnchorPoint,
    pub to: Option<AnchorPoint>,
    /// `(cx, cy)` in EMU.
    pub extent: Option<(i64, i64)>,
    pub media: MediaFile,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSheet {
    pub name: String,
    pub hidden: bool,
    pub tab_color: Option<ColorSpec>,
    pub cells: Vec<SourceCellRecord>,
    pub rows: Vec<SourceRow>,
    pub columns: Vec<SourceColumn>,
    pub merges: Vec<CellRange>,
    pub pane: Option<SourcePane>,
    pub default_row_height: Option<f64>,
    pub default_col_width: Option<f64>,
    pub auto_filter: Option<SourceFilterRef>,
    pub conditional_formats: Vec<SourceConditionalFormat>,
    pub images: Vec<SourceImage>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceWorkbook {
    pub sheets: Vec<SourceSheet>,
    pub styles: Vec<SourceStyle>,
    pub dxf_styles: Vec<SourceStyle>,
    pub theme_colors: Vec<String>,
    pub indexed_colors: Option<Vec<String>>,
    pub date1904: bool,
    /// Cell-hosted pictures keyed by the name (and id) the marker formula uses.
    pub cell_images: HashMap<String, MediaFile>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        assert_eq!(SourceCell::Number(42.0).plain_text(), "42");
        assert_eq!(SourceCell::Number(1.5).plain_text(), "1.5");
        assert_eq!(SourceCell::Boolean(true).plain_text(), "TRUE");
        let rich = SourceCell::RichText(vec![
            SourceRun {
                text: "ab".to_string(),
                font: None,
            },
            SourceRun {
                text: "cd".to_string(),
                font: None,
            },
        ]);
        assert_eq!(rich.plain_text(), "abcd");
        let formula = SourceCell::Formula {
            formula: "1+1".to_string(),
            cached: Some(Box::new(SourceCell::Number(2.0))),
        };
        assert_eq!(formula.plain_text(), "2");
    }
}
