use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Snapshot, Style};

/// Cell-relative anchor: the cell plus a pixel offset into it.
#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPosition {
    pub row: u32,
    pub column: u32,
    pub row_offset: f64,
    pub column_offset: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

// =============================================================================
// Images
// =============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ImageKind {
    /// Anchored over the grid.
    Floating,
    /// Hosted inside a single cell.
    Cell,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedImage {
    pub id: String,
    pub sheet_id: String,
    pub kind: ImageKind,
    /// `data:` URI for embedded bytes, or the external URL.
    pub source: String,
    pub mime_type: String,
    pub position: AnchorPosition,
    pub size: Size,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// =============================================================================
// Conditional formatting
// =============================================================================

/// A threshold reference (`cfvo`): its kind (`min`, `num`, `percent`, ...) and value.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColorStop {
    pub threshold: Threshold,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// The closed set of rule families.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConditionalRule {
    #[serde(rename_all = "camelCase")]
    DataBar {
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<Threshold>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<Threshold>,
    },
    #[serde(rename_all = "camelCase")]
    ColorScale { stops: Vec<ColorStop> },
    #[serde(rename_all = "camelCase")]
    IconSet {
        icon_set: String,
        thresholds: Vec<Threshold>,
        reverse: bool,
        show_value: bool,
    },
    #[serde(rename_all = "camelCase")]
    HighlightCell {
        /// Source rule type, e.g. `cellIs` or `containsText`.
        rule_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        formulas: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<Style>,
    },
    /// Anything else, carried untouched for best-effort handling downstream.
    #[serde(rename_all = "camelCase")]
    Other {
        rule_type: String,
        attributes: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        formulas: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<Style>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedConditionalFormat {
    /// A1 ranges the rule applies to.
    pub ranges: Vec<String>,
    pub priority: u32,
    #[serde(default, skip_serializing_if = "super::snapshot::is_false")]
    pub stop_if_true: bool,
    pub rule: ConditionalRule,
}

// =============================================================================
// Filters and sorts
// =============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedFilter {
    pub range: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SortCondition {
    /// Column offset from the start of the sort range.
    pub column: u32,
    pub ascending: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedSort {
    pub range: String,
    pub conditions: Vec<SortCondition>,
}

// =============================================================================
// Charts
// =============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ChartType {
    Column,
    Bar,
    StackedBar,
    PercentStackedBar,
    Line,
    Pie,
    Doughnut,
    Area,
    Scatter,
    Radar,
    Bubble,
    Combo,
    #[default]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedChart {
    pub id: String,
    pub sheet_id: String,
    pub sheet_name: String,
    pub chart_type: ChartType,
    /// Bounding A1 range of all series references, no sheet qualifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_sheet_name: Option<String>,
    pub position: AnchorPosition,
    pub size: Size,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

// =============================================================================
// Pivot tables
// =============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PivotSourceRange {
    pub sheet_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<String>,
    pub start_row: u32,
    pub start_column: u32,
    pub end_row: u32,
    pub end_column: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PivotAnchor {
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OccupiedRange {
    pub start_row: u32,
    pub start_column: u32,
    pub end_row: u32,
    pub end_column: u32,
}

/// Field roles as 0-based source-column indices.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PivotFields {
    pub row_fields: Vec<u32>,
    pub col_fields: Vec<u32>,
    pub value_fields: Vec<u32>,
    pub filter_fields: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedPivotTable {
    pub id: String,
    pub sheet_id: String,
    pub sheet_name: String,
    pub source_range: PivotSourceRange,
    pub anchor_cell: PivotAnchor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupied_range: Option<OccupiedRange>,
    pub fields: PivotFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// =============================================================================
// Result bundle
// =============================================================================

/// Everything one import call produces. Side collections are keyed by the
/// canonical sheet id.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub snapshot: Snapshot,
    pub images: BTreeMap<String, Vec<ImportedImage>>,
    pub conditional_formats: BTreeMap<String, Vec<ImportedConditionalFormat>>,
    pub filters: BTreeMap<String, ImportedFilter>,
    pub sorts: BTreeMap<String, ImportedSort>,
    pub charts: BTreeMap<String, Vec<ImportedChart>>,
    pub pivot_tables: Vec<ImportedPivotTable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
