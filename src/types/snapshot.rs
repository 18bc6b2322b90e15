use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{RunStyle, Style};

/// Helper function for serde skip_serializing_if
pub(crate) fn is_false(b: &bool) -> bool {
    !b
}

/// The normalized workbook: sheets in source order, keyed by generated id.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub sheet_order: Vec<String>,
    pub sheets: BTreeMap<String, Sheet>,
}

impl Snapshot {
    /// Sheets in `sheet_order` order.
    pub fn ordered_sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheet_order.iter().filter_map(|id| self.sheets.get(id))
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.ordered_sheets().find(|s| s.name == name)
    }
}

/// Sparse row -> column -> cell grid.
pub type CellGrid = BTreeMap<u32, BTreeMap<u32, Cell>>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub id: String,
    pub name: String,
    pub row_count: u32,
    pub column_count: u32,
    pub default_row_height: f64,
    pub default_column_width: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeze: Option<Freeze>,
    pub cell_data: CellGrid,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub row_data: BTreeMap<u32, RowData>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_data: BTreeMap<u32, ColumnData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merge_data: Vec<MergeRegion>,
}

impl Sheet {
    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cell_data.get(&row).and_then(|r| r.get(&col))
    }
}

/// Frozen panes: rows above `start_row` and columns left of `start_column` stay put.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Freeze {
    pub start_row: u32,
    pub start_column: u32,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RowData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

/// 0-based inclusive merge rectangle.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MergeRegion {
    pub start_row: u32,
    pub end_row: u32,
    pub start_column: u32,
    pub end_column: u32,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<CellValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rich_text: Option<Vec<RichTextRun>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<Hyperlink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
}

impl Cell {
    /// A cell worth emitting: it has a value, a formula or a style.
    pub fn is_present(&self) -> bool {
        self.value.is_some() || self.formula.is_some() || self.style.is_some()
    }

    /// Set the value and its matching type tag together.
    pub fn set_value(&mut self, value: CellValue) {
        self.value_type = Some(value.value_type());
        self.value = Some(value);
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Boolean(_) => ValueType::Boolean,
            Self::Number(_) => ValueType::Number,
            Self::Text(_) => ValueType::String,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
}

/// A styled slice of a cell's text, as char offsets `[start, end)`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RichTextRun {
    pub start: usize,
    pub end: usize,
    pub style: RunStyle,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hyperlink {
    pub url: String,
    pub text: String,
}
