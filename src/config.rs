//! Import options and the input-kind discriminator.

use serde::{Deserialize, Serialize};

/// Which reader handles the input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Zipped-XML workbook package.
    Xlsx,
    /// Legacy binary workbook.
    Xls,
    /// Delimited text.
    Csv,
}

impl InputKind {
    /// Derive the kind from a file name or bare extension, case-insensitively.
    ///
    /// ```
    /// use xlimport::InputKind;
    /// assert_eq!(InputKind::from_extension("Report.XLSX"), Some(InputKind::Xlsx));
    /// assert_eq!(InputKind::from_extension("csv"), Some(InputKind::Csv));
    /// assert_eq!(InputKind::from_extension("notes.txt"), None);
    /// ```
    pub fn from_extension(name: &str) -> Option<Self> {
        let ext = name.rsplit('.').next().unwrap_or(name).to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Csv => "csv",
        }
    }
}

/// Pixel size used for image placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelSize {
    pub width: f64,
    pub height: f64,
}

/// Tunables for a single import call.
///
/// Every field has a default, so callers on the JS side can pass `{}` or
/// only the fields they care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    /// Extract floating and cell-hosted images.
    pub include_images: bool,
    /// Floor for each sheet's row count.
    pub min_rows: u32,
    /// Floor for each sheet's column count.
    pub min_columns: u32,
    /// Default row height in pixels.
    pub default_row_height: f64,
    /// Default column width in pixels.
    pub default_column_width: f64,
    /// Multiplier from the source's character-width unit to pixels.
    pub column_width_factor: f64,
    /// Inputs larger than this many bytes raise an advisory warning.
    pub large_input_threshold: usize,
    /// Size given to cell-hosted images.
    pub cell_image_placeholder: PixelSize,
    /// Minimum edge length of a floating image.
    pub min_image_size: f64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            include_images: true,
            min_rows: 100,
            min_columns: 26,
            default_row_height: 20.0,
            default_column_width: 64.0,
            column_width_factor: 7.0,
            large_input_threshold: 10 * 1024 * 1024,
            cell_image_placeholder: PixelSize {
                width: 100.0,
                height: 100.0,
            },
            min_image_size: 20.0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(InputKind::from_extension("a.xlsm"), Some(InputKind::Xlsx));
        assert_eq!(InputKind::from_extension("XLS"), Some(InputKind::Xls));
        assert_eq!(InputKind::from_extension("archive.tar.gz"), None);
    }

    #[test]
    fn test_partial_options_json() {
        let opts: ImportOptions =
            serde_json::from_str(r#"{"includeImages": false, "minRows": 10}"#).unwrap();
        assert!(!opts.include_images);
        assert_eq!(opts.min_rows, 10);
        assert_eq!(opts.min_columns, 26);
        assert_eq!(opts.cell_image_placeholder.width, 100.0);
    }
}
