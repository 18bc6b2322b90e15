//! xlimport - spreadsheet importer
//!
//! Converts spreadsheet files into one canonical, sparse snapshot plus the
//! side artifacts a spreadsheet host needs to rebuild the workbook:
//! - xlsx packages, legacy xls workbooks and csv text
//! - cells with values, formulas, rich text, hyperlinks and resolved styles
//! - merges, frozen panes, hidden rows/columns, tab colors
//! - images, conditional formats, auto-filters, sort state
//! - charts and pivot tables recovered from the package XML
//!
//! # Usage (Rust)
//!
//! ```no_run
//! use xlimport::{import, ImportOptions, InputKind};
//!
//! let data = std::fs::read("book.xlsx").unwrap();
//! let result = import(&data, InputKind::Xlsx, &ImportOptions::default()).unwrap();
//! for sheet in result.snapshot.ordered_sheets() {
//!     println!("{}: {} rows", sheet.name, sheet.row_count);
//! }
//! ```
//!
//! # Usage (JavaScript)
//!
//! ```javascript
//! import init, { import_spreadsheet_to_js } from 'xlimport';
//! await init();
//! const result = import_spreadsheet_to_js(bytes, 'xlsx', '{"includeImages": true}');
//! ```

// Package and XML plumbing
pub mod cell_ref;
pub mod package;
pub mod xml_helpers;

// Workbook part readers
pub mod cell_images;
pub mod conditional;
pub mod drawings;
pub mod hyperlinks;
pub mod parser;
pub mod rich_text;
pub mod styles;

// Other input formats
pub mod csv;
pub mod xls;

// Resolution helpers
pub mod color;
pub mod date;
pub mod numfmt;

// Pipeline
pub mod charts;
pub mod config;
pub mod error;
mod import;
mod mapper;
pub mod pivots;
pub mod registry;
pub mod sorts;
pub mod source;
pub mod types;

use wasm_bindgen::prelude::*;

pub use config::{ImportOptions, InputKind, PixelSize};
pub use error::{ImportError, Result, SkipReason};
pub use import::import;
pub use registry::SheetRegistry;
pub use types::*;

fn run_import(data: &[u8], kind: &str, options_json: Option<String>) -> std::result::Result<ImportResult, JsValue> {
    let kind = InputKind::from_extension(kind)
        .ok_or_else(|| JsValue::from_str(&format!("Unsupported input kind: {kind}")))?;
    let options = match options_json.as_deref().map(str::trim) {
        Some(json) if !json.is_empty() => serde_json::from_str::<ImportOptions>(json)
            .map_err(|e| JsValue::from_str(&format!("Invalid options: {e}")))?,
        _ => ImportOptions::default(),
    };
    import(data, kind, &options).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Import a spreadsheet and return the result as a JSON string
///
/// # Arguments
/// * `data` - The raw bytes of the file
/// * `kind` - `"xlsx"`, `"xls"` or `"csv"` (a file name works too)
/// * `options_json` - Optional JSON object of [`ImportOptions`] fields
///
/// # Errors
/// Returns an error if the kind is unknown, the options do not parse, or the
/// file cannot be opened at all.
#[wasm_bindgen]
pub fn import_spreadsheet(
    data: &[u8],
    kind: &str,
    options_json: Option<String>,
) -> std::result::Result<String, JsValue> {
    let result = run_import(data, kind, options_json)?;

    serde_json::to_string(&result)
        .map_err(|e| JsValue::from_str(&format!("JSON serialization error: {e}")))
}

/// Import a spreadsheet and return the result as a `JsValue`
///
/// This is more efficient than `import_spreadsheet` when the result will be
/// used directly in JavaScript.
///
/// # Errors
/// Same as [`import_spreadsheet`].
#[wasm_bindgen]
pub fn import_spreadsheet_to_js(
    data: &[u8],
    kind: &str,
    options_json: Option<String>,
) -> std::result::Result<JsValue, JsValue> {
    let result = run_import(data, kind, options_json)?;

    serde_wasm_bindgen::to_value(&result)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
}

/// Get the library version
#[must_use]
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
