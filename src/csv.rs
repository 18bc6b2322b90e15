//! CSV reader that produces a [`SourceWorkbook`] with a single sheet.

use crate::error::Result;
use crate::source::{SourceCell, SourceCellRecord, SourceSheet, SourceWorkbook};

/// Sheet name given to delimited-text input.
pub const CSV_SHEET_NAME: &str = "CSV";

/// Parse CSV bytes into a [`SourceWorkbook`] with one sheet.
///
/// Numeric fields become numbers; everything else stays text. Blank fields
/// are omitted, and quoted fields may span lines. Records may differ in
/// length.
pub(crate) fn read_csv(data: &[u8]) -> Result<SourceWorkbook> {
    let text = String::from_utf8_lossy(data);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut cells: Vec<SourceCellRecord> = Vec::new();

    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let Ok(row) = u32::try_from(row_idx) else {
            break;
        };
        for (col_idx, field) in record.iter().enumerate() {
            let Ok(col) = u32::try_from(col_idx) else {
                break;
            };
            let value = field.trim();
            if value.is_empty() {
                continue;
            }

            let cell = match parse_number(value) {
                Some(n) => SourceCell::Number(n),
                None => SourceCell::Text(value.to_string()),
            };

            cells.push(SourceCellRecord {
                row,
                col,
                cell,
                style: None,
                raw: Some(value.to_string()),
            });
        }
    }

    log::debug!("csv: {} cells", cells.len());

    Ok(SourceWorkbook {
        sheets: vec![SourceSheet {
            name: CSV_SHEET_NAME.to_string(),
            cells,
            ..SourceSheet::default()
        }],
        ..SourceWorkbook::default()
    })
}

/// Finite decimal numbers only; `NaN`, `inf` and friends stay text.
fn parse_number(value: &str) -> Option<f64> {
    if !value.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<f64>().ok().filter(|n| n.is_finite())
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
    use test_case::test_case;

    fn cell_at(wb: &SourceWorkbook, row: u32, col: u32) -> &SourceCell {
        &wb.sheets[0]
            .cells
            .iter()
            .find(|c| c.row == row && c.col == col)
            .unwrap()
            .cell
    }

    #[test]
    fn test_parse_csv_basic() {
        let data = b"Name,Age,City\nAlice,30,NYC\nBob,25,LA";
        let wb = read_csv(data).unwrap();
        assert_eq!(wb.sheets.len(), 1);
        assert_eq!(wb.sheets[0].name, "CSV");
        assert_eq!(wb.sheets[0].cells.len(), 9);
        assert_eq!(cell_at(&wb, 1, 0), &SourceCell::Text("Alice".to_string()));
        assert_eq!(cell_at(&wb, 1, 1), &SourceCell::Number(30.0));
    }

    #[test]
    fn test_quoted_csv() {
        let data = b"\"Hello, World\",42\n\"She said \"\"hi\"\"\",0";
        let wb = read_csv(data).unwrap();
        assert_eq!(
            cell_at(&wb, 0, 0),
            &SourceCell::Text("Hello, World".to_string())
        );
        assert_eq!(
            cell_at(&wb, 1, 0),
            &SourceCell::Text("She said \"hi\"".to_string())
        );
        assert_eq!(cell_at(&wb, 0, 1), &SourceCell::Number(42.0));
    }

    #[test]
    fn test_bom_and_blank_fields() {
        let wb = read_csv("\u{feff}a,,c\n\n,2".as_bytes()).unwrap();
        assert_eq!(wb.sheets[0].cells.len(), 3);
        assert_eq!(cell_at(&wb, 0, 0), &SourceCell::Text("a".to_string()));
        // blank lines do not produce rows
        assert_eq!(cell_at(&wb, 1, 1), &SourceCell::Number(2.0));
    }

    #[test]
    fn test_quoted_field_spans_lines() {
        let wb = read_csv(b"note,qty\n\"line one\nline two\",5\nlast,6\n").unwrap();
        assert_eq!(
            cell_at(&wb, 1, 0),
            &SourceCell::Text("line one\nline two".to_string())
        );
        assert_eq!(cell_at(&wb, 1, 1), &SourceCell::Number(5.0));
        assert_eq!(cell_at(&wb, 2, 1), &SourceCell::Number(6.0));
        assert!(wb.sheets[0].cells.iter().all(|c| c.row <= 2));
    }

    #[test]
    fn test_ragged_records() {
        let wb = read_csv(b"a\nb,c,d\n").unwrap();
        assert_eq!(cell_at(&wb, 1, 2), &SourceCell::Text("d".to_string()));
    }

    #[test]
    fn test_empty_csv() {
        let wb = read_csv(b"").unwrap();
        assert_eq!(wb.sheets.len(), 1);
        assert!(wb.sheets[0].cells.is_empty());
    }

    #[test_case("3.25", Some(3.25))]
    #[test_case("-1e3", Some(-1000.0))]
    #[test_case("NaN", None)]
    #[test_case("inf", None)]
    #[test_case("12abc", None)]
    fn test_parse_number(input: &str, expected: Option<f64>) {
        assert_eq!(parse_number(input), expected);
    }
}
