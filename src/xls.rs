//! Legacy binary workbook (`.xls`) reader.
//!
//! calamine decodes the BIFF records; this module maps its ranges onto the
//! same [`SourceWorkbook`] the xlsx reader produces. The format keeps its
//! styles out of calamine's reach, so cells carry no style index here.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{
    open_workbook_from_rs, Data, ExcelDateTime, ExcelDateTimeType, Reader, SheetVisible, Xls,
};

use crate::cell_ref::CellRange;
use crate::color::default_theme_colors;
use crate::error::{Result, SkipReason, Warnings};
use crate::source::{SourceCell, SourceCellRecord, SourceDate, SourceSheet, SourceWorkbook};

/// Read an `.xls` workbook. Only failing to open the file is fatal; a sheet
/// that cannot be decoded becomes an empty sheet plus a warning.
pub(crate) fn read_xls(data: &[u8], warnings: &mut Warnings) -> Result<SourceWorkbook> {
    let mut workbook: Xls<_> = open_workbook_from_rs(Cursor::new(data))?;

    let metadata: Vec<(String, bool)> = workbook
        .sheets_metadata()
        .iter()
        .map(|s| (s.name.clone(), s.visible != SheetVisible::Visible))
        .collect();

    let mut sheets = Vec::with_capacity(metadata.len());
    let mut date1904 = false;
    for (name, hidden) in metadata {
        let mut sheet = SourceSheet {
            name: name.clone(),
            hidden,
            ..SourceSheet::default()
        };

        match workbook.worksheet_range(&name) {
            Ok(range) => {
                let (start_row, start_col) = range.start().unwrap_or((0, 0));
                for (row, col, value) in range.used_cells() {
                    let (Ok(r), Ok(c)) = (u32::try_from(row), u32::try_from(col)) else {
                        continue;
                    };
                    if let Data::DateTime(dt) = value {
                        date1904 |= uses_1904_epoch(dt);
                    }
                    if let Some(cell) = source_cell(value) {
                        sheet.cells.push(SourceCellRecord {
                            row: start_row.saturating_add(r),
                            col: start_col.saturating_add(c),
                            raw: Some(value.to_string()),
                            cell,
                            style: None,
                        });
                    }
                }
            }
            Err(e) => {
                warnings.skip(
                    &format!("cells of sheet {name:?}"),
                    &SkipReason::MissingPart(format!("{name}: {e}")),
                );
            }
        }

        if let Ok(formulas) = workbook.worksheet_formula(&name) {
            let (start_row, start_col) = formulas.start().unwrap_or((0, 0));
            let positions: Vec<(u32, u32, String)> = formulas
                .used_cells()
                .filter(|(_, _, f)| !f.trim().is_empty())
                .filter_map(|(row, col, f)| {
                    let r = u32::try_from(row).ok()?;
                    let c = u32::try_from(col).ok()?;
                    Some((start_row.saturating_add(r), start_col.saturating_add(c), f.clone()))
                })
                .collect();
            attach_formulas(&mut sheet.cells, positions);
        }

        if let Some(merges) = workbook.worksheet_merge_cells(&name) {
            sheet.merges = merges
                .iter()
                .map(|d| CellRange {
                    start_row: d.start.0,
                    start_col: d.start.1,
                    end_row: d.end.0,
                    end_col: d.end.1,
                })
                .collect();
        }

        log::debug!("xls sheet {name:?}: {} cells", sheet.cells.len());
        sheets.push(sheet);
    }

    if date1904 {
        log::debug!("xls workbook uses the 1904 date system");
    }
    Ok(SourceWorkbook {
        sheets,
        date1904,
        theme_colors: default_theme_colors(),
        ..SourceWorkbook::default()
    })
}

/// Whether calamine decoded this value against the 1904 epoch. The flag is
/// private to calamine; the calendar date it yields is not.
fn uses_1904_epoch(dt: &ExcelDateTime) -> bool {
    let as_1900 = ExcelDateTime::new(dt.as_f64(), ExcelDateTimeType::DateTime, false);
    dt.to_ymd_hms_milli() != as_1900.to_ymd_hms_milli()
}

/// Map one calamine value; empty cells and empty strings yield `None`.
fn source_cell(value: &Data) -> Option<SourceCell> {
    #[allow(clippy::cast_precision_loss)]
    let cell = match value {
        Data::Empty => return None,
        Data::String(s) if s.is_empty() => return None,
        Data::String(s) => SourceCell::Text(s.clone()),
        Data::Int(n) => SourceCell::Number(*n as f64),
        Data::Float(n) => SourceCell::Number(*n),
        Data::Bool(b) => SourceCell::Boolean(*b),
        Data::DateTime(dt) => SourceCell::Date(SourceDate::Serial(dt.as_f64())),
        Data::DateTimeIso(s) => SourceCell::Date(SourceDate::Text(s.clone())),
        Data::DurationIso(s) => SourceCell::Text(s.clone()),
        Data::Error(e) => SourceCell::Error(e.to_string()),
    };
    Some(cell)
}

/// Wrap the cells at formula positions, keeping their values as the cached
/// result. Formula cells with no value get a record of their own.
fn attach_formulas(cells: &mut Vec<SourceCellRecord>, formulas: Vec<(u32, u32, String)>) {
    let index: HashMap<(u32, u32), usize> = cells
        .iter()
        .enumerate()
        .map(|(i, c)| ((c.row, c.col), i))
        .collect();

    for (row, col, formula) in formulas {
        match index.get(&(row, col)).and_then(|&i| cells.get_mut(i)) {
            Some(record) => {
                let cached = std::mem::replace(&mut record.cell, SourceCell::Empty);
                record.cell = SourceCell::Formula {
                    formula,
                    cached: Some(Box::new(cached)),
                };
            }
            None => cells.push(SourceCellRecord {
                row,
                col,
                cell: SourceCell::Formula {
                    formula,
                    cached: None,
                },
                style: None,
                raw: None,
            }),
        }
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
    use calamine::CellErrorType;

    #[test]
    fn test_source_cell_mapping() {
        assert_eq!(source_cell(&Data::Empty), None);
        assert_eq!(source_cell(&Data::String(String::new())), None);
        assert_eq!(source_cell(&Data::Int(7)), Some(SourceCell::Number(7.0)));
        assert_eq!(
            source_cell(&Data::Bool(false)),
            Some(SourceCell::Boolean(false))
        );
        assert_eq!(
            source_cell(&Data::Error(CellErrorType::Div0)),
            Some(SourceCell::Error("#DIV/0!".to_string()))
        );
        assert_eq!(
            source_cell(&Data::DateTimeIso("2024-01-02".to_string())),
            Some(SourceCell::Date(SourceDate::Text("2024-01-02".to_string())))
        );
    }

    #[test]
    fn test_1904_epoch_detection() {
        let serial = 45306.0;
        let modern = ExcelDateTime::new(serial, ExcelDateTimeType::DateTime, false);
        let legacy = ExcelDateTime::new(serial, ExcelDateTimeType::DateTime, true);
        assert!(!uses_1904_epoch(&modern));
        assert!(uses_1904_epoch(&legacy));
        assert!(uses_1904_epoch(&ExcelDateTime::new(
            0.0,
            ExcelDateTimeType::DateTime,
            true
        )));

        // the serial is kept; the workbook flag picks the epoch
        assert_eq!(
            source_cell(&Data::DateTime(legacy)),
            Some(SourceCell::Date(SourceDate::Serial(serial)))
        );
        assert_eq!(
            crate::date::format_serial(serial, "yyyy-mm-dd", true),
            "2028-01-16"
        );
    }

    #[test]
    fn test_attach_formulas() {
        let mut cells = vec![SourceCellRecord {
            row: 3,
            col: 0,
            cell: SourceCell::Number(42.0),
            style: None,
            raw: Some("42".to_string()),
        }];
        attach_formulas(
            &mut cells,
            vec![
                (3, 0, "SUM(A1:A3)".to_string()),
                (5, 1, "NOW()".to_string()),
            ],
        );
        assert_eq!(
            cells[0].cell,
            SourceCell::Formula {
                formula: "SUM(A1:A3)".to_string(),
                cached: Some(Box::new(SourceCell::Number(42.0))),
            }
        );
        assert_eq!(cells.len(), 2);
        assert_eq!((cells[1].row, cells[1].col), (5, 1));
    }

    #[test]
    fn test_garbage_is_fatal() {
        let mut warnings = Warnings::new();
        assert!(read_xls(b"definitely not a compound file", &mut warnings).is_err());
    }
}
