//! Import pipeline: read -> map -> extract.

use crate::charts::extract_charts;
use crate::config::{ImportOptions, InputKind};
use crate::csv::read_csv;
use crate::error::{Result, Warnings};
use crate::mapper::{map_workbook, MappedWorkbook};
use crate::package::Package;
use crate::parser::read_xlsx;
use crate::pivots::extract_pivot_tables;
use crate::sorts::extract_sorts;
use crate::types::ImportResult;
use crate::xls::read_xls;

/// Convert one spreadsheet into the canonical snapshot and its side
/// collections.
///
/// Only an unreadable container is an error. Anything below that is
/// skipped and reported in [`ImportResult::warnings`].
///
/// ```
/// use xlimport::{import, ImportOptions, InputKind};
///
/// let result = import(b"name,qty\nbolts,40\n", InputKind::Csv, &ImportOptions::default()).unwrap();
/// let sheet = result.snapshot.ordered_sheets().next().unwrap();
/// assert_eq!(sheet.name, "CSV");
/// assert_eq!(sheet.cell(1, 1).and_then(|c| c.value.as_ref()).and_then(|v| v.as_number()), Some(40.0));
/// ```
///
/// # Errors
/// Fails when the zip container or workbook manifest (xlsx), or the compound
/// file (xls), cannot be read.
pub fn import(data: &[u8], kind: InputKind, options: &ImportOptions) -> Result<ImportResult> {
    let mut warnings = Warnings::new();
    if data.len() > options.large_input_threshold {
        warnings.advise(format!(
            "input is {} bytes, above the {} byte threshold; import may be slow",
            data.len(),
            options.large_input_threshold
        ));
    }

    let mut result = match kind {
        InputKind::Xlsx => import_xlsx(data, options, &mut warnings)?,
        InputKind::Xls => {
            let source = read_xls(data, &mut warnings)?;
            into_result(map_workbook(&source, options, &mut warnings))
        }
        InputKind::Csv => {
            let source = read_csv(data)?;
            into_result(map_workbook(&source, options, &mut warnings))
        }
    };

    log::info!(
        "imported {} {} sheets: {} images, {} conditional formats, {} charts, {} pivot tables, {} warnings",
        result.snapshot.sheet_order.len(),
        kind.as_str(),
        result.images.values().map(Vec::len).sum::<usize>(),
        result.conditional_formats.values().map(Vec::len).sum::<usize>(),
        result.charts.values().map(Vec::len).sum::<usize>(),
        result.pivot_tables.len(),
        warnings.len()
    );
    result.warnings = warnings.into_vec();
    Ok(result)
}

fn import_xlsx(data: &[u8], options: &ImportOptions, warnings: &mut Warnings) -> Result<ImportResult> {
    let mut pkg = Package::open(data)?;
    let source = read_xlsx(&mut pkg, options, warnings)?;
    let mapped = map_workbook(&source, options, warnings);

    let charts = extract_charts(&mut pkg, &mapped.registry, warnings);
    let pivot_tables = extract_pivot_tables(&mut pkg, &mapped.registry, warnings);
    let sorts = extract_sorts(&mut pkg, &mapped.registry, warnings);

    Ok(ImportResult {
        charts,
        pivot_tables,
        sorts,
        ..into_result(mapped)
    })
}

fn into_result(mapped: MappedWorkbook) -> ImportResult {
    ImportResult {
        snapshot: mapped.snapshot,
        images: mapped.images,
        conditional_formats: mapped.conditional_formats,
        filters: mapped.filters,
        ..ImportResult::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_large_input_advisory() {
        let options = ImportOptions {
            large_input_threshold: 4,
            ..ImportOptions::default()
        };
        let result = import(b"a,b\n1,2\n", InputKind::Csv, &options).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("threshold"));
    }

    #[test]
    fn test_garbage_xlsx_is_fatal() {
        assert!(import(b"not a zip", InputKind::Xlsx, &ImportOptions::default()).is_err());
    }
}
