//! Main XLSX reader
//!
//! Orchestrates reading every workbook part from the package into a
//! [`SourceWorkbook`]. Only the workbook manifest is mandatory; every other
//! part degrades to a warning and a default.

mod relationships;
mod styles;
mod worksheet;

use crate::cell_images::read_cell_images;
use crate::color::default_theme_colors;
use crate::config::ImportOptions;
use crate::error::{Result, SkipReason, Warnings};
use crate::package::Package;
use crate::rich_text::parse_shared_strings;
use crate::source::SourceWorkbook;
use crate::styles::{parse_styles, StyleSheet};

use relationships::{parse_theme_colors, workbook_parts};
use styles::resolve_styles;
use worksheet::read_worksheet;

/// Read an xlsx package into the source model.
///
/// Fails only when the workbook manifest is missing or unreadable.
pub(crate) fn read_xlsx(
    pkg: &mut Package,
    options: &ImportOptions,
    warnings: &mut Warnings,
) -> Result<SourceWorkbook> {
    let entries = pkg.workbook_sheets()?;
    let date1904 = pkg.uses_1904_dates();
    let parts = workbook_parts(pkg);

    let theme_colors = parts
        .theme
        .as_deref()
        .and_then(|path| pkg.read_part(path))
        .map_or_else(default_theme_colors, |xml| parse_theme_colors(&xml));

    let shared_strings = parts
        .shared_strings
        .as_deref()
        .and_then(|path| pkg.read_part(path))
        .map(|xml| parse_shared_strings(&xml))
        .unwrap_or_default();

    let stylesheet = match parts.styles.as_deref() {
        Some(path) => match pkg.read_part(path).map(|xml| parse_styles(&xml)) {
            Some(Ok(sheet)) => sheet,
            Some(Err(e)) => {
                warnings.skip(
                    "cell styles",
                    &SkipReason::Xml {
                        part: path.to_string(),
                        message: e.to_string(),
                    },
                );
                StyleSheet::default()
            }
            None => StyleSheet::default(),
        },
        None => StyleSheet::default(),
    };

    log::debug!(
        "workbook: {} sheets, {} shared strings, {} cell formats, date1904={date1904}",
        entries.len(),
        shared_strings.len(),
        stylesheet.cell_xfs.len()
    );

    let sheets = entries
        .iter()
        .enumerate()
        .map(|(ordinal, entry)| {
            read_worksheet(
                pkg,
                entry,
                ordinal,
                &shared_strings,
                options.include_images,
                warnings,
            )
        })
        .collect();

    let cell_images = if options.include_images {
        read_cell_images(pkg)
    } else {
        Default::default()
    };

    Ok(SourceWorkbook {
        sheets,
        styles: resolve_styles(&stylesheet),
        dxf_styles: stylesheet.dxfs,
        theme_colors,
        indexed_colors: stylesheet.indexed_colors,
        date1904,
        cell_images,
    })
}
