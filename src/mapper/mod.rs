//! Cell, style and document mapper.
//!
//! Walks a [`SourceWorkbook`] sheet by sheet, in source order, registering
//! each sheet's id and emitting the canonical [`Sheet`] plus the per-sheet
//! artifacts the source model carries directly (images, conditional formats,
//! auto-filters).

mod conditional;
mod images;
mod merges;
mod style;
mod value;

use std::collections::BTreeMap;

use crate::cell_images::parse_image_marker;
use crate::cell_ref::{to_a1, CellRange};
use crate::config::ImportOptions;
use crate::error::{SkipReason, Warnings};
use crate::registry::SheetRegistry;
use crate::source::{SourceCell, SourceCellRecord, SourceFilterRef, SourceSheet, SourceWorkbook};
use crate::types::{
    Cell, CellGrid, ColumnData, Freeze, ImportedConditionalFormat, ImportedFilter, ImportedImage,
    MergeRegion, RowData, Sheet, Snapshot, Style,
};

use conditional::map_conditional_format;
use images::{cell_image, floating_image, CellMetrics};
use merges::{merge_region, propagate_border};
use style::{map_style, BaseFont, Palette};
use value::{resolve_value, ValueContext};

pub(crate) use images::{anchor_position, emu_to_px};

/// Last addressable column (`XFD`), 0-based.
const MAX_COLUMN: u32 = 16_383;

/// Mapper output: the snapshot, the registry every extractor resolves
/// through, and the side collections keyed by sheet id.
#[derive(Debug, Default)]
pub(crate) struct MappedWorkbook {
    pub registry: SheetRegistry,
    pub snapshot: Snapshot,
    pub images: BTreeMap<String, Vec<ImportedImage>>,
    pub conditional_formats: BTreeMap<String, Vec<ImportedConditionalFormat>>,
    pub filters: BTreeMap<String, ImportedFilter>,
}

/// Workbook-wide inputs shared by every sheet.
struct MapContext<'a> {
    workbook: &'a SourceWorkbook,
    options: &'a ImportOptions,
    palette: Palette<'a>,
    base_font: BaseFont,
}

/// One sheet's artifacts alongside its [`Sheet`].
#[derive(Default)]
struct SheetArtifacts {
    images: Vec<ImportedImage>,
    conditional_formats: Vec<ImportedConditionalFormat>,
    filter: Option<ImportedFilter>,
}

pub(crate) fn map_workbook(
    workbook: &SourceWorkbook,
    options: &ImportOptions,
    warnings: &mut Warnings,
) -> MappedWorkbook {
    let palette = Palette {
        theme: &workbook.theme_colors,
        indexed: workbook.indexed_colors.as_deref(),
    };
    let base_font = workbook
        .styles
        .first()
        .map(|s| BaseFont::from_font(&s.font, palette))
        .unwrap_or_default();
    let ctx = MapContext {
        workbook,
        options,
        palette,
        base_font,
    };

    let mut out = MappedWorkbook::default();
    for (index, source) in workbook.sheets.iter().enumerate() {
        let id = out.registry.register(&source.name);
        let (sheet, artifacts) = map_sheet(&ctx, source, index, &id, warnings);

        if !artifacts.images.is_empty() {
            out.images.insert(id.clone(), artifacts.images);
        }
        if !artifacts.conditional_formats.is_empty() {
            out.conditional_formats
                .insert(id.clone(), artifacts.conditional_formats);
        }
        if let Some(filter) = artifacts.filter {
            out.filters.insert(id.clone(), filter);
        }
        out.snapshot.sheet_order.push(id.clone());
        out.snapshot.sheets.insert(id, sheet);
    }
    out
}

fn map_sheet(
    ctx: &MapContext,
    source: &SourceSheet,
    index: usize,
    sheet_id: &str,
    warnings: &mut Warnings,
) -> (Sheet, SheetArtifacts) {
    let options = ctx.options;
    let mut artifacts = SheetArtifacts::default();

    let default_row_height = source
        .default_row_height
        .filter(|h| h.is_finite() && *h > 0.0)
        .unwrap_or(options.default_row_height);
    let default_column_width = source
        .default_col_width
        .filter(|w| w.is_finite() && *w > 0.0)
        .map_or(options.default_column_width, |w| w * options.column_width_factor);
    let metrics = CellMetrics {
        row_height: default_row_height,
        column_width: default_column_width,
    };

    let mut grid = CellGrid::new();
    for record in &source.cells {
        if options.include_images {
            if let Some(image) = marker_image(ctx, record, index, artifacts.images.len(), sheet_id) {
                artifacts.images.push(image);
                continue;
            }
            if let SourceCell::Formula { formula, .. } = &record.cell {
                if parse_image_marker(formula).is_some() {
                    warnings.skip(
                        &format!("cell image at {}!{}", source.name, to_a1(record.row, record.col)),
                        &SkipReason::MissingPart(formula.clone()),
                    );
                }
            }
        }

        let cell = map_cell(ctx, record, &source.name, warnings);
        if cell.is_present() {
            grid.entry(record.row).or_default().insert(record.col, cell);
        }
    }

    let merge_data: Vec<_> = source.merges.iter().map(merge_region).collect();
    for region in &merge_data {
        propagate_border(&mut grid, region);
    }

    let row_data: BTreeMap<u32, RowData> = source
        .rows
        .iter()
        .filter(|r| r.height.is_some() || r.hidden)
        .map(|r| {
            (
                r.index,
                RowData {
                    height: r.height.filter(|h| h.is_finite()),
                    hidden: r.hidden.then_some(true),
                },
            )
        })
        .collect();

    let (max_row, max_col) = populated_extent(&grid, &merge_data);
    let row_count = options.min_rows.max(max_row);
    let column_count = options.min_columns.max(max_col);

    // spans often run to the grid edge; only the sheet's own columns matter
    let last_column = column_count.saturating_sub(1).min(MAX_COLUMN);
    let mut column_data = BTreeMap::new();
    for span in &source.columns {
        let width = span
            .width
            .filter(|w| w.is_finite() && Some(*w) != source.default_col_width);
        if width.is_none() && !span.hidden {
            continue;
        }
        let data = ColumnData {
            width: width.map(|w| w * options.column_width_factor),
            hidden: span.hidden.then_some(true),
        };
        for col in span.min..=span.max.min(last_column) {
            column_data.insert(col, data.clone());
        }
    }

    let freeze = source.pane.as_ref().and_then(|pane| {
        if pane.state.as_deref() != Some("frozen") {
            return None;
        }
        let freeze = Freeze {
            start_row: f64_to_u32_clamped(pane.y_split),
            start_column: f64_to_u32_clamped(pane.x_split),
        };
        (freeze.start_row > 0 || freeze.start_column > 0).then_some(freeze)
    });

    artifacts.filter = source.auto_filter.as_ref().and_then(|f| match filter_range(f) {
        Some(range) => Some(ImportedFilter { range }),
        None => {
            warnings.skip(
                &format!("auto-filter on {}", source.name),
                &SkipReason::MalformedRef(format!("{f:?}")),
            );
            None
        }
    });

    artifacts.conditional_formats = source
        .conditional_formats
        .iter()
        .flat_map(|block| map_conditional_format(block, &ctx.workbook.dxf_styles, ctx.palette))
        .collect();

    if options.include_images {
        for image in &source.images {
            let id = format!("image_{index}_{}", artifacts.images.len());
            artifacts
                .images
                .push(floating_image(image, id, sheet_id, metrics, options));
        }
    }

    log::debug!(
        "mapped sheet {:?}: {} rows with cells, {} merges, {} images",
        source.name,
        grid.len(),
        merge_data.len(),
        artifacts.images.len()
    );

    let sheet = Sheet {
        id: sheet_id.to_string(),
        name: source.name.clone(),
        row_count,
        column_count,
        default_row_height,
        default_column_width,
        hidden: source.hidden,
        tab_color: source.tab_color.as_ref().and_then(|c| ctx.palette.resolve(c)),
        freeze,
        cell_data: grid,
        row_data,
        column_data,
        merge_data,
    };
    (sheet, artifacts)
}

/// The image a marker formula stands for, when it resolves.
fn marker_image(
    ctx: &MapContext,
    record: &SourceCellRecord,
    index: usize,
    ordinal: usize,
    sheet_id: &str,
) -> Option<ImportedImage> {
    let SourceCell::Formula { formula, .. } = &record.cell else {
        return None;
    };
    let marker = parse_image_marker(formula)?;
    cell_image(
        &marker,
        |name| ctx.workbook.cell_images.get(name),
        format!("image_{index}_{ordinal}"),
        sheet_id,
        (record.row, record.col),
        ctx.options,
    )
}

fn map_cell(
    ctx: &MapContext,
    record: &SourceCellRecord,
    sheet_name: &str,
    warnings: &mut Warnings,
) -> Cell {
    let source_style = record.style.and_then(|i| ctx.workbook.styles.get(i));
    let value_ctx = ValueContext {
        num_fmt: source_style.and_then(|s| s.num_fmt.as_deref()),
        date1904: ctx.workbook.date1904,
        palette: ctx.palette,
    };
    let resolved = resolve_value(&record.cell, record.raw.as_deref(), &value_ctx);
    if resolved.used_fallback {
        let a1 = to_a1(record.row, record.col);
        warnings.skip(
            &format!("value of {sheet_name}!{a1}"),
            &SkipReason::InvalidNumber(a1.clone()),
        );
    }

    let style: Option<Style> =
        source_style.and_then(|s| map_style(s, &ctx.base_font, ctx.palette));

    let mut cell = Cell {
        formula: resolved.formula,
        rich_text: resolved.rich_text,
        hyperlink: resolved.hyperlink,
        style,
        ..Cell::default()
    };
    if let Some(value) = resolved.value {
        cell.set_value(value);
    }
    cell
}

/// One past the last populated row and column, counting merge extents.
fn populated_extent(grid: &CellGrid, merges: &[MergeRegion]) -> (u32, u32) {
    let mut rows = 0u32;
    let mut cols = 0u32;
    for (row, cells) in grid {
        rows = rows.max(row.saturating_add(1));
        if let Some(col) = cells.keys().next_back() {
            cols = cols.max(col.saturating_add(1));
        }
    }
    for m in merges {
        rows = rows.max(m.end_row.saturating_add(1));
        cols = cols.max(m.end_column.saturating_add(1));
    }
    (rows, cols)
}

/// Normalize either filter shape to a single A1 range.
fn filter_range(filter: &SourceFilterRef) -> Option<String> {
    let range = match filter {
        SourceFilterRef::A1(text) => CellRange::parse(text)?,
        SourceFilterRef::Span { from, to } => CellRange {
            start_row: from.0.min(to.0),
            start_col: from.1.min(to.1),
            end_row: from.0.max(to.0),
            end_col: from.1.max(to.1),
        },
    };
    Some(range.to_a1())
}

/// Convert a split count to u32, clamping to the valid range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn f64_to_u32_clamped(v: f64) -> u32 {
    if v.is_finite() {
        v.clamp(0.0, f64::from(u32::MAX)).floor() as u32
    } else {
        0
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
    use crate::source::{MediaFile, SourceColumn, SourcePane, SourceRow, SourceStyle};
    use crate::types::{CellValue, ImageKind};
    use std::collections::HashMap;

    fn record(row: u32, col: u32, cell: SourceCell) -> SourceCellRecord {
        SourceCellRecord {
            row,
            col,
            cell,
            style: None,
            raw: None,
        }
    }

    fn map(workbook: &SourceWorkbook) -> (MappedWorkbook, Warnings) {
        let mut warnings = Warnings::new();
        let mapped = map_workbook(workbook, &ImportOptions::default(), &mut warnings);
        (mapped, warnings)
    }

    #[test]
    fn test_sheet_order_includes_empty_sheets() {
        let workbook = SourceWorkbook {
            sheets: vec![
                SourceSheet {
                    name: "First".to_string(),
                    cells: vec![record(0, 0, SourceCell::Number(1.0))],
                    ..SourceSheet::default()
                },
                SourceSheet {
                    name: "Empty".to_string(),
                    ..SourceSheet::default()
                },
            ],
            ..SourceWorkbook::default()
        };
        let (mapped, _) = map(&workbook);
        let names: Vec<_> = mapped
            .snapshot
            .ordered_sheets()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["First", "Empty"]);
        assert_eq!(mapped.registry.ordinal_for_name("Empty"), Some(1));
        assert_eq!(
            mapped.registry.id_for_name("First"),
            Some(mapped.snapshot.sheet_order[0].as_str())
        );
    }

    #[test]
    fn test_sparsity_and_counts() {
        let workbook = SourceWorkbook {
            sheets: vec![SourceSheet {
                name: "S".to_string(),
                cells: vec![
                    record(0, 0, SourceCell::Empty),
                    record(149, 30, SourceCell::Text("far".to_string())),
                ],
                ..SourceSheet::default()
            }],
            ..SourceWorkbook::default()
        };
        let (mapped, _) = map(&workbook);
        let sheet = mapped.snapshot.ordered_sheets().next().unwrap();
        assert!(sheet.cell(0, 0).is_none());
        assert_eq!(sheet.row_count, 150);
        assert_eq!(sheet.column_count, 31);
    }

    #[test]
    fn test_dimensions_and_freeze() {
        let workbook = SourceWorkbook {
            sheets: vec![SourceSheet {
                name: "S".to_string(),
                rows: vec![SourceRow {
                    index: 2,
                    height: Some(30.0),
                    hidden: false,
                }],
                columns: vec![SourceColumn {
                    min: 1,
                    max: 2,
                    width: Some(10.0),
                    hidden: true,
                }],
                pane: Some(SourcePane {
                    x_split: 1.0,
                    y_split: 2.0,
                    top_left_cell: Some("B3".to_string()),
                    state: Some("frozen".to_string()),
                }),
                default_col_width: Some(9.0),
                ..SourceSheet::default()
            }],
            ..SourceWorkbook::default()
        };
        let (mapped, _) = map(&workbook);
        let sheet = mapped.snapshot.ordered_sheets().next().unwrap();
        assert_eq!(sheet.row_data[&2].height, Some(30.0));
        assert_eq!(sheet.column_data[&2].width, Some(70.0));
        assert_eq!(sheet.column_data[&1].hidden, Some(true));
        assert_eq!(sheet.default_column_width, 63.0);
        assert_eq!(
            sheet.freeze,
            Some(Freeze {
                start_row: 2,
                start_column: 1
            })
        );
    }

    #[test]
    fn test_split_pane_is_not_frozen() {
        let workbook = SourceWorkbook {
            sheets: vec![SourceSheet {
                name: "S".to_string(),
                pane: Some(SourcePane {
                    x_split: 1200.0,
                    y_split: 0.0,
                    top_left_cell: None,
                    state: Some("split".to_string()),
                }),
                ..SourceSheet::default()
            }],
            ..SourceWorkbook::default()
        };
        let (mapped, _) = map(&workbook);
        assert!(mapped.snapshot.ordered_sheets().next().unwrap().freeze.is_none());
    }

    #[test]
    fn test_invalid_number_records_warning() {
        let mut cell = record(0, 0, SourceCell::Number(f64::NAN));
        cell.raw = Some("12.5".to_string());
        let workbook = SourceWorkbook {
            sheets: vec![SourceSheet {
                name: "S".to_string(),
                cells: vec![cell],
                ..SourceSheet::default()
            }],
            ..SourceWorkbook::default()
        };
        let (mapped, warnings) = map(&workbook);
        let sheet = mapped.snapshot.ordered_sheets().next().unwrap();
        assert_eq!(sheet.cell(0, 0).unwrap().value, Some(CellValue::Number(12.5)));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_styled_empty_cell_is_kept() {
        let mut cell = record(3, 3, SourceCell::Empty);
        cell.style = Some(1);
        let workbook = SourceWorkbook {
            sheets: vec![SourceSheet {
                name: "S".to_string(),
                cells: vec![cell],
                ..SourceSheet::default()
            }],
            styles: vec![
                SourceStyle::default(),
                SourceStyle {
                    wrap: true,
                    ..SourceStyle::default()
                },
            ],
            ..SourceWorkbook::default()
        };
        let (mapped, _) = map(&workbook);
        let sheet = mapped.snapshot.ordered_sheets().next().unwrap();
        let cell = sheet.cell(3, 3).unwrap();
        assert!(cell.value.is_none());
        assert!(cell.value_type.is_none());
        assert_eq!(cell.style.as_ref().unwrap().wrap, Some(true));
    }

    #[test]
    fn test_filter_shapes() {
        assert_eq!(
            filter_range(&SourceFilterRef::A1("$A$1:$C$9".to_string())).as_deref(),
            Some("A1:C9")
        );
        assert_eq!(
            filter_range(&SourceFilterRef::Span {
                from: (4, 2),
                to: (0, 0)
            })
            .as_deref(),
            Some("A1:C5")
        );
        assert!(filter_range(&SourceFilterRef::A1("nope".to_string())).is_none());
    }

    #[test]
    fn test_unresolved_marker_keeps_cell() {
        let workbook = SourceWorkbook {
            sheets: vec![SourceSheet {
                name: "S".to_string(),
                cells: vec![record(
                    0,
                    0,
                    SourceCell::Formula {
                        formula: "_xlfn.DISPIMG(\"ID_X\",1)".to_string(),
                        cached: Some(Box::new(SourceCell::Text("=DISPIMG(\"ID_X\",1)".to_string()))),
                    },
                )],
                ..SourceSheet::default()
            }],
            ..SourceWorkbook::default()
        };
        let (mapped, warnings) = map(&workbook);
        let sheet = mapped.snapshot.ordered_sheets().next().unwrap();
        assert!(sheet.cell(0, 0).is_some());
        assert!(mapped.images.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_resolved_marker_becomes_cell_image() {
        let workbook = SourceWorkbook {
            sheets: vec![SourceSheet {
                name: "S".to_string(),
                cells: vec![
                    record(0, 0, SourceCell::Text("photo".to_string())),
                    record(
                        2,
                        1,
                        SourceCell::Formula {
                            formula: "_xlfn.DISPIMG(\"ID_LOGO\",1)".to_string(),
                            cached: Some(Box::new(SourceCell::Text(
                                "=DISPIMG(\"ID_LOGO\",1)".to_string(),
                            ))),
                        },
                    ),
                ],
                ..SourceSheet::default()
            }],
            cell_images: HashMap::from([(
                "ID_LOGO".to_string(),
                MediaFile {
                    path: "xl/media/image1.png".to_string(),
                    bytes: vec![0x89, b'P', b'N', b'G'],
                },
            )]),
            ..SourceWorkbook::default()
        };
        let (mapped, warnings) = map(&workbook);
        let sheet = mapped.snapshot.ordered_sheets().next().unwrap();
        assert!(sheet.cell(2, 1).is_none());
        assert!(sheet.cell(0, 0).is_some());
        assert!(warnings.is_empty());

        let images = &mapped.images[&sheet.id];
        assert_eq!(images.len(), 1);
        let image = &images[0];
        assert_eq!(image.id, "image_0_0");
        assert_eq!(image.kind, ImageKind::Cell);
        assert_eq!(image.sheet_id, sheet.id);
        assert_eq!((image.position.row, image.position.column), (2, 1));
        assert_eq!((image.size.width, image.size.height), (100.0, 100.0));
        assert_eq!(image.mime_type, "image/png");
        assert!(image.source.starts_with("data:image/png;base64,"));
        assert_eq!(image.name.as_deref(), Some("ID_LOGO"));
    }

    #[test]
    fn test_full_width_column_spans_stay_small() {
        let span = |min, max, width| SourceColumn {
            min,
            max,
            width: Some(width),
            hidden: false,
        };
        let workbook = SourceWorkbook {
            sheets: vec![
                SourceSheet {
                    name: "Defaults".to_string(),
                    columns: vec![span(0, 1, 30.0), span(2, 16_383, 9.0)],
                    default_col_width: Some(9.0),
                    ..SourceSheet::default()
                },
                SourceSheet {
                    name: "Wide".to_string(),
                    columns: vec![span(0, 16_383, 12.0)],
                    ..SourceSheet::default()
                },
            ],
            ..SourceWorkbook::default()
        };
        let (mapped, _) = map(&workbook);
        let mut sheets = mapped.snapshot.ordered_sheets();

        let defaults = sheets.next().unwrap();
        assert_eq!(defaults.column_data.len(), 2);
        assert_eq!(defaults.column_data[&1].width, Some(210.0));

        let wide = sheets.next().unwrap();
        assert_eq!(wide.column_count, 26);
        assert_eq!(wide.column_data.len(), 26);
        assert_eq!(wide.column_data[&25].width, Some(84.0));
    }
}
