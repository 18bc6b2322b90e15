//! End-to-end import tests over xlsx packages built in memory.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod fixtures;

use fixtures::{
    chart_xml, formula, minimal_xlsx, xlsx_with_cell, xlsx_with_styled_cell, Anchor, PivotSpec,
    SheetBuilder, StyleBuilder, XlsxBuilder, PNG_1X1,
};
use xlimport::{
    import, BorderStyle, CellValue, ChartType, ConditionalRule, Freeze, ImageKind, ImportOptions,
    ImportResult, InputKind, MergeRegion, Sheet,
};

fn import_xlsx(data: &[u8]) -> ImportResult {
    import(data, InputKind::Xlsx, &ImportOptions::default()).expect("import failed")
}

fn first_sheet(result: &ImportResult) -> &Sheet {
    result.snapshot.ordered_sheets().next().expect("no sheets")
}

// ============================================================================
// Sheets
// ============================================================================

#[test]
fn test_sheet_order_matches_source_including_empty() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Summary").cell("A1", "Total"))
        .sheet(SheetBuilder::new("Empty"))
        .sheet(SheetBuilder::new("Data").cell("B2", 7))
        .build();
    let result = import_xlsx(&xlsx);

    assert_eq!(result.snapshot.sheet_order.len(), 3);
    let names: Vec<_> = result.snapshot.ordered_sheets().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Summary", "Empty", "Data"]);

    let empty = result.snapshot.sheet_by_name("Empty").unwrap();
    assert!(empty.cell_data.is_empty());
    assert_eq!(empty.row_count, 100);
    assert_eq!(empty.column_count, 26);
}

#[test]
fn test_sheet_ids_are_consistent() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("A"))
        .sheet(SheetBuilder::new("B"))
        .build();
    let result = import_xlsx(&xlsx);

    for id in &result.snapshot.sheet_order {
        assert_eq!(&result.snapshot.sheets[id].id, id);
    }
    assert_ne!(result.snapshot.sheet_order[0], result.snapshot.sheet_order[1]);
}

#[test]
fn test_import_is_idempotent_except_ids() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .styled("A1", "Header", StyleBuilder::new().bold())
                .cell("A2", 10)
                .cell("A3", formula("A2*2", Some(20.0)))
                .merge("C1:D2"),
        )
        .sheet(SheetBuilder::new("Sheet2").cell("A1", true))
        .build();
    let first = import_xlsx(&xlsx);
    let second = import_xlsx(&xlsx);

    assert_ne!(first.snapshot.sheet_order, second.snapshot.sheet_order);
    let a: Vec<_> = first
        .snapshot
        .ordered_sheets()
        .map(|s| Sheet {
            id: String::new(),
            ..s.clone()
        })
        .collect();
    let b: Vec<_> = second
        .snapshot
        .ordered_sheets()
        .map(|s| Sheet {
            id: String::new(),
            ..s.clone()
        })
        .collect();
    assert_eq!(a, b);
}

#[test]
fn test_hidden_sheet_and_tab_color() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Visible").tab_color("FF0000"))
        .sheet(SheetBuilder::new("Secret").hidden())
        .build();
    let result = import_xlsx(&xlsx);

    let visible = result.snapshot.sheet_by_name("Visible").unwrap();
    assert!(!visible.hidden);
    assert_eq!(visible.tab_color.as_deref(), Some("#FF0000"));
    assert!(result.snapshot.sheet_by_name("Secret").unwrap().hidden);
}

#[test]
fn test_minimal_workbook() {
    let result = import_xlsx(&minimal_xlsx());
    assert_eq!(result.snapshot.sheet_order.len(), 1);
    assert!(result.warnings.is_empty());
    assert!(result.charts.is_empty());
    assert!(result.pivot_tables.is_empty());
}

// ============================================================================
// Cells
// ============================================================================

#[test]
fn test_cells_are_sparse() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").cell("A1", 1).cell("E10", "far"))
        .build();
    let result = import_xlsx(&xlsx);
    let sheet = first_sheet(&result);

    let present: usize = sheet.cell_data.values().map(|row| row.len()).sum();
    assert_eq!(present, 2);
    assert!(sheet.cell(0, 1).is_none());
    assert_eq!(
        sheet.cell(9, 4).and_then(|c| c.value.clone()),
        Some(CellValue::Text("far".to_string()))
    );
}

#[test]
fn test_styled_blank_cell_is_kept() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").blank("B2", StyleBuilder::new().bg_color("FFFF00")))
        .build();
    let result = import_xlsx(&xlsx);
    let cell = first_sheet(&result).cell(1, 1).unwrap();

    assert!(cell.value.is_none());
    assert_eq!(
        cell.style.as_ref().and_then(|s| s.background_color.as_deref()),
        Some("#FFFF00")
    );
}

#[test]
fn test_formula_with_cached_value() {
    let result = import_xlsx(&xlsx_with_cell(formula("SUM(A1:A3)", Some(42.0))));
    let cell = first_sheet(&result).cell(0, 0).unwrap();

    assert_eq!(cell.formula.as_deref(), Some("=SUM(A1:A3)"));
    assert_eq!(cell.value.as_ref().and_then(CellValue::as_number), Some(42.0));
}

#[test]
fn test_formula_without_cache_keeps_text() {
    let result = import_xlsx(&xlsx_with_cell(formula("NOW()", None)));
    let cell = first_sheet(&result).cell(0, 0).unwrap();
    assert_eq!(cell.formula.as_deref(), Some("=NOW()"));
}

#[test]
fn test_boolean_cell() {
    let result = import_xlsx(&xlsx_with_cell(true));
    let cell = first_sheet(&result).cell(0, 0).unwrap();
    assert_eq!(cell.value, Some(CellValue::Boolean(true)));
}

#[test]
fn test_date_formatted_serial_becomes_text() {
    let style = StyleBuilder::new().number_format("yyyy-mm-dd");
    let result = import_xlsx(&xlsx_with_styled_cell(45306.0, style));
    let cell = first_sheet(&result).cell(0, 0).unwrap();

    assert_eq!(cell.value.as_ref().and_then(CellValue::as_text), Some("2024-01-15"));
    assert!(cell
        .style
        .as_ref()
        .and_then(|s| s.number_format.as_ref())
        .is_some_and(|f| f.is_date_time));
}

#[test]
fn test_1904_date_system() {
    let xlsx = XlsxBuilder::new()
        .date1904()
        .sheet(SheetBuilder::new("Sheet1").styled(
            "A1",
            0,
            StyleBuilder::new().number_format("yyyy-mm-dd"),
        ))
        .build();
    let result = import_xlsx(&xlsx);
    let cell = first_sheet(&result).cell(0, 0).unwrap();
    assert_eq!(cell.value.as_ref().and_then(CellValue::as_text), Some("1904-01-01"));
}

#[test]
fn test_thousands_format_classification() {
    let style = StyleBuilder::new().number_format("#,##0.00");
    let result = import_xlsx(&xlsx_with_styled_cell(1234.5, style));
    let cell = first_sheet(&result).cell(0, 0).unwrap();
    let info = cell.style.as_ref().and_then(|s| s.number_format.clone()).unwrap();

    assert_eq!(info.decimal_places, 2);
    assert!(info.has_thousands_separator);
    assert!(!info.is_percent);
    assert!(!info.is_date_time);
    // a number format never turns the value into text
    assert_eq!(cell.value.as_ref().and_then(CellValue::as_number), Some(1234.5));
}

#[test]
fn test_theme_tint_lightens_background() {
    let style = StyleBuilder::new().theme_bg(4, 0.4);
    let result = import_xlsx(&xlsx_with_styled_cell("tinted", style));
    let cell = first_sheet(&result).cell(0, 0).unwrap();

    // #4472C4 moved 40% toward white
    assert_eq!(
        cell.style.as_ref().and_then(|s| s.background_color.as_deref()),
        Some("#8FAADC")
    );
}

#[test]
fn test_custom_theme_palette() {
    let xlsx = XlsxBuilder::new()
        .theme_accent1("C0504D")
        .sheet(SheetBuilder::new("Sheet1").styled("A1", "x", StyleBuilder::new().theme_bg(4, 0.0)))
        .build();
    let result = import_xlsx(&xlsx);
    let cell = first_sheet(&result).cell(0, 0).unwrap();
    assert_eq!(
        cell.style.as_ref().and_then(|s| s.background_color.as_deref()),
        Some("#C0504D")
    );
}

#[test]
fn test_default_font_is_not_repeated() {
    let style = StyleBuilder::new().bold().font_color("FF0000").align("center");
    let result = import_xlsx(&xlsx_with_styled_cell("warn", style));
    let style = first_sheet(&result).cell(0, 0).unwrap().style.clone().unwrap();

    assert_eq!(style.bold, Some(true));
    assert_eq!(style.font_color.as_deref(), Some("#FF0000"));
    assert!(style.font_name.is_none());
    assert!(style.font_size.is_none());
    assert!(style.horizontal_align.is_some());
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_merge_border_reaches_perimeter() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .styled("A1", "Merged", StyleBuilder::new().border_all("thin"))
                .merge("A1:C3"),
        )
        .build();
    let result = import_xlsx(&xlsx);
    let sheet = first_sheet(&result);

    assert_eq!(
        sheet.merge_data,
        vec![MergeRegion {
            start_row: 0,
            end_row: 2,
            start_column: 0,
            end_column: 2,
        }]
    );

    let border = |row, col| {
        sheet
            .cell(row, col)
            .and_then(|c| c.style.as_ref())
            .and_then(|s| s.border.clone())
            .unwrap_or_else(|| panic!("no border at ({row}, {col})"))
    };
    // bottom-right corner
    let corner = border(2, 2);
    assert_eq!(corner.bottom.as_ref().unwrap().style, BorderStyle::Thin);
    assert!(corner.right.is_some());
    // top edge and left edge
    assert!(border(0, 1).top.is_some());
    assert!(border(1, 0).left.is_some());
    // the interior has nothing to draw
    assert!(sheet.cell(1, 1).and_then(|c| c.style.as_ref()).is_none());
}

#[test]
fn test_dimensions_freeze_and_hidden() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .cell("A1", 1)
                .col_width(2, 3, 20.0)
                .hide_cols(5, 5)
                .row_height(4, 30.0)
                .hide_row(6)
                .freeze_panes(2, 1),
        )
        .build();
    let result = import_xlsx(&xlsx);
    let sheet = first_sheet(&result);

    assert_eq!(sheet.column_data[&1].width, Some(140.0));
    assert_eq!(sheet.column_data[&2].width, Some(140.0));
    assert_eq!(sheet.column_data[&4].hidden, Some(true));
    assert_eq!(sheet.row_data[&3].height, Some(30.0));
    assert_eq!(sheet.row_data[&5].hidden, Some(true));
    assert_eq!(
        sheet.freeze,
        Some(Freeze {
            start_row: 2,
            start_column: 1
        })
    );
}

#[test]
fn test_counts_grow_past_minimum() {
    let result = import_xlsx(&XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").cell("AD150", 1))
        .build());
    let sheet = first_sheet(&result);
    assert_eq!(sheet.row_count, 150);
    assert_eq!(sheet.column_count, 30);
}

// ============================================================================
// Side collections
// ============================================================================

#[test]
fn test_auto_filter_and_sort() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .cell("A1", "Name")
                .auto_filter("A1:C10")
                .sort("A2:C10", &[("C2:C10", true), ("A2:A10", false)]),
        )
        .build();
    let result = import_xlsx(&xlsx);
    let sheet_id = &result.snapshot.sheet_order[0];

    assert_eq!(result.filters[sheet_id].range, "A1:C10");
    let sort = &result.sorts[sheet_id];
    assert_eq!(sort.range, "A2:C10");
    assert_eq!(sort.conditions.len(), 2);
    assert_eq!(sort.conditions[0].column, 2);
    assert!(!sort.conditions[0].ascending);
    assert_eq!(sort.conditions[1].column, 0);
    assert!(sort.conditions[1].ascending);
}

#[test]
fn test_conditional_formats() {
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .cell("A1", 5)
                .conditional(
                    "A1:A10",
                    r#"type="cellIs" operator="greaterThan"><formula>3</formula>"#,
                    Some(r#"<dxf><font><color rgb="FF9C0006"/></font></dxf>"#),
                )
                .conditional(
                    "B1:B10 D1:D10",
                    r#"type="dataBar"><dataBar><cfvo type="min"/><cfvo type="max"/><color rgb="FF638EC6"/></dataBar>"#,
                    None,
                ),
        )
        .build();
    let result = import_xlsx(&xlsx);
    let formats = &result.conditional_formats[&result.snapshot.sheet_order[0]];
    assert_eq!(formats.len(), 2);

    match &formats[0].rule {
        ConditionalRule::HighlightCell {
            rule_type,
            operator,
            formulas,
            style,
            ..
        } => {
            assert_eq!(rule_type, "cellIs");
            assert_eq!(operator.as_deref(), Some("greaterThan"));
            assert_eq!(formulas, &["3".to_string()]);
            assert_eq!(
                style.as_ref().and_then(|s| s.font_color.as_deref()),
                Some("#9C0006")
            );
        }
        other => panic!("expected a highlight rule, got {other:?}"),
    }

    assert_eq!(formats[1].ranges, ["B1:B10", "D1:D10"]);
    assert!(matches!(formats[1].rule, ConditionalRule::DataBar { .. }));
}

#[test]
fn test_floating_image() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").picture(
            Anchor::new((1, 2), (4, 8)).with_extent(9525 * 200, 9525 * 150),
            "Logo",
            PNG_1X1,
        ))
        .build();
    let result = import_xlsx(&xlsx);
    let sheet_id = &result.snapshot.sheet_order[0];
    let images = &result.images[sheet_id];
    assert_eq!(images.len(), 1);

    let image = &images[0];
    assert_eq!(image.id, "image_0_0");
    assert_eq!(&image.sheet_id, sheet_id);
    assert_eq!(image.kind, ImageKind::Floating);
    assert_eq!(image.mime_type, "image/png");
    assert!(image.source.starts_with("data:image/png;base64,"));
    assert_eq!((image.position.row, image.position.column), (2, 1));
    assert_eq!((image.size.width, image.size.height), (200.0, 150.0));
    assert_eq!(image.name.as_deref(), Some("Logo"));
}

#[test]
fn test_images_can_be_disabled() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").picture(Anchor::new((0, 0), (2, 2)), "Logo", PNG_1X1))
        .build();
    let options = ImportOptions {
        include_images: false,
        ..ImportOptions::default()
    };
    let result = import(&xlsx, InputKind::Xlsx, &options).unwrap();
    assert!(result.images.is_empty());
}

#[test]
fn test_chart_data_range_and_title() {
    let chart = chart_xml(
        "barChart",
        Some("Quarterly Sales"),
        &["Sheet1!$A$1:$A$6", "Sheet1!$B$1:$D$6"],
    );
    let xlsx = XlsxBuilder::new()
        .sheet(
            SheetBuilder::new("Sheet1")
                .cell("A1", "Quarter")
                .chart(Anchor::new((5, 1), (12, 16)).with_extent(9525 * 480, 9525 * 300), chart),
        )
        .build();
    let result = import_xlsx(&xlsx);
    let sheet_id = &result.snapshot.sheet_order[0];
    let charts = &result.charts[sheet_id];
    assert_eq!(charts.len(), 1);

    let chart = &charts[0];
    assert_eq!(chart.id, "chart_0_0");
    assert_eq!(chart.sheet_name, "Sheet1");
    assert_eq!(chart.chart_type, ChartType::Column);
    assert_eq!(chart.data_range.as_deref(), Some("A1:D6"));
    assert_eq!(chart.data_sheet_name.as_deref(), Some("Sheet1"));
    assert_eq!(chart.title.as_deref(), Some("Quarterly Sales"));
    assert_eq!((chart.position.row, chart.position.column), (1, 5));
    assert_eq!((chart.size.width, chart.size.height), (480.0, 300.0));
}

#[test]
fn test_chart_without_extent_gets_default_size() {
    let chart = chart_xml("lineChart", None, &["Sheet1!$B$2:$B$9"]);
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").chart(Anchor::new((0, 0), (6, 12)), chart))
        .build();
    let result = import_xlsx(&xlsx);
    let chart = &result.charts[&result.snapshot.sheet_order[0]][0];

    assert_eq!(chart.chart_type, ChartType::Line);
    assert_eq!((chart.size.width, chart.size.height), (600.0, 400.0));
    assert!(chart.title.is_none());
}

#[test]
fn test_pivot_anchor_makes_room_for_filters() {
    let xlsx = XlsxBuilder::new()
        .sheet(SheetBuilder::new("Data").cell("A1", "Region"))
        .sheet(SheetBuilder::new("Report").pivot(PivotSpec {
            name: "SalesPivot".to_string(),
            location: "A11:C20".to_string(),
            source_sheet: "Data".to_string(),
            source_ref: "A1:D50".to_string(),
            row_fields: vec![0],
            data_fields: vec![3],
            page_fields: vec![1, 2],
        }))
        .build();
    let result = import_xlsx(&xlsx);
    assert_eq!(result.pivot_tables.len(), 1);

    let pivot = &result.pivot_tables[0];
    let order = &result.snapshot.sheet_order;
    assert_eq!(pivot.id, "pivot_1_0");
    assert_eq!(&pivot.sheet_id, &order[1]);
    assert_eq!(pivot.sheet_name, "Report");
    assert_eq!(pivot.name.as_deref(), Some("SalesPivot"));
    assert_eq!(pivot.anchor_cell.row, 6);
    assert_eq!(pivot.anchor_cell.col, 0);
    assert_eq!(pivot.occupied_range.as_ref().map(|r| r.end_row), Some(19));

    let source = &pivot.source_range;
    assert_eq!(source.sheet_name, "Data");
    assert_eq!(source.sheet_id.as_ref(), Some(&order[0]));
    assert_eq!((source.start_row, source.end_row), (0, 49));
    assert_eq!((source.start_column, source.end_column), (0, 3));
    assert_eq!(pivot.fields.row_fields, [0]);
    assert_eq!(pivot.fields.value_fields, [3]);
    assert_eq!(pivot.fields.filter_fields, [1, 2]);
}

// ============================================================================
// Other formats and failures
// ============================================================================

#[test]
fn test_csv_import() {
    let data = b"item,qty,note\nbolts,40,\"a, b\"\nnuts,12.5,\n";
    let result = import(data, InputKind::Csv, &ImportOptions::default()).unwrap();
    let sheet = first_sheet(&result);

    assert_eq!(sheet.name, "CSV");
    assert_eq!(
        sheet.cell(0, 0).and_then(|c| c.value.clone()),
        Some(CellValue::Text("item".to_string()))
    );
    assert_eq!(sheet.cell(1, 1).and_then(|c| c.value.as_ref()?.as_number()), Some(40.0));
    assert_eq!(
        sheet.cell(1, 2).and_then(|c| c.value.clone()),
        Some(CellValue::Text("a, b".to_string()))
    );
    assert_eq!(sheet.cell(2, 1).and_then(|c| c.value.as_ref()?.as_number()), Some(12.5));
    assert!(sheet.cell(2, 2).is_none());
}

#[test]
fn test_csv_multiline_field_stays_in_its_row() {
    let data = b"note,qty\n\"line one\nline two\",5\n";
    let result = import(data, InputKind::Csv, &ImportOptions::default()).unwrap();
    let sheet = first_sheet(&result);

    assert_eq!(
        sheet.cell(1, 0).and_then(|c| c.value.clone()),
        Some(CellValue::Text("line one\nline two".to_string()))
    );
    assert_eq!(sheet.cell(1, 1).and_then(|c| c.value.as_ref()?.as_number()), Some(5.0));
    assert!(sheet.cell(2, 0).is_none());
}

#[test]
fn test_corrupt_inputs_are_fatal() {
    let options = ImportOptions::default();
    assert!(import(b"PK\x03\x04 truncated", InputKind::Xlsx, &options).is_err());
    assert!(import(b"not a compound file", InputKind::Xls, &options).is_err());
}

#[test]
fn test_result_serializes_camel_case() {
    let result = import_xlsx(&xlsx_with_cell(1.5));
    let json = serde_json::to_value(&result).unwrap();

    assert!(json["snapshot"]["sheetOrder"].is_array());
    assert!(json["conditionalFormats"].is_object());
    assert!(json["pivotTables"].is_array());
    let id = json["snapshot"]["sheetOrder"][0].as_str().unwrap();
    assert_eq!(json["snapshot"]["sheets"][id]["cellData"]["0"]["0"]["value"], 1.5);
}
