//! Benchmarks for import performance.
//!
//! Run with: cargo bench
//!
//! Workbooks are generated in memory, so no fixture files are needed.
#![allow(clippy::expect_used, clippy::cast_precision_loss)]

#[path = "../tests/fixtures/mod.rs"]
mod fixtures;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fixtures::{chart_xml, formula, Anchor, SheetBuilder, StyleBuilder, XlsxBuilder};
use xlimport::{import, ImportOptions, InputKind};

const COLS: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];

/// `rows` x 8 grid with a header row, mixed value kinds and a few styles.
fn generate(rows: u32) -> Vec<u8> {
    let header = StyleBuilder::new().bold().bg_color("D9E1F2").border_all("thin");
    let money = StyleBuilder::new().number_format("#,##0.00");
    let date = StyleBuilder::new().number_format("yyyy-mm-dd");

    let mut sheet = SheetBuilder::new("Data").freeze_panes(1, 0);
    for col in COLS {
        sheet = sheet.styled(&format!("{col}1"), col, header.clone());
    }
    for row in 2..=rows {
        let n = f64::from(row);
        sheet = sheet
            .cell(&format!("A{row}"), format!("item {row}").as_str())
            .styled(&format!("B{row}"), n * 1.25, money.clone())
            .styled(&format!("C{row}"), 45000.0 + n, date.clone())
            .cell(&format!("D{row}"), row % 2 == 0)
            .cell(&format!("E{row}"), formula(&format!("B{row}*2"), Some(n * 2.5)))
            .cell(&format!("F{row}"), n / 3.0)
            .cell(&format!("G{row}"), "constant")
            .cell(&format!("H{row}"), -n);
    }
    let chart = chart_xml(
        "barChart",
        Some("Totals"),
        &[
            format!("Data!$A$2:$A${rows}").as_str(),
            format!("Data!$B$2:$B${rows}").as_str(),
        ],
    );
    sheet = sheet
        .auto_filter(&format!("A1:H{rows}"))
        .chart(Anchor::new((9, 1), (16, 20)), chart);

    XlsxBuilder::new().sheet(sheet).build()
}

fn bench_xlsx(c: &mut Criterion) {
    let mut group = c.benchmark_group("import_xlsx");
    let options = ImportOptions::default();
    for rows in [100, 1_000, 5_000] {
        let data = generate(rows);
        group.throughput(Throughput::Elements(u64::from(rows) * COLS.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| import(black_box(data), InputKind::Xlsx, &options).expect("import failed"));
        });
    }
    group.finish();
}

fn bench_csv(c: &mut Criterion) {
    let mut data = String::from("name,amount,note\n");
    for row in 0..5_000 {
        data.push_str(&format!("row {row},{},\"a, b\"\n", f64::from(row) * 0.5));
    }
    let options = ImportOptions::default();
    c.bench_function("import_csv_5000", |b| {
        b.iter(|| import(black_box(data.as_bytes()), InputKind::Csv, &options).expect("import failed"));
    });
}

criterion_group!(benches, bench_xlsx, bench_csv);
criterion_main!(benches);
