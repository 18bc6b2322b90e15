//! Test fixtures for generating xlsx packages in memory.
//!
//! The builders only emit the parts a test asks for, so each test describes
//! exactly the workbook it imports.
//!
//! # Example
//!
//! ```rust
//! use fixtures::{SheetBuilder, StyleBuilder, XlsxBuilder};
//!
//! let bold = StyleBuilder::new().bold();
//! let xlsx = XlsxBuilder::new()
//!     .sheet(SheetBuilder::new("Data").cell("A1", "Total").styled("B1", 42.0, bold))
//!     .build();
//!
//! let result = xlimport::import(&xlsx, xlimport::InputKind::Xlsx, &Default::default()).unwrap();
//! ```
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::format_push_string
)]

use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

// ============================================================================
// Cell values
// ============================================================================

#[derive(Debug, Clone)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Formula text (without `=`) and its cached result.
    Formula(String, Option<f64>),
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(f64::from(n))
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// `CellValue::Formula` shorthand.
pub fn formula(text: &str, cached: Option<f64>) -> CellValue {
    CellValue::Formula(text.to_string(), cached)
}

// ============================================================================
// Styles
// ============================================================================

/// One `cellXfs` entry. Colors are `RRGGBB`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleBuilder {
    bold: bool,
    italic: bool,
    font_color: Option<String>,
    fill: Option<String>,
    /// `(theme index, tint)` fill
    theme_fill: Option<(u32, f64)>,
    border: Option<String>,
    horizontal: Option<String>,
    number_format: Option<String>,
}

impl StyleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn font_color(mut self, rgb: &str) -> Self {
        self.font_color = Some(rgb.to_string());
        self
    }

    pub fn bg_color(mut self, rgb: &str) -> Self {
        self.fill = Some(rgb.to_string());
        self
    }

    pub fn theme_bg(mut self, theme: u32, tint: f64) -> Self {
        self.theme_fill = Some((theme, tint));
        self
    }

    /// Same border style on all four edges, black.
    pub fn border_all(mut self, style: &str) -> Self {
        self.border = Some(style.to_string());
        self
    }

    pub fn align(mut self, horizontal: &str) -> Self {
        self.horizontal = Some(horizontal.to_string());
        self
    }

    pub fn number_format(mut self, code: &str) -> Self {
        self.number_format = Some(code.to_string());
        self
    }
}

/// Collects unique styles into the `styles.xml` tables.
#[derive(Default)]
struct StylesCollector {
    styles: Vec<StyleBuilder>,
}

impl StylesCollector {
    /// Index into `cellXfs`; 0 is the default style.
    fn index_of(&mut self, style: &StyleBuilder) -> usize {
        if let Some(pos) = self.styles.iter().position(|s| s == style) {
            return pos + 1;
        }
        self.styles.push(style.clone());
        self.styles.len()
    }

    fn generate_styles_xml(&self, dxfs: &[String]) -> String {
        let mut num_fmts = String::new();
        let mut fonts = String::from(r#"<font><sz val="11"/><name val="Calibri"/></font>"#);
        let mut fills =
            String::from(r#"<fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill>"#);
        let mut borders = String::from("<border><left/><right/><top/><bottom/><diagonal/></border>");
        let mut xfs = String::from(r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#);

        for (i, style) in self.styles.iter().enumerate() {
            let font_id = i + 1;
            let fill_id = i + 2;
            let border_id = i + 1;

            let mut font = String::from("<font>");
            if style.bold {
                font.push_str("<b/>");
            }
            if style.italic {
                font.push_str("<i/>");
            }
            font.push_str(r#"<sz val="11"/>"#);
            if let Some(ref rgb) = style.font_color {
                let _ = write!(font, r#"<color rgb="FF{rgb}"/>"#);
            }
            font.push_str(r#"<name val="Calibri"/></font>"#);
            fonts.push_str(&font);

            match (&style.fill, style.theme_fill) {
                (Some(rgb), _) => {
                    let _ = write!(
                        fills,
                        r#"<fill><patternFill patternType="solid"><fgColor rgb="FF{rgb}"/><bgColor indexed="64"/></patternFill></fill>"#
                    );
                }
                (None, Some((theme, tint))) => {
                    let _ = write!(
                        fills,
                        r#"<fill><patternFill patternType="solid"><fgColor theme="{theme}" tint="{tint}"/><bgColor indexed="64"/></patternFill></fill>"#
                    );
                }
                (None, None) => fills.push_str(r#"<fill><patternFill patternType="none"/></fill>"#),
            }

            match style.border {
                Some(ref kind) => {
                    borders.push_str("<border>");
                    for edge in ["left", "right", "top", "bottom"] {
                        let _ = write!(
                            borders,
                            r#"<{edge} style="{kind}"><color rgb="FF000000"/></{edge}>"#
                        );
                    }
                    borders.push_str("<diagonal/></border>");
                }
                None => borders.push_str("<border><left/><right/><top/><bottom/><diagonal/></border>"),
            }

            let num_fmt_id = match style.number_format.as_deref() {
                None => 0,
                Some(code) => builtin_format_id(code).unwrap_or_else(|| {
                    let id = 164 + i;
                    let _ = write!(
                        num_fmts,
                        r#"<numFmt numFmtId="{id}" formatCode="{}"/>"#,
                        escape_xml(code)
                    );
                    id
                }),
            };

            let _ = write!(
                xfs,
                r#"<xf numFmtId="{num_fmt_id}" fontId="{font_id}" fillId="{fill_id}" borderId="{border_id}" xfId="0" applyFont="1" applyFill="1" applyBorder="1" applyNumberFormat="1""#
            );
            match style.horizontal {
                Some(ref h) => {
                    let _ = write!(
                        xfs,
                        r#" applyAlignment="1"><alignment horizontal="{h}"/></xf>"#
                    );
                }
                None => xfs.push_str("/>"),
            }
        }

        let count = self.styles.len();
        let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="{MAIN_NS}">"#);
        if !num_fmts.is_empty() {
            let _ = write!(xml, "<numFmts>{num_fmts}</numFmts>");
        }
        let _ = write!(
            xml,
            r#"<fonts count="{}">{fonts}</fonts><fills count="{}">{fills}</fills><borders count="{}">{borders}</borders>"#,
            count + 1,
            count + 2,
            count + 1
        );
        xml.push_str(r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#);
        let _ = write!(xml, r#"<cellXfs count="{}">{xfs}</cellXfs>"#, count + 1);
        if !dxfs.is_empty() {
            let _ = write!(xml, r#"<dxfs count="{}">{}</dxfs>"#, dxfs.len(), dxfs.concat());
        }
        xml.push_str("</styleSheet>");
        xml
    }
}

fn builtin_format_id(code: &str) -> Option<usize> {
    match code {
        "0" => Some(1),
        "0.00" => Some(2),
        "#,##0" => Some(3),
        "#,##0.00" => Some(4),
        "0%" => Some(9),
        "0.00%" => Some(10),
        "mm-dd-yy" => Some(14),
        _ => None,
    }
}

// ============================================================================
// Drawings, charts and pivots
// ============================================================================

/// A two-cell anchor, zero-based `(col, row)` corners.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    pub from: (u32, u32),
    pub to: (u32, u32),
    /// Extent in EMU, written as `xdr:ext` when present.
    pub extent: Option<(i64, i64)>,
}

impl Anchor {
    pub fn new(from: (u32, u32), to: (u32, u32)) -> Self {
        Self {
            from,
            to,
            extent: None,
        }
    }

    pub fn with_extent(mut self, cx: i64, cy: i64) -> Self {
        self.extent = Some((cx, cy));
        self
    }
}

#[derive(Debug, Clone)]
enum DrawingObject {
    Chart { anchor: Anchor, xml: String },
    Picture { anchor: Anchor, name: String, png: Vec<u8> },
}

/// A pivot table placed on the sheet that declares it.
#[derive(Debug, Clone)]
pub struct PivotSpec {
    pub name: String,
    pub location: String,
    pub source_sheet: String,
    pub source_ref: String,
    pub row_fields: Vec<u32>,
    pub data_fields: Vec<u32>,
    pub page_fields: Vec<u32>,
}

/// A minimal chart part: one plot of `kind` with one series per ref.
pub fn chart_xml(plot: &str, title: Option<&str>, refs: &[&str]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><c:chart>"#,
    );
    if let Some(title) = title {
        let _ = write!(
            xml,
            r#"<c:title><c:tx><c:rich><a:p><a:r><a:t>{}</a:t></a:r></a:p></c:rich></c:tx></c:title>"#,
            escape_xml(title)
        );
    }
    let _ = write!(xml, "<c:plotArea><c:{plot}>");
    if plot == "barChart" {
        xml.push_str(r#"<c:barDir val="col"/><c:grouping val="clustered"/>"#);
    }
    for (i, r) in refs.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<c:ser><c:idx val="{i}"/><c:val><c:numRef><c:f>{}</c:f></c:numRef></c:val></c:ser>"#,
            escape_xml(r)
        );
    }
    let _ = write!(xml, "</c:{plot}></c:plotArea></c:chart></c:chartSpace>");
    xml
}

// ============================================================================
// Sheets
// ============================================================================

#[derive(Debug, Clone)]
struct CellEntry {
    cell_ref: String,
    value: Option<CellValue>,
    style: Option<StyleBuilder>,
}

/// Builder for one worksheet.
#[derive(Debug, Clone)]
pub struct SheetBuilder {
    name: String,
    hidden: bool,
    tab_color: Option<String>,
    cells: Vec<CellEntry>,
    merges: Vec<String>,
    frozen: Option<(u32, u32)>,
    col_widths: Vec<(u32, u32, f64, bool)>,
    row_heights: Vec<(u32, f64, bool)>,
    auto_filter: Option<String>,
    sort: Option<(String, Vec<(String, bool)>)>,
    conditional: Vec<(String, String, Option<String>)>,
    drawing: Vec<DrawingObject>,
    pivots: Vec<PivotSpec>,
}

impl SheetBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hidden: false,
            tab_color: None,
            cells: Vec::new(),
            merges: Vec::new(),
            frozen: None,
            col_widths: Vec::new(),
            row_heights: Vec::new(),
            auto_filter: None,
            sort: None,
            conditional: Vec::new(),
            drawing: Vec::new(),
            pivots: Vec::new(),
        }
    }

    pub fn cell<V: Into<CellValue>>(mut self, cell_ref: &str, value: V) -> Self {
        self.cells.push(CellEntry {
            cell_ref: cell_ref.to_string(),
            value: Some(value.into()),
            style: None,
        });
        self
    }

    pub fn styled<V: Into<CellValue>>(mut self, cell_ref: &str, value: V, style: StyleBuilder) -> Self {
        self.cells.push(CellEntry {
            cell_ref: cell_ref.to_string(),
            value: Some(value.into()),
            style: Some(style),
        });
        self
    }

    /// A cell with a style and no value.
    pub fn blank(mut self, cell_ref: &str, style: StyleBuilder) -> Self {
        self.cells.push(CellEntry {
            cell_ref: cell_ref.to_string(),
            value: None,
            style: Some(style),
        });
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn tab_color(mut self, rgb: &str) -> Self {
        self.tab_color = Some(rgb.to_string());
        self
    }

    pub fn merge(mut self, range: &str) -> Self {
        self.merges.push(range.to_string());
        self
    }

    /// Freeze the top `rows` rows and left `cols` columns.
    pub fn freeze_panes(mut self, rows: u32, cols: u32) -> Self {
        self.frozen = Some((rows, cols));
        self
    }

    /// One-based inclusive column span.
    pub fn col_width(mut self, min: u32, max: u32, width: f64) -> Self {
        self.col_widths.push((min, max, width, false));
        self
    }

    pub fn hide_cols(mut self, min: u32, max: u32) -> Self {
        self.col_widths.push((min, max, 9.140625, true));
        self
    }

    /// One-based row.
    pub fn row_height(mut self, row: u32, height: f64) -> Self {
        self.row_heights.push((row, height, false));
        self
    }

    pub fn hide_row(mut self, row: u32) -> Self {
        self.row_heights.push((row, 15.0, true));
        self
    }

    pub fn auto_filter(mut self, range: &str) -> Self {
        self.auto_filter = Some(range.to_string());
        self
    }

    /// `sortState` with `(ref, descending)` conditions.
    pub fn sort(mut self, range: &str, conditions: &[(&str, bool)]) -> Self {
        self.sort = Some((
            range.to_string(),
            conditions
                .iter()
                .map(|(r, desc)| ((*r).to_string(), *desc))
                .collect(),
        ));
        self
    }

    /// A `cfRule` for `sqref`. `rule` is everything after the priority
    /// attribute: the remaining attributes, `>`, and the child elements,
    /// e.g. `type="cellIs" operator="greaterThan"><formula>5</formula>`.
    /// `dxf` is a full `<dxf>` element the rule points at.
    pub fn conditional(mut self, sqref: &str, rule: &str, dxf: Option<&str>) -> Self {
        self.conditional
            .push((sqref.to_string(), rule.to_string(), dxf.map(str::to_string)));
        self
    }

    pub fn chart(mut self, anchor: Anchor, xml: String) -> Self {
        self.drawing.push(DrawingObject::Chart { anchor, xml });
        self
    }

    pub fn picture(mut self, anchor: Anchor, name: &str, png: &[u8]) -> Self {
        self.drawing.push(DrawingObject::Picture {
            anchor,
            name: name.to_string(),
            png: png.to_vec(),
        });
        self
    }

    pub fn pivot(mut self, pivot: PivotSpec) -> Self {
        self.pivots.push(pivot);
        self
    }
}

// ============================================================================
// Workbook
// ============================================================================

/// Builder for a whole package.
#[derive(Debug, Clone, Default)]
pub struct XlsxBuilder {
    sheets: Vec<SheetBuilder>,
    date1904: bool,
    theme_accent1: Option<String>,
}

/// Parts written so far plus the counters that name new ones.
struct PartWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
    charts: usize,
    images: usize,
    pivots: usize,
}

impl PartWriter {
    fn put(&mut self, path: &str, data: &[u8]) {
        self.zip.start_file(path, self.options).unwrap();
        self.zip.write_all(data).unwrap();
    }
}

impl XlsxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(mut self, sheet: SheetBuilder) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn date1904(mut self) -> Self {
        self.date1904 = true;
        self
    }

    pub fn theme_accent1(mut self, rgb: &str) -> Self {
        self.theme_accent1 = Some(rgb.to_string());
        self
    }

    /// Build the xlsx file as bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut styles = StylesCollector::default();
        let mut strings: Vec<String> = Vec::new();
        let mut dxfs: Vec<String> = Vec::new();
        for sheet in &self.sheets {
            for cell in &sheet.cells {
                if let Some(ref style) = cell.style {
                    styles.index_of(style);
                }
                if let Some(CellValue::Text(ref s)) = cell.value {
                    if !strings.contains(s) {
                        strings.push(s.clone());
                    }
                }
            }
            for (_, _, dxf) in &sheet.conditional {
                if let Some(dxf) = dxf {
                    dxfs.push(dxf.clone());
                }
            }
        }

        let mut out = PartWriter {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default().compression_method(zip::CompressionMethod::Deflated),
            charts: 0,
            images: 0,
            pivots: 0,
        };

        out.put("[Content_Types].xml", content_types().as_bytes());
        out.put(
            "_rels/.rels",
            rels(&[(
                "officeDocument".to_string(),
                "xl/workbook.xml".to_string(),
            )])
            .as_bytes(),
        );

        let mut wb_rels: Vec<(String, String)> = (1..=self.sheets.len())
            .map(|i| ("worksheet".to_string(), format!("worksheets/sheet{i}.xml")))
            .collect();
        wb_rels.push(("styles".to_string(), "styles.xml".to_string()));
        wb_rels.push(("theme".to_string(), "theme/theme1.xml".to_string()));
        if !strings.is_empty() {
            wb_rels.push(("sharedStrings".to_string(), "sharedStrings.xml".to_string()));
        }

        // pivot caches are workbook-level, one per pivot
        let mut caches = String::new();
        let mut cache_id = 0;
        for pivot in self.sheets.iter().flat_map(|s| &s.pivots) {
            cache_id += 1;
            wb_rels.push((
                "pivotCacheDefinition".to_string(),
                format!("pivotCache/pivotCacheDefinition{cache_id}.xml"),
            ));
            let _ = write!(
                caches,
                r#"<pivotCache cacheId="{cache_id}" r:id="rId{}"/>"#,
                wb_rels.len()
            );
            out.put(
                &format!("xl/pivotCache/pivotCacheDefinition{cache_id}.xml"),
                format!(
                    r#"<pivotCacheDefinition xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><cacheSource type="worksheet"><worksheetSource ref="{}" sheet="{}"/></cacheSource></pivotCacheDefinition>"#,
                    pivot.source_ref,
                    escape_xml(&pivot.source_sheet)
                )
                .as_bytes(),
            );
        }

        out.put("xl/_rels/workbook.xml.rels", rels(&wb_rels).as_bytes());
        out.put("xl/workbook.xml", self.workbook_xml(&caches).as_bytes());
        out.put("xl/styles.xml", styles.generate_styles_xml(&dxfs).as_bytes());
        out.put(
            "xl/theme/theme1.xml",
            theme_xml(self.theme_accent1.as_deref().unwrap_or("4472C4")).as_bytes(),
        );
        if !strings.is_empty() {
            out.put("xl/sharedStrings.xml", shared_strings_xml(&strings).as_bytes());
        }

        let mut dxf_base = 0;
        let mut cache_base = 0;
        for (i, sheet) in self.sheets.iter().enumerate() {
            let mut sheet_rels = Vec::new();
            let drawing_rid = (!sheet.drawing.is_empty()).then(|| {
                let path = write_drawing(&mut out, i + 1, &sheet.drawing);
                sheet_rels.push(("drawing".to_string(), format!("../drawings/{path}")));
                format!("rId{}", sheet_rels.len())
            });
            for pivot in &sheet.pivots {
                cache_base += 1;
                out.pivots += 1;
                let n = out.pivots;
                let xml = pivot_xml(pivot, cache_base);
                out.put(&format!("xl/pivotTables/pivotTable{n}.xml"), xml.as_bytes());
                out.put(
                    &format!("xl/pivotTables/_rels/pivotTable{n}.xml.rels"),
                    rels(&[(
                        "pivotCacheDefinition".to_string(),
                        format!("../pivotCache/pivotCacheDefinition{cache_base}.xml"),
                    )])
                    .as_bytes(),
                );
                sheet_rels.push((
                    "pivotTable".to_string(),
                    format!("../pivotTables/pivotTable{n}.xml"),
                ));
            }
            if !sheet_rels.is_empty() {
                out.put(
                    &format!("xl/worksheets/_rels/sheet{}.xml.rels", i + 1),
                    rels(&sheet_rels).as_bytes(),
                );
            }

            let xml = sheet_xml(sheet, &strings, &mut styles, dxf_base, drawing_rid.as_deref());
            dxf_base += sheet.conditional.iter().filter(|c| c.2.is_some()).count();
            out.put(&format!("xl/worksheets/sheet{}.xml", i + 1), xml.as_bytes());
        }

        out.zip.finish().expect("Failed to finish ZIP").into_inner()
    }

    fn workbook_xml(&self, caches: &str) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}">"#
        );
        if self.date1904 {
            xml.push_str(r#"<workbookPr date1904="1"/>"#);
        }
        xml.push_str("<sheets>");
        for (i, sheet) in self.sheets.iter().enumerate() {
            let state = if sheet.hidden { r#" state="hidden""# } else { "" };
            let _ = write!(
                xml,
                r#"<sheet name="{}" sheetId="{}"{state} r:id="rId{}"/>"#,
                escape_xml(&sheet.name),
                i + 1,
                i + 1
            );
        }
        xml.push_str("</sheets>");
        if !caches.is_empty() {
            let _ = write!(xml, "<pivotCaches>{caches}</pivotCaches>");
        }
        xml.push_str("</workbook>");
        xml
    }
}

/// Write a drawing part, its rels, and the chart and media parts it points
/// at. Returns the drawing file name.
fn write_drawing(out: &mut PartWriter, sheet_no: usize, objects: &[DrawingObject]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart">"#,
    );
    let mut drawing_rels = Vec::new();

    for (shape_id, object) in objects.iter().enumerate() {
        let anchor = match object {
            DrawingObject::Chart { anchor, .. } | DrawingObject::Picture { anchor, .. } => anchor,
        };
        let _ = write!(
            xml,
            "<xdr:twoCellAnchor><xdr:from><xdr:col>{}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from><xdr:to><xdr:col>{}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to>",
            anchor.from.0, anchor.from.1, anchor.to.0, anchor.to.1
        );
        if let Some((cx, cy)) = anchor.extent {
            let _ = write!(xml, r#"<xdr:ext cx="{cx}" cy="{cy}"/>"#);
        }

        match object {
            DrawingObject::Chart { xml: chart, .. } => {
                out.charts += 1;
                let n = out.charts;
                out.put(&format!("xl/charts/chart{n}.xml"), chart.as_bytes());
                drawing_rels.push(("chart".to_string(), format!("../charts/chart{n}.xml")));
                let _ = write!(
                    xml,
                    r#"<xdr:graphicFrame macro=""><xdr:nvGraphicFramePr><xdr:cNvPr id="{}" name="Chart {n}"/><xdr:cNvGraphicFramePr/></xdr:nvGraphicFramePr><xdr:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/></xdr:xfrm><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/chart"><c:chart r:id="rId{}"/></a:graphicData></a:graphic></xdr:graphicFrame>"#,
                    shape_id + 2,
                    drawing_rels.len()
                );
            }
            DrawingObject::Picture { name, png, .. } => {
                out.images += 1;
                let n = out.images;
                out.put(&format!("xl/media/image{n}.png"), png);
                drawing_rels.push(("image".to_string(), format!("../media/image{n}.png")));
                let _ = write!(
                    xml,
                    r#"<xdr:pic><xdr:nvPicPr><xdr:cNvPr id="{}" name="{}"/><xdr:cNvPicPr/></xdr:nvPicPr><xdr:blipFill><a:blip r:embed="rId{}"/><a:stretch><a:fillRect/></a:stretch></xdr:blipFill><xdr:spPr/></xdr:pic>"#,
                    shape_id + 2,
                    escape_xml(name),
                    drawing_rels.len()
                );
            }
        }
        xml.push_str("<xdr:clientData/></xdr:twoCellAnchor>");
    }
    xml.push_str("</xdr:wsDr>");

    let file = format!("drawing{sheet_no}.xml");
    out.put(&format!("xl/drawings/{file}"), xml.as_bytes());
    out.put(
        &format!("xl/drawings/_rels/{file}.rels"),
        rels(&drawing_rels).as_bytes(),
    );
    file
}

fn pivot_xml(pivot: &PivotSpec, cache_id: usize) -> String {
    let fields = |tag: &str, inner: &str, attr: &str, list: &[u32]| -> String {
        if list.is_empty() {
            return String::new();
        }
        let items: String = list
            .iter()
            .map(|x| format!(r#"<{inner} {attr}="{x}"/>"#))
            .collect();
        format!(r#"<{tag} count="{}">{items}</{tag}>"#, list.len())
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><pivotTableDefinition xmlns="{MAIN_NS}" name="{}" cacheId="{cache_id}" dataCaption="Values"><location ref="{}" firstHeaderRow="1" firstDataRow="1" firstDataCol="1"/>{}{}{}</pivotTableDefinition>"#,
        escape_xml(&pivot.name),
        pivot.location,
        fields("rowFields", "field", "x", &pivot.row_fields),
        fields("pageFields", "pageField", "fld", &pivot.page_fields),
        fields("dataFields", "dataField", "fld", &pivot.data_fields),
    )
}

fn sheet_xml(
    sheet: &SheetBuilder,
    strings: &[String],
    styles: &mut StylesCollector,
    dxf_base: usize,
    drawing_rid: Option<&str>,
) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{MAIN_NS}" xmlns:r="{REL_NS}">"#
    );
    if let Some(ref rgb) = sheet.tab_color {
        let _ = write!(xml, r#"<sheetPr><tabColor rgb="FF{rgb}"/></sheetPr>"#);
    }

    xml.push_str(r#"<sheetViews><sheetView workbookViewId="0">"#);
    if let Some((rows, cols)) = sheet.frozen {
        let mut pane = String::from("<pane");
        if cols > 0 {
            let _ = write!(pane, r#" xSplit="{cols}""#);
        }
        if rows > 0 {
            let _ = write!(pane, r#" ySplit="{rows}""#);
        }
        let _ = write!(
            pane,
            r#" topLeftCell="{}{}" activePane="bottomRight" state="frozen"/>"#,
            col_letters(cols),
            rows + 1
        );
        xml.push_str(&pane);
    }
    xml.push_str("</sheetView></sheetViews>");
    xml.push_str(r#"<sheetFormatPr defaultRowHeight="15"/>"#);

    if !sheet.col_widths.is_empty() {
        xml.push_str("<cols>");
        for (min, max, width, hidden) in &sheet.col_widths {
            let hidden = if *hidden { r#" hidden="1""# } else { "" };
            let _ = write!(
                xml,
                r#"<col min="{min}" max="{max}" width="{width}" customWidth="1"{hidden}/>"#
            );
        }
        xml.push_str("</cols>");
    }

    // group cells by row, rows ascending
    let mut rows: Vec<u32> = sheet
        .cells
        .iter()
        .map(|c| row_of(&c.cell_ref))
        .chain(sheet.row_heights.iter().map(|r| r.0))
        .collect();
    rows.sort_unstable();
    rows.dedup();

    xml.push_str("<sheetData>");
    for row in rows {
        let _ = write!(xml, r#"<row r="{row}""#);
        if let Some((_, height, hidden)) = sheet.row_heights.iter().find(|r| r.0 == row) {
            let _ = write!(xml, r#" ht="{height}" customHeight="1""#);
            if *hidden {
                xml.push_str(r#" hidden="1""#);
            }
        }
        xml.push('>');
        for cell in sheet.cells.iter().filter(|c| row_of(&c.cell_ref) == row) {
            let style = cell
                .style
                .as_ref()
                .map(|s| format!(r#" s="{}""#, styles.index_of(s)))
                .unwrap_or_default();
            let r = &cell.cell_ref;
            match cell.value {
                None => {
                    let _ = write!(xml, r#"<c r="{r}"{style}/>"#);
                }
                Some(CellValue::Text(ref s)) => {
                    let idx = strings.iter().position(|x| x == s).unwrap_or(0);
                    let _ = write!(xml, r#"<c r="{r}"{style} t="s"><v>{idx}</v></c>"#);
                }
                Some(CellValue::Number(n)) => {
                    let _ = write!(xml, r#"<c r="{r}"{style}><v>{n}</v></c>"#);
                }
                Some(CellValue::Bool(b)) => {
                    let _ = write!(xml, r#"<c r="{r}"{style} t="b"><v>{}</v></c>"#, u8::from(b));
                }
                Some(CellValue::Formula(ref f, cached)) => {
                    let _ = write!(xml, r#"<c r="{r}"{style}><f>{}</f>"#, escape_xml(f));
                    if let Some(v) = cached {
                        let _ = write!(xml, "<v>{v}</v>");
                    }
                    xml.push_str("</c>");
                }
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");

    if let Some(ref range) = sheet.auto_filter {
        let _ = write!(xml, r#"<autoFilter ref="{range}"/>"#);
    }
    if let Some((ref range, ref conditions)) = sheet.sort {
        let _ = write!(xml, r#"<sortState ref="{range}">"#);
        for (r, descending) in conditions {
            let desc = if *descending { r#" descending="1""# } else { "" };
            let _ = write!(xml, r#"<sortCondition{desc} ref="{r}"/>"#);
        }
        xml.push_str("</sortState>");
    }
    if !sheet.merges.is_empty() {
        let _ = write!(xml, r#"<mergeCells count="{}">"#, sheet.merges.len());
        for m in &sheet.merges {
            let _ = write!(xml, r#"<mergeCell ref="{m}"/>"#);
        }
        xml.push_str("</mergeCells>");
    }

    let mut dxf_id = dxf_base;
    for (priority, (sqref, rule, dxf)) in sheet.conditional.iter().enumerate() {
        // the rule text is the inside of cfRule plus its type attributes
        let dxf_attr = match dxf {
            Some(_) => {
                let attr = format!(r#" dxfId="{dxf_id}""#);
                dxf_id += 1;
                attr
            }
            None => String::new(),
        };
        let _ = write!(
            xml,
            r#"<conditionalFormatting sqref="{sqref}"><cfRule{dxf_attr} priority="{}" {rule}</cfRule></conditionalFormatting>"#,
            priority + 1
        );
    }

    if let Some(rid) = drawing_rid {
        let _ = write!(xml, r#"<drawing r:id="{rid}"/>"#);
    }
    xml.push_str("</worksheet>");
    xml
}

fn content_types() -> String {
    String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#,
    )
}

/// A relationships part; ids are `rId1..` in slice order.
fn rels(entries: &[(String, String)]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}">"#
    );
    for (i, (kind, target)) in entries.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{}" Type="{REL_NS}/{kind}" Target="{target}"/>"#,
            i + 1
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn shared_strings_xml(strings: &[String]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="{MAIN_NS}" count="{0}" uniqueCount="{0}">"#,
        strings.len()
    );
    for s in strings {
        let _ = write!(xml, r#"<si><t xml:space="preserve">{}</t></si>"#, escape_xml(s));
    }
    xml.push_str("</sst>");
    xml
}

fn theme_xml(accent1: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2><a:accent1><a:srgbClr val="{accent1}"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme></a:themeElements></a:theme>"#
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Zero-based column index to letters.
fn col_letters(mut col: u32) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

/// One-based row number of an A1 reference.
fn row_of(cell_ref: &str) -> u32 {
    cell_ref
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .unwrap()
}

// ============================================================================
// Convenience constructors
// ============================================================================

/// A workbook with one empty sheet.
pub fn minimal_xlsx() -> Vec<u8> {
    XlsxBuilder::new().sheet(SheetBuilder::new("Sheet1")).build()
}

/// A workbook with one sheet holding `value` in A1.
pub fn xlsx_with_cell<V: Into<CellValue>>(value: V) -> Vec<u8> {
    XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").cell("A1", value))
        .build()
}

/// A workbook with one sheet holding a styled `value` in A1.
pub fn xlsx_with_styled_cell<V: Into<CellValue>>(value: V, style: StyleBuilder) -> Vec<u8> {
    XlsxBuilder::new()
        .sheet(SheetBuilder::new("Sheet1").styled("A1", value, style))
        .build()
}

/// Smallest valid PNG: one transparent pixel.
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];
