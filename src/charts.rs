//! Chart extraction
//!
//! Charts are stored in `xl/charts/chartN.xml` and placed on a sheet by a
//! drawing anchor. The chain is sheet -> drawing (sheet rels) -> anchor
//! `c:chart r:id` -> chart part (drawing rels).
//!
//! ## Chart XML Structure
//! ```xml
//! <c:chartSpace xmlns:c="...">
//!   <c:chart>
//!     <c:title><c:tx><c:rich>...<a:t>Sales</a:t>...</c:rich></c:tx></c:title>
//!     <c:plotArea>
//!       <c:barChart>
//!         <c:barDir val="col"/>
//!         <c:grouping val="clustered"/>
//!         <c:ser>
//!           <c:cat><c:strRef><c:f>Sheet1!$A$2:$A$5</c:f></c:strRef></c:cat>
//!           <c:val><c:numRef><c:f>Sheet1!$B$2:$B$5</c:f></c:numRef></c:val>
//!         </c:ser>
//!       </c:barChart>
//!     </c:plotArea>
//!   </c:chart>
//! </c:chartSpace>
//! ```
//!
//! Only the type, data range and title are recovered; series styling and
//! axes are left to the consumer.

use std::collections::BTreeMap;

use quick_xml::events::Event;

use crate::cell_ref::{split_sheet_ref, CellRange};
use crate::drawings::{parse_drawing_anchors, AnchorContent, DrawingAnchor};
use crate::error::{SkipReason, Warnings};
use crate::mapper::{anchor_position, emu_to_px};
use crate::package::{rel_type, Package};
use crate::registry::SheetRegistry;
use crate::types::{ChartType, ImportedChart, Size};
use crate::xml_helpers::{attr_val, xml_text_reader};

/// Size used when the anchor carries no extent.
const DEFAULT_CHART_SIZE: Size = Size {
    width: 600.0,
    height: 400.0,
};

/// Plot families as they appear in `plotArea`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Bar,
    Line,
    Pie,
    Doughnut,
    Area,
    Scatter,
    Radar,
    Bubble,
    Stock,
    Surface,
    OfPie,
}

impl Family {
    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "barChart" | "bar3DChart" => Self::Bar,
            "lineChart" | "line3DChart" => Self::Line,
            "pieChart" | "pie3DChart" => Self::Pie,
            "doughnutChart" => Self::Doughnut,
            "areaChart" | "area3DChart" => Self::Area,
            "scatterChart" => Self::Scatter,
            "radarChart" => Self::Radar,
            "bubbleChart" => Self::Bubble,
            "stockChart" => Self::Stock,
            "surfaceChart" | "surface3DChart" => Self::Surface,
            "ofPieChart" => Self::OfPie,
            _ => return None,
        })
    }
}

/// What one chart part says about itself.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct ChartInfo {
    pub chart_type: ChartType,
    pub data_range: Option<String>,
    pub data_sheet_name: Option<String>,
    pub title: Option<String>,
    pub is_pivot: bool,
}

/// Parse a chart part. Malformed XML keeps whatever was read before the error.
pub(crate) fn parse_chart_xml(xml: &[u8]) -> ChartInfo {
    let mut reader = xml_text_reader(xml);
    let mut buf = Vec::new();

    let mut families: Vec<Family> = Vec::new();
    let mut bar_dir: Option<String> = None;
    let mut grouping: Option<String> = None;
    let mut in_bar = false;
    let mut is_pivot = false;

    let mut in_plot_area = false;
    let mut title_depth = 0u32;
    let mut title_done = false;
    let mut title = String::new();
    let mut in_title_text = false;

    let mut in_f = false;
    let mut refs: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.local_name();
                let name = std::str::from_utf8(name.as_ref()).unwrap_or("");
                match name {
                    "plotArea" => in_plot_area = true,
                    "title" if !in_plot_area && !title_done => title_depth += 1,
                    "t" | "v" if title_depth > 0 => in_title_text = true,
                    "f" => in_f = true,
                    "pivotSource" => is_pivot = true,
                    tag if in_plot_area => {
                        if let Some(family) = Family::from_tag(tag) {
                            in_bar = family == Family::Bar;
                            if !families.contains(&family) {
                                families.push(family);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"barDir" if in_bar && bar_dir.is_none() => bar_dir = attr_val(e),
                    b"grouping" if in_bar && grouping.is_none() => grouping = attr_val(e),
                    b"pivotSource" => is_pivot = true,
                    tag if in_plot_area => {
                        let family = std::str::from_utf8(tag).ok().and_then(Family::from_tag);
                        if let Some(family) = family.filter(|f| !families.contains(f)) {
                            families.push(family);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref t)) => {
                let text = t.unescape().map(|s| s.into_owned()).unwrap_or_default();
                if in_title_text {
                    title.push_str(&text);
                } else if in_f && title_depth == 0 {
                    refs.push(text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"plotArea" => in_plot_area = false,
                b"title" if title_depth > 0 => {
                    title_depth -= 1;
                    title_done = title_depth == 0;
                }
                b"t" | b"v" => in_title_text = false,
                b"f" => in_f = false,
                b"barChart" | b"bar3DChart" => in_bar = false,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let (data_range, data_sheet_name) = merge_data_refs(&refs);
    let title = title.trim();
    ChartInfo {
        chart_type: classify(&families, bar_dir.as_deref(), grouping.as_deref()),
        data_range,
        data_sheet_name,
        title: (!title.is_empty()).then(|| title.to_string()),
        is_pivot,
    }
}

fn classify(families: &[Family], bar_dir: Option<&str>, grouping: Option<&str>) -> ChartType {
    let [family] = families else {
        return if families.is_empty() {
            ChartType::Unknown
        } else {
            ChartType::Combo
        };
    };
    match family {
        Family::Bar => match (grouping, bar_dir) {
            (Some("stacked"), _) => ChartType::StackedBar,
            (Some("percentStacked"), _) => ChartType::PercentStackedBar,
            (_, Some("bar")) => ChartType::Bar,
            _ => ChartType::Column,
        },
        Family::Line => ChartType::Line,
        Family::Pie | Family::OfPie => ChartType::Pie,
        Family::Doughnut => ChartType::Doughnut,
        Family::Area => ChartType::Area,
        Family::Scatter | Family::Surface => ChartType::Scatter,
        Family::Radar => ChartType::Radar,
        Family::Bubble => ChartType::Bubble,
        Family::Stock => ChartType::Combo,
    }
}

/// Bounding rectangle of every qualified absolute reference, plus the sheet
/// named by the first one.
pub(crate) fn merge_data_refs<S: AsRef<str>>(refs: &[S]) -> (Option<String>, Option<String>) {
    let mut bounds: Option<CellRange> = None;
    let mut sheet: Option<String> = None;
    for reference in refs {
        let reference = reference.as_ref().trim();
        if !reference.contains('!') || !reference.contains('$') {
            continue;
        }
        let (name, range) = split_sheet_ref(reference);
        let Some(range) = CellRange::parse(range) else {
            continue;
        };
        bounds = Some(bounds.map_or(range, |b| b.union(range)));
        if sheet.is_none() {
            sheet = name;
        }
    }
    (bounds.map(CellRange::to_a1), sheet)
}

fn chart_size(anchor: &DrawingAnchor) -> Size {
    match anchor.extent {
        Some((cx, cy)) if cx > 0 && cy > 0 => Size {
            width: emu_to_px(cx),
            height: emu_to_px(cy),
        },
        _ => DEFAULT_CHART_SIZE,
    }
}

/// Extract every chart on every sheet, keyed by sheet id.
pub(crate) fn extract_charts(
    pkg: &mut Package,
    registry: &SheetRegistry,
    warnings: &mut Warnings,
) -> BTreeMap<String, Vec<ImportedChart>> {
    let mut out: BTreeMap<String, Vec<ImportedChart>> = BTreeMap::new();
    let Ok(entries) = pkg.workbook_sheets() else {
        return out;
    };

    for (index, entry) in entries.iter().enumerate() {
        let Some(sheet_path) = entry.path.as_deref() else {
            continue;
        };
        let drawings = pkg.related_parts(sheet_path, rel_type::DRAWING);
        if drawings.is_empty() {
            continue;
        }
        let sheet_id = match registry.resolve(&entry.name) {
            Ok(id) => id.to_string(),
            Err(reason) => {
                warnings.skip(&format!("charts on {}", entry.name), &reason);
                continue;
            }
        };

        let mut charts = Vec::new();
        for drawing in drawings {
            let Some(xml) = pkg.read_part(&drawing) else {
                warnings.skip("drawing", &SkipReason::MissingPart(drawing.clone()));
                continue;
            };
            for anchor in parse_drawing_anchors(&xml) {
                let AnchorContent::Chart { r_id } = &anchor.content else {
                    continue;
                };
                let id = format!("chart_{index}_{}", charts.len());
                match read_chart(pkg, &drawing, r_id) {
                    Ok(info) => charts.push(ImportedChart {
                        id,
                        sheet_id: sheet_id.clone(),
                        sheet_name: entry.name.clone(),
                        chart_type: info.chart_type,
                        data_range: info.data_range,
                        data_sheet_name: info.data_sheet_name,
                        position: anchor_position(&anchor.from),
                        size: chart_size(&anchor),
                        title: info.title,
                    }),
                    Err(reason) => {
                        warnings.skip(&format!("chart {r_id} on {}", entry.name), &reason);
                    }
                }
            }
        }

        log::debug!("sheet {:?}: {} charts", entry.name, charts.len());
        if !charts.is_empty() {
            out.entry(sheet_id).or_default().extend(charts);
        }
    }
    out
}

fn read_chart(pkg: &mut Package, drawing: &str, r_id: &str) -> Result<ChartInfo, SkipReason> {
    let path = pkg.resolve_id(drawing, r_id)?;
    let xml = pkg.require_part(&path)?;
    let info = parse_chart_xml(&xml);
    if info.is_pivot {
        return Err(SkipReason::PivotChart(path));
    }
    Ok(info)
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

    fn chart(plot: &str) -> String {
        format!(
            r#"<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><c:chart><c:plotArea>{plot}</c:plotArea></c:chart></c:chartSpace>"#
        )
    }

    #[test_case("<c:barChart><c:barDir val=\"col\"/><c:grouping val=\"clustered\"/></c:barChart>", ChartType::Column ; "column")]
    #[test_case("<c:barChart><c:barDir val=\"bar\"/><c:grouping val=\"clustered\"/></c:barChart>", ChartType::Bar ; "bar")]
    #[test_case("<c:barChart><c:barDir val=\"bar\"/><c:grouping val=\"stacked\"/></c:barChart>", ChartType::StackedBar ; "stacked")]
    #[test_case("<c:bar3DChart><c:barDir val=\"col\"/><c:grouping val=\"percentStacked\"/></c:bar3DChart>", ChartType::PercentStackedBar ; "percent stacked")]
    #[test_case("<c:lineChart/>", ChartType::Line ; "line")]
    #[test_case("<c:ofPieChart/>", ChartType::Pie ; "of pie")]
    #[test_case("<c:doughnutChart/>", ChartType::Doughnut ; "doughnut")]
    #[test_case("<c:surface3DChart/>", ChartType::Scatter ; "surface")]
    #[test_case("<c:stockChart/>", ChartType::Combo ; "stock")]
    #[test_case("<c:barChart/><c:lineChart/>", ChartType::Combo ; "bar and line")]
    #[test_case("", ChartType::Unknown ; "empty plot area")]
    fn test_classify(plot: &str, expected: ChartType) {
        assert_eq!(parse_chart_xml(chart(plot).as_bytes()).chart_type, expected);
    }

    #[test]
    fn test_data_range_is_bounding_box() {
        let (range, sheet) = merge_data_refs(&["Sheet1!$A$1:$A$6", "Sheet1!$B$1:$D$6"]);
        assert_eq!(range.as_deref(), Some("A1:D6"));
        assert_eq!(sheet.as_deref(), Some("Sheet1"));
    }

    #[test]
    fn test_unqualified_refs_ignored() {
        let (range, _) = merge_data_refs(&["A1:B2", "Sheet1!A1:B2", "'My Data'!$C$3"]);
        assert_eq!(range.as_deref(), Some("C3"));
    }

    #[test]
    fn test_title_and_refs() {
        let xml = r#"<c:chartSpace xmlns:c="c" xmlns:a="a"><c:chart>
<c:title><c:tx><c:rich><a:p><a:r><a:t>Quarterly </a:t></a:r><a:r><a:t>Sales</a:t></a:r></a:p></c:rich></c:tx></c:title>
<c:plotArea><c:lineChart><c:ser>
<c:tx><c:strRef><c:f>'Data Sheet'!$B$1</c:f></c:strRef></c:tx>
<c:cat><c:strRef><c:f>'Data Sheet'!$A$2:$A$5</c:f></c:strRef></c:cat>
<c:val><c:numRef><c:f>'Data Sheet'!$B$2:$B$5</c:f></c:numRef></c:val>
</c:ser></c:lineChart>
<c:valAx><c:title><c:tx><c:rich><a:p><a:r><a:t>Units</a:t></a:r></a:p></c:rich></c:tx></c:title></c:valAx>
</c:plotArea></c:chart></c:chartSpace>"#;
        let info = parse_chart_xml(xml.as_bytes());
        assert_eq!(info.title.as_deref(), Some("Quarterly Sales"));
        assert_eq!(info.data_range.as_deref(), Some("A1:B5"));
        assert_eq!(info.data_sheet_name.as_deref(), Some("Data Sheet"));
        assert!(!info.is_pivot);
    }

    #[test]
    fn test_pivot_source_flags_chart() {
        let xml = r#"<c:chartSpace xmlns:c="c"><c:pivotSource><c:name>[Book1]Sheet2!PivotTable1</c:name></c:pivotSource><c:chart><c:plotArea><c:barChart/></c:plotArea></c:chart></c:chartSpace>"#;
        assert!(parse_chart_xml(xml.as_bytes()).is_pivot);
    }
}
