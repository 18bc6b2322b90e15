//! Worksheet parsing - streams one sheet part into a [`SourceSheet`].

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::cell_ref::{parse_cell_ref_bytes, shift_formula_refs, CellRange};
use crate::conditional::parse_conditional_formatting;
use crate::drawings::read_drawing_images;
use crate::error::{SkipReason, Warnings};
use crate::hyperlinks::{apply_hyperlinks, parse_hyperlink_element, resolve_hyperlinks};
use crate::package::{rel_type, Package, SheetEntry};
use crate::rich_text::{parse_string_item, SharedString};
use crate::source::{
    SourceCell, SourceCellRecord, SourceColumn, SourceDate, SourceFilterRef, SourcePane,
    SourceRow, SourceSheet,
};
use crate::xml_helpers::{
    attr_bool_default, attr_f64, attr_string, attr_u32, parse_color_attrs, xml_text_reader,
};

/// Cell type tag from the `t` attribute of a `<c>` element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum CellTypeTag {
    Shared,
    Inline,
    Str,
    Bool,
    Error,
    Date,
    Default,
}

pub(super) fn parse_cell_type_tag(value: &str) -> CellTypeTag {
    match value {
        "s" => CellTypeTag::Shared,
        "b" => CellTypeTag::Bool,
        "e" => CellTypeTag::Error,
        "str" => CellTypeTag::Str,
        "inlineStr" => CellTypeTag::Inline,
        "d" => CellTypeTag::Date,
        _ => CellTypeTag::Default,
    }
}

/// Anchor cell and text of a shared formula group, keyed by its `si`.
struct SharedFormula {
    row: u32,
    col: u32,
    formula: String,
}

/// Whether a sheet `state` hides it.
pub(super) fn is_hidden_state(state: Option<&str>) -> bool {
    matches!(state, Some("hidden" | "veryHidden"))
}

/// Read one worksheet. A missing or malformed part yields whatever could
/// be read (possibly an empty sheet) plus a warning, never an error.
pub(super) fn read_worksheet(
    pkg: &mut Package,
    entry: &SheetEntry,
    ordinal: usize,
    shared_strings: &[SharedString],
    include_images: bool,
    warnings: &mut Warnings,
) -> SourceSheet {
    let mut sheet = SourceSheet {
        name: entry.name.clone(),
        hidden: is_hidden_state(entry.state.as_deref()),
        ..SourceSheet::default()
    };

    let path = entry
        .path
        .clone()
        .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", ordinal + 1));
    let xml = match pkg.require_part(&path) {
        Ok(xml) => xml,
        Err(reason) => {
            warnings.skip(&format!("worksheet {:?}", entry.name), &reason);
            return sheet;
        }
    };

    let mut hyperlinks = Vec::new();
    if let Err(e) = parse_sheet_xml(&xml, &mut sheet, &mut hyperlinks, shared_strings) {
        warnings.skip(
            &format!("rest of worksheet {:?}", entry.name),
            &SkipReason::xml(&path, &e),
        );
    }

    mark_merged_cells(&mut sheet);

    if !hyperlinks.is_empty() {
        let rels = pkg.relationships(&path);
        let resolved = resolve_hyperlinks(&hyperlinks, &rels);
        apply_hyperlinks(&mut sheet.cells, resolved);
    }

    if include_images {
        for drawing in pkg.related_parts(&path, rel_type::DRAWING) {
            sheet.images.extend(read_drawing_images(pkg, &drawing));
        }
    }

    log::debug!(
        "sheet {:?}: {} cells, {} merges, {} images",
        sheet.name,
        sheet.cells.len(),
        sheet.merges.len(),
        sheet.images.len()
    );
    sheet
}

/// Stream the sheet XML. Stops at the first XML error, keeping what was read.
#[allow(clippy::too_many_lines)]
fn parse_sheet_xml(
    data: &[u8],
    sheet: &mut SourceSheet,
    hyperlinks: &mut Vec<crate::hyperlinks::RawHyperlink>,
    shared_strings: &[SharedString],
) -> Result<(), quick_xml::Error> {
    let mut xml = xml_text_reader(data);
    let mut buf = Vec::new();
    let mut current_row: u32 = 0;
    let mut next_col: u32 = 0;
    let mut in_sheet_pr = false;
    let mut sheet_views_seen = 0u32;
    let mut shared_formulas: HashMap<u32, SharedFormula> = HashMap::new();

    loop {
        let event = xml.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                match e.local_name().as_ref() {
                    b"sheetPr" => in_sheet_pr = is_start,
                    b"tabColor" if in_sheet_pr => {
                        sheet.tab_color = Some(parse_color_attrs(e));
                    }
                    b"sheetFormatPr" => {
                        sheet.default_row_height = attr_f64(e, b"defaultRowHeight");
                        sheet.default_col_width = attr_f64(e, b"defaultColWidth");
                    }
                    b"sheetView" => sheet_views_seen += 1,
                    // only the first view contributes panes
                    b"pane" if sheet_views_seen == 1 && sheet.pane.is_none() => {
                        sheet.pane = Some(SourcePane {
                            x_split: attr_f64(e, b"xSplit").unwrap_or(0.0),
                            y_split: attr_f64(e, b"ySplit").unwrap_or(0.0),
                            top_left_cell: attr_string(e, b"topLeftCell"),
                            state: attr_string(e, b"state"),
                        });
                    }
                    b"col" => {
                        let min = attr_u32(e, b"min").unwrap_or(1).max(1);
                        let max = attr_u32(e, b"max").unwrap_or(min).max(min);
                        let width = attr_f64(e, b"width");
                        let hidden = attr_bool_default(e, b"hidden", false);
                        if width.is_some() || hidden {
                            sheet.columns.push(SourceColumn {
                                min: min - 1,
                                max: max - 1,
                                width,
                                hidden,
                            });
                        }
                    }
                    b"row" => {
                        current_row = attr_u32(e, b"r")
                            .map_or(current_row.saturating_add(1), |r| r.max(1));
                        next_col = 0;
                        let height = attr_f64(e, b"ht");
                        let hidden = attr_bool_default(e, b"hidden", false);
                        if height.is_some() || hidden {
                            sheet.rows.push(SourceRow {
                                index: current_row - 1,
                                height,
                                hidden,
                            });
                        }
                    }
                    b"c" => {
                        let (col, row) = attr_string(e, b"r")
                            .and_then(|r| parse_cell_ref_bytes(r.as_bytes()))
                            .unwrap_or((next_col, current_row.saturating_sub(1)));
                        next_col = col.saturating_add(1);
                        let record = read_cell(
                            &mut xml,
                            e,
                            is_start,
                            (row, col),
                            shared_strings,
                            &mut shared_formulas,
                        );
                        if let Some(record) = record {
                            sheet.cells.push(record);
                        }
                    }
                    b"mergeCell" => {
                        if let Some(range) = attr_string(e, b"ref").and_then(|r| CellRange::parse(&r))
                        {
                            sheet.merges.push(range);
                        }
                    }
                    b"autoFilter" => {
                        sheet.auto_filter = attr_string(e, b"ref")
                            .filter(|r| !r.trim().is_empty())
                            .map(SourceFilterRef::A1);
                    }
                    b"conditionalFormatting" if is_start => {
                        let start = e.clone().into_owned();
                        sheet
                            .conditional_formats
                            .extend(parse_conditional_formatting(&start, &mut xml));
                    }
                    b"hyperlink" => hyperlinks.extend(parse_hyperlink_element(e)),
                    _ => {}
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetPr" => in_sheet_pr = false,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Read one `<c>` element and its children into a record.
///
/// Returns `None` for a cell with neither content nor a style.
fn read_cell<R: BufRead>(
    xml: &mut Reader<R>,
    e: &BytesStart,
    is_start: bool,
    (row, col): (u32, u32),
    shared_strings: &[SharedString],
    shared_formulas: &mut HashMap<u32, SharedFormula>,
) -> Option<SourceCellRecord> {
    let tag = attr_string(e, b"t").map_or(CellTypeTag::Default, |t| parse_cell_type_tag(&t));
    let style = attr_u32(e, b"s").and_then(|s| usize::try_from(s).ok());

    let mut value: Option<String> = None;
    let mut formula: Option<String> = None;
    let mut shared_group: Option<u32> = None;
    let mut inline: Option<SharedString> = None;

    if is_start {
        let mut buf = Vec::new();
        loop {
            match xml.read_event_into(&mut buf) {
                Ok(Event::Start(ref inner)) => match inner.local_name().as_ref() {
                    b"v" => value = Some(read_text_until(xml, b"v")),
                    b"f" => {
                        shared_group = shared_formula_group(inner);
                        formula = Some(read_text_until(xml, b"f"));
                    }
                    b"is" => inline = Some(parse_string_item(xml, b"is")),
                    _ => {}
                },
                Ok(Event::Empty(ref inner)) if inner.local_name().as_ref() == b"f" => {
                    shared_group = shared_formula_group(inner);
                }
                Ok(Event::End(ref inner)) if inner.local_name().as_ref() == b"c" => break,
                Ok(Event::Eof) | Err(_) => break,
                _ => {}
            }
            buf.clear();
        }
    }

    let formula = formula.filter(|f| !f.trim().is_empty());
    let formula = match (formula, shared_group) {
        (Some(text), Some(si)) => {
            shared_formulas.insert(
                si,
                SharedFormula {
                    row,
                    col,
                    formula: text.clone(),
                },
            );
            Some(text)
        }
        // filled-down cells repeat the group's text, moved by their offset
        (None, Some(si)) => shared_formulas.get(&si).map(|anchor| {
            shift_formula_refs(
                &anchor.formula,
                i64::from(row) - i64::from(anchor.row),
                i64::from(col) - i64::from(anchor.col),
            )
        }),
        (formula, None) => formula,
    };

    let cell = cell_value(tag, value.as_deref(), inline, shared_strings);
    let cell = match formula {
        Some(formula) => SourceCell::Formula {
            formula,
            cached: (cell != SourceCell::Empty).then(|| Box::new(cell)),
        },
        None => cell,
    };

    if cell == SourceCell::Empty && style.is_none() {
        return None;
    }
    Some(SourceCellRecord {
        row,
        col,
        cell,
        style,
        raw: value,
    })
}

/// The `si` of an `<f t="shared">` element.
fn shared_formula_group(f: &BytesStart) -> Option<u32> {
    (attr_string(f, b"t").as_deref() == Some("shared"))
        .then(|| attr_u32(f, b"si"))
        .flatten()
}

/// Turn the stored value text into a typed source cell.
fn cell_value(
    tag: CellTypeTag,
    value: Option<&str>,
    inline: Option<SharedString>,
    shared_strings: &[SharedString],
) -> SourceCell {
    if tag == CellTypeTag::Inline {
        return match inline {
            Some(SharedString::Plain(s)) => SourceCell::Text(s),
            Some(SharedString::Rich(runs)) => SourceCell::RichText(runs),
            None => value.map_or(SourceCell::Empty, |v| SourceCell::Text(v.to_string())),
        };
    }
    let Some(value) = value else {
        return SourceCell::Empty;
    };
    match tag {
        CellTypeTag::Shared => {
            let item = value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|idx| shared_strings.get(idx));
            match item {
                Some(SharedString::Plain(s)) => SourceCell::Text(s.clone()),
                Some(SharedString::Rich(runs)) => SourceCell::RichText(runs.clone()),
                None => {
                    log::warn!("shared string index {value:?} out of range");
                    SourceCell::Empty
                }
            }
        }
        CellTypeTag::Str | CellTypeTag::Inline => SourceCell::Text(value.to_string()),
        CellTypeTag::Bool => SourceCell::Boolean(matches!(value.trim(), "1" | "true")),
        CellTypeTag::Error => SourceCell::Error(value.to_string()),
        CellTypeTag::Date => SourceCell::Date(SourceDate::Text(value.trim().to_string())),
        // unparsable numbers become NaN; the mapper falls back to the raw text
        CellTypeTag::Default => SourceCell::Number(value.trim().parse().unwrap_or(f64::NAN)),
    }
}

/// Concatenated text content up to the matching end tag.
fn read_text_until<R: BufRead>(xml: &mut Reader<R>, end_tag: &[u8]) -> String {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Text(ref t)) => {
                if let Ok(s) = t.unescape() {
                    text.push_str(&s);
                }
            }
            Ok(Event::CData(ref t)) => {
                if let Ok(s) = std::str::from_utf8(t.as_ref()) {
                    text.push_str(s);
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == end_tag => break,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    text
}

/// Covered, non-anchor cells of each merge become [`SourceCell::Merged`],
/// keeping their style.
fn mark_merged_cells(sheet: &mut SourceSheet) {
    if sheet.merges.is_empty() {
        return;
    }
    for record in &mut sheet.cells {
        let covered = sheet.merges.iter().any(|m| {
            (m.start_row..=m.end_row).contains(&record.row)
                && (m.start_col..=m.end_col).contains(&record.col)
                && (record.row, record.col) != (m.start_row, m.start_col)
        });
        if covered {
            record.cell = SourceCell::Merged;
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::source::SourceRun;
    use test_case::test_case;

    fn parse(xml: &str, shared: &[SharedString]) -> SourceSheet {
        let mut sheet = SourceSheet::default();
        let mut links = Vec::new();
        parse_sheet_xml(xml.as_bytes(), &mut sheet, &mut links, shared).unwrap();
        mark_merged_cells(&mut sheet);
        sheet
    }

    fn cell(sheet: &SourceSheet, row: u32, col: u32) -> &SourceCellRecord {
        sheet
            .cells
            .iter()
            .find(|c| c.row == row && c.col == col)
            .unwrap()
    }

    #[test]
    fn test_cell_types() {
        let shared = vec![
            SharedString::Plain("hello".to_string()),
            SharedString::Rich(vec![SourceRun {
                text: "rich".to_string(),
                font: None,
            }]),
        ];
        let sheet = parse(
            r#"<worksheet><sheetData>
<row r="1">
  <c r="A1" t="s"><v>0</v></c>
  <c r="B1" t="s"><v>1</v></c>
  <c r="C1"><v>3.5</v></c>
  <c r="D1" t="b"><v>1</v></c>
  <c r="E1" t="e"><v>#DIV/0!</v></c>
  <c r="F1" t="inlineStr"><is><t xml:space="preserve"> in line </t></is></c>
  <c r="G1" t="d"><v>2024-03-01T00:00:00</v></c>
  <c r="H1" s="2"/>
  <c r="I1"/>
</row>
</sheetData></worksheet>"#,
            &shared,
        );
        assert_eq!(sheet.cells.len(), 8);
        assert_eq!(cell(&sheet, 0, 0).cell, SourceCell::Text("hello".to_string()));
        assert!(matches!(cell(&sheet, 0, 1).cell, SourceCell::RichText(_)));
        assert_eq!(cell(&sheet, 0, 2).cell, SourceCell::Number(3.5));
        assert_eq!(cell(&sheet, 0, 2).raw.as_deref(), Some("3.5"));
        assert_eq!(cell(&sheet, 0, 3).cell, SourceCell::Boolean(true));
        assert_eq!(cell(&sheet, 0, 4).cell, SourceCell::Error("#DIV/0!".to_string()));
        assert_eq!(cell(&sheet, 0, 5).cell, SourceCell::Text(" in line ".to_string()));
        assert_eq!(
            cell(&sheet, 0, 6).cell,
            SourceCell::Date(SourceDate::Text("2024-03-01T00:00:00".to_string()))
        );
        assert_eq!(cell(&sheet, 0, 7).cell, SourceCell::Empty);
        assert_eq!(cell(&sheet, 0, 7).style, Some(2));
    }

    #[test]
    fn test_formulas() {
        let sheet = parse(
            r#"<worksheet><sheetData><row r="4">
<c r="A4"><f>SUM(A1:A3)</f><v>42</v></c>
<c r="B4"><f t="shared" ref="B4:B6" si="0">A4*2</f><v>84</v></c>
<c r="C4"><f t="shared" si="0"/><v>7</v></c>
<c r="D4" t="str"><f>"a"&amp;"b"</f><v>ab</v></c>
</row></sheetData></worksheet>"#,
            &[],
        );
        assert_eq!(
            cell(&sheet, 3, 0).cell,
            SourceCell::Formula {
                formula: "SUM(A1:A3)".to_string(),
                cached: Some(Box::new(SourceCell::Number(42.0))),
            }
        );
        assert!(matches!(cell(&sheet, 3, 1).cell, SourceCell::Formula { .. }));
        assert_eq!(
            cell(&sheet, 3, 2).cell,
            SourceCell::Formula {
                formula: "B4*2".to_string(),
                cached: Some(Box::new(SourceCell::Number(7.0))),
            }
        );
        assert_eq!(
            cell(&sheet, 3, 3).cell,
            SourceCell::Formula {
                formula: "\"a\"&\"b\"".to_string(),
                cached: Some(Box::new(SourceCell::Text("ab".to_string()))),
            }
        );
    }

    #[test]
    fn test_shared_formula_filled_down() {
        let sheet = parse(
            r#"<worksheet><sheetData>
<row r="1"><c r="A1"><f t="shared" ref="A1:A3" si="0">B1*2+$C$1</f><v>2</v></c></row>
<row r="2"><c r="A2"><f t="shared" si="0"/><v>4</v></c></row>
<row r="3"><c r="A3"><f t="shared" si="0"/></c><c r="B3"><f t="shared" si="9"/><v>1</v></c></row>
</sheetData></worksheet>"#,
            &[],
        );
        assert_eq!(
            cell(&sheet, 1, 0).cell,
            SourceCell::Formula {
                formula: "B2*2+$C$1".to_string(),
                cached: Some(Box::new(SourceCell::Number(4.0))),
            }
        );
        assert_eq!(
            cell(&sheet, 2, 0).cell,
            SourceCell::Formula {
                formula: "B3*2+$C$1".to_string(),
                cached: None,
            }
        );
        // unknown group keeps the cached value only
        assert_eq!(cell(&sheet, 2, 1).cell, SourceCell::Number(1.0));
    }

    #[test]
    fn test_sheet_layout() {
        let sheet = parse(
            r#"<worksheet>
<sheetPr><tabColor rgb="FFFF0000"/></sheetPr>
<sheetViews><sheetView workbookViewId="0"><pane xSplit="1" ySplit="2" topLeftCell="B3" state="frozen"/></sheetView>
<sheetView workbookViewId="1"><pane xSplit="5" state="frozen"/></sheetView></sheetViews>
<sheetFormatPr defaultRowHeight="15" defaultColWidth="10"/>
<cols><col min="2" max="3" width="20" customWidth="1"/><col min="5" max="5" hidden="1"/><col min="6" max="6"/></cols>
<sheetData>
<row r="2" ht="30" customHeight="1"><c r="A2"><v>1</v></c></row>
<row r="3" hidden="1"/>
<row r="5"><c r="A5"><v>1</v></c><c r="B5"><v>2</v></c><c r="A6"><v>3</v></c><c r="B6" s="4"/></row>
</sheetData>
<autoFilter ref="A1:C10"/>
<mergeCells count="1"><mergeCell ref="A5:B6"/></mergeCells>
</worksheet>"#,
            &[],
        );
        assert_eq!(sheet.tab_color.as_ref().and_then(|c| c.rgb.as_deref()), Some("FFFF0000"));
        let pane = sheet.pane.as_ref().unwrap();
        assert_eq!((pane.x_split, pane.y_split), (1.0, 2.0));
        assert_eq!(pane.state.as_deref(), Some("frozen"));
        assert_eq!(sheet.default_row_height, Some(15.0));
        assert_eq!(sheet.default_col_width, Some(10.0));

        assert_eq!(sheet.columns.len(), 2);
        assert_eq!((sheet.columns[0].min, sheet.columns[0].max), (1, 2));
        assert!(sheet.columns[1].hidden);

        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].index, 1);
        assert_eq!(sheet.rows[0].height, Some(30.0));
        assert!(sheet.rows[1].hidden);

        assert_eq!(sheet.auto_filter, Some(SourceFilterRef::A1("A1:C10".to_string())));
        assert_eq!(sheet.merges.len(), 1);
        assert_eq!(cell(&sheet, 4, 0).cell, SourceCell::Number(1.0));
        assert_eq!(cell(&sheet, 4, 1).cell, SourceCell::Merged);
        assert_eq!(cell(&sheet, 5, 0).cell, SourceCell::Merged);
        assert_eq!(cell(&sheet, 5, 1).style, Some(4));
    }

    #[test]
    fn test_cells_without_reference_follow_position() {
        let sheet = parse(
            r#"<worksheet><sheetData><row><c><v>1</v></c><c><v>2</v></c></row><row><c><v>3</v></c></row></sheetData></worksheet>"#,
            &[],
        );
        assert_eq!(cell(&sheet, 0, 1).cell, SourceCell::Number(2.0));
        assert_eq!(cell(&sheet, 1, 0).cell, SourceCell::Number(3.0));
    }

    #[test]
    fn test_unparsable_number_keeps_raw() {
        let sheet = parse(
            r#"<worksheet><sheetData><row r="1"><c r="A1"><v>abc</v></c></row></sheetData></worksheet>"#,
            &[],
        );
        let record = cell(&sheet, 0, 0);
        assert!(matches!(record.cell, SourceCell::Number(n) if n.is_nan()));
        assert_eq!(record.raw.as_deref(), Some("abc"));
    }

    #[test_case(Some("hidden"), true)]
    #[test_case(Some("veryHidden"), true)]
    #[test_case(Some("visible"), false)]
    #[test_case(None, false)]
    fn test_hidden_state(state: Option<&str>, expected: bool) {
        assert_eq!(is_hidden_state(state), expected);
    }
}
