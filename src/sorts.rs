//! Sort-state extraction
//!
//! A sheet's last applied sort lives in a `sortState` element, either at
//! worksheet level or inside `autoFilter`:
//!
//! ```xml
//! <autoFilter ref="A1:D10">
//!   <sortState ref="A2:D10">
//!     <sortCondition descending="1" ref="C2:C10"/>
//!     <sortCondition ref="A2:A10"/>
//!   </sortState>
//! </autoFilter>
//! ```
//!
//! Condition refs are absolute; consumers want the column offset into the
//! sort range.

use std::collections::BTreeMap;

use quick_xml::events::Event;

use crate::cell_ref::{parse_column_letters, CellRange};
use crate::error::{SkipReason, Warnings};
use crate::package::Package;
use crate::registry::SheetRegistry;
use crate::types::{ImportedSort, SortCondition};
use crate::xml_helpers::{attr_bool_default, attr_string, xml_reader};

/// Find the first `sortState` of a worksheet part.
///
/// `Ok(None)` means the sheet has no sort; a sort whose range does not parse
/// is a skip.
pub(crate) fn parse_sort_state(xml: &[u8]) -> Result<Option<ImportedSort>, SkipReason> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();
    let mut range: Option<CellRange> = None;
    let mut conditions = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            // sheetData can be huge and never holds a sort
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"sheetData" => {
                if reader.read_to_end_into(e.name(), &mut skip_buf).is_err() {
                    break;
                }
                skip_buf.clear();
            }
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"sortState" if range.is_none() => {
                    let reference = attr_string(e, b"ref").unwrap_or_default();
                    let parsed = CellRange::parse(&reference)
                        .ok_or(SkipReason::MalformedRef(reference))?;
                    range = Some(parsed);
                }
                b"sortCondition" => {
                    let Some(sort_range) = range else {
                        buf.clear();
                        continue;
                    };
                    let column = attr_string(e, b"ref")
                        .as_deref()
                        .and_then(parse_column_letters)
                        .and_then(|col| col.checked_sub(sort_range.start_col));
                    if let Some(column) = column {
                        conditions.push(SortCondition {
                            column,
                            ascending: !attr_bool_default(e, b"descending", false),
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"sortState" && range.is_some() => {
                break;
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(range.map(|range| ImportedSort {
        range: range.to_a1(),
        conditions,
    }))
}

/// Extract every sheet's sort state, keyed by sheet id.
pub(crate) fn extract_sorts(
    pkg: &mut Package,
    registry: &SheetRegistry,
    warnings: &mut Warnings,
) -> BTreeMap<String, ImportedSort> {
    let mut out = BTreeMap::new();
    let Ok(entries) = pkg.workbook_sheets() else {
        return out;
    };

    for entry in &entries {
        let Some(path) = entry.path.as_deref() else {
            continue;
        };
        let Some(xml) = pkg.read_part(path) else {
            continue;
        };
        let sort = match parse_sort_state(&xml) {
            Ok(Some(sort)) => sort,
            Ok(None) => continue,
            Err(reason) => {
                warnings.skip(&format!("sort on {}", entry.name), &reason);
                continue;
            }
        };
        match registry.resolve(&entry.name) {
            Ok(id) => {
                out.insert(id.to_string(), sort);
            }
            Err(reason) => warnings.skip(&format!("sort on {}", entry.name), &reason),
        }
    }
    out
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_are_range_relative() {
        let xml = br#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData>
<autoFilter ref="B1:E10"><sortState ref="B2:E10">
<sortCondition descending="1" ref="D2:D10"/><sortCondition ref="B2:B10"/>
</sortState></autoFilter></worksheet>"#;
        let sort = parse_sort_state(xml).unwrap().unwrap();
        assert_eq!(sort.range, "B2:E10");
        assert_eq!(
            sort.conditions,
            vec![
                SortCondition {
                    column: 2,
                    ascending: false
                },
                SortCondition {
                    column: 0,
                    ascending: true
                },
            ]
        );
    }

    #[test]
    fn test_no_sort_state() {
        let xml = br#"<worksheet><sheetData/></worksheet>"#;
        assert_eq!(parse_sort_state(xml).unwrap(), None);
    }

    #[test]
    fn test_malformed_range_is_skip() {
        let xml = br#"<worksheet><sortState ref="not a range"/></worksheet>"#;
        assert!(matches!(
            parse_sort_state(xml),
            Err(SkipReason::MalformedRef(_))
        ));
    }

    #[test]
    fn test_condition_left_of_range_dropped() {
        let xml = br#"<worksheet><sortState ref="C1:D5"><sortCondition ref="A1:A5"/></sortState></worksheet>"#;
        let sort = parse_sort_state(xml).unwrap().unwrap();
        assert!(sort.conditions.is_empty());
    }
}
