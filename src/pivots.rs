//! Pivot table extraction
//!
//! Two chains meet here:
//! - workbook `pivotCaches/pivotCache@cacheId` -> `r:id` -> cache definition
//!   -> `cacheSource/worksheetSource` (the source sheet and range)
//! - sheet rels -> `pivotTableDefinition` -> `@cacheId`, `location`, and the
//!   row/col/data/page field lists
//!
//! A pivot whose cache id is not in the workbook list falls back to the
//! definition's own cache relationship.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};

use crate::cell_ref::CellRange;
use crate::error::{SkipReason, Warnings};
use crate::package::{rel_type, Package, WORKBOOK_PART};
use crate::registry::SheetRegistry;
use crate::types::{ImportedPivotTable, OccupiedRange, PivotAnchor, PivotFields, PivotSourceRange};
use crate::xml_helpers::{attr_i32, attr_string, attr_string_local, attr_u32, xml_reader};

/// Rows each page (filter) field takes above the pivot body.
const ROWS_PER_FILTER_FIELD: u32 = 2;

/// Where a pivot cache reads its data from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CacheSource {
    pub sheet_name: String,
    pub range: CellRange,
}

/// The parts of a `pivotTableDefinition` this extractor needs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct PivotDefinition {
    pub name: Option<String>,
    pub cache_id: Option<u32>,
    pub location: Option<CellRange>,
    pub fields: PivotFields,
}

/// `pivotCache` entries of the workbook part: `(cacheId, r:id)`.
fn parse_pivot_cache_list(xml: &[u8]) -> Vec<(u32, String)> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e))
                if e.local_name().as_ref() == b"pivotCache" =>
            {
                if let (Some(id), Some(r_id)) = (attr_u32(e, b"cacheId"), attr_string_local(e, b"id"))
                {
                    out.push((id, r_id));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    out
}

/// Read `worksheetSource` from a cache definition. Named-range and external
/// sources yield `None`.
pub(crate) fn parse_cache_source(xml: &[u8]) -> Option<CacheSource> {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e) | Event::Start(ref e))
                if e.local_name().as_ref() == b"worksheetSource" =>
            {
                let sheet_name = attr_string(e, b"sheet")?;
                let range = attr_string(e, b"ref").as_deref().and_then(CellRange::parse)?;
                return Some(CacheSource { sheet_name, range });
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

#[derive(Clone, Copy)]
enum FieldList {
    Row,
    Col,
    Data,
    Page,
}

/// Field index of a `field`/`dataField`/`pageField` child; the `-2` data
/// placeholder yields `None`.
fn field_index(e: &BytesStart, list: FieldList) -> Option<u32> {
    let key: &[u8] = match list {
        FieldList::Row | FieldList::Col => b"x",
        FieldList::Data | FieldList::Page => b"fld",
    };
    attr_i32(e, key).and_then(|v| u32::try_from(v).ok())
}

pub(crate) fn parse_pivot_definition(xml: &[u8]) -> PivotDefinition {
    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();
    let mut def = PivotDefinition::default();
    let mut list: Option<FieldList> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"pivotTableDefinition" => {
                    def.name = attr_string(e, b"name");
                    def.cache_id = attr_u32(e, b"cacheId");
                }
                b"location" => {
                    def.location = attr_string(e, b"ref").as_deref().and_then(CellRange::parse);
                }
                b"rowFields" => list = Some(FieldList::Row),
                b"colFields" => list = Some(FieldList::Col),
                b"dataFields" => list = Some(FieldList::Data),
                b"pageFields" => list = Some(FieldList::Page),
                b"field" | b"dataField" | b"pageField" => {
                    let Some(current) = list else {
                        buf.clear();
                        continue;
                    };
                    if let Some(index) = field_index(e, current) {
                        let target = match current {
                            FieldList::Row => &mut def.fields.row_fields,
                            FieldList::Col => &mut def.fields.col_fields,
                            FieldList::Data => &mut def.fields.value_fields,
                            FieldList::Page => &mut def.fields.filter_fields,
                        };
                        target.push(index);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if matches!(
                    e.local_name().as_ref(),
                    b"rowFields" | b"colFields" | b"dataFields" | b"pageFields"
                ) {
                    list = None;
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    def
}

/// Cache id -> source, for every cache the workbook lists.
fn read_cache_map(pkg: &mut Package, warnings: &mut Warnings) -> HashMap<u32, CacheSource> {
    let Some(xml) = pkg.read_part(WORKBOOK_PART) else {
        return HashMap::new();
    };
    let mut map = HashMap::new();
    for (cache_id, r_id) in parse_pivot_cache_list(&xml) {
        let source = pkg
            .resolve_id(WORKBOOK_PART, &r_id)
            .and_then(|path| pkg.require_part(&path))
            .and_then(|xml| {
                parse_cache_source(&xml).ok_or(SkipReason::UnresolvedPivotCache(cache_id))
            });
        match source {
            Ok(source) => {
                map.insert(cache_id, source);
            }
            Err(reason) => warnings.skip(&format!("pivot cache {cache_id}"), &reason),
        }
    }
    map
}

/// The definition's own cache relationship, for caches missing from the map.
fn cache_from_rels(pkg: &mut Package, pivot_path: &str) -> Option<CacheSource> {
    let path = pkg.related_part(pivot_path, rel_type::PIVOT_CACHE_DEFINITION)?;
    let xml = pkg.read_part(&path)?;
    parse_cache_source(&xml)
}

/// Move the anchor and occupied range up to make room for filter rows.
pub(crate) fn layout(location: CellRange, filter_count: usize) -> (PivotAnchor, OccupiedRange) {
    let shift = u32::try_from(filter_count)
        .unwrap_or(u32::MAX)
        .saturating_mul(ROWS_PER_FILTER_FIELD);
    let start_row = location.start_row.saturating_sub(shift);
    (
        PivotAnchor {
            row: start_row,
            col: location.start_col,
        },
        OccupiedRange {
            start_row,
            start_column: location.start_col,
            end_row: location.end_row,
            end_column: location.end_col,
        },
    )
}

/// Extract every pivot table, in sheet order.
pub(crate) fn extract_pivot_tables(
    pkg: &mut Package,
    registry: &SheetRegistry,
    warnings: &mut Warnings,
) -> Vec<ImportedPivotTable> {
    let Ok(entries) = pkg.workbook_sheets() else {
        return Vec::new();
    };
    let caches = read_cache_map(pkg, warnings);
    let mut out = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let Some(sheet_path) = entry.path.as_deref() else {
            continue;
        };
        let parts = pkg.related_parts(sheet_path, rel_type::PIVOT_TABLE);
        let mut ordinal = 0usize;
        for part in parts {
            let id = format!("pivot_{index}_{ordinal}");
            match read_pivot(pkg, &part, &caches, registry, &entry.name) {
                Ok(mut pivot) => {
                    pivot.id = id;
                    out.push(pivot);
                    ordinal += 1;
                }
                Err(reason) => warnings.skip(&format!("pivot table {part}"), &reason),
            }
        }
    }
    log::debug!("{} pivot tables", out.len());
    out
}

fn read_pivot(
    pkg: &mut Package,
    part: &str,
    caches: &HashMap<u32, CacheSource>,
    registry: &SheetRegistry,
    sheet_name: &str,
) -> Result<ImportedPivotTable, SkipReason> {
    let sheet_id = registry.resolve(sheet_name)?.to_string();
    let xml = pkg.require_part(part)?;
    let def = parse_pivot_definition(&xml);
    let location = def
        .location
        .ok_or_else(|| SkipReason::MalformedRef(format!("{part} location")))?;

    let cache_id = def.cache_id.unwrap_or_default();
    let source = match caches.get(&cache_id) {
        Some(source) => source.clone(),
        None => cache_from_rels(pkg, part).ok_or(SkipReason::UnresolvedPivotCache(cache_id))?,
    };

    let (anchor_cell, occupied) = layout(location, def.fields.filter_fields.len());
    Ok(ImportedPivotTable {
        id: String::new(),
        sheet_id,
        sheet_name: sheet_name.to_string(),
        source_range: PivotSourceRange {
            sheet_id: registry.id_for_name(&source.sheet_name).map(str::to_string),
            sheet_name: source.sheet_name,
            start_row: source.range.start_row,
            start_column: source.range.start_col,
            end_row: source.range.end_row,
            end_column: source.range.end_col,
        },
        anchor_cell,
        occupied_range: Some(occupied),
        fields: def.fields,
        name: def.name,
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"<pivotTableDefinition xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" name="PivotTable1" cacheId="5" dataCaption="Values">
  <location ref="A11:C20" firstHeaderRow="1" firstDataRow="2" firstDataCol="1" rowPageCount="2" colPageCount="1"/>
  <pivotFields count="4"><pivotField axis="axisRow" showAll="0"><items count="1"><item t="default"/></items></pivotField></pivotFields>
  <rowFields count="1"><field x="0"/></rowFields>
  <colFields count="2"><field x="-2"/><field x="3"/></colFields>
  <pageFields count="2"><pageField fld="1" hier="-1"/><pageField fld="2" hier="-1"/></pageFields>
  <dataFields count="1"><dataField name="Sum of Amount" fld="3" baseField="0" baseItem="0"/></dataFields>
</pivotTableDefinition>"#;

    #[test]
    fn test_definition_fields() {
        let def = parse_pivot_definition(DEFINITION.as_bytes());
        assert_eq!(def.name.as_deref(), Some("PivotTable1"));
        assert_eq!(def.cache_id, Some(5));
        assert_eq!(def.fields.row_fields, vec![0]);
        assert_eq!(def.fields.col_fields, vec![3]);
        assert_eq!(def.fields.filter_fields, vec![1, 2]);
        assert_eq!(def.fields.value_fields, vec![3]);
    }

    #[test]
    fn test_filter_rows_shift_anchor() {
        let def = parse_pivot_definition(DEFINITION.as_bytes());
        let (anchor, occupied) = layout(def.location.unwrap(), def.fields.filter_fields.len());
        // A11 is row 10; two filter fields take four rows
        assert_eq!(anchor, PivotAnchor { row: 6, col: 0 });
        assert_eq!(occupied.start_row, 6);
        assert_eq!(occupied.end_row, 19);
    }

    #[test]
    fn test_shift_clamps_at_zero() {
        let (anchor, _) = layout(CellRange::parse("B2:C4").unwrap(), 3);
        assert_eq!(anchor.row, 0);
        assert_eq!(anchor.col, 1);
    }

    #[test]
    fn test_cache_source() {
        let xml = br#"<pivotCacheDefinition><cacheSource type="worksheet"><worksheetSource ref="A1:D50" sheet="Raw Data"/></cacheSource></pivotCacheDefinition>"#;
        let source = parse_cache_source(xml).unwrap();
        assert_eq!(source.sheet_name, "Raw Data");
        assert_eq!(source.range.end_row, 49);
        assert_eq!(source.range.end_col, 3);

        let named = br#"<pivotCacheDefinition><cacheSource type="worksheet"><worksheetSource name="SalesTable"/></cacheSource></pivotCacheDefinition>"#;
        assert!(parse_cache_source(named).is_none());
    }

    #[test]
    fn test_workbook_cache_list() {
        let xml = br#"<workbook xmlns:r="r"><pivotCaches><pivotCache cacheId="5" r:id="rId4"/><pivotCache cacheId="6" r:id="rId5"/></pivotCaches></workbook>"#;
        assert_eq!(
            parse_pivot_cache_list(xml),
            vec![(5, "rId4".to_string()), (6, "rId5".to_string())]
        );
    }
}
