//! Hyperlink parsing module
//! Sheet XML lists `<hyperlink>` elements; external targets live in the
//! sheet's relationship file, internal ones in the `location` attribute.

use quick_xml::events::BytesStart;

use crate::cell_ref::parse_cell_ref;
use crate::package::{rel_type, Relationship};
use crate::source::{SourceCell, SourceCellRecord};
use crate::xml_helpers::{attr_string, attr_string_local};

/// Intermediate hyperlink data parsed from sheet XML
/// Contains the r:id reference that needs to be resolved via relationships
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHyperlink {
    /// Cell reference (e.g., "A1", or a range whose first cell is used)
    pub cell_ref: String,
    /// Relationship ID for external links (e.g., "rId1")
    pub r_id: Option<String>,
    /// Internal location (e.g., "Sheet2!A1")
    pub location: Option<String>,
    pub display: Option<String>,
}

/// A hyperlink with its target known, addressed by 0-based cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHyperlink {
    pub row: u32,
    pub col: u32,
    pub url: String,
    pub display: Option<String>,
}

/// Parse a single hyperlink element
pub fn parse_hyperlink_element(e: &BytesStart<'_>) -> Option<RawHyperlink> {
    let cell_ref = attr_string(e, b"ref").filter(|s| !s.is_empty())?;
    let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
    Some(RawHyperlink {
        cell_ref,
        r_id: non_empty(attr_string_local(e, b"id")),
        location: non_empty(attr_string(e, b"location")),
        display: non_empty(attr_string(e, b"display")),
    })
}

/// Resolve raw hyperlinks against the sheet's relationships.
///
/// External targets keep any `location` as a fragment; internal links
/// become `#Sheet!A1`. Links whose `r:id` does not resolve are dropped.
pub fn resolve_hyperlinks(raw: &[RawHyperlink], rels: &[Relationship]) -> Vec<ResolvedHyperlink> {
    raw.iter()
        .filter_map(|link| {
            let anchor = link.cell_ref.split(':').next().unwrap_or(&link.cell_ref);
            let (col, row) = parse_cell_ref(anchor)?;

            let url = if let Some(ref r_id) = link.r_id {
                let rel = rels
                    .iter()
                    .find(|rel| &rel.id == r_id && rel.is_type(rel_type::HYPERLINK))?;
                match link.location {
                    Some(ref loc) => format!("{}#{loc}", rel.target),
                    None => rel.target.clone(),
                }
            } else {
                format!("#{}", link.location.as_ref()?)
            };

            Some(ResolvedHyperlink {
                row,
                col,
                url,
                display: link.display.clone(),
            })
        })
        .collect()
}

/// Turn the addressed cells into hyperlink cells, creating text cells for
/// links that sit on an empty position.
pub fn apply_hyperlinks(cells: &mut Vec<SourceCellRecord>, links: Vec<ResolvedHyperlink>) {
    for link in links {
        if let Some(record) = cells
            .iter_mut()
            .find(|r| r.row == link.row && r.col == link.col)
        {
            let text = match record.cell.plain_text() {
                t if t.is_empty() => link.display.unwrap_or_else(|| link.url.clone()),
                t => t,
            };
            // formula cells keep their formula; the link rides on the cached value
            match record.cell {
                SourceCell::Formula { ref mut cached, .. } => {
                    *cached = Some(Box::new(SourceCell::Hyperlink {
                        text,
                        url: link.url,
                    }));
                }
                _ => {
                    record.cell = SourceCell::Hyperlink {
                        text,
                        url: link.url,
                    };
                }
            }
        } else {
            cells.push(SourceCellRecord {
                row: link.row,
                col: link.col,
                cell: SourceCell::Hyperlink {
                    text: link.display.unwrap_or_else(|| link.url.clone()),
                    url: link.url,
                },
                style: None,
                raw: None,
            });
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
    use crate::package::parse_relationships;
    use crate::xml_helpers::xml_reader;
    use quick_xml::events::Event;

    fn parse_all(xml: &str) -> Vec<RawHyperlink> {
        let mut reader = xml_reader(xml.as_bytes());
        let mut buf = Vec::new();
        let mut out = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(ref e) | Event::Empty(ref e)
                    if e.local_name().as_ref() == b"hyperlink" =>
                {
                    out.extend(parse_hyperlink_element(e));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        out
    }

    const SHEET: &str = r#"<worksheet xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<hyperlinks>
  <hyperlink ref="A1" r:id="rId1" display="Click here"/>
  <hyperlink ref="B2" location="Sheet2!A1" display="Go to Sheet2"/>
  <hyperlink ref="C3:D4" r:id="rId9"/>
  <hyperlink ref="E5"/>
</hyperlinks>
</worksheet>"#;

    const RELS: &str = r#"<Relationships>
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn test_parse_hyperlink_elements() {
        let raw = parse_all(SHEET);
        assert_eq!(raw.len(), 4);
        assert_eq!(raw[0].r_id.as_deref(), Some("rId1"));
        assert_eq!(raw[1].location.as_deref(), Some("Sheet2!A1"));
        assert_eq!(raw[2].cell_ref, "C3:D4");
    }

    #[test]
    fn test_resolve_hyperlinks() {
        let rels = parse_relationships(RELS.as_bytes(), "xl/worksheets/sheet1.xml");
        let resolved = resolve_hyperlinks(&parse_all(SHEET), &rels);
        // rId9 is dangling, E5 has no target
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].url, "https://example.com");
        assert_eq!((resolved[0].row, resolved[0].col), (0, 0));
        assert_eq!(resolved[1].url, "#Sheet2!A1");
        assert_eq!((resolved[1].row, resolved[1].col), (1, 1));
    }

    #[test]
    fn test_apply_hyperlinks() {
        let mut cells = vec![SourceCellRecord {
            row: 0,
            col: 0,
            cell: SourceCell::Text("Docs".to_string()),
            style: Some(3),
            raw: None,
        }];
        let links = vec![
            ResolvedHyperlink {
                row: 0,
                col: 0,
                url: "https://example.com".to_string(),
                display: Some("ignored".to_string()),
            },
            ResolvedHyperlink {
                row: 4,
                col: 2,
                url: "#Sheet2!A1".to_string(),
                display: Some("Jump".to_string()),
            },
        ];
        apply_hyperlinks(&mut cells, links);
        assert_eq!(
            cells[0].cell,
            SourceCell::Hyperlink {
                text: "Docs".to_string(),
                url: "https://example.com".to_string()
            }
        );
        assert_eq!(cells[0].style, Some(3));
        assert_eq!(
            cells[1].cell,
            SourceCell::Hyperlink {
                text: "Jump".to_string(),
                url: "#Sheet2!A1".to_string()
            }
        );
    }
}
