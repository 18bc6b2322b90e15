//! Conditional formatting parsing module
//! Reads `<conditionalFormatting>` blocks into raw rules; classification into
//! the canonical rule families happens in the mapper.

use std::collections::BTreeMap;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::source::{SourceCfRule, SourceCfValue, SourceConditionalFormat};
use crate::xml_helpers::{attr_bool_default, attr_string, attr_u32, parse_color_attrs};

/// Parse conditional formatting rules from a `<conditionalFormatting>` element
///
/// # XML Format
/// ```xml
/// <conditionalFormatting sqref="A1:A10">
///   <cfRule type="colorScale" priority="1">
///     <colorScale>
///       <cfvo type="min"/>
///       <cfvo type="max"/>
///       <color rgb="FFF8696B"/>
///       <color rgb="FF63BE7B"/>
///     </colorScale>
///   </cfRule>
///   <cfRule type="cellIs" dxfId="0" priority="2" operator="greaterThan">
///     <formula>100</formula>
///   </cfRule>
/// </conditionalFormatting>
/// ```
///
/// Returns `None` when the block has no `sqref` or no rules.
pub fn parse_conditional_formatting<R: BufRead>(
    start_element: &BytesStart,
    xml: &mut Reader<R>,
) -> Option<SourceConditionalFormat> {
    let sqref = attr_string(start_element, b"sqref").unwrap_or_default();
    let mut rules = Vec::new();
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"cfRule" => {
                let mut rule = rule_header(e);
                parse_rule_body(xml, &mut rule);
                rules.push(rule);
            }
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"cfRule" => {
                rules.push(rule_header(e));
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"conditionalFormatting" => break,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    if sqref.trim().is_empty() || rules.is_empty() {
        return None;
    }
    Some(SourceConditionalFormat { sqref, rules })
}

/// Attributes of a `<cfRule>`; the full set is also kept verbatim.
fn rule_header(e: &BytesStart) -> SourceCfRule {
    let attributes: BTreeMap<String, String> = e
        .attributes()
        .flatten()
        .filter_map(|attr| {
            let key = std::str::from_utf8(attr.key.as_ref()).ok()?.to_string();
            let value = attr.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect();

    SourceCfRule {
        rule_type: attr_string(e, b"type").unwrap_or_default(),
        priority: attr_u32(e, b"priority").unwrap_or(0),
        stop_if_true: attr_bool_default(e, b"stopIfTrue", false),
        operator: attr_string(e, b"operator"),
        text: attr_string(e, b"text"),
        dxf_id: attr_u32(e, b"dxfId").and_then(|id| usize::try_from(id).ok()),
        show_value: true,
        attributes,
        ..SourceCfRule::default()
    }
}

/// Children of a `<cfRule>`: formulas, and the colorScale / dataBar /
/// iconSet payloads with their thresholds and colors.
fn parse_rule_body<R: BufRead>(xml: &mut Reader<R>, rule: &mut SourceCfRule) {
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"formula" => {
                rule.formulas.push(read_formula(xml));
            }
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"cfvo" => rule.cfvos.push(SourceCfValue {
                    kind: attr_string(e, b"type").unwrap_or_default(),
                    value: attr_string(e, b"val"),
                }),
                b"color" => rule.colors.push(parse_color_attrs(e)),
                b"iconSet" => {
                    rule.icon_set =
                        Some(attr_string(e, b"iconSet").unwrap_or_else(|| "3TrafficLights1".into()));
                    rule.reverse = attr_bool_default(e, b"reverse", false);
                    rule.show_value = attr_bool_default(e, b"showValue", true);
                }
                b"dataBar" => rule.show_value = attr_bool_default(e, b"showValue", true),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"cfRule" => break,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
}

/// Formula text up to `</formula>`.
fn read_formula<R: BufRead>(xml: &mut Reader<R>) -> String {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Text(ref t)) => {
                if let Ok(s) = t.unescape() {
                    text.push_str(&s);
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"formula" => break,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    text
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
    use crate::xml_helpers::xml_reader;

    fn parse_first(xml: &str) -> Option<SourceConditionalFormat> {
        let mut reader = xml_reader(xml.as_bytes());
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(ref e) if e.local_name().as_ref() == b"conditionalFormatting" => {
                    let e = e.clone().into_owned();
                    return parse_conditional_formatting(&e, &mut reader);
                }
                Event::Eof => return None,
                _ => {}
            }
            buf.clear();
        }
    }

    #[test]
    fn test_color_scale() {
        let cf = parse_first(
            r#"<worksheet><conditionalFormatting sqref="A1:A10">
<cfRule type="colorScale" priority="1"><colorScale>
<cfvo type="min"/><cfvo type="percentile" val="50"/><cfvo type="max"/>
<color rgb="FFF8696B"/><color rgb="FFFFEB84"/><color rgb="FF63BE7B"/>
</colorScale></cfRule></conditionalFormatting></worksheet>"#,
        )
        .unwrap();
        assert_eq!(cf.sqref, "A1:A10");
        let rule = &cf.rules[0];
        assert_eq!(rule.rule_type, "colorScale");
        assert_eq!(rule.cfvos.len(), 3);
        assert_eq!(rule.cfvos[1].value.as_deref(), Some("50"));
        assert_eq!(rule.colors.len(), 3);
    }

    #[test]
    fn test_cell_is_with_formula() {
        let cf = parse_first(
            r#"<worksheet><conditionalFormatting sqref="B2:B5 D2:D5">
<cfRule type="cellIs" dxfId="0" priority="2" operator="between" stopIfTrue="1">
<formula>10</formula><formula>&quot;x&quot;&amp;A1</formula></cfRule>
<cfRule type="duplicateValues" dxfId="1" priority="3"/>
</conditionalFormatting></worksheet>"#,
        )
        .unwrap();
        assert_eq!(cf.rules.len(), 2);
        let rule = &cf.rules[0];
        assert_eq!(rule.operator.as_deref(), Some("between"));
        assert_eq!(rule.formulas, vec!["10".to_string(), "\"x\"&A1".to_string()]);
        assert_eq!(rule.dxf_id, Some(0));
        assert!(rule.stop_if_true);
        assert_eq!(rule.attributes.get("priority").map(String::as_str), Some("2"));
        assert_eq!(cf.rules[1].rule_type, "duplicateValues");
    }

    #[test]
    fn test_icon_set() {
        let cf = parse_first(
            r#"<worksheet><conditionalFormatting sqref="C1:C9">
<cfRule type="iconSet" priority="1"><iconSet iconSet="3Arrows" reverse="1" showValue="0">
<cfvo type="percent" val="0"/><cfvo type="percent" val="33"/><cfvo type="percent" val="67"/>
</iconSet></cfRule></conditionalFormatting></worksheet>"#,
        )
        .unwrap();
        let rule = &cf.rules[0];
        assert_eq!(rule.icon_set.as_deref(), Some("3Arrows"));
        assert!(rule.reverse);
        assert!(!rule.show_value);
    }

    #[test]
    fn test_missing_sqref_is_dropped() {
        assert!(parse_first(
            r#"<worksheet><conditionalFormatting><cfRule type="expression" priority="1"/></conditionalFormatting></worksheet>"#
        )
        .is_none());
    }
}
