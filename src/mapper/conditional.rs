//! Conditional-format rules -> the canonical rule families.

use crate::cell_ref::CellRange;
use crate::source::{SourceCfRule, SourceCfValue, SourceConditionalFormat, SourceStyle};
use crate::types::{ColorStop, ConditionalRule, ImportedConditionalFormat, Style, Threshold};

use super::style::{map_style, BaseFont, Palette};

const DEFAULT_ICON_SET: &str = "3TrafficLights1";

/// Rule types rendered as a highlight of the matching cells.
const HIGHLIGHT_TYPES: &[&str] = &[
    "cellIs",
    "containsText",
    "notContainsText",
    "beginsWith",
    "endsWith",
    "containsBlanks",
    "notContainsBlanks",
    "containsErrors",
    "notContainsErrors",
    "duplicateValues",
    "uniqueValues",
    "timePeriod",
];

fn threshold(cfvo: &SourceCfValue) -> Threshold {
    Threshold {
        kind: cfvo.kind.clone(),
        value: cfvo.value.clone(),
    }
}

/// Normalize the space-separated `sqref` into A1 ranges, dropping the ones
/// that do not parse.
pub(crate) fn normalize_sqref(sqref: &str) -> Vec<String> {
    sqref
        .split_whitespace()
        .filter_map(CellRange::parse)
        .map(CellRange::to_a1)
        .collect()
}

fn dxf_style(rule: &SourceCfRule, dxfs: &[SourceStyle], palette: Palette) -> Option<Style> {
    let dxf = dxfs.get(rule.dxf_id?)?;
    map_style(dxf, &BaseFont::default(), palette)
}

pub(crate) fn map_rule(rule: &SourceCfRule, dxfs: &[SourceStyle], palette: Palette) -> ConditionalRule {
    match rule.rule_type.as_str() {
        "dataBar" => ConditionalRule::DataBar {
            color: rule.colors.first().and_then(|c| palette.resolve(c)),
            min: rule.cfvos.first().map(threshold),
            max: rule.cfvos.get(1).map(threshold),
        },
        "colorScale" => ConditionalRule::ColorScale {
            stops: rule
                .cfvos
                .iter()
                .enumerate()
                .map(|(i, cfvo)| ColorStop {
                    threshold: threshold(cfvo),
                    color: rule.colors.get(i).and_then(|c| palette.resolve(c)),
                })
                .collect(),
        },
        "iconSet" => ConditionalRule::IconSet {
            icon_set: rule
                .icon_set
                .clone()
                .unwrap_or_else(|| DEFAULT_ICON_SET.to_string()),
            thresholds: rule.cfvos.iter().map(threshold).collect(),
            reverse: rule.reverse,
            show_value: rule.show_value,
        },
        t if HIGHLIGHT_TYPES.contains(&t) => ConditionalRule::HighlightCell {
            rule_type: t.to_string(),
            operator: rule.operator.clone(),
            formulas: rule.formulas.clone(),
            text: rule.text.clone(),
            style: dxf_style(rule, dxfs, palette),
        },
        t => ConditionalRule::Other {
            rule_type: t.to_string(),
            attributes: rule.attributes.clone(),
            formulas: rule.formulas.clone(),
            style: dxf_style(rule, dxfs, palette),
        },
    }
}

/// One canonical entry per rule; the block's ranges are shared.
pub(crate) fn map_conditional_format(
    block: &SourceConditionalFormat,
    dxfs: &[SourceStyle],
    palette: Palette,
) -> Vec<ImportedConditionalFormat> {
    let ranges = normalize_sqref(&block.sqref);
    if ranges.is_empty() {
        return Vec::new();
    }
    block
        .rules
        .iter()
        .map(|rule| ImportedConditionalFormat {
            ranges: ranges.clone(),
            priority: rule.priority,
            stop_if_true: rule.stop_if_true,
            rule: map_rule(rule, dxfs, palette),
        })
        .collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::source::{ColorSpec, SourceFont};
    use std::collections::BTreeMap;

    fn palette() -> Palette<'static> {
        Palette {
            theme: &[],
            indexed: None,
        }
    }

    fn rgb(hex: &str) -> ColorSpec {
        ColorSpec {
            rgb: Some(hex.to_string()),
            ..ColorSpec::default()
        }
    }

    fn cfvo(kind: &str) -> SourceCfValue {
        SourceCfValue {
            kind: kind.to_string(),
            value: None,
        }
    }

    #[test]
    fn test_color_scale_stops() {
        let rule = SourceCfRule {
            rule_type: "colorScale".to_string(),
            cfvos: vec![cfvo("min"), cfvo("max")],
            colors: vec![rgb("FFF8696B"), rgb("FF63BE7B")],
            ..SourceCfRule::default()
        };
        let ConditionalRule::ColorScale { stops } = map_rule(&rule, &[], palette()) else {
            panic!("expected a color scale");
        };
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].threshold.kind, "min");
        assert_eq!(stops[1].color.as_deref(), Some("#63BE7B"));
    }

    #[test]
    fn test_highlight_uses_dxf() {
        let dxfs = vec![SourceStyle {
            font: SourceFont {
                bold: true,
                ..SourceFont::default()
            },
            fill: Some(rgb("FFFFC7CE")),
            ..SourceStyle::default()
        }];
        let rule = SourceCfRule {
            rule_type: "cellIs".to_string(),
            operator: Some("greaterThan".to_string()),
            formulas: vec!["100".to_string()],
            dxf_id: Some(0),
            ..SourceCfRule::default()
        };
        let ConditionalRule::HighlightCell {
            operator, style, ..
        } = map_rule(&rule, &dxfs, palette())
        else {
            panic!("expected a highlight rule");
        };
        assert_eq!(operator.as_deref(), Some("greaterThan"));
        let style = style.unwrap();
        assert_eq!(style.bold, Some(true));
        assert_eq!(style.background_color.as_deref(), Some("#FFC7CE"));
    }

    #[test]
    fn test_unknown_type_keeps_attributes() {
        let mut attributes = BTreeMap::new();
        attributes.insert("type".to_string(), "top10".to_string());
        attributes.insert("rank".to_string(), "5".to_string());
        let rule = SourceCfRule {
            rule_type: "top10".to_string(),
            attributes,
            ..SourceCfRule::default()
        };
        let ConditionalRule::Other { attributes, .. } = map_rule(&rule, &[], palette()) else {
            panic!("expected a passthrough rule");
        };
        assert_eq!(attributes.get("rank").map(String::as_str), Some("5"));
    }

    #[test]
    fn test_block_ranges() {
        let block = SourceConditionalFormat {
            sqref: "A1:A10 $C$2 bogus".to_string(),
            rules: vec![SourceCfRule {
                rule_type: "dataBar".to_string(),
                priority: 3,
                ..SourceCfRule::default()
            }],
        };
        let out = map_conditional_format(&block, &[], palette());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ranges, vec!["A1:A10".to_string(), "C2".to_string()]);
        assert_eq!(out[0].priority, 3);
    }
}
