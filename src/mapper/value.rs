//! Cell value resolution.
//!
//! Turns one [`SourceCell`] into the canonical value, formula, rich text and
//! hyperlink fields. Numbers that end up non-finite fall back to the cell's
//! stored text instead of leaking `NaN` downstream.

use crate::date::{format_date, format_serial, parse_date_string};
use crate::numfmt::is_date_format;
use crate::source::{SourceCell, SourceDate, SourceRun};
use crate::types::{CellValue, Hyperlink, RichTextRun, RunStyle};

use super::style::{map_run_style, Palette};

/// Per-cell inputs the value rules depend on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ValueContext<'a> {
    pub num_fmt: Option<&'a str>,
    pub date1904: bool,
    pub palette: Palette<'a>,
}

/// The value-bearing part of a canonical cell.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct ResolvedValue {
    pub value: Option<CellValue>,
    pub formula: Option<String>,
    pub rich_text: Option<Vec<RichTextRun>>,
    pub hyperlink: Option<Hyperlink>,
    /// The value was replaced by the stored text because it resolved to NaN.
    pub used_fallback: bool,
}

/// Prefix a formula with `=` unless it already has one.
pub(crate) fn normalize_formula(formula: &str) -> String {
    let trimmed = formula.trim();
    if trimmed.starts_with('=') {
        trimmed.to_string()
    } else {
        format!("={trimmed}")
    }
}

/// Resolve a cell. `raw` is the untouched stored text used as the NaN fallback.
pub(crate) fn resolve_value(
    cell: &SourceCell,
    raw: Option<&str>,
    ctx: &ValueContext,
) -> ResolvedValue {
    let mut out = ResolvedValue::default();
    match cell {
        SourceCell::Formula { formula, cached } => {
            let formula = normalize_formula(formula);
            out.value = match cached.as_deref() {
                Some(inner) => plain_value(inner, ctx),
                None => None,
            }
            .or_else(|| Some(CellValue::Text(formula.clone())));
            out.formula = Some(formula);
        }
        SourceCell::RichText(runs) => {
            let (text, rich) = flatten_runs(runs, ctx.palette);
            if !text.is_empty() {
                out.value = Some(CellValue::Text(text));
            }
            out.rich_text = (!rich.is_empty()).then_some(rich);
        }
        SourceCell::Hyperlink { text, url } => {
            let text = if text.is_empty() { url.clone() } else { text.clone() };
            out.value = Some(CellValue::Text(text.clone()));
            out.hyperlink = Some(Hyperlink {
                url: url.clone(),
                text,
            });
        }
        other => out.value = plain_value(other, ctx),
    }

    if out.value.as_ref().is_some_and(is_invalid) {
        out.value = fallback_value(raw);
        out.used_fallback = true;
    }
    out
}

/// Value of a non-compound cell (also used for a formula's cached result).
fn plain_value(cell: &SourceCell, ctx: &ValueContext) -> Option<CellValue> {
    match cell {
        SourceCell::Empty | SourceCell::Merged => None,
        SourceCell::Boolean(b) => Some(CellValue::Boolean(*b)),
        SourceCell::Text(s) | SourceCell::Error(s) => Some(CellValue::Text(s.clone())),
        SourceCell::Number(n) => Some(match ctx.num_fmt {
            Some(fmt) if is_date_format(fmt) => date_text(*n, fmt, ctx.date1904)
                .map_or(CellValue::Number(*n), CellValue::Text),
            _ => CellValue::Number(*n),
        }),
        SourceCell::Date(SourceDate::Serial(n)) => Some(match ctx.num_fmt {
            Some(fmt) if !is_date_format(fmt) => CellValue::Number(*n),
            fmt => date_text(*n, fmt.unwrap_or_default(), ctx.date1904)
                .map_or(CellValue::Number(*n), CellValue::Text),
        }),
        SourceCell::Date(SourceDate::Text(s)) => {
            let pattern = ctx.num_fmt.filter(|f| is_date_format(f)).unwrap_or_default();
            let rendered = parse_date_string(s)
                .map(|dt| format_date(dt, pattern))
                .filter(|t| !t.is_empty());
            Some(CellValue::Text(rendered.unwrap_or_else(|| s.clone())))
        }
        SourceCell::RichText(runs) => {
            let text: String = runs.iter().map(|r| r.text.as_str()).collect();
            (!text.is_empty()).then_some(CellValue::Text(text))
        }
        SourceCell::Hyperlink { text, .. } => Some(CellValue::Text(text.clone())),
        SourceCell::Formula { cached, .. } => {
            cached.as_deref().and_then(|inner| plain_value(inner, ctx))
        }
    }
}

fn date_text(serial: f64, pattern: &str, date1904: bool) -> Option<String> {
    let text = format_serial(serial, pattern, date1904);
    (!text.is_empty()).then_some(text)
}

fn is_invalid(value: &CellValue) -> bool {
    match value {
        CellValue::Number(n) => !n.is_finite(),
        CellValue::Text(s) => s.contains("NaN"),
        CellValue::Boolean(_) => false,
    }
}

/// Re-derive a displayable value from the stored text: a finite number if it
/// parses as one, else the text itself. Nothing usable yields no value.
fn fallback_value(raw: Option<&str>) -> Option<CellValue> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(CellValue::Number(n)),
        _ if raw.contains("NaN") => None,
        _ => Some(CellValue::Text(raw.to_string())),
    }
}

/// Concatenate run text; styled runs become char-offset ranges.
fn flatten_runs(runs: &[SourceRun], palette: Palette) -> (String, Vec<RichTextRun>) {
    let mut text = String::new();
    let mut rich = Vec::new();
    let mut offset = 0usize;
    for run in runs {
        let len = run.text.chars().count();
        text.push_str(&run.text);
        if let Some(font) = &run.font {
            let style = map_run_style(font, palette);
            if len > 0 && style != RunStyle::default() {
                rich.push(RichTextRun {
                    start: offset,
                    end: offset + len,
                    style,
                });
            }
        }
        offset += len;
    }
    (text, rich)
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
    use crate::source::SourceFont;

    const THEME: &[String] = &[];

    fn ctx(num_fmt: Option<&str>) -> ValueContext<'_> {
        ValueContext {
            num_fmt,
            date1904: false,
            palette: Palette {
                theme: THEME,
                indexed: None,
            },
        }
    }

    #[test]
    fn test_formula_prefers_cached() {
        let cell = SourceCell::Formula {
            formula: "SUM(A1:A3)".to_string(),
            cached: Some(Box::new(SourceCell::Number(42.0))),
        };
        let out = resolve_value(&cell, Some("42"), &ctx(None));
        assert_eq!(out.formula.as_deref(), Some("=SUM(A1:A3)"));
        assert_eq!(out.value, Some(CellValue::Number(42.0)));
    }

    #[test]
    fn test_formula_without_cache_uses_text() {
        let cell = SourceCell::Formula {
            formula: "=NOW()".to_string(),
            cached: None,
        };
        let out = resolve_value(&cell, None, &ctx(None));
        assert_eq!(out.formula.as_deref(), Some("=NOW()"));
        assert_eq!(out.value, Some(CellValue::Text("=NOW()".to_string())));
    }

    #[test]
    fn test_date_number_formats() {
        let date = resolve_value(&SourceCell::Number(45306.0), None, &ctx(Some("yyyy-mm-dd")));
        assert_eq!(date.value, Some(CellValue::Text("2024-01-15".to_string())));

        let plain = resolve_value(&SourceCell::Number(45306.0), None, &ctx(Some("0.00")));
        assert_eq!(plain.value, Some(CellValue::Number(45306.0)));
    }

    #[test]
    fn test_date_serial_keeps_raw_for_numeric_format() {
        let cell = SourceCell::Date(SourceDate::Serial(45306.0));
        let out = resolve_value(&cell, None, &ctx(Some("#,##0")));
        assert_eq!(out.value, Some(CellValue::Number(45306.0)));

        let out = resolve_value(&cell, None, &ctx(None));
        assert_eq!(out.value, Some(CellValue::Text("2024-01-15".to_string())));
    }

    #[test]
    fn test_nan_falls_back_to_raw() {
        let out = resolve_value(&SourceCell::Number(f64::NAN), Some("n/a"), &ctx(None));
        assert!(out.used_fallback);
        assert_eq!(out.value, Some(CellValue::Text("n/a".to_string())));

        let out = resolve_value(&SourceCell::Number(f64::INFINITY), Some("NaN"), &ctx(None));
        assert!(out.used_fallback);
        assert_eq!(out.value, None);
    }

    #[test]
    fn test_rich_text_offsets_count_chars() {
        let cell = SourceCell::RichText(vec![
            SourceRun {
                text: "héllo ".to_string(),
                font: None,
            },
            SourceRun {
                text: "wörld".to_string(),
                font: Some(SourceFont {
                    bold: true,
                    ..SourceFont::default()
                }),
            },
        ]);
        let out = resolve_value(&cell, None, &ctx(None));
        assert_eq!(out.value, Some(CellValue::Text("héllo wörld".to_string())));
        let runs = out.rich_text.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!((runs[0].start, runs[0].end), (6, 11));
        assert_eq!(runs[0].style.bold, Some(true));
    }

    #[test]
    fn test_hyperlink_and_merged() {
        let link = SourceCell::Hyperlink {
            text: String::new(),
            url: "https://example.com".to_string(),
        };
        let out = resolve_value(&link, None, &ctx(None));
        assert_eq!(out.hyperlink.unwrap().text, "https://example.com");

        let merged = resolve_value(&SourceCell::Merged, None, &ctx(None));
        assert_eq!(merged, ResolvedValue::default());
    }
}
