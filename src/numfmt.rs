//! Number-format classification.
//!
//! This is a probe over the format string, not a format compiler: it answers
//! "is this a percent / currency / date ..." questions for the canonical
//! style descriptor. Ambiguous codes classify as non-date so plain numbers are
//! never turned into dates.

use crate::types::NumberFormatInfo;

/// Built-in number format IDs (0-49 are predefined by Excel)
/// See: ECMA-376 Part 1, Section 18.8.30
pub const fn get_builtin_format(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        5 => Some("$#,##0_);($#,##0)"),
        6 => Some("$#,##0_);[Red]($#,##0)"),
        7 => Some("$#,##0.00_);($#,##0.00)"),
        8 => Some("$#,##0.00_);[Red]($#,##0.00)"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        37 => Some("#,##0 ;(#,##0)"),
        38 => Some("#,##0 ;[Red](#,##0)"),
        39 => Some("#,##0.00;(#,##0.00)"),
        40 => Some("#,##0.00;[Red](#,##0.00)"),
        41 => Some("_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)"),
        42 => Some("_($* #,##0_);_($* (#,##0);_($* \"-\"_);_(@_)"),
        43 => Some("_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)"),
        44 => Some("_($* #,##0.00_);_($* (#,##0.00);_($* \"-\"??_);_(@_)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mmss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}

const CURRENCY_SYMBOLS: [char; 8] = ['$', '€', '£', '¥', '₹', '₩', '₽', '¤'];

const CJK_DATE_GLYPHS: [char; 6] = ['年', '月', '日', '时', '分', '秒'];

/// Split a format code into its `;`-separated sections, ignoring `;` inside quotes.
pub fn split_sections(format_code: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in format_code.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                sections.push(format_code.get(start..i).unwrap_or(""));
                start = i + 1;
            }
            _ => {}
        }
    }
    sections.push(format_code.get(start..).unwrap_or(""));
    sections
}

/// Lowercased section with quoted text, escapes, padding directives and
/// bracketed modifiers removed. Elapsed-time brackets (`[h]`, `[mm]`, `[ss]`)
/// keep their letters.
fn strip_literals(section: &str) -> String {
    let mut out = String::with_capacity(section.len());
    let mut chars = section.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let inner: String = chars.by_ref().take_while(|&b| b != ']').collect();
                let inner = inner.to_ascii_lowercase();
                if !inner.is_empty() && inner.chars().all(|ch| matches!(ch, 'h' | 'm' | 's')) {
                    out.push_str(&inner);
                }
            }
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Check if a format code displays dates or times.
///
/// Only the first section is probed. A bare `m` never decides on its own
/// since it also means minutes, and digit placeholders (`#`, `?`) rule the
/// code out.
pub fn is_date_format(format_code: &str) -> bool {
    let first = split_sections(format_code)
        .into_iter()
        .next()
        .unwrap_or_default();
    let cleaned = strip_literals(first);

    if cleaned.is_empty() || cleaned.contains("general") || cleaned == "@" {
        return false;
    }
    if cleaned.contains(CJK_DATE_GLYPHS) {
        return true;
    }
    if cleaned.contains(['#', '?']) || cleaned.contains("e+") || cleaned.contains("e-") {
        return false;
    }

    let has = |c: char| cleaned.contains(c);
    has('y') || has('d') || has('h') || (has('s') && (has(':') || has('m')))
}

/// Currency symbols anywhere in the code, or a `[$SYM-locale]` tag with a
/// non-empty symbol. Locale-only tags like `[$-409]` don't count.
fn has_currency_symbol(format_code: &str) -> bool {
    let mut chars = format_code.chars();
    while let Some(c) = chars.next() {
        if c == '[' {
            let inner: String = chars.by_ref().take_while(|&b| b != ']').collect();
            if let Some(tag) = inner.strip_prefix('$') {
                if !tag.split('-').next().unwrap_or("").is_empty() {
                    return true;
                }
            }
        } else if CURRENCY_SYMBOLS.contains(&c) {
            return true;
        }
    }
    false
}

/// Check if a format code uses scientific notation.
pub fn is_scientific_format(format_code: &str) -> bool {
    let cleaned = strip_literals(format_code);
    cleaned.contains("e+") || cleaned.contains("e-")
}

/// Number of digit placeholders after the first decimal point in the first
/// section (`"#,##0.00"` -> 2, `"0%"` -> 0).
pub fn decimal_places(format_code: &str) -> u32 {
    let first = split_sections(format_code)
        .into_iter()
        .next()
        .unwrap_or_default();
    let cleaned = strip_literals(first);
    cleaned.find('.').map_or(0, |dot| {
        let run = cleaned
            .get(dot + 1..)
            .unwrap_or("")
            .chars()
            .take_while(|c| matches!(c, '0' | '#' | '?'))
            .count();
        u32::try_from(run).unwrap_or(u32::MAX)
    })
}

/// Classify a format code into the canonical number-format descriptor.
pub fn classify_number_format(format_code: &str) -> NumberFormatInfo {
    let sections = split_sections(format_code);
    let first = sections.first().copied().unwrap_or_default();
    let cleaned = strip_literals(first);
    let is_date_time = is_date_format(format_code);

    NumberFormatInfo {
        pattern: format_code.to_string(),
        decimal_places: decimal_places(format_code),
        is_percent: cleaned.contains('%'),
        is_currency: has_currency_symbol(format_code),
        is_scientific: !is_date_time && is_scientific_format(first),
        has_thousands_separator: !is_date_time
            && cleaned.contains(',')
            && cleaned.contains(['0', '#']),
        is_date_time,
        has_negative_format: sections.len() >= 2,
    }
}

/// Resolve a style's format id and custom-format table to a pattern.
///
/// Custom formats win over built-ins; `General` (id 0) yields `None`.
pub fn resolve_format_code(
    num_fmt_id: u32,
    custom: &std::collections::HashMap<u32, String>,
) -> Option<String> {
    if let Some(code) = custom.get(&num_fmt_id) {
        return Some(code.clone());
    }
    match get_builtin_format(num_fmt_id) {
        Some("General") | None => None,
        Some(code) => Some(code.to_string()),
    }
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
    use std::collections::HashMap;
    use test_case::test_case;

    #[test]
    fn test_thousands_with_two_decimals() {
        let info = classify_number_format("#,##0.00");
        assert_eq!(info.decimal_places, 2);
        assert!(info.has_thousands_separator);
        assert!(!info.is_percent);
        assert!(!info.is_currency);
        assert!(!info.is_date_time);
        assert!(!info.has_negative_format);
    }

    #[test_case("yyyy-mm-dd", true)]
    #[test_case("m/d/yy h:mm", true)]
    #[test_case("h:mm:ss", true)]
    #[test_case("[h]:mm:ss", true)]
    #[test_case("mm:ss", true)]
    #[test_case("yyyy\"年\"m\"月\"d\"日\"", true)]
    #[test_case("General", false)]
    #[test_case("0.00", false)]
    #[test_case("#,##0", false)]
    #[test_case("0.00E+00", false)]
    #[test_case("\"Day\" 0", false)]
    #[test_case("[Red]0.00", false)]
    #[test_case("mmm", false)]
    #[test_case("@", false)]
    fn test_is_date_format(code: &str, expected: bool) {
        assert_eq!(is_date_format(code), expected, "{code}");
    }

    #[test]
    fn test_percent() {
        let info = classify_number_format("0.0%");
        assert!(info.is_percent);
        assert_eq!(info.decimal_places, 1);
    }

    #[test]
    fn test_currency_with_negative_section() {
        let info = classify_number_format("$#,##0.00_);[Red]($#,##0.00)");
        assert!(info.is_currency);
        assert!(info.has_thousands_separator);
        assert!(info.has_negative_format);
        assert_eq!(info.decimal_places, 2);
    }

    #[test]
    fn test_locale_currency_bracket() {
        let info = classify_number_format("[$€-407]#,##0.00");
        assert!(info.is_currency);
        assert!(!info.is_date_time);
    }

    #[test]
    fn test_locale_only_tag_is_not_currency() {
        assert!(!classify_number_format("[$-409]m/d/yy").is_currency);
        assert!(classify_number_format("[$USD-409] #,##0").is_currency);
    }

    #[test]
    fn test_scientific() {
        let info = classify_number_format("0.000E+00");
        assert!(info.is_scientific);
        assert_eq!(info.decimal_places, 3);
    }

    #[test]
    fn test_quoted_period_is_not_decimal() {
        assert_eq!(decimal_places("0\".\"00"), 0);
    }

    #[test]
    fn test_split_sections_respects_quotes() {
        assert_eq!(split_sections("0;\"a;b\";0"), vec!["0", "\"a;b\"", "0"]);
    }

    #[test]
    fn test_resolve_format_code() {
        let mut custom = HashMap::new();
        custom.insert(164, "0.000".to_string());
        assert_eq!(resolve_format_code(164, &custom), Some("0.000".to_string()));
        assert_eq!(resolve_format_code(14, &custom), Some("mm-dd-yy".to_string()));
        assert_eq!(resolve_format_code(0, &custom), None);
        assert_eq!(resolve_format_code(99, &custom), None);
    }
}
