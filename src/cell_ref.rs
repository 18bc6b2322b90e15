//! Utilities for parsing and formatting A1-style cell references and ranges.
//!
//! Everything here is 0-based internally; the 1-based spreadsheet address only
//! exists in strings.

use std::sync::OnceLock;

use regex::{Captures, Regex};

const LAST_ROW: i64 = 1_048_575;
const LAST_COL: i64 = 16_383;

/// Parse a cell reference like "A1" or "$B$7" into (col, row), 0-indexed.
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    parse_cell_ref_bytes(cell_ref.trim().as_bytes())
}

/// Bytes equivalent of [`parse_cell_ref`] for raw XML attribute values.
///
/// Letters must precede digits; anything else is rejected.
pub fn parse_cell_ref_bytes(ref_bytes: &[u8]) -> Option<(u32, u32)> {
    let mut col: u32 = 0;
    let mut row: u32 = 0;
    let mut saw_col = false;
    let mut saw_row = false;

    for &b in ref_bytes {
        if b == b'$' {
            continue;
        }
        if b.is_ascii_alphabetic() {
            if saw_row {
                return None;
            }
            let upper = b.to_ascii_uppercase();
            col = col
                .checked_mul(26)?
                .checked_add(u32::from(upper - b'A') + 1)?;
            saw_col = true;
        } else if b.is_ascii_digit() {
            row = row.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
            saw_row = true;
        } else {
            return None;
        }
    }

    if !saw_col || !saw_row || row == 0 {
        return None;
    }

    Some((col - 1, row - 1))
}

/// Parse only the column letters of a reference ("C7" -> 2, "$AA$1" -> 26).
pub fn parse_column_letters(cell_ref: &str) -> Option<u32> {
    let mut col: u32 = 0;
    let mut saw_col = false;
    for b in cell_ref.trim().bytes() {
        if b == b'$' && !saw_col {
            continue;
        }
        if !b.is_ascii_alphabetic() {
            break;
        }
        let upper = b.to_ascii_uppercase();
        col = col
            .checked_mul(26)?
            .checked_add(u32::from(upper - b'A') + 1)?;
        saw_col = true;
    }
    saw_col.then(|| col - 1)
}

/// Convert a 0-based column index to letters (0 -> "A", 26 -> "AA").
pub fn column_letters(col: u32) -> String {
    let mut n = u64::from(col) + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        // rem < 26, always fits
        out.push(b'A' + u8::try_from(rem).unwrap_or(0));
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Format a 0-based (row, col) as "A1".
pub fn to_a1(row: u32, col: u32) -> String {
    format!("{}{}", column_letters(col), u64::from(row) + 1)
}

/// Parse a cell range like "A1:B10" or "A1" into (start_row, start_col, end_row, end_col).
pub fn parse_cell_range(range: &str) -> Option<(u32, u32, u32, u32)> {
    if let Some((start, end)) = range.split_once(':') {
        let (start_col, start_row) = parse_cell_ref(start)?;
        let (end_col, end_row) = parse_cell_ref(end)?;
        Some((start_row, start_col, end_row, end_col))
    } else {
        let (start_col, start_row) = parse_cell_ref(range)?;
        Some((start_row, start_col, start_row, start_col))
    }
}

/// Parse sqref string into a list of (start_row, start_col, end_row, end_col) ranges.
pub fn parse_sqref(sqref: &str) -> Vec<(u32, u32, u32, u32)> {
    sqref.split_whitespace().filter_map(parse_cell_range).collect()
}

/// Rectangular 0-based inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl CellRange {
    /// Parse "A1:D6" (or a single cell). Corners are normalized so start <= end.
    pub fn parse(range: &str) -> Option<Self> {
        let (r1, c1, r2, c2) = parse_cell_range(range)?;
        Some(Self {
            start_row: r1.min(r2),
            start_col: c1.min(c2),
            end_row: r1.max(r2),
            end_col: c1.max(c2),
        })
    }

    /// Smallest range covering both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            start_row: self.start_row.min(other.start_row),
            start_col: self.start_col.min(other.start_col),
            end_row: self.end_row.max(other.end_row),
            end_col: self.end_col.max(other.end_col),
        }
    }

    /// Format as "A1:D6", or "A1" for a single cell.
    pub fn to_a1(self) -> String {
        let start = to_a1(self.start_row, self.start_col);
        if self.start_row == self.end_row && self.start_col == self.end_col {
            start
        } else {
            format!("{start}:{}", to_a1(self.end_row, self.end_col))
        }
    }
}

/// Split a qualified reference like `'My Sheet'!$A$1:$B$2` into sheet and range.
///
/// Quotes around the sheet name are removed and doubled quotes unescaped.
pub fn split_sheet_ref(reference: &str) -> (Option<String>, &str) {
    let reference = reference.trim().trim_start_matches('=');
    match reference.rsplit_once('!') {
        Some((sheet, range)) => {
            let sheet = sheet
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .map_or_else(|| sheet.to_string(), |s| s.replace("''", "'"));
            (Some(sheet), range)
        }
        None => (None, reference),
    }
}


fn formula_ref_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(\$?)([A-Za-z]{1,3})(\$?)([0-9]+)").ok())
        .as_ref()
}

/// Move the relative references in formula text by a row and column offset,
/// the way a shared formula reads in each cell it was filled into.
///
/// `$`-anchored parts stay put. String literals, quoted sheet names and
/// identifiers such as `LOG10(` or `Sheet2!` are left alone. A reference
/// pushed off the grid becomes `#REF!`.
pub fn shift_formula_refs(formula: &str, row_delta: i64, col_delta: i64) -> String {
    let Some(pattern) = formula_ref_pattern() else {
        return formula.to_string();
    };
    let mut out = String::with_capacity(formula.len());
    let mut code = String::new();
    let mut quote: Option<char> = None;
    for ch in formula.chars() {
        match quote {
            Some(open) => {
                out.push(ch);
                if ch == open {
                    quote = None;
                }
            }
            None if ch == '"' || ch == '\'' => {
                out.push_str(&shift_code(pattern, &code, row_delta, col_delta));
                code.clear();
                out.push(ch);
                quote = Some(ch);
            }
            None => code.push(ch),
        }
    }
    out.push_str(&shift_code(pattern, &code, row_delta, col_delta));
    out
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Shift the references of one unquoted stretch of formula text.
fn shift_code(pattern: &Regex, code: &str, row_delta: i64, col_delta: i64) -> String {
    pattern
        .replace_all(code, |caps: &Captures| {
            let Some(whole) = caps.get(0) else {
                return String::new();
            };
            let before = code.get(..whole.start()).and_then(|s| s.chars().next_back());
            let after = code.get(whole.end()..).and_then(|s| s.chars().next());
            let part_of_name = before.is_some_and(is_name_char)
                || after.is_some_and(|c| is_name_char(c) || c == '(' || c == '!');
            let col_anchor = caps.get(1).map_or("", |m| m.as_str());
            let row_anchor = caps.get(3).map_or("", |m| m.as_str());
            let col = caps.get(2).and_then(|m| parse_column_letters(m.as_str()));
            let row = caps.get(4).and_then(|m| m.as_str().parse::<i64>().ok());
            let (Some(col), Some(row)) = (col, row) else {
                return whole.as_str().to_string();
            };
            if part_of_name || row == 0 {
                return whole.as_str().to_string();
            }

            let col = i64::from(col) + if col_anchor.is_empty() { col_delta } else { 0 };
            let row = row - 1 + if row_anchor.is_empty() { row_delta } else { 0 };
            match (u32::try_from(col), u32::try_from(row)) {
                (Ok(col), Ok(row)) if i64::from(col) <= LAST_COL && i64::from(row) <= LAST_ROW => {
                    format!(
                        "{col_anchor}{}{row_anchor}{}",
                        column_letters(col),
                        u64::from(row) + 1
                    )
                }
                _ => "#REF!".to_string(),
            }
        })
        .into_owned()
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
    use test_case::test_case;

    #[test_case("A1", Some((0, 0)))]
    #[test_case("$B$7", Some((1, 6)))]
    #[test_case("AA10", Some((26, 9)))]
    #[test_case("xfd1048576", Some((16383, 1_048_575)))]
    #[test_case("A0", None)]
    #[test_case("1A", None)]
    #[test_case("", None)]
    fn test_parse_cell_ref(input: &str, expected: Option<(u32, u32)>) {
        assert_eq!(parse_cell_ref(input), expected);
    }

    #[test_case(0, "A")]
    #[test_case(25, "Z")]
    #[test_case(26, "AA")]
    #[test_case(701, "ZZ")]
    #[test_case(702, "AAA")]
    fn test_column_letters(col: u32, expected: &str) {
        assert_eq!(column_letters(col), expected);
        assert_eq!(parse_column_letters(expected), Some(col));
    }

    #[test]
    fn test_parse_cell_range() {
        assert_eq!(parse_cell_range("A1:B10"), Some((0, 0, 9, 1)));
        assert_eq!(parse_cell_range("C3"), Some((2, 2, 2, 2)));
        assert_eq!(parse_cell_range("C3:"), None);
    }

    #[test]
    fn test_range_union_and_format() {
        let a = CellRange::parse("$A$1:$A$6").unwrap();
        let b = CellRange::parse("$B$1:$D$6").unwrap();
        assert_eq!(a.union(b).to_a1(), "A1:D6");
        assert_eq!(CellRange::parse("B2").unwrap().to_a1(), "B2");
    }

    #[test]
    fn test_range_normalizes_reversed_corners() {
        let r = CellRange::parse("D6:A1").unwrap();
        assert_eq!(r.to_a1(), "A1:D6");
    }

    #[test]
    fn test_split_sheet_ref() {
        assert_eq!(
            split_sheet_ref("Sheet1!$A$1:$B$2"),
            (Some("Sheet1".to_string()), "$A$1:$B$2")
        );
        assert_eq!(
            split_sheet_ref("'Bob''s Data'!A1"),
            (Some("Bob's Data".to_string()), "A1")
        );
        assert_eq!(split_sheet_ref("A1:C3"), (None, "A1:C3"));
    }

    #[test]
    fn test_parse_sqref() {
        assert_eq!(parse_sqref("A1:B2 D4"), vec![(0, 0, 1, 1), (3, 3, 3, 3)]);
    }

    #[test_case("B1*2", 1, 0, "B2*2"; "row shift")]
    #[test_case("SUM(A1:A3)", 2, 1, "SUM(B3:B5)"; "range shift")]
    #[test_case("$A$1+A$1+$A1", 3, 2, "$A$1+C$1+$A4"; "anchors hold")]
    #[test_case("LOG10(A1)", 1, 0, "LOG10(A2)"; "function name kept")]
    #[test_case("Sheet2!B2&\"A1\"", 1, 1, "Sheet2!C3&\"A1\""; "sheet prefix and literal kept")]
    #[test_case("'Q1 Data'!A1", 1, 0, "'Q1 Data'!A2"; "quoted sheet kept")]
    #[test_case("A1-1", -1, 0, "#REF!-1"; "off the grid")]
    fn test_shift_formula_refs(formula: &str, rows: i64, cols: i64, expected: &str) {
        assert_eq!(shift_formula_refs(formula, rows, cols), expected);
    }
}
