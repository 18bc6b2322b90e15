//! Shared XML attribute accessors for the package readers.
//!
//! All lookups go through the streaming `quick_xml` reader; attribute values
//! are entity-unescaped so names such as `R&amp;D` come back as `R&D`.

use quick_xml::events::BytesStart;
use quick_xml::Reader;

use crate::source::ColorSpec;

/// Build a trimming reader over an in-memory XML part.
pub fn xml_reader(xml: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);
    reader
}

/// Build a reader that keeps whitespace, for parts where text content is
/// significant (shared strings, worksheet cell values).
pub fn xml_text_reader(xml: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    reader
}

/// Extract a string attribute value by its full (possibly prefixed) key.
///
/// Returns `None` if the attribute is missing or cannot be unescaped.
pub fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Extract a string attribute by local name, ignoring any namespace prefix.
///
/// Used for `r:id` / `r:embed`, whose prefix varies between producers.
pub fn attr_string_local(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Extract a `u32` attribute value by key.
pub fn attr_u32(e: &BytesStart, key: &[u8]) -> Option<u32> {
    attr_string(e, key).and_then(|s| s.trim().parse().ok())
}

/// Extract an `i32` attribute value by key.
pub fn attr_i32(e: &BytesStart, key: &[u8]) -> Option<i32> {
    attr_string(e, key).and_then(|s| s.trim().parse().ok())
}

/// Extract an `f64` attribute value by key. Non-finite values are rejected.
pub fn attr_f64(e: &BytesStart, key: &[u8]) -> Option<f64> {
    attr_string(e, key)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Extract a boolean attribute value by key.
///
/// Returns `None` if missing. `"1"` and `"true"` are true; anything else is false.
pub fn attr_bool(e: &BytesStart, key: &[u8]) -> Option<bool> {
    attr_string(e, key).map(|s| matches!(s.as_str(), "1" | "true"))
}

/// Extract a boolean attribute with a default value.
pub fn attr_bool_default(e: &BytesStart, key: &[u8], default: bool) -> bool {
    attr_bool(e, key).unwrap_or(default)
}

/// Extract the `val` attribute as a string. Very common in SpreadsheetML.
pub fn attr_val(e: &BytesStart) -> Option<String> {
    attr_string(e, b"val")
}

/// Extract the `val` attribute as `u32`.
pub fn attr_val_u32(e: &BytesStart) -> Option<u32> {
    attr_u32(e, b"val")
}

/// Boolean toggle elements like `<b/>` or `<i val="0"/>`: absent `val` means on.
pub fn toggle_val(e: &BytesStart) -> bool {
    attr_val(e).map_or(true, |v| !matches!(v.as_str(), "0" | "false"))
}

/// Parse color attributes from an XML element into a `ColorSpec`.
///
/// Handles `rgb`, `theme`, `tint`, `indexed`, and `auto`.
pub fn parse_color_attrs(e: &BytesStart) -> ColorSpec {
    ColorSpec {
        rgb: attr_string(e, b"rgb"),
        theme: attr_u32(e, b"theme"),
        tint: attr_f64(e, b"tint"),
        indexed: attr_u32(e, b"indexed"),
        auto: attr_bool_default(e, b"auto", false),
    }
}

/// Get the local element name as an owned string.
///
/// Returns empty string if not valid UTF-8.
#[inline]
pub fn local_name_string(e: &BytesStart) -> String {
    let bytes = e.local_name();
    std::str::from_utf8(bytes.as_ref())
        .unwrap_or("")
        .to_string()
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

    fn make_start(xml: &str) -> BytesStart<'_> {
        let content = xml
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim_end_matches('/')
            .trim_end();
        BytesStart::from_content(content, content.find(' ').unwrap_or(content.len()))
    }

    #[test]
    fn test_attr_string_unescapes() {
        let e = make_start(r#"<sheet name="R&amp;D" />"#);
        assert_eq!(attr_string(&e, b"name"), Some("R&D".to_string()));
        assert_eq!(attr_string(&e, b"missing"), None);
    }

    #[test]
    fn test_attr_string_local_ignores_prefix() {
        let e = make_start(r#"<sheet name="A" r:id="rId3" />"#);
        assert_eq!(attr_string_local(&e, b"id"), Some("rId3".to_string()));
        assert_eq!(attr_string(&e, b"id"), None);
    }

    #[test]
    fn test_attr_numbers() {
        let e = make_start(r#"<foo count="42" tint="-0.25" bad="NaN" />"#);
        assert_eq!(attr_u32(&e, b"count"), Some(42));
        assert_eq!(attr_f64(&e, b"tint"), Some(-0.25));
        assert_eq!(attr_f64(&e, b"bad"), None);
    }

    #[test]
    fn test_attr_bool() {
        let e = make_start(r#"<foo a="1" b="0" c="true" d="false" />"#);
        assert_eq!(attr_bool(&e, b"a"), Some(true));
        assert_eq!(attr_bool(&e, b"b"), Some(false));
        assert_eq!(attr_bool(&e, b"c"), Some(true));
        assert_eq!(attr_bool(&e, b"d"), Some(false));
        assert!(attr_bool_default(&e, b"missing", true));
    }

    #[test]
    fn test_toggle_val() {
        assert!(toggle_val(&make_start("<b/>")));
        assert!(!toggle_val(&make_start(r#"<b val="0"/>"#)));
    }

    #[test]
    fn test_parse_color_attrs() {
        let e = make_start(r#"<color theme="4" tint="0.4" />"#);
        let color = parse_color_attrs(&e);
        assert_eq!(color.theme, Some(4));
        assert_eq!(color.tint, Some(0.4));
        assert_eq!(color.rgb, None);
        assert!(!color.auto);
    }
}
