//! Rich text parsing module
//! This module handles shared-string items and inline strings, which are
//! either plain text or a list of runs with per-run font overrides.

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::source::{SourceFont, SourceRun};
use crate::xml_helpers::{attr_f64, attr_val, parse_color_attrs, toggle_val, xml_text_reader};

/// One entry of the shared-string table.
#[derive(Debug, Clone, PartialEq)]
pub enum SharedString {
    Plain(String),
    Rich(Vec<SourceRun>),
}

impl SharedString {
    pub fn text(&self) -> String {
        match self {
            Self::Plain(s) => s.clone(),
            Self::Rich(runs) => runs.iter().map(|r| r.text.as_str()).collect(),
        }
    }
}

/// Parse `xl/sharedStrings.xml`. A malformed part yields the items read so far.
pub fn parse_shared_strings(xml: &[u8]) -> Vec<SharedString> {
    let mut reader = xml_text_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(parse_string_item(&mut reader, b"si"));
            }
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(SharedString::Plain(String::new()));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("shared strings truncated after {} items: {e}", strings.len());
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    strings
}

/// Parse the body of an `<si>` or `<is>` element up to its end tag.
///
/// Structure:
/// ```xml
/// <si>
///   <t>Plain text</t>  -- OR --
///   <r><rPr>...</rPr><t>Styled</t></r>
///   <r><t>Normal</t></r>
/// </si>
/// ```
/// Phonetic runs (`<rPh>`) are skipped.
pub fn parse_string_item<R: BufRead>(xml: &mut Reader<R>, end_tag: &[u8]) -> SharedString {
    let mut buf = Vec::new();
    let mut plain_text: Option<String> = None;
    let mut runs: Vec<SourceRun> = Vec::new();
    let mut phonetic_depth = 0u32;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"rPh" | b"phoneticPr" => phonetic_depth += 1,
                _ if phonetic_depth > 0 => {}
                b"t" => {
                    let text = read_text_content(xml);
                    plain_text.get_or_insert_with(String::new).push_str(&text);
                }
                b"r" => runs.push(parse_run(xml)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if phonetic_depth == 0 && e.local_name().as_ref() == b"t" {
                    plain_text.get_or_insert_with(String::new);
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.local_name();
                if name.as_ref() == end_tag {
                    break;
                }
                if matches!(name.as_ref(), b"rPh" | b"phoneticPr") {
                    phonetic_depth = phonetic_depth.saturating_sub(1);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    if runs.is_empty() {
        SharedString::Plain(plain_text.unwrap_or_default())
    } else {
        SharedString::Rich(runs)
    }
}

/// Parse a single rich text run (`<r>` element)
///
/// Structure:
/// ```xml
/// <r>
///   <rPr><b/><sz val="12"/><color rgb="FFFF0000"/><rFont val="Arial"/></rPr>
///   <t>Text content</t>
/// </r>
/// ```
fn parse_run<R: BufRead>(xml: &mut Reader<R>) -> SourceRun {
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut font: Option<SourceFont> = None;

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"rPr" => font = Some(parse_run_properties(xml)),
                b"t" => text.push_str(&read_text_content(xml)),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"r" => break,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    SourceRun { text, font }
}

/// Parse run properties (`<rPr>` element) into a raw font.
fn parse_run_properties<R: BufRead>(xml: &mut Reader<R>) -> SourceFont {
    let mut buf = Vec::new();
    let mut font = SourceFont::default();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e) | Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"color" => font.color = Some(parse_color_attrs(e)),
                b"sz" => font.size = attr_f64(e, b"val"),
                b"rFont" => font.name = attr_val(e),
                b"b" => font.bold = toggle_val(e),
                b"i" => font.italic = toggle_val(e),
                b"u" => font.underline = attr_val(e).map_or(true, |v| v != "none"),
                b"strike" => font.strike = toggle_val(e),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"rPr" => break,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    font
}

/// Read text content from inside a <t> element until </t>
pub(crate) fn read_text_content<R: BufRead>(xml: &mut Reader<R>) -> String {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Text(ref e)) => {
                if let Ok(t) = e.unescape() {
                    text.push_str(&t);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Ok(t) = std::str::from_utf8(e.as_ref()) {
                    text.push_str(t);
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"t" => break,
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

    #[test]
    fn test_plain_and_rich_items() {
        let xml = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3">
<si><t xml:space="preserve"> padded </t></si>
<si><r><rPr><b/><sz val="12"/><color theme="4"/><rFont val="Arial"/></rPr><t>Bold</t></r><r><t xml:space="preserve"> plain</t></r></si>
<si><t/></si>
<si/>
</sst>"#;
        let strings = parse_shared_strings(xml.as_bytes());
        assert_eq!(strings.len(), 4);
        assert_eq!(strings[0], SharedString::Plain(" padded ".to_string()));
        let SharedString::Rich(runs) = &strings[1] else {
            panic!("expected rich text");
        };
        assert_eq!(runs.len(), 2);
        let font = runs[0].font.as_ref().unwrap();
        assert!(font.bold);
        assert_eq!(font.size, Some(12.0));
        assert_eq!(font.name.as_deref(), Some("Arial"));
        assert_eq!(font.color.as_ref().and_then(|c| c.theme), Some(4));
        assert!(runs[1].font.is_none());
        assert_eq!(strings[1].text(), "Bold plain");
        assert_eq!(strings[2].text(), "");
        assert_eq!(strings[3].text(), "");
    }

    #[test]
    fn test_phonetic_runs_skipped() {
        let xml = r#"<sst><si><t>東京</t><rPh sb="0" eb="2"><t>トウキョウ</t></rPh><phoneticPr fontId="1"/></si></sst>"#;
        let strings = parse_shared_strings(xml.as_bytes());
        assert_eq!(strings, vec![SharedString::Plain("東京".to_string())]);
    }

    #[test]
    fn test_entities_unescaped() {
        let xml = r#"<sst><si><t>R&amp;D &lt;2024&gt;</t></si></sst>"#;
        let strings = parse_shared_strings(xml.as_bytes());
        assert_eq!(strings[0].text(), "R&D <2024>");
    }
}
