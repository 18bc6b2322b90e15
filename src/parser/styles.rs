//! Style resolution - flattens `cellXfs` and their parent `cellStyleXfs`
//! into one [`SourceStyle`] per cell style index.

use crate::numfmt::resolve_format_code;
use crate::source::SourceStyle;
use crate::styles::{CellXf, StyleSheet};

/// Resolve every `cellXfs` entry, in index order.
pub(super) fn resolve_styles(stylesheet: &StyleSheet) -> Vec<SourceStyle> {
    stylesheet
        .cell_xfs
        .iter()
        .map(|xf| resolve_style(xf, stylesheet))
        .collect()
}

/// Pick a component id: the xf's own when it applies it, else the parent's.
fn component(own: Option<u32>, apply: bool, parent: Option<u32>) -> Option<u32> {
    if apply {
        own
    } else {
        parent.or(own)
    }
}

fn resolve_style(xf: &CellXf, stylesheet: &StyleSheet) -> SourceStyle {
    let parent = xf
        .xf_id
        .and_then(|id| stylesheet.cell_style_xfs.get(id as usize));
    let mut style = SourceStyle::default();

    let font_id = component(xf.font_id, xf.apply_font, parent.and_then(|p| p.font_id));
    if let Some(font) = font_id.and_then(|id| stylesheet.fonts.get(id as usize)) {
        style.font = font.clone();
    }

    let fill_id = component(xf.fill_id, xf.apply_fill, parent.and_then(|p| p.fill_id));
    style.fill = fill_id
        .and_then(|id| stylesheet.fills.get(id as usize))
        .and_then(|fill| fill.background().cloned());

    let border_id = component(
        xf.border_id,
        xf.apply_border,
        parent.and_then(|p| p.border_id),
    );
    if let Some(borders) = border_id.and_then(|id| stylesheet.borders.get(id as usize)) {
        style.borders = borders.clone();
    }

    let alignment = if xf.apply_alignment || xf.alignment.is_some() {
        xf.alignment.as_ref()
    } else {
        parent.and_then(|p| p.alignment.as_ref())
    };
    if let Some(align) = alignment {
        style.align_h = align.horizontal.clone();
        style.align_v = align.vertical.clone();
        style.wrap = align.wrap_text;
    }

    let num_fmt_id = component(
        xf.num_fmt_id,
        xf.apply_number_format,
        parent.and_then(|p| p.num_fmt_id),
    );
    style.num_fmt = num_fmt_id.and_then(|id| resolve_format_code(id, &stylesheet.num_fmts));

    style
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::styles::parse_styles;

    const STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts>
<fonts count="2">
  <font><sz val="11"/><name val="Calibri"/></font>
  <font><b/><sz val="14"/><color theme="4"/><name val="Arial"/></font>
</fonts>
<fills count="3">
  <fill><patternFill patternType="none"/></fill>
  <fill><patternFill patternType="gray125"/></fill>
  <fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/></patternFill></fill>
</fills>
<borders count="1"><border><left/><right/><top/><bottom/></border></borders>
<cellStyleXfs count="2">
  <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
  <xf numFmtId="0" fontId="1" fillId="2" borderId="0"><alignment horizontal="center"/></xf>
</cellStyleXfs>
<cellXfs count="4">
  <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
  <xf numFmtId="164" fontId="1" fillId="2" borderId="0" xfId="0" applyFont="1" applyFill="1" applyNumberFormat="1"/>
  <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="1"/>
  <xf numFmtId="4" fontId="0" fillId="0" borderId="0" xfId="1" applyFont="1" applyFill="1" applyNumberFormat="1" applyAlignment="1"/>
</cellXfs>
</styleSheet>"#;

    #[test]
    fn test_resolve_own_components() {
        let styles = resolve_styles(&parse_styles(STYLES.as_bytes()).unwrap());
        assert_eq!(styles.len(), 4);
        assert!(!styles[0].font.bold);
        assert!(styles[0].fill.is_none());
        assert!(styles[0].num_fmt.is_none());

        let s = &styles[1];
        assert!(s.font.bold);
        assert_eq!(s.font.name.as_deref(), Some("Arial"));
        assert_eq!(s.fill.as_ref().and_then(|c| c.rgb.as_deref()), Some("FFFFFF00"));
        assert_eq!(s.num_fmt.as_deref(), Some("yyyy-mm-dd"));
    }

    #[test]
    fn test_inherit_from_cell_style() {
        let styles = resolve_styles(&parse_styles(STYLES.as_bytes()).unwrap());
        let inherited = &styles[2];
        assert!(inherited.font.bold);
        assert!(inherited.fill.is_some());
        assert_eq!(inherited.align_h.as_deref(), Some("center"));

        // apply flags keep the xf's own ids
        let applied = &styles[3];
        assert!(!applied.font.bold);
        assert!(applied.fill.is_none());
        assert!(applied.align_h.is_none());
        assert_eq!(applied.num_fmt.as_deref(), Some("#,##0.00"));
    }
}
