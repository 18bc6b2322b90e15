//! Color resolution
//!
//! Turns a source color reference (direct RGB, theme index + tint, or legacy
//! palette index) into `#RRGGBB`.

use crate::source::ColorSpec;

/// Excel's 64 indexed colors (legacy palette)
pub const INDEXED_COLORS: [&str; 64] = [
    "#000000", "#FFFFFF", "#FF0000", "#00FF00", "#0000FF", "#FFFF00", "#FF00FF", "#00FFFF",
    "#000000", "#FFFFFF", "#FF0000", "#00FF00", "#0000FF", "#FFFF00", "#FF00FF", "#00FFFF",
    "#800000", "#008000", "#000080", "#808000", "#800080", "#008080", "#C0C0C0", "#808080",
    "#9999FF", "#993366", "#FFFFCC", "#CCFFFF", "#660066", "#FF8080", "#0066CC", "#CCCCFF",
    "#000080", "#FF00FF", "#FFFF00", "#00FFFF", "#800080", "#800000", "#008080", "#0000FF",
    "#00CCFF", "#CCFFFF", "#CCFFCC", "#FFFF99", "#99CCFF", "#FF99CC", "#CC99FF", "#FFCC99",
    "#3366FF", "#33CCCC", "#99CC00", "#FFCC00", "#FF9900", "#FF6600", "#666699", "#969696",
    "#003366", "#339966", "#003300", "#333300", "#993300", "#993366", "#333399", "#333333",
];

/// Office theme palette, used when the package has no theme part.
///
/// Order follows the `theme` attribute numbering: lt1, dk1, lt2, dk2,
/// accent1-6, hlink, folHlink.
pub const DEFAULT_THEME_COLORS: [&str; 12] = [
    "#FFFFFF", "#000000", "#E7E6E6", "#44546A", "#4472C4", "#ED7D31", "#A5A5A5", "#FFC000",
    "#5B9BD5", "#70AD47", "#0563C1", "#954F72",
];

/// The default palette as owned strings.
pub fn default_theme_colors() -> Vec<String> {
    DEFAULT_THEME_COLORS.iter().map(|c| (*c).to_string()).collect()
}

/// Resolve a `ColorSpec` to an `#RRGGBB` string.
///
/// Priority: direct rgb, then theme (+ tint), then indexed palette. Anything
/// else, including `auto` and the system indices 64/65, is unresolved.
pub fn resolve_color(
    color: &ColorSpec,
    theme_colors: &[String],
    indexed_colors: Option<&[String]>,
) -> Option<String> {
    if let Some(rgb) = color.rgb.as_deref().and_then(normalize_rgb) {
        return Some(rgb);
    }

    if let Some(theme_idx) = color.theme {
        let idx = usize::try_from(theme_idx).ok()?;
        let base = theme_colors
            .get(idx)
            .map(String::as_str)
            .or_else(|| DEFAULT_THEME_COLORS.get(idx).copied())
            .and_then(normalize_rgb);
        if let Some(base) = base {
            return Some(match color.tint {
                Some(tint) => apply_tint(&base, tint),
                None => base,
            });
        }
    }

    if let Some(indexed) = color.indexed {
        let idx = usize::try_from(indexed).ok()?;
        let custom = indexed_colors.and_then(|palette| palette.get(idx));
        if let Some(c) = custom.and_then(|c| normalize_rgb(c)) {
            return Some(c);
        }
        return INDEXED_COLORS.get(idx).map(|c| (*c).to_string());
    }

    None
}

/// Normalize `RRGGBB`, `#RRGGBB` or `AARRGGBB` to uppercase `#RRGGBB`.
pub fn normalize_rgb(raw: &str) -> Option<String> {
    let hex = raw.trim().trim_start_matches('#');
    let rgb = match hex.len() {
        8 => hex.get(2..)?,
        6 => hex,
        _ => return None,
    };
    if !rgb.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", rgb.to_ascii_uppercase()))
}

fn hex_channels(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    };
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

/// Apply a tint in RGB space.
///
/// Positive tint moves each channel toward 255 by `tint` of its remaining
/// distance; negative tint scales each channel toward 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn apply_tint(hex_color: &str, tint: f64) -> String {
    let Some(channels) = hex_channels(hex_color) else {
        return hex_color.to_string();
    };
    let tint = if tint.is_finite() {
        tint.clamp(-1.0, 1.0)
    } else {
        0.0
    };

    let [r, g, b] = channels.map(|c| {
        let c = f64::from(c);
        let v = if tint > 0.0 {
            (255.0 - c).mul_add(tint, c)
        } else {
            c * (1.0 + tint)
        };
        // clamped to 0..=255 above, cast is exact
        v.round().clamp(0.0, 255.0) as u8
    });

    format!("#{r:02X}{g:02X}{b:02X}")
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
    use test_case::test_case;

    fn theme_color(theme: u32, tint: Option<f64>) -> ColorSpec {
        ColorSpec {
            theme: Some(theme),
            tint,
            ..ColorSpec::default()
        }
    }

    #[test]
    fn test_accent1_lighter_40() {
        let resolved = resolve_color(&theme_color(4, Some(0.4)), &default_theme_colors(), None);
        assert_eq!(resolved.as_deref(), Some("#8FAADC"));

        let base = hex_channels("#4472C4").unwrap();
        let tinted = hex_channels("#8FAADC").unwrap();
        for (b, t) in base.iter().zip(tinted.iter()) {
            let expected = f64::from(*b) + (255.0 - f64::from(*b)) * 0.4;
            assert!((f64::from(*t) - expected).abs() <= 0.5);
        }
    }

    #[test]
    fn test_tint_darken() {
        assert_eq!(apply_tint("#FFFFFF", -0.5), "#808080");
        assert_eq!(apply_tint("#000000", 0.5), "#808080");
    }

    #[test_case("FFFFFF00", Some("#FFFF00"))]
    #[test_case("ff0000", Some("#FF0000"))]
    #[test_case("#00FF00", Some("#00FF00"))]
    #[test_case("F00", None)]
    #[test_case("ZZZZZZ", None)]
    fn test_normalize_rgb(input: &str, expected: Option<&str>) {
        assert_eq!(normalize_rgb(input).as_deref(), expected);
    }

    #[test]
    fn test_rgb_beats_theme() {
        let color = ColorSpec {
            rgb: Some("FFC00000".to_string()),
            theme: Some(4),
            ..ColorSpec::default()
        };
        assert_eq!(
            resolve_color(&color, &default_theme_colors(), None).as_deref(),
            Some("#C00000")
        );
    }

    #[test]
    fn test_theme_falls_back_to_default_palette() {
        let resolved = resolve_color(&theme_color(5, None), &[], None);
        assert_eq!(resolved.as_deref(), Some("#ED7D31"));
    }

    #[test]
    fn test_indexed_custom_palette_then_default() {
        let custom = vec!["#111111".to_string(), "#222222".to_string()];
        let color = ColorSpec {
            indexed: Some(1),
            ..ColorSpec::default()
        };
        assert_eq!(
            resolve_color(&color, &[], Some(custom.as_slice())).as_deref(),
            Some("#222222")
        );
        let color = ColorSpec {
            indexed: Some(10),
            ..ColorSpec::default()
        };
        assert_eq!(
            resolve_color(&color, &[], Some(custom.as_slice())).as_deref(),
            Some("#FF0000")
        );
    }

    #[test]
    fn test_unresolved() {
        let auto = ColorSpec {
            auto: true,
            ..ColorSpec::default()
        };
        assert_eq!(resolve_color(&auto, &default_theme_colors(), None), None);
        let system = ColorSpec {
            indexed: Some(64),
            ..ColorSpec::default()
        };
        assert_eq!(resolve_color(&system, &default_theme_colors(), None), None);
    }
}
