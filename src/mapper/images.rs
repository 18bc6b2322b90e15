//! Floating and cell-hosted image artifacts.

use crate::cell_images::CellImageMarker;
use crate::config::ImportOptions;
use crate::drawings::{data_uri, mime_for_path};
use crate::source::{AnchorPoint, MediaFile, SourceImage};
use crate::types::{AnchorPosition, ImageKind, ImportedImage, Size};

/// EMU per pixel at 96 DPI.
pub(crate) const EMU_PER_PIXEL: f64 = 9525.0;

#[allow(clippy::cast_precision_loss)]
pub(crate) fn emu_to_px(emu: i64) -> f64 {
    emu as f64 / EMU_PER_PIXEL
}

/// Anchor point -> canonical position with pixel offsets.
pub(crate) fn anchor_position(point: &AnchorPoint) -> AnchorPosition {
    AnchorPosition {
        row: point.row,
        column: point.col,
        row_offset: emu_to_px(point.row_off),
        column_offset: emu_to_px(point.col_off),
    }
}

/// Per-sheet inputs for image sizing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CellMetrics {
    pub row_height: f64,
    pub column_width: f64,
}

/// Pixel size of a floating image: the explicit extent when present, else
/// the covered cell span at default cell size. Both edges are clamped to
/// the configured minimum.
pub(crate) fn floating_size(image: &SourceImage, metrics: CellMetrics, min: f64) -> Size {
    let (width, height) = match (image.extent, image.to) {
        (Some((cx, cy)), _) if cx > 0 && cy > 0 => (emu_to_px(cx), emu_to_px(cy)),
        (_, Some(to)) => {
            let cols = f64::from(to.col.saturating_sub(image.from.col));
            let rows = f64::from(to.row.saturating_sub(image.from.row));
            (
                cols * metrics.column_width + emu_to_px(to.col_off) - emu_to_px(image.from.col_off),
                rows * metrics.row_height + emu_to_px(to.row_off) - emu_to_px(image.from.row_off),
            )
        }
        _ => (metrics.column_width, metrics.row_height),
    };
    Size {
        width: width.max(min),
        height: height.max(min),
    }
}

pub(crate) fn floating_image(
    image: &SourceImage,
    id: String,
    sheet_id: &str,
    metrics: CellMetrics,
    options: &ImportOptions,
) -> ImportedImage {
    ImportedImage {
        id,
        sheet_id: sheet_id.to_string(),
        kind: ImageKind::Floating,
        source: data_uri(&image.media),
        mime_type: mime_for_path(&image.media.path).to_string(),
        position: anchor_position(&image.from),
        size: floating_size(image, metrics, options.min_image_size),
        name: image.name.clone(),
    }
}

/// Build the image for a cell marker, or `None` when an embedded marker
/// names a picture the workbook does not carry.
pub(crate) fn cell_image<'a>(
    marker: &CellImageMarker,
    lookup: impl Fn(&str) -> Option<&'a MediaFile>,
    id: String,
    sheet_id: &str,
    (row, column): (u32, u32),
    options: &ImportOptions,
) -> Option<ImportedImage> {
    let (source, mime_type, name) = match marker {
        CellImageMarker::Embedded(name) => {
            let media = lookup(name)?;
            (
                data_uri(media),
                mime_for_path(&media.path),
                Some(name.clone()),
            )
        }
        CellImageMarker::Url(url) => (url.clone(), mime_for_path(url), None),
    };
    Some(ImportedImage {
        id,
        sheet_id: sheet_id.to_string(),
        kind: ImageKind::Cell,
        source,
        mime_type: mime_type.to_string(),
        position: AnchorPosition {
            row,
            column,
            ..AnchorPosition::default()
        },
        size: Size {
            width: options.cell_image_placeholder.width,
            height: options.cell_image_placeholder.height,
        },
        name,
    })
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
    use std::collections::HashMap;

    const METRICS: CellMetrics = CellMetrics {
        row_height: 20.0,
        column_width: 64.0,
    };

    fn image(extent: Option<(i64, i64)>, to: Option<AnchorPoint>) -> SourceImage {
        SourceImage {
            from: AnchorPoint {
                col: 1,
                col_off: 95_250,
                row: 2,
                row_off: 0,
            },
            to,
            extent,
            media: MediaFile {
                path: "xl/media/image1.png".to_string(),
                bytes: vec![0x89, b'P', b'N', b'G'],
            },
            name: Some("Picture 1".to_string()),
        }
    }

    #[test]
    fn test_extent_wins() {
        let img = image(Some((1_905_000, 952_500)), None);
        assert_eq!(
            floating_size(&img, METRICS, 20.0),
            Size {
                width: 200.0,
                height: 100.0
            }
        );
        let built = floating_image(&img, "image_0_0".to_string(), "s1", METRICS, &ImportOptions::default());
        assert_eq!(built.position.column_offset, 10.0);
        assert_eq!(built.mime_type, "image/png");
        assert!(built.source.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_span_size_and_clamp() {
        let to = AnchorPoint {
            col: 3,
            col_off: 95_250,
            row: 2,
            row_off: 95_250,
        };
        let size = floating_size(&image(None, Some(to)), METRICS, 20.0);
        assert_eq!(size.width, 128.0);
        assert_eq!(size.height, 20.0);
    }

    #[test]
    fn test_cell_marker_images() {
        let mut media = HashMap::new();
        media.insert(
            "ID_1".to_string(),
            MediaFile {
                path: "xl/media/image2.jpeg".to_string(),
                bytes: vec![0xFF, 0xD8],
            },
        );
        let opts = ImportOptions::default();
        let found = cell_image(
            &CellImageMarker::Embedded("ID_1".to_string()),
            |n| media.get(n),
            "image_0_1".to_string(),
            "s1",
            (4, 2),
            &opts,
        )
        .unwrap();
        assert_eq!(found.kind, ImageKind::Cell);
        assert_eq!(found.mime_type, "image/jpeg");
        assert_eq!(found.size.width, 100.0);
        assert_eq!((found.position.row, found.position.column), (4, 2));

        let missing = cell_image(
            &CellImageMarker::Embedded("ID_9".to_string()),
            |n| media.get(n),
            "image_0_2".to_string(),
            "s1",
            (0, 0),
            &opts,
        );
        assert!(missing.is_none());

        let url = cell_image(
            &CellImageMarker::Url("https://example.com/cat.gif".to_string()),
            |n| media.get(n),
            "image_0_3".to_string(),
            "s1",
            (0, 0),
            &opts,
        )
        .unwrap();
        assert_eq!(url.source, "https://example.com/cat.gif");
        assert_eq!(url.mime_type, "image/gif");
    }
}
