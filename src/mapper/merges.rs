//! Merge regions and their perimeter borders.
//!
//! Sources record a merged block's border only on its top-left cell. Each
//! edge of that border is copied onto the matching outer edge of every
//! perimeter cell so the block renders with a closed outline.

use crate::cell_ref::CellRange;
use crate::types::{Border, BorderSet, Cell, CellGrid, MergeRegion};

pub(crate) fn merge_region(range: &CellRange) -> MergeRegion {
    MergeRegion {
        start_row: range.start_row,
        end_row: range.end_row,
        start_column: range.start_col,
        end_column: range.end_col,
    }
}

fn cell_mut(grid: &mut CellGrid, row: u32, col: u32) -> &mut Cell {
    grid.entry(row).or_default().entry(col).or_default()
}

fn set_edge(grid: &mut CellGrid, row: u32, col: u32, edge: &Border, pick: fn(&mut BorderSet) -> &mut Option<Border>) {
    let cell = cell_mut(grid, row, col);
    let style = cell.style.get_or_insert_with(Default::default);
    let border = style.border.get_or_insert_with(BorderSet::default);
    *pick(border) = Some(edge.clone());
}

/// Copy the anchor's border edges around the region's perimeter.
pub(crate) fn propagate_border(grid: &mut CellGrid, region: &MergeRegion) {
    let Some(anchor) = grid
        .get(&region.start_row)
        .and_then(|r| r.get(&region.start_column))
        .and_then(|c| c.style.as_ref())
        .and_then(|s| s.border.clone())
    else {
        return;
    };

    let rows = region.start_row..=region.end_row;
    let cols = region.start_column..=region.end_column;

    if let Some(top) = &anchor.top {
        for col in cols.clone() {
            set_edge(grid, region.start_row, col, top, |b| &mut b.top);
        }
    }
    if let Some(bottom) = &anchor.bottom {
        for col in cols.clone() {
            set_edge(grid, region.end_row, col, bottom, |b| &mut b.bottom);
        }
    }
    if let Some(left) = &anchor.left {
        for row in rows.clone() {
            set_edge(grid, row, region.start_column, left, |b| &mut b.left);
        }
    }
    if let Some(right) = &anchor.right {
        for row in rows {
            set_edge(grid, row, region.end_column, right, |b| &mut b.right);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::types::{BorderStyle, Style};

    fn thin() -> Border {
        Border {
            style: BorderStyle::Thin,
            color: "#000000".to_string(),
        }
    }

    #[test]
    fn test_perimeter_gets_anchor_edges() {
        let mut grid = CellGrid::new();
        grid.entry(1).or_default().insert(
            1,
            Cell {
                style: Some(Style {
                    border: Some(BorderSet {
                        top: Some(thin()),
                        bottom: Some(thin()),
                        left: Some(thin()),
                        right: Some(thin()),
                    }),
                    ..Style::default()
                }),
                ..Cell::default()
            },
        );
        let region = merge_region(&CellRange::parse("B2:D4").unwrap());
        propagate_border(&mut grid, &region);

        let border = |r: u32, c: u32| grid[&r][&c].style.as_ref().unwrap().border.clone().unwrap();
        assert!(border(1, 3).top.is_some());
        assert!(border(1, 3).right.is_some());
        assert!(border(3, 1).bottom.is_some());
        assert!(border(3, 1).left.is_some());
        assert!(border(2, 3).right.is_some());
        assert!(border(2, 3).top.is_none());
        // interior cells stay untouched
        assert!(grid.get(&2).and_then(|r| r.get(&2)).is_none());
    }

    #[test]
    fn test_no_anchor_border_is_noop() {
        let mut grid = CellGrid::new();
        let region = merge_region(&CellRange::parse("A1:B2").unwrap());
        propagate_border(&mut grid, &region);
        assert!(grid.is_empty());
    }
}
