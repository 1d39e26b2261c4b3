//! Page geometry and the arithmetic for the two page templates.
//!
//! Everything here is pure integer arithmetic in PDF points, origin at the
//! top-left corner of the content box (page minus padding), y growing down.
//! The renderer flips to PDF's bottom-left origin.
//!
//! ```text
//!  ┌──────────────── CW ────────────────┐
//!  │               cover                │ cover_height = ⌊CH × ratio⌋
//!  ├────────────────────────────────────┤ below_cover_gap
//!  │ ┌────┐ gap ┌────┐ gap ┌────┐       │
//!  │ │cell│     │cell│     │cell│       │ collage_height
//!  │ └────┘     └────┘     └────┘       │
//!  │  gap                               │
//!  │  ...                               │
//!  └────────────────────────────────────┘
//! ```

use crate::error::BrochureError;
use crate::model::MAX_GALLERY_IMAGES;
use serde::{Deserialize, Serialize};

/// Cells per grid row and per field row.
pub const COLUMNS: u32 = 3;

/// Height of the title line on the field page, when shown.
pub const TITLE_LINE_HEIGHT: u32 = 28;

/// Height of one row of fields (label line + value line + spacing).
pub const FIELD_ROW_HEIGHT: u32 = 36;

/// Fixed page dimensions and spacing, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    /// Share of the content height given to the cover image.
    pub cover_ratio: f32,
    pub below_cover_gap: u32,
    pub grid_gap: u32,
    pub field_column_gap: u32,
}

impl PageGeometry {
    /// A4 portrait, 20 pt padding: content box 555 × 802.
    pub const A4_PORTRAIT: Self = Self {
        width: 595,
        height: 842,
        padding: 20,
        cover_ratio: 0.33,
        below_cover_gap: 10,
        grid_gap: 8,
        field_column_gap: 12,
    };

    pub fn content_width(&self) -> u32 {
        self.width.saturating_sub(2 * self.padding)
    }

    pub fn content_height(&self) -> u32 {
        self.height.saturating_sub(2 * self.padding)
    }

    /// Reject geometries that leave no room for a cell or a column.
    pub fn validate(&self) -> Result<(), BrochureError> {
        if self.content_width() == 0 || self.content_height() == 0 {
            return Err(BrochureError::InvalidConfig(format!(
                "padding {} leaves no content area on a {}x{} page",
                self.padding, self.width, self.height
            )));
        }
        if !(self.cover_ratio > 0.0 && self.cover_ratio < 1.0) {
            return Err(BrochureError::InvalidConfig(format!(
                "cover_ratio must be in (0, 1), got {}",
                self.cover_ratio
            )));
        }
        let plan = cover_grid_plan(self);
        if plan.cell_size == 0 {
            return Err(BrochureError::InvalidConfig(
                "page geometry leaves no room for the gallery grid".into(),
            ));
        }
        if field_page_plan(self, false).column_width == 0 {
            return Err(BrochureError::InvalidConfig(
                "field_column_gap leaves no room for field columns".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::A4_PORTRAIT
    }
}

/// Sizing for the cover + gallery page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoverGridPlan {
    pub content_width: u32,
    pub cover_height: u32,
    /// Top of the grid, relative to the content box.
    pub grid_top: u32,
    pub collage_height: u32,
    pub cell_size: u32,
    pub grid_gap: u32,
}

/// Where one gallery cell lands, relative to the content box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPlacement {
    pub index: usize,
    pub row: u32,
    pub column: u32,
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub right_margin: u32,
    pub bottom_margin: u32,
}

/// Sizing for the title + fields page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldPagePlan {
    pub column_width: u32,
    pub column_gap: u32,
    /// Vertical space taken by the title line; 0 when the title is omitted.
    pub title_height: u32,
    pub row_height: u32,
    /// Field rows that fit below the title.
    pub max_rows: u32,
}

impl FieldPagePlan {
    pub fn max_fields(&self) -> usize {
        (self.max_rows * COLUMNS) as usize
    }

    /// Top-left corner of field `index`, relative to the content box.
    pub fn field_origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        let column = index % COLUMNS;
        let row = index / COLUMNS;
        (
            column * (self.column_width + self.column_gap),
            self.title_height + row * self.row_height,
        )
    }
}

/// Cover + grid sizing with the cover at its configured share of the page.
pub fn cover_grid_plan(geometry: &PageGeometry) -> CoverGridPlan {
    let cover_height = (geometry.content_height() as f32 * geometry.cover_ratio).floor() as u32;
    cover_grid_plan_with_cover_height(geometry, cover_height)
}

/// Cover + grid sizing for an explicit cover height.
///
/// The cell is the tighter of the width bound and the height bound, so the
/// full 3×3 grid always fits both ways.
pub fn cover_grid_plan_with_cover_height(geometry: &PageGeometry, cover_height: u32) -> CoverGridPlan {
    let cw = geometry.content_width();
    let ch = geometry.content_height();
    let gaps = (COLUMNS - 1) * geometry.grid_gap;

    let cover_height = cover_height.min(ch);
    let collage_height = ch.saturating_sub(cover_height + geometry.below_cover_gap);
    let by_width = cw.saturating_sub(gaps) / COLUMNS;
    let by_height = collage_height.saturating_sub(gaps) / COLUMNS;

    CoverGridPlan {
        content_width: cw,
        cover_height,
        grid_top: cover_height + geometry.below_cover_gap,
        collage_height,
        cell_size: by_width.min(by_height),
        grid_gap: geometry.grid_gap,
    }
}

/// Lattice positions for `count` gallery images, row-major.
///
/// Counts above the grid capacity are clamped; fewer images shorten the
/// traversal without leaving holes.
pub fn grid_cells(count: usize, plan: &CoverGridPlan) -> Vec<CellPlacement> {
    let last = COLUMNS - 1;
    (0..count.min(MAX_GALLERY_IMAGES))
        .map(|index| {
            let row = index as u32 / COLUMNS;
            let column = index as u32 % COLUMNS;
            let step = plan.cell_size + plan.grid_gap;
            CellPlacement {
                index,
                row,
                column,
                x: column * step,
                y: plan.grid_top + row * step,
                size: plan.cell_size,
                right_margin: if column < last { plan.grid_gap } else { 0 },
                bottom_margin: if row < last { plan.grid_gap } else { 0 },
            }
        })
        .collect()
}

/// Field page sizing. `with_title` reserves the title line.
pub fn field_page_plan(geometry: &PageGeometry, with_title: bool) -> FieldPagePlan {
    let cw = geometry.content_width();
    let title_height = if with_title { TITLE_LINE_HEIGHT } else { 0 };
    FieldPagePlan {
        column_width: cw.saturating_sub((COLUMNS - 1) * geometry.field_column_gap) / COLUMNS,
        column_gap: geometry.field_column_gap,
        title_height,
        row_height: FIELD_ROW_HEIGHT,
        max_rows: geometry.content_height().saturating_sub(title_height) / FIELD_ROW_HEIGHT,
    }
}
