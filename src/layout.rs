//! Pixel geometry shared by the raster and vector renderers.
//!
//! A [`Layout`] is computed once per render and handed to both outputs, so
//! the safe-zone exclusion decision for every cell comes from the same
//! floating point values. Raster-side quantities (`cell_size`, the safe zone)
//! are expressed in offscreen pixels; divide by `offscreen_scale` to get
//! logical units.

use std::f64::consts::SQRT_2;

use crate::config::{LogoClip, RenderOptions};
use crate::grid::ModuleGrid;

/// Padding around the logo inside the safe zone.
const SAFE_ZONE_PADDING: f64 = 1.1;

/// Exact bounding-box growth of a unit square rotated by `degrees`.
pub fn expansion_factor(degrees: f64) -> f64 {
    let radians = degrees.to_radians();
    (radians.cos().abs() + radians.sin().abs()).max(1.0)
}

/// Axis-aligned square, in offscreen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Square {
    pub x: f64,
    pub y: f64,
    pub side: f64,
}

impl Square {
    /// Open-interval overlap: squares that only share an edge do not
    /// intersect, and a square with no area intersects nothing.
    pub fn intersects(&self, other: &Square) -> bool {
        self.side > 0.0
            && other.side > 0.0
            && self.x < other.x + other.side
            && other.x < self.x + self.side
            && self.y < other.y + other.side
            && other.y < self.y + self.side
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.side / 2.0, self.y + self.side / 2.0)
    }

    /// Integer pixel rectangle: edges floored, extent ceiled, so neighbouring
    /// cells always meet or overlap and never leave a seam.
    pub fn pixel_bounds(&self) -> (i32, i32, u32) {
        (
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.side.ceil().max(1.0) as u32,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    /// Side of the visible square.
    pub display_size: f64,
    /// Logical side of the unrotated QR square.
    pub qr_size: f64,
    /// Logical quiet zone on each side of the modules.
    pub margin: f64,
    pub offscreen_scale: f64,
    pub device_pixel_ratio: f64,
    /// Modules per side.
    pub grid_size: usize,
    /// Module side in offscreen pixels.
    pub cell_size: f64,
    /// Logical logo side.
    pub logo_size: f64,
    /// Logo side in offscreen pixels.
    pub scaled_logo_size: f64,
    /// Square the logo sits in, centered on the grid, in offscreen pixels.
    pub safe_zone: Square,
    /// Rotation in degrees, `[0, 360)`.
    pub rotation: f64,
    /// Exact rotated bounding-box factor, used for vector canvas sizing.
    pub expansion_factor: f64,
    /// Logical padding around the vector canvas.
    pub vector_padding: f64,
    pub logo_clip: LogoClip,
}

impl Layout {
    /// Derives the geometry for a grid of `grid_size` modules rendered at
    /// `rotation` degrees.
    ///
    /// `qr_size` is `container_size * √2 / 2` so the square still fits the
    /// container after a 45° rotation; this is conservative for other angles.
    pub fn compute(options: &RenderOptions, grid_size: usize, rotation: f64) -> Self {
        let container_size = options.container_size;
        let scale = options.offscreen_scale;
        let qr_size = container_size * SQRT_2 / 2.0;
        let margin = qr_size * options.margin_fraction;
        let cell_size = (qr_size - 2.0 * margin) * scale / grid_size.max(1) as f64;

        let logo_size = qr_size * options.logo_fraction;
        let scaled_logo_size = logo_size * scale;
        let zone_side = scaled_logo_size * SAFE_ZONE_PADDING;
        let center = qr_size * scale / 2.0;
        let safe_zone = Square {
            x: center - zone_side / 2.0,
            y: center - zone_side / 2.0,
            side: zone_side,
        };

        let rotation = rotation.rem_euclid(360.0);
        let layout = Self {
            display_size: container_size,
            qr_size,
            margin,
            offscreen_scale: scale,
            device_pixel_ratio: options.device_pixel_ratio,
            grid_size,
            cell_size,
            logo_size,
            scaled_logo_size,
            safe_zone,
            rotation,
            expansion_factor: expansion_factor(rotation),
            vector_padding: qr_size * options.vector_padding_fraction,
            logo_clip: options.logo_clip,
        };
        tracing::debug!(
            qr_size,
            cell_size,
            zone = zone_side,
            expansion = layout.expansion_factor,
            "computed layout"
        );
        layout
    }

    /// Side of the supersampled surface, in (fractional) offscreen pixels.
    pub fn offscreen_side(&self) -> f64 {
        self.qr_size * self.offscreen_scale
    }

    /// Side of the supersampled surface, rounded up to whole pixels.
    pub fn offscreen_px(&self) -> u32 {
        self.offscreen_side().ceil().max(1.0) as u32
    }

    /// Side of the display surface's backing store, in physical pixels.
    pub fn display_px(&self) -> u32 {
        (self.display_size * self.device_pixel_ratio).ceil().max(1.0) as u32
    }

    /// Scale applied to the offscreen surface when blitting it to the display.
    pub fn blit_scale(&self) -> f64 {
        self.display_size / (self.offscreen_side() * SQRT_2)
    }

    /// Square covered by the module at `(row, col)`, in offscreen pixels.
    pub fn cell_rect(&self, row: usize, col: usize) -> Square {
        let origin = self.margin * self.offscreen_scale;
        Square {
            x: origin + col as f64 * self.cell_size,
            y: origin + row as f64 * self.cell_size,
            side: self.cell_size,
        }
    }

    /// Whether the module at `(row, col)` touches the logo safe zone.
    pub fn in_safe_zone(&self, row: usize, col: usize) -> bool {
        self.cell_rect(row, col).intersects(&self.safe_zone)
    }

    /// Side of the vector document canvas.
    pub fn vector_canvas_side(&self) -> f64 {
        (self.qr_size * self.expansion_factor).ceil() + 2.0 * self.vector_padding
    }
}

/// Per-cell drawing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Dark,
    Light,
    /// Inside the logo safe zone: neither foreground nor background is painted.
    Excluded,
}

/// Drawing decisions for every cell of a grid, computed once and consumed by
/// both renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPlan {
    size: usize,
    cells: Vec<CellState>,
}

impl CellPlan {
    /// Exclusion follows the logo *request*, not whether the logo later loads.
    pub fn new(grid: &ModuleGrid, layout: &Layout, logo_requested: bool) -> Self {
        let cells = grid
            .iter()
            .map(|(row, col, dark)| {
                if logo_requested && layout.in_safe_zone(row, col) {
                    CellState::Excluded
                } else if dark {
                    CellState::Dark
                } else {
                    CellState::Light
                }
            })
            .collect();
        Self { size: grid.size(), cells }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn state(&self, row: usize, col: usize) -> CellState {
        self.cells[row * self.size + col]
    }

    /// Iterates `(row, col, state)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, CellState)> + '_ {
        let size = self.size;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &state)| (i / size, i % size, state))
    }

    pub fn excluded_count(&self) -> usize {
        self.cells.iter().filter(|&&s| s == CellState::Excluded).count()
    }
}
