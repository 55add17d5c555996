//! Raster composition.
//!
//! Modules are drawn unrotated onto a supersampled offscreen surface, the
//! logo is composited on top, and the result is rotated, scaled and blitted
//! onto the DPI-aware display surface in one step.

use image::RgbaImage;
use resvg::tiny_skia::{FilterQuality, Paint, Pixmap, PixmapPaint, Rect, Transform};

use crate::color::Rgba;
use crate::config::{Background, RenderConfig};
use crate::error::{Error, Result};
use crate::grid::ModuleGrid;
use crate::layout::{CellPlan, CellState, Layout};
use crate::logo::{self, LogoStyle};

/// Surfaces produced by [`render_raster`].
#[derive(Debug, Clone)]
pub struct RasterOutput {
    /// Unrotated supersampled composition.
    pub offscreen: Pixmap,
    /// Final rotated composition at `display_size * device_pixel_ratio` pixels.
    pub surface: Pixmap,
    /// Set when the logo was requested but could not be drawn.
    pub logo_error: Option<Error>,
}

fn allocate(side: u32) -> Result<Pixmap> {
    Pixmap::new(side, side).ok_or_else(|| Error::Config(format!("cannot allocate {side}x{side} surface")))
}

/// Converts a straight-alpha bitmap into a premultiplied pixmap.
pub(crate) fn pixmap_from_rgba(image: &RgbaImage) -> Option<Pixmap> {
    let (width, height) = image.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    for (dst, src) in pixmap.data_mut().chunks_exact_mut(4).zip(image.as_raw().chunks_exact(4)) {
        let a = src[3] as u16;
        for i in 0..3 {
            dst[i] = ((src[i] as u16 * a + 127) / 255) as u8;
        }
        dst[3] = src[3];
    }
    Some(pixmap)
}

fn solid_paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = false;
    paint
}

fn paint_background(surface: &mut Pixmap, background: &Background) {
    match background {
        Background::Solid(color) => surface.fill(color.to_skia()),
        Background::Transparent => {}
        Background::Image(image) => {
            let Some(bitmap) = pixmap_from_rgba(image) else {
                tracing::warn!("background image is empty, leaving surface unpainted");
                return;
            };
            let sx = surface.width() as f32 / bitmap.width() as f32;
            let sy = surface.height() as f32 / bitmap.height() as f32;
            let paint = PixmapPaint {
                quality: FilterQuality::Bilinear,
                ..PixmapPaint::default()
            };
            surface.draw_pixmap(0, 0, bitmap.as_ref(), &paint, Transform::from_scale(sx, sy), None);
        }
    }
}

fn paint_modules(surface: &mut Pixmap, plan: &CellPlan, layout: &Layout, config: &RenderConfig) {
    let dark = solid_paint(config.module_color);
    let light = config.background.solid_color().map(solid_paint);

    for (row, col, state) in plan.iter() {
        let paint = match (state, &light) {
            (CellState::Dark, _) => &dark,
            (CellState::Light, Some(light)) => light,
            // Excluded cells, and light cells over transparent/image backgrounds.
            _ => continue,
        };
        let (x, y, w) = layout.cell_rect(row, col).pixel_bounds();
        if let Some(rect) = Rect::from_xywh(x as f32, y as f32, w as f32, w as f32) {
            surface.fill_rect(rect, paint, Transform::identity(), None);
        }
    }
}

/// Renders the styled code onto a display surface.
///
/// `logo` is the loaded logo source, `None` when none is requested or it
/// failed to load; the safe zone is excluded whenever `config` requests a
/// logo. A logo that fails to draw is reported in
/// [`RasterOutput::logo_error`] and does not abort the render.
pub fn render_raster(
    grid: &ModuleGrid,
    config: &RenderConfig,
    layout: &Layout,
    logo: Option<&str>,
) -> Result<RasterOutput> {
    let plan = CellPlan::new(grid, layout, config.logo.is_requested());
    let mut offscreen = allocate(layout.offscreen_px())?;

    paint_background(&mut offscreen, &config.background);
    paint_modules(&mut offscreen, &plan, layout, config);

    let mut logo_error = None;
    if let Some(source) = logo.filter(|_| config.logo.is_requested()) {
        let style = LogoStyle {
            stroke: config.module_color,
            backdrop: config.background.solid_color(),
            clip: layout.logo_clip,
        };
        let mid = layout.offscreen_side() / 2.0;
        if let Err(err) = logo::embed_raster(
            source,
            &mut offscreen,
            (mid, mid),
            layout.scaled_logo_size,
            layout.rotation,
            &style,
        ) {
            tracing::warn!(error = %err, "logo could not be drawn, rendering without it");
            logo_error = Some(err);
        }
    }

    let mut surface = allocate(layout.display_px())?;
    let dpr = layout.device_pixel_ratio as f32;
    let half_display = layout.display_size as f32 / 2.0;
    let half_offscreen = layout.offscreen_side() as f32 / 2.0;
    let scale = layout.blit_scale() as f32;
    let transform = Transform::from_scale(dpr, dpr)
        .pre_concat(Transform::from_translate(half_display, half_display))
        .pre_concat(Transform::from_rotate(layout.rotation as f32))
        .pre_concat(Transform::from_scale(scale, scale))
        .pre_concat(Transform::from_translate(-half_offscreen, -half_offscreen));
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    surface.draw_pixmap(0, 0, offscreen.as_ref(), &paint, transform, None);

    tracing::debug!(
        offscreen = offscreen.width(),
        display = surface.width(),
        excluded = plan.excluded_count(),
        "rendered raster surface"
    );
    Ok(RasterOutput { offscreen, surface, logo_error })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{LogoMode, RenderOptions};
    use crate::grid::build_grid;

    fn render(config: &RenderConfig, logo: Option<&str>) -> (ModuleGrid, Layout, RasterOutput) {
        let grid = build_grid(&config.text).unwrap();
        let layout = Layout::compute(&RenderOptions::default(), grid.size(), config.rotation());
        let out = render_raster(&grid, config, &layout, logo).unwrap();
        (grid, layout, out)
    }

    fn cell_center(layout: &Layout, row: usize, col: usize) -> (u32, u32) {
        let (cx, cy) = layout.cell_rect(row, col).center();
        (cx as u32, cy as u32)
    }

    #[test]
    fn test_black_on_white_has_no_holes() {
        let config = RenderConfig::new("HELLO");
        let (grid, layout, out) = render(&config, None);
        assert!(out.offscreen.pixels().iter().all(|p| p.alpha() == 255));
        for (row, col, dark) in grid.iter() {
            let (x, y) = cell_center(&layout, row, col);
            let px = out.offscreen.pixel(x, y).unwrap();
            assert_eq!(px.red(), if dark { 0 } else { 255 }, "cell ({row}, {col})");
        }
        assert_eq!(out.surface.width(), layout.display_px());
        assert!(out.logo_error.is_none());
    }

    #[test]
    fn test_transparent_background_leaves_light_modules_clear() {
        let config = RenderConfig::new("HELLO").with_background(Background::Transparent);
        let (grid, layout, out) = render(&config, None);
        for (row, col, dark) in grid.iter() {
            let (x, y) = cell_center(&layout, row, col);
            let alpha = out.offscreen.pixel(x, y).unwrap().alpha();
            assert_eq!(alpha, if dark { 255 } else { 0 });
        }
    }

    #[test]
    fn test_image_background_shows_through_light_modules() {
        let image = RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
        let config = RenderConfig::new("HELLO").with_background(Background::Image(Arc::new(image)));
        let (grid, layout, out) = render(&config, None);
        let (row, col, _) = grid.iter().find(|(_, _, dark)| !dark).unwrap();
        let (x, y) = cell_center(&layout, row, col);
        let px = out.offscreen.pixel(x, y).unwrap();
        assert_eq!((px.red(), px.green(), px.alpha()), (255, 0, 255));
    }

    #[test]
    fn test_logo_zone_excluded_even_without_logo() {
        let config = RenderConfig::new("HELLO WORLD").with_logo(LogoMode::Default);
        let (grid, layout, out) = render(&config, None);
        let plan = CellPlan::new(&grid, &layout, true);
        for (row, col, state) in plan.iter() {
            if state == CellState::Excluded {
                let (x, y) = cell_center(&layout, row, col);
                assert_eq!(out.offscreen.pixel(x, y).unwrap().red(), 255);
            }
        }
    }

    #[test]
    fn test_broken_logo_is_reported_not_fatal() {
        let config = RenderConfig::new("HELLO").with_logo(LogoMode::Custom("nope".into()));
        let (_, _, out) = render(&config, Some("nope"));
        assert!(matches!(out.logo_error, Some(Error::AssetLoad { .. })));
    }

    #[test]
    fn test_device_pixel_ratio_scales_backing_store() {
        let grid = build_grid("HELLO").unwrap();
        let options = RenderOptions { device_pixel_ratio: 2.0, ..Default::default() };
        let layout = Layout::compute(&options, grid.size(), 0.0);
        let out = render_raster(&grid, &RenderConfig::new("HELLO"), &layout, None).unwrap();
        assert_eq!(out.surface.width(), 600);
        // Center of the display is inside the QR square and opaque.
        assert_eq!(out.surface.pixel(300, 300).unwrap().alpha(), 255);
        // Corners lie outside the unrotated square.
        assert_eq!(out.surface.pixel(2, 2).unwrap().alpha(), 0);
    }

    #[test]
    fn test_premultiply() {
        let image = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 128]));
        let pixmap = pixmap_from_rgba(&image).unwrap();
        assert_eq!(pixmap.data(), &[128, 128, 128, 128]);
    }
}
