//! Vector document export.
//!
//! Regenerates the raster composition as a standalone SVG document: modules
//! and background inside a rotated group, the logo outside it so it stays
//! upright. The canvas is grown by the exact rotated bounding-box factor so
//! no corner is clipped at any angle.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::color::Rgba;
use crate::config::{Background, RenderConfig};
use crate::error::{Error, Result};
use crate::grid::ModuleGrid;
use crate::layout::{CellPlan, CellState, Layout};
use crate::logo::{self, LogoStyle};

/// Formats a coordinate with at most three decimals and no trailing zeros.
pub(crate) fn fmt_num(value: f64) -> String {
    let text = format!("{value:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// `{name}="#rrggbb"`, plus `{name}-opacity` when the color is translucent.
pub(crate) fn paint_attrs(name: &str, color: Rgba) -> String {
    let opaque = Rgba { a: 255, ..color };
    if color.is_opaque() {
        format!("{name}=\"{}\"", opaque.to_hex())
    } else {
        format!(
            "{name}=\"{}\" {name}-opacity=\"{}\"",
            opaque.to_hex(),
            fmt_num(color.a as f64 / 255.0)
        )
    }
}

/// Path data covering every dark module of `plan`, one closed subpath per
/// module, in coordinates relative to the center of the QR square.
///
/// Returns the path data and the number of modules it contains.
pub fn module_path(plan: &CellPlan, layout: &Layout) -> (String, usize) {
    let scale = layout.offscreen_scale;
    let half = layout.qr_size / 2.0;
    let side = fmt_num(layout.cell_size / scale);
    let mut data = String::new();
    let mut count = 0;
    for (row, col, state) in plan.iter() {
        if state != CellState::Dark {
            continue;
        }
        let rect = layout.cell_rect(row, col);
        if count > 0 {
            data += " ";
        }
        data += &format!(
            "M{},{}h{side}v{side}h-{side}z",
            fmt_num(rect.x / scale - half),
            fmt_num(rect.y / scale - half)
        );
        count += 1;
    }
    (data, count)
}

fn encode_png_base64(image: &RgbaImage) -> Result<String> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| Error::Export(format!("background image: {e}")))?;
    Ok(STANDARD.encode(bytes))
}

/// Renders the styled code as a standalone SVG document.
///
/// `logo` is the loaded logo source, `None` when no logo is requested or it
/// failed to load. The safe zone is excluded whenever `config` requests a
/// logo, independent of `logo`.
pub fn render_vector(
    grid: &ModuleGrid,
    config: &RenderConfig,
    layout: &Layout,
    logo: Option<&str>,
) -> Result<String> {
    let plan = CellPlan::new(grid, layout, config.logo.is_requested());
    let canvas = layout.vector_canvas_side();
    let center = fmt_num(canvas / 2.0);
    let q = layout.qr_size;
    let corner = fmt_num(-q / 2.0);
    let side = fmt_num(q);

    let mut result = String::new();
    result += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    result += &format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" version=\"1.1\" width=\"{0}\" height=\"{0}\" viewBox=\"0 0 {0} {0}\">\n",
        fmt_num(canvas)
    );
    result += &format!(
        "\t<g transform=\"translate({center} {center}) rotate({})\">\n",
        fmt_num(layout.rotation)
    );
    match &config.background {
        Background::Solid(color) => {
            result += &format!(
                "\t\t<rect x=\"{corner}\" y=\"{corner}\" width=\"{side}\" height=\"{side}\" {}/>\n",
                paint_attrs("fill", *color)
            );
        }
        Background::Image(image) => {
            result += &format!(
                "\t\t<image x=\"{corner}\" y=\"{corner}\" width=\"{side}\" height=\"{side}\" preserveAspectRatio=\"none\" xlink:href=\"data:image/png;base64,{}\"/>\n",
                encode_png_base64(image)?
            );
        }
        Background::Transparent => {}
    }
    let (path, modules) = module_path(&plan, layout);
    if modules > 0 {
        result += &format!(
            "\t\t<path d=\"{path}\" {} shape-rendering=\"crispEdges\"/>\n",
            paint_attrs("fill", config.module_color)
        );
    }
    result += "\t</g>\n";

    if let Some(source) = logo.filter(|_| config.logo.is_requested()) {
        let style = LogoStyle {
            stroke: config.module_color,
            backdrop: config.background.solid_color(),
            clip: layout.logo_clip,
        };
        let mid = canvas / 2.0;
        result += "\t";
        result += &logo::embed_vector(source, (mid, mid), layout.logo_size, &style);
        result += "\n";
    }
    result += "</svg>\n";

    tracing::debug!(canvas, modules, excluded = plan.excluded_count(), "rendered vector document");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{LogoMode, RenderOptions};
    use crate::grid::build_grid;

    fn setup(config: &RenderConfig) -> (ModuleGrid, Layout) {
        let grid = build_grid(&config.text).unwrap();
        let layout = Layout::compute(&RenderOptions::default(), grid.size(), config.rotation());
        (grid, layout)
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(1.0), "1");
        assert_eq!(fmt_num(0.1234), "0.123");
        assert_eq!(fmt_num(-0.0001), "0");
        assert_eq!(fmt_num(212.5), "212.5");
    }

    #[test]
    fn test_document_is_standalone() {
        let config = RenderConfig::new("HELLO");
        let (grid, layout) = setup(&config);
        let svg = render_vector(&grid, &config, &layout, None).unwrap();
        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(svg.contains("xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(svg.contains("viewBox=\"0 0 "));
        assert!(svg.contains("rotate(0)"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_one_subpath_per_dark_module() {
        let config = RenderConfig::new("HELLO");
        let (grid, layout) = setup(&config);
        let dark = grid.iter().filter(|(_, _, d)| *d).count();
        let plan = CellPlan::new(&grid, &layout, false);
        let (path, count) = module_path(&plan, &layout);
        assert_eq!(count, dark);
        assert_eq!(path.matches('M').count(), dark);
        assert_eq!(path.matches('z').count(), dark);
    }

    #[test]
    fn test_transparent_background_has_no_rect() {
        let config = RenderConfig::new("HELLO").with_background(Background::Transparent);
        let (grid, layout) = setup(&config);
        let svg = render_vector(&grid, &config, &layout, None).unwrap();
        assert!(!svg.contains("<rect"));
    }

    #[test]
    fn test_logo_sits_outside_rotation_group() {
        let config = RenderConfig::new("HELLO").with_logo(LogoMode::Default).with_rotation(30.0);
        let (grid, layout) = setup(&config);
        let logo = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"><circle cx="5" cy="5" r="4" stroke="red"/></svg>"#;
        let svg = render_vector(&grid, &config, &layout, Some(logo)).unwrap();
        let group_end = svg.find("</g>").unwrap();
        let clip = svg.find("<clipPath").unwrap();
        assert!(clip > group_end);
        assert!(svg.contains("rotate(30)"));
        assert!(svg.contains(r##"stroke="#000000""##));
    }

    #[test]
    fn test_translucent_module_color() {
        let config = RenderConfig::new("HELLO").with_module_color(Rgba::new(255, 0, 0, 128));
        let (grid, layout) = setup(&config);
        let svg = render_vector(&grid, &config, &layout, None).unwrap();
        assert!(svg.contains(r##"fill="#ff0000" fill-opacity="0.502""##));
    }

    #[test]
    fn test_image_background_is_embedded_inside_rotation_group() {
        let image = RgbaImage::from_pixel(5, 3, image::Rgba([10, 200, 30, 255]));
        let config = RenderConfig::new("HELLO")
            .with_background(Background::Image(Arc::new(image)))
            .with_rotation(30.0);
        let (grid, layout) = setup(&config);
        let svg = render_vector(&grid, &config, &layout, None).unwrap();

        let prefix = r#"preserveAspectRatio="none" xlink:href="data:image/png;base64,"#;
        let element = svg.find("<image").unwrap();
        let payload_start = svg.find(prefix).unwrap() + prefix.len();
        assert!(element < payload_start);
        assert!(payload_start < svg.find("</g>").unwrap());
        assert!(!svg.contains("<rect"));

        let payload = &svg[payload_start..payload_start + svg[payload_start..].find('"').unwrap()];
        let decoded = image::load_from_memory(&STANDARD.decode(payload).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (5, 3));
    }

    #[test]
    fn test_logo_with_quoted_style_yields_parsable_document() {
        let source = r#"<svg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 10 10' style='font-family:"A"'><circle cx='5' cy='5' r='4' stroke='red'/></svg>"#;
        let config = RenderConfig::new("HELLO").with_logo(LogoMode::Custom("quoted.svg".into()));
        let (grid, layout) = setup(&config);
        let svg = render_vector(&grid, &config, &layout, Some(source)).unwrap();
        assert!(svg.contains("<circle cx='5'"));
        assert!(resvg::usvg::Tree::from_str(&svg, &resvg::usvg::Options::default()).is_ok());
    }
}
