//! Logo embedding for both output targets.
//!
//! A vector logo source is recolored (every `stroke` attribute takes the
//! module color), optionally given a solid backdrop rect as its first child,
//! and then either rasterized into a clipped pixmap or re-wrapped as a nested
//! `<svg>` block for the vector document. The logo is always drawn upright.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use resvg::tiny_skia::{self, FillRule, Mask, PathBuilder, Pixmap, PixmapPaint, Rect, Transform};
use resvg::usvg;

use crate::color::Rgba;
use crate::config::LogoClip;
use crate::error::{Error, Result};
use crate::vector::{fmt_num, paint_attrs};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const CLIP_ID: &str = "qr-logo-clip";

/// Root attributes replaced when the logo is re-wrapped at a new position.
const POSITIONAL_ATTRS: [&str; 6] = ["x", "y", "width", "height", "viewBox", "preserveAspectRatio"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoStyle {
    /// Replaces every stroke color in the source.
    pub stroke: Rgba,
    /// Solid fill synthesized behind the logo, for opaque backgrounds only.
    pub backdrop: Option<Rgba>,
    pub clip: LogoClip,
}

/// A parsed vector logo: root attributes, view box and inner markup.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorLogo {
    /// Namespace declarations and presentation attributes of the source root.
    attrs: Vec<(String, String)>,
    view_box: [f64; 4],
    inner: String,
}

impl VectorLogo {
    /// Parses a standalone vector document.
    ///
    /// The XML prolog, doctype and leading comments are dropped. The source
    /// is validated by a full SVG parse so malformed input fails here rather
    /// than producing a broken document later.
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::asset("logo", reason);

        let body = strip_prolog(source);
        if !body.starts_with("<svg") {
            return Err(invalid("document root is not <svg>"));
        }
        let tag_end = find_tag_end(body).ok_or_else(|| invalid("unterminated <svg> tag"))?;
        let self_closing = body[..tag_end].ends_with('/');
        let attr_text = body[4..tag_end].trim_end_matches('/');
        let attrs = parse_attributes(attr_text).ok_or_else(|| invalid("malformed root attributes"))?;

        let inner = if self_closing {
            String::new()
        } else {
            let close = body.rfind("</svg>").ok_or_else(|| invalid("missing </svg>"))?;
            if close < tag_end {
                return Err(invalid("missing </svg>"));
            }
            body[tag_end + 1..close].to_string()
        };

        let tree = usvg::Tree::from_str(body, &usvg::Options::default())
            .map_err(|e| Error::asset("logo", e))?;

        let lookup = |name: &str| attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());
        let view_box = match lookup("viewBox").and_then(parse_view_box) {
            Some(vb) => vb,
            None => {
                let size = tree.size();
                let width = lookup("width").and_then(parse_length).unwrap_or(size.width() as f64);
                let height = lookup("height").and_then(parse_length).unwrap_or(size.height() as f64);
                [0.0, 0.0, width, height]
            }
        };

        let attrs = attrs
            .into_iter()
            .filter(|(k, _)| !POSITIONAL_ATTRS.contains(&k.as_str()))
            .collect();
        Ok(Self { attrs, view_box, inner })
    }

    /// Parses `source` after applying the stroke color and backdrop of `style`.
    pub fn styled(source: &str, style: &LogoStyle) -> Result<Self> {
        let mut logo = Self::parse(&recolor_strokes(source, style.stroke))?;
        if let Some(fill) = style.backdrop {
            logo.inject_backdrop(fill);
        }
        Ok(logo)
    }

    /// Inserts a rect covering the whole view box as the first child.
    pub fn inject_backdrop(&mut self, fill: Rgba) {
        let [x, y, w, h] = self.view_box;
        let rect = format!(
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" {}/>",
            fmt_num(x),
            fmt_num(y),
            fmt_num(w),
            fmt_num(h),
            paint_attrs("fill", fill)
        );
        self.inner.insert_str(0, &rect);
    }

    pub fn view_box(&self) -> [f64; 4] {
        self.view_box
    }

    fn root_attributes(&self) -> String {
        let mut out = String::new();
        if !self.attrs.iter().any(|(k, _)| k == "xmlns") {
            out += &format!(" xmlns=\"{SVG_NS}\"");
        }
        // Values keep their source entities; only the quote needs escaping
        // since single-quoted values may contain `"`.
        for (name, value) in &self.attrs {
            out += &format!(" {name}=\"{}\"", value.replace('"', "&quot;"));
        }
        let [x, y, w, h] = self.view_box;
        out += &format!(
            " viewBox=\"{} {} {} {}\" preserveAspectRatio=\"xMidYMid meet\"",
            fmt_num(x),
            fmt_num(y),
            fmt_num(w),
            fmt_num(h)
        );
        out
    }

    /// Nested `<svg>` block placed at `(x, y)` with side `size`.
    pub fn nested(&self, x: f64, y: f64, size: f64) -> String {
        format!(
            "<svg x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"{}>{}</svg>",
            fmt_num(x),
            fmt_num(y),
            fmt_num(size),
            fmt_num(size),
            self.root_attributes(),
            self.inner
        )
    }

    /// Renders the logo into a `px`-sided pixmap, clipped to `clip`.
    pub fn rasterize(&self, px: u32, clip: LogoClip) -> Result<Pixmap> {
        let document = self.nested(0.0, 0.0, px as f64);
        let tree = usvg::Tree::from_str(&document, &usvg::Options::default())
            .map_err(|e| Error::asset("logo", e))?;
        let mut logo = Pixmap::new(px, px).ok_or_else(|| Error::asset("logo", "empty logo size"))?;
        resvg::render(&tree, Transform::identity(), &mut logo.as_mut());

        let mask = clip_mask(px, clip).ok_or_else(|| Error::asset("logo", "invalid clip size"))?;
        let mut clipped = Pixmap::new(px, px).ok_or_else(|| Error::asset("logo", "empty logo size"))?;
        clipped.draw_pixmap(
            0,
            0,
            logo.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            Some(&mask),
        );
        Ok(clipped)
    }
}

fn clip_mask(px: u32, clip: LogoClip) -> Option<Mask> {
    let side = px as f32;
    let path = match clip {
        LogoClip::Circle => PathBuilder::from_circle(side / 2.0, side / 2.0, side / 2.0)?,
        LogoClip::Rect => PathBuilder::from_rect(Rect::from_xywh(0.0, 0.0, side, side)?),
    };
    let mut mask = Mask::new(px, px)?;
    mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
    Some(mask)
}

/// `<clipPath>` definition matching the raster clip for a logo at `(x, y)`.
fn clip_definition(clip: LogoClip, x: f64, y: f64, size: f64) -> String {
    let shape = match clip {
        LogoClip::Circle => format!(
            "<circle cx=\"{}\" cy=\"{}\" r=\"{}\"/>",
            fmt_num(x + size / 2.0),
            fmt_num(y + size / 2.0),
            fmt_num(size / 2.0)
        ),
        LogoClip::Rect => format!(
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"/>",
            fmt_num(x),
            fmt_num(y),
            fmt_num(size),
            fmt_num(size)
        ),
    };
    format!("<defs><clipPath id=\"{CLIP_ID}\">{shape}</clipPath></defs>")
}

/// Builds the vector markup for a logo centered at `center` with side `size`.
///
/// If the source cannot be parsed, the raw asset is embedded as an image
/// reference clipped to the same shape instead of failing the export.
pub fn embed_vector(source: &str, center: (f64, f64), size: f64, style: &LogoStyle) -> String {
    let x = center.0 - size / 2.0;
    let y = center.1 - size / 2.0;
    let body = match VectorLogo::styled(source, style) {
        Ok(logo) => logo.nested(x, y, size),
        Err(err) => {
            tracing::warn!(error = %err, "vector logo unparsable, embedding as image");
            format!(
                "<image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" xlink:href=\"data:image/svg+xml;base64,{}\"/>",
                fmt_num(x),
                fmt_num(y),
                fmt_num(size),
                fmt_num(size),
                STANDARD.encode(source.as_bytes())
            )
        }
    };
    format!(
        "{}<g clip-path=\"url(#{CLIP_ID})\">{body}</g>",
        clip_definition(style.clip, x, y, size)
    )
}

/// Draws the logo onto `surface`, centered at `center` with side `size`
/// pixels, counter-rotated by `rotation` degrees so that it ends up upright
/// once the surface itself is rotated by `rotation`.
pub fn embed_raster(
    source: &str,
    surface: &mut Pixmap,
    center: (f64, f64),
    size: f64,
    rotation: f64,
    style: &LogoStyle,
) -> Result<()> {
    let px = size.round().max(1.0) as u32;
    let logo = VectorLogo::styled(source, style)?.rasterize(px, style.clip)?;
    let half = px as f32 / 2.0;
    let transform = Transform::from_translate(center.0 as f32, center.1 as f32)
        .pre_concat(Transform::from_rotate(-rotation as f32))
        .pre_concat(Transform::from_translate(-half, -half));
    let paint = PixmapPaint {
        quality: tiny_skia::FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    surface.draw_pixmap(0, 0, logo.as_ref(), &paint, transform, None);
    Ok(())
}

/// Rewrites the value of every `stroke` attribute to `color`, leaving
/// `stroke="none"` alone. `stroke-width` and other attributes are untouched.
/// A translucent `color` adds `stroke-opacity` after each rewritten stroke.
pub fn recolor_strokes(source: &str, color: Rgba) -> String {
    let hex = Rgba { a: 255, ..color }.to_hex();
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    let mut search = 0;

    while let Some(found) = source[search..].find("stroke") {
        let start = search + found;
        search = start + "stroke".len();

        let preceded_by_space = start > 0 && bytes[start - 1].is_ascii_whitespace();
        if !preceded_by_space {
            continue;
        }
        let rest = &source[search..];
        let after_name = rest.trim_start();
        let Some(after_eq) = after_name.strip_prefix('=') else {
            continue;
        };
        let after_eq = after_eq.trim_start();
        let Some(quote) = after_eq.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let value_start = source.len() - after_eq.len() + 1;
        let Some(value_len) = source[value_start..].find(quote) else {
            break;
        };
        let value = &source[value_start..value_start + value_len];
        if value.trim() != "none" {
            out += &source[last..value_start];
            out += &hex;
            out.push(quote);
            last = value_start + value_len + 1;
            // An opacity the element already declares wins over ours.
            let tag_start = source[..start].rfind('<').unwrap_or(0);
            let tag_end = source[start..].find('>').map_or(source.len(), |i| start + i);
            if !color.is_opaque() && !source[tag_start..tag_end].contains("stroke-opacity") {
                out += &format!(" stroke-opacity=\"{}\"", fmt_num(color.a as f64 / 255.0));
            }
        }
        search = value_start + value_len;
    }
    out += &source[last..];
    out
}

fn strip_prolog(source: &str) -> &str {
    let mut rest = source.trim_start_matches('\u{feff}').trim_start();
    loop {
        let skipped = if rest.starts_with("<?") {
            rest.find("?>").map(|i| &rest[i + 2..])
        } else if rest.starts_with("<!--") {
            rest.find("-->").map(|i| &rest[i + 3..])
        } else if rest.starts_with("<!") {
            rest.find('>').map(|i| &rest[i + 1..])
        } else {
            None
        };
        match skipped {
            Some(next) => rest = next.trim_start(),
            None => return rest,
        }
    }
}

/// Byte index of the `>` closing the first tag, skipping quoted values.
fn find_tag_end(body: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_attributes(text: &str) -> Option<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let name_end = rest.find(|c: char| c == '=' || c.is_whitespace())?;
        let name = &rest[..name_end];
        let after = rest[name_end..].trim_start().strip_prefix('=')?.trim_start();
        let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let value_len = after[1..].find(quote)?;
        attrs.push((name.to_string(), after[1..1 + value_len].to_string()));
        rest = after[value_len + 2..].trim_start();
    }
    Some(attrs)
}

fn parse_view_box(value: &str) -> Option<[f64; 4]> {
    let nums: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match nums[..] {
        [x, y, w, h] if w > 0.0 && h > 0.0 => Some([x, y, w, h]),
        _ => None,
    }
}

fn parse_length(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").parse().ok().filter(|v: &f64| *v > 0.0)
}
