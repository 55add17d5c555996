use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::tiny_skia::Pixmap;

use crate::error::{Error, Result};
use crate::pipeline::Frame;

/*---- Export utilities ----*/

/// Longest payload-derived part of an export file name.
const MAX_STEM_TEXT: usize = 48;

/// Returns the file stem exports of `text` are saved under.
///
/// The stem is derived only from the payload: ASCII alphanumerics are kept
/// (lowercased), every other run of characters becomes a single `-`.
///
/// # Example
///
/// ```
/// use qistyle::helper::export_stem;
///
/// assert_eq!(export_stem("https://example.com/a?b=1"), "qr-https-example-com-a-b-1");
/// ```
pub fn export_stem(text: &str) -> String {
    let mut slug = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
        if slug.len() >= MAX_STEM_TEXT {
            break;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "qr-code".to_string()
    } else {
        format!("qr-{slug}")
    }
}

/// Converts a premultiplied surface into a straight-alpha image.
pub fn surface_to_image(surface: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(surface.width(), surface.height());
    for (dst, src) in image.pixels_mut().zip(surface.pixels()) {
        let c = src.demultiply();
        *dst = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    image
}

/// Encodes a surface as PNG bytes.
pub fn encode_png(surface: &Pixmap) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(surface_to_image(surface))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| Error::Export(format!("PNG encoding failed: {e}")))?;
    Ok(bytes)
}

impl Frame {
    /// The display surface as PNG bytes, e.g. for a clipboard image.
    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.raster.surface)
    }

    /// The file stem this frame exports under.
    pub fn export_stem(&self) -> String {
        export_stem(&self.text)
    }
}

/// Writes `bytes` to `directory/file_name`, creating the directory if needed.
///
/// Data goes to a temporary sibling first and is renamed into place, so a
/// failed export never leaves a partial file under the final name.
fn write_atomically(directory: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let export_err = |e: std::io::Error| Error::Export(format!("{}: {e}", directory.display()));

    // Check if the directory exists, create it if it doesn't
    if !directory.exists() {
        fs::create_dir_all(directory).map_err(export_err)?;
    }
    let target = directory.join(file_name);
    let partial = directory.join(format!(".{file_name}.part"));
    if let Err(e) = fs::write(&partial, bytes).and_then(|_| fs::rename(&partial, &target)) {
        let _ = fs::remove_file(&partial);
        return Err(export_err(e));
    }
    tracing::info!(path = %target.display(), bytes = bytes.len(), "exported");
    Ok(target)
}

/// Saves the frame's display surface as `<stem>.png` in `directory`.
///
/// # Errors
///
/// Returns [`Error::Export`] if encoding or writing fails.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> qistyle::Result<()> {
/// use qistyle::{helper::save_png, render_frame, MemoryFetcher, RenderConfig, RenderOptions};
///
/// let config = RenderConfig::new("Hello, World!");
/// let frame = render_frame(&MemoryFetcher::new(), &RenderOptions::default(), &config)
///     .await?
///     .expect("non-empty text");
/// save_png(&frame, "generated")?;
/// # Ok(())
/// # }
/// ```
pub fn save_png(frame: &Frame, directory: impl AsRef<Path>) -> Result<PathBuf> {
    let bytes = frame.png_bytes()?;
    write_atomically(directory.as_ref(), &format!("{}.png", frame.export_stem()), &bytes)
}

/// Saves the frame's vector document as `<stem>.svg` in `directory`.
pub fn save_svg(frame: &Frame, directory: impl AsRef<Path>) -> Result<PathBuf> {
    write_atomically(
        directory.as_ref(),
        &format!("{}.svg", frame.export_stem()),
        frame.svg.as_bytes(),
    )
}
