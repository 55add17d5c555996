//! Single-render pipeline: encode, lay out, load the logo, compose both outputs.

use crate::assets::{self, AssetFetcher};
use crate::config::{RenderConfig, RenderOptions};
use crate::error::{Error, Result};
use crate::grid::ModuleGrid;
use crate::layout::Layout;
use crate::raster::{render_raster, RasterOutput};
use crate::vector::render_vector;

/// A fully composed render: raster surface and vector document from the
/// same grid and layout.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Payload text the frame encodes.
    pub text: String,
    pub layout: Layout,
    pub raster: RasterOutput,
    pub svg: String,
    /// Recovered asset failures, in the order they happened.
    pub asset_errors: Vec<Error>,
}

/// Renders `config` into a [`Frame`].
///
/// Returns `Ok(None)` for empty payload text: there is nothing to draw and
/// the output should be cleared. Encoding and export failures abort the
/// render; logo failures are collected in [`Frame::asset_errors`].
pub async fn render_frame<F: AssetFetcher>(
    fetcher: &F,
    options: &RenderOptions,
    config: &RenderConfig,
) -> Result<Option<Frame>> {
    if config.text.is_empty() {
        return Ok(None);
    }
    options.validate()?;

    let grid = ModuleGrid::encode(&config.text, options.error_correction)?;
    tokio::task::yield_now().await;
    let layout = Layout::compute(options, grid.size(), config.rotation());

    let mut asset_errors = Vec::new();
    let logo = match assets::load_logo(fetcher, &config.logo, &options.default_logo).await {
        Ok(logo) => logo,
        Err(err) => {
            tracing::warn!(error = %err, "logo unavailable, rendering without it");
            asset_errors.push(err);
            None
        }
    };

    let raster = render_raster(&grid, config, &layout, logo.as_deref())?;
    asset_errors.extend(raster.logo_error.clone());
    let svg = render_vector(&grid, config, &layout, logo.as_deref())?;

    Ok(Some(Frame {
        text: config.text.clone(),
        layout,
        raster,
        svg,
        asset_errors,
    }))
}
