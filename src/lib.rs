//! # qistyle
//!
//! A Rust library for rendering styled QR codes.
//!
//! `qistyle` takes a payload, encodes it at the highest error correction level
//! and renders the module grid twice from one shared layout: a DPI-aware
//! raster surface (exported as PNG) and a standalone SVG document. Both
//! outputs agree on which modules are dropped to make room for a logo.
//!
//! ## Features
//!
//! - Custom module and background colors, transparent or image backgrounds.
//! - Centered logo (bundled or user-supplied SVG) with a padded safe zone,
//!   recolored to the module color and always drawn upright.
//! - Arbitrary rotation; the vector canvas grows by the exact rotated
//!   bounding box so no corner is clipped.
//! - Debounced rendering session publishing whole frames atomically.
//! - Safe Rust implementation with no unsafe code.
//!
//! ## Installation
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! qistyle = "0.1" # Replace with the latest version
//! ```
//!
//! ## Example
//!
//! Render a rotated code with the bundled logo and save both formats:
//!
//! ```no_run
//! use qistyle::{helper, render_frame, LogoMode, MemoryFetcher, RenderConfig, RenderOptions, Rgba};
//!
//! # async fn demo() -> qistyle::Result<()> {
//! let config = RenderConfig::new("https://example.com")
//!     .with_module_color(Rgba::from_hex("#1e3a8a")?)
//!     .with_logo(LogoMode::Default)
//!     .with_rotation(15.0);
//! let fetcher = MemoryFetcher::with_builtin_logo();
//!
//! if let Some(frame) = render_frame(&fetcher, &RenderOptions::default(), &config).await? {
//!     helper::save_png(&frame, "output")?;
//!     helper::save_svg(&frame, "output")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`grid`]: Module grid adapter over the QR encoder.
//! - [`layout`]: Pixel geometry, safe zone and rotation expansion.
//! - [`raster`]: Supersampled raster compositor.
//! - [`vector`]: SVG exporter.
//! - [`logo`]: Logo recoloring, clipping and embedding.
//! - [`assets`]: Asset fetching and decoding.
//! - [`session`]: Debounced renderer with atomic output.
//! - [`helper`]: PNG/SVG export utilities.

#![forbid(unsafe_code)]

pub mod assets;
pub mod color;
pub mod config;
pub mod error;
pub mod grid;
pub mod helper;
pub mod layout;
pub mod logo;
pub mod pipeline;
pub mod raster;
pub mod session;
pub mod vector;

pub use assets::{AssetFetcher, FsFetcher, MemoryFetcher, BUILTIN_LOGO_SVG};
pub use color::Rgba;
pub use config::{Background, LogoClip, LogoMode, RenderConfig, RenderOptions};
pub use error::{Error, Result};
pub use grid::{build_grid, ModuleGrid, QrCodeEcc};
pub use layout::{CellPlan, CellState, Layout};
pub use pipeline::{render_frame, Frame};
pub use raster::{render_raster, RasterOutput};
pub use session::{RenderStatus, Renderer};
pub use vector::render_vector;
