//! Render configuration.
//!
//! [`RenderOptions`] holds the tunable constants of a rendering session and
//! can be loaded from any serde format. [`RenderConfig`] is the per-render
//! value object: it fully determines the output and is rebuilt for every
//! render rather than mutated.

use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::error::{Error, Result};
use crate::grid::QrCodeEcc;

/// Shape the logo is clipped to, applied identically to raster and vector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoClip {
    #[default]
    Circle,
    Rect,
}

/// Session-wide rendering constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Side of the square container the display surface must fit, in logical pixels.
    pub container_size: f64,
    /// Physical pixels per logical pixel of the display surface.
    pub device_pixel_ratio: f64,
    /// Supersampling factor of the intermediate raster surface.
    pub offscreen_scale: f64,
    /// Logo side as a fraction of the QR square.
    pub logo_fraction: f64,
    /// Quiet zone on each side as a fraction of the QR square.
    pub margin_fraction: f64,
    /// Vector canvas padding as a fraction of the QR square.
    pub vector_padding_fraction: f64,
    /// Quiet period before a burst of requests is rendered.
    pub debounce_ms: u64,
    pub logo_clip: LogoClip,
    /// Asset reference resolved through the fetcher for [`LogoMode::Default`].
    pub default_logo: String,
    pub error_correction: QrCodeEcc,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            container_size: 300.0,
            device_pixel_ratio: 1.0,
            offscreen_scale: 4.0,
            logo_fraction: 0.2,
            margin_fraction: 0.04,
            vector_padding_fraction: 0.1,
            debounce_ms: 300,
            logo_clip: LogoClip::Circle,
            default_logo: "logo.svg".to_string(),
            error_correction: QrCodeEcc::High,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("container_size", self.container_size),
            ("device_pixel_ratio", self.device_pixel_ratio),
            ("offscreen_scale", self.offscreen_scale),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("{name} must be positive, got {value}")));
            }
        }
        let fractions = [
            ("logo_fraction", self.logo_fraction),
            ("margin_fraction", self.margin_fraction),
            ("vector_padding_fraction", self.vector_padding_fraction),
        ];
        for (name, value) in fractions {
            if !(0.0..1.0).contains(&value) {
                return Err(Error::Config(format!("{name} must be in [0, 1), got {value}")));
            }
        }
        if self.logo_fraction <= 0.0 {
            return Err(Error::Config("logo_fraction must be positive".into()));
        }
        if self.margin_fraction >= 0.5 {
            return Err(Error::Config("margin_fraction leaves no room for modules".into()));
        }
        Ok(())
    }
}

/// What is painted behind the modules.
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Solid(Rgba),
    Transparent,
    /// A decoded bitmap, stretched over the whole QR square.
    Image(Arc<RgbaImage>),
}

impl Background {
    /// Solid backgrounds are the only opaque context: light modules get painted
    /// and logos get a synthesized backdrop.
    pub fn solid_color(&self) -> Option<Rgba> {
        match self {
            Background::Solid(color) => Some(*color),
            _ => None,
        }
    }
}

/// Which logo, if any, is placed over the safe zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoMode {
    None,
    Default,
    /// User-supplied vector document text.
    Custom(String),
}

impl LogoMode {
    pub fn is_requested(&self) -> bool {
        !matches!(self, LogoMode::None)
    }
}

/// Everything that determines a single render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub text: String,
    pub module_color: Rgba,
    pub background: Background,
    pub logo: LogoMode,
    rotation: f64,
}

impl RenderConfig {
    /// Black on white, no logo, unrotated.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            module_color: Rgba::BLACK,
            background: Background::Solid(Rgba::WHITE),
            logo: LogoMode::None,
            rotation: 0.0,
        }
    }

    pub fn with_module_color(mut self, color: Rgba) -> Self {
        self.module_color = color;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_logo(mut self, logo: LogoMode) -> Self {
        self.logo = logo;
        self
    }

    /// Sets the rotation in degrees; any finite angle is accepted and
    /// reduced into `[0, 360)`.
    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = if degrees.is_finite() {
            degrees.rem_euclid(360.0)
        } else {
            0.0
        };
        self
    }

    /// Rotation in degrees, always within `[0, 360)`.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }
}
