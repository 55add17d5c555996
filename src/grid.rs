//! Module grid adapter.
//!
//! Wraps the output of the external QR encoder into an immutable square
//! matrix of booleans. The encoding itself (segment selection, error
//! correction, masking) is delegated entirely to the `qrcode` crate.

use ::qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The error correction level used when encoding the payload.
///
/// Styled codes cover part of the symbol with a logo, so the renderer always
/// asks for [`QrCodeEcc::High`] unless told otherwise.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
pub enum QrCodeEcc {
    /// The QR Code can tolerate about  7% erroneous codewords.
    Low,
    /// The QR Code can tolerate about 15% erroneous codewords.
    Medium,
    /// The QR Code can tolerate about 25% erroneous codewords.
    Quartile,
    /// The QR Code can tolerate about 30% erroneous codewords.
    #[default]
    High,
}

impl QrCodeEcc {
    fn level(self) -> EcLevel {
        match self {
            QrCodeEcc::Low => EcLevel::L,
            QrCodeEcc::Medium => EcLevel::M,
            QrCodeEcc::Quartile => EcLevel::Q,
            QrCodeEcc::High => EcLevel::H,
        }
    }
}

/// A square grid of dark (`true`) and light (`false`) modules.
///
/// Immutable once built. Rows are stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleGrid {
    size: usize,
    modules: Vec<bool>,
}

impl ModuleGrid {
    /// Encodes `text` at the given error correction level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the encoder rejects the payload, which
    /// happens when it exceeds the capacity of the largest version at `ecl`.
    /// An empty `text` is also rejected: callers are expected to skip the
    /// render and clear their output instead.
    ///
    /// # Example
    ///
    /// ```rust
    /// use qistyle::{ModuleGrid, QrCodeEcc};
    ///
    /// let grid = ModuleGrid::encode("HELLO", QrCodeEcc::High).unwrap();
    /// assert_eq!(grid.size(), 21);
    /// ```
    pub fn encode(text: &str, ecl: QrCodeEcc) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::Encoding("payload text is empty".into()));
        }
        let code = QrCode::with_error_correction_level(text.as_bytes(), ecl.level())
            .map_err(|e| Error::Encoding(e.to_string()))?;
        let modules = code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();
        let grid = Self::from_flat(code.width(), modules)?;
        tracing::debug!(size = grid.size, ?ecl, "encoded module grid");
        Ok(grid)
    }

    /// Builds a grid from a flattened row-major module list.
    ///
    /// `modules.len()` must equal `size * size`.
    pub fn from_flat(size: usize, modules: Vec<bool>) -> Result<Self> {
        if size == 0 || size.checked_mul(size) != Some(modules.len()) {
            return Err(Error::Encoding(format!(
                "expected {size}x{size} modules, got {}",
                modules.len()
            )));
        }
        Ok(Self { size, modules })
    }

    /// Returns the side length, in modules.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the color of the module at the given coordinates.
    ///
    /// Returns `true` for dark modules and `false` for light modules.
    /// Coordinates outside the grid return `false`.
    ///
    /// * `x` - Column (0 is left).
    /// * `y` - Row (0 is top).
    pub fn get_module(&self, x: i32, y: i32) -> bool {
        let range = 0..self.size as i32;
        range.contains(&x) && range.contains(&y) && self.modules[y as usize * self.size + x as usize]
    }

    /// Iterates `(row, col, is_dark)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, bool)> + '_ {
        let size = self.size;
        self.modules
            .iter()
            .enumerate()
            .map(move |(i, &dark)| (i / size, i % size, dark))
    }
}

/// Encodes `text` at the highest error correction level.
pub fn build_grid(text: &str) -> Result<ModuleGrid> {
    ModuleGrid::encode(text, QrCodeEcc::High)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_is_version_one() {
        let grid = build_grid("HELLO").unwrap();
        assert_eq!(grid.size(), 21);
        // Top-left finder pattern corner is always dark.
        assert!(grid.get_module(0, 0));
        assert!(grid.get_module(6, 6));
        assert!(!grid.get_module(7, 7));
    }

    #[test]
    fn test_out_of_bounds_is_light() {
        let grid = build_grid("HELLO").unwrap();
        assert!(!grid.get_module(-1, 0));
        assert!(!grid.get_module(0, 21));
    }

    #[test]
    fn test_payload_over_capacity_is_rejected() {
        let text = "A".repeat(5000);
        let err = build_grid(&text).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_from_flat_checks_length() {
        assert!(ModuleGrid::from_flat(2, vec![true; 4]).is_ok());
        assert!(ModuleGrid::from_flat(2, vec![true; 3]).is_err());
        assert!(ModuleGrid::from_flat(0, vec![]).is_err());
    }

    #[test]
    fn test_iter_is_row_major() {
        let grid = ModuleGrid::from_flat(2, vec![true, false, false, true]).unwrap();
        let cells: Vec<_> = grid.iter().collect();
        assert_eq!(cells[1], (0, 1, false));
        assert_eq!(cells[2], (1, 0, false));
        assert_eq!(cells[3], (1, 1, true));
    }
}
