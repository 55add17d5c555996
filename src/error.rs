//! Error types for rendering and export.

use thiserror::Error;

/// Result type alias for rendering operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, rendering or exporting a QR symbol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The encoder rejected the payload (too long for the grid at the requested level).
    #[error("QR encoding failed: {0}")]
    Encoding(String),

    /// A logo or background asset could not be fetched or decoded.
    #[error("Failed to load asset '{reference}': {reason}")]
    AssetLoad { reference: String, reason: String },

    /// PNG or vector serialization failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// Invalid render options or color values
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn asset(reference: impl Into<String>, reason: impl ToString) -> Self {
        Error::AssetLoad {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error aborts the render it occurred in.
    ///
    /// Asset failures are recovered inside the renderers: the frame is still
    /// produced without the missing asset.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::AssetLoad { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_errors_are_recoverable() {
        let err = Error::asset("logo.svg", "not found");
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "Failed to load asset 'logo.svg': not found");
    }

    #[test]
    fn encoding_errors_are_fatal() {
        assert!(Error::Encoding("data too long".into()).is_fatal());
        assert!(Error::Export("disk full".into()).is_fatal());
    }
}
