//! Asset collaborators: fetching logos and background bitmaps by reference.
//!
//! Loading is an awaited stage of a render. Failures come back as
//! [`Error::AssetLoad`] so the caller can render without the asset.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Background, LogoMode};
use crate::error::{Error, Result};

/// Logo bundled with the crate, usable as the default asset.
pub const BUILTIN_LOGO_SVG: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 48 48" fill="none">
  <circle cx="24" cy="24" r="17" stroke="#000000" stroke-width="4"/>
  <path d="M29 29l9 9" stroke="#000000" stroke-width="4" stroke-linecap="round"/>
  <rect x="18" y="18" width="12" height="12" rx="2" fill="#000000"/>
</svg>
"##;

/// Resolves asset references to raw bytes.
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, reference: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Reads assets from a directory.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetFetcher for FsFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.root.join(reference);
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::asset(reference, e))
    }
}

/// Serves assets from memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    assets: HashMap<String, Arc<[u8]>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fetcher serving [`BUILTIN_LOGO_SVG`] as `logo.svg`.
    pub fn with_builtin_logo() -> Self {
        let mut fetcher = Self::new();
        fetcher.insert("logo.svg", BUILTIN_LOGO_SVG.as_bytes().to_vec());
        fetcher
    }

    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.assets.insert(reference.into(), bytes.into());
    }
}

impl AssetFetcher for MemoryFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        self.assets
            .get(reference)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| Error::asset(reference, "not found"))
    }
}

/// Loads the vector source for `mode`.
///
/// `default_logo` is the reference fetched for [`LogoMode::Default`].
/// Returns `Ok(None)` when no logo is requested.
pub async fn load_logo<F: AssetFetcher>(
    fetcher: &F,
    mode: &LogoMode,
    default_logo: &str,
) -> Result<Option<String>> {
    match mode {
        LogoMode::None => Ok(None),
        LogoMode::Custom(source) => Ok(Some(source.clone())),
        LogoMode::Default => {
            let bytes = fetcher.fetch(default_logo).await?;
            let text = String::from_utf8(bytes).map_err(|e| Error::asset(default_logo, e))?;
            tracing::debug!(reference = default_logo, len = text.len(), "loaded default logo");
            Ok(Some(text))
        }
    }
}

/// Decodes an uploaded bitmap into an image background.
pub fn decode_background(reference: &str, bytes: &[u8]) -> Result<Background> {
    let image = image::load_from_memory(bytes).map_err(|e| Error::asset(reference, e))?;
    Ok(Background::Image(Arc::new(image.to_rgba8())))
}

/// Fetches and decodes a background bitmap.
pub async fn load_background<F: AssetFetcher>(fetcher: &F, reference: &str) -> Result<Background> {
    let bytes = fetcher.fetch(reference).await?;
    // Decoding is CPU bound; give other stages a turn before it.
    tokio::task::yield_now().await;
    decode_background(reference, &bytes)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::logo::VectorLogo;

    #[test]
    fn builtin_logo_parses() {
        let logo = VectorLogo::parse(BUILTIN_LOGO_SVG).unwrap();
        assert_eq!(logo.view_box(), [0.0, 0.0, 48.0, 48.0]);
    }

    #[tokio::test]
    async fn memory_fetcher_serves_default_logo() {
        let fetcher = MemoryFetcher::with_builtin_logo();
        let logo = load_logo(&fetcher, &LogoMode::Default, "logo.svg").await.unwrap();
        assert_eq!(logo.as_deref(), Some(BUILTIN_LOGO_SVG));
        assert_eq!(load_logo(&fetcher, &LogoMode::None, "logo.svg").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_default_logo_is_asset_error() {
        let err = load_logo(&MemoryFetcher::new(), &LogoMode::Default, "logo.svg")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AssetLoad { ref reference, .. } if reference == "logo.svg"));
    }

    #[tokio::test]
    async fn fs_fetcher_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.svg"), BUILTIN_LOGO_SVG).unwrap();
        let fetcher = FsFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("logo.svg").await.unwrap(), BUILTIN_LOGO_SVG.as_bytes());
        assert!(fetcher.fetch("missing.svg").await.is_err());
    }

    #[tokio::test]
    async fn background_is_decoded() {
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(image::RgbaImage::new(3, 2))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("bg.png", png);
        fetcher.insert("bad.png", b"not an image".to_vec());

        match load_background(&fetcher, "bg.png").await.unwrap() {
            Background::Image(image) => assert_eq!(image.dimensions(), (3, 2)),
            other => panic!("unexpected background {other:?}"),
        }
        assert!(load_background(&fetcher, "bad.png").await.is_err());
    }
}
