//! The boundary between this crate and wherever raw image bytes actually
//! live. Grounded in `tiled_master/framework/utils.py::get_image_path`, minus
//! its URL-download branch: fetching artwork over the network is the
//! embedding application's concern, not this engine's.

use crate::error::{ResourceError, ResourceResult};
use async_trait::async_trait;
use image::RgbaImage;

pub struct DecodedImage {
    pub pixels: RgbaImage,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

#[async_trait]
pub trait AssetProvider: Send + Sync {
    /// Resolve `reference` (a resource descriptor's `image` field) to a
    /// decoded RGBA image.
    async fn load(&self, reference: &str) -> ResourceResult<DecodedImage>;
}

/// Reads `reference` as a local filesystem path. The convenience
/// implementation named in the ambient stack: suitable for tests and for
/// callers who have already resolved everything to local paths.
pub struct FilesystemAssetProvider;

#[async_trait]
impl AssetProvider for FilesystemAssetProvider {
    async fn load(&self, reference: &str) -> ResourceResult<DecodedImage> {
        let path = reference.to_string();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| ResourceError::NotFound { path: path.clone() })?;
        let pixels = image::load_from_memory(&bytes)
            .map_err(|source| ResourceError::Decode { path, source })?
            .to_rgba8();
        Ok(DecodedImage { pixels })
    }
}
