//! Thumbnail generation and caching.
//!
//! - [`generator`]: the [`ThumbnailGenerator`] collaborator and its `image`-crate implementation
//! - [`cache`]: [`ThumbnailCache`], the mtime-validated cache in front of a generator
//!
//! The generator knows nothing about caching; the cache knows nothing about pixels.

pub mod cache;
pub mod generator;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::{ThumbnailCache, WarmReport};
pub use generator::ImageThumbnailer;

/// Bounding box a thumbnail must fit within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Encoded format of generated thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy JPEG; alpha is dropped.
    #[default]
    Jpeg,
    /// Lossless PNG.
    Png,
}

impl OutputFormat {
    /// MIME type for serving the encoded bytes.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// Thumbnail settings shared by the generator and the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Maximum thumbnail width in pixels.
    pub max_width: u32,
    /// Maximum thumbnail height in pixels.
    pub max_height: u32,
    /// Output encoding.
    pub format: OutputFormat,
    /// JPEG quality (1-100). Ignored for PNG.
    pub quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_width: 300,
            max_height: 300,
            format: OutputFormat::Jpeg,
            quality: 85,
        }
    }
}

impl ThumbnailConfig {
    /// The configured bounding box.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.max_width, self.max_height)
    }
}

/// Errors that can occur while producing a thumbnail.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// The source could not be opened or decoded.
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The resized image could not be encoded.
    #[error("failed to encode thumbnail for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The requested bounding box is empty.
    #[error("invalid thumbnail size {dims} for {path}")]
    InvalidDimensions { path: PathBuf, dims: Dimensions },

    /// A custom generator failed for its own reasons.
    #[error("thumbnail generation failed for {path}: {message}")]
    Other { path: PathBuf, message: String },
}

impl ThumbnailError {
    /// Source file the failure refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Decode { path, .. }
            | Self::Encode { path, .. }
            | Self::InvalidDimensions { path, .. }
            | Self::Other { path, .. } => path,
        }
    }
}

/// Produces encoded thumbnail bytes for an image file.
///
/// Implementations must preserve aspect ratio, never exceed `max`, and
/// must not cache anything themselves.
pub trait ThumbnailGenerator: Send + Sync {
    /// Generate a thumbnail for the image at `path`.
    fn generate(&self, path: &Path, max: Dimensions) -> Result<Vec<u8>, ThumbnailError>;
}

impl<F> ThumbnailGenerator for F
where
    F: Fn(&Path, Dimensions) -> Result<Vec<u8>, ThumbnailError> + Send + Sync,
{
    fn generate(&self, path: &Path, max: Dimensions) -> Result<Vec<u8>, ThumbnailError> {
        self(path, max)
    }
}
