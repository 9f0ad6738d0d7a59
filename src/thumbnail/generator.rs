//! Thumbnail generator backed by the `image` crate.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use super::{Dimensions, OutputFormat, ThumbnailConfig, ThumbnailError, ThumbnailGenerator};

/// Decodes images from disk and writes resized JPEG or PNG bytes.
#[derive(Debug, Clone, Default)]
pub struct ImageThumbnailer {
    config: ThumbnailConfig,
}

impl ImageThumbnailer {
    #[must_use]
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    fn decode(path: &Path) -> Result<DynamicImage, ThumbnailError> {
        let decode_err = |source| ThumbnailError::Decode {
            path: path.to_path_buf(),
            source,
        };
        ImageReader::open(path)
            .map_err(|e| decode_err(e.into()))?
            .with_guessed_format()
            .map_err(|e| decode_err(e.into()))?
            .decode()
            .map_err(decode_err)
    }

    /// Shrink to fit `max`, keeping aspect ratio. Small images are left as-is.
    fn fit(img: DynamicImage, max: Dimensions) -> DynamicImage {
        if img.width() <= max.width && img.height() <= max.height {
            img
        } else {
            img.resize(max.width, max.height, FilterType::Lanczos3)
        }
    }

    fn encode(&self, path: &Path, img: &DynamicImage) -> Result<Vec<u8>, ThumbnailError> {
        let mut buf = Vec::new();
        let result = match self.config.format {
            OutputFormat::Jpeg => {
                let rgb = img.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.config.quality);
                encoder.encode_image(&rgb)
            }
            OutputFormat::Png => img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png),
        };
        result.map_err(|source| ThumbnailError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(buf)
    }
}

impl ThumbnailGenerator for ImageThumbnailer {
    fn generate(&self, path: &Path, max: Dimensions) -> Result<Vec<u8>, ThumbnailError> {
        if max.width == 0 || max.height == 0 {
            return Err(ThumbnailError::InvalidDimensions {
                path: path.to_path_buf(),
                dims: max,
            });
        }
        let img = Self::decode(path)?;
        let (w, h) = (img.width(), img.height());
        let thumb = Self::fit(img, max);
        log::trace!(
            "Resized {} from {}x{} to {}x{}",
            path.display(),
            w,
            h,
            thumb.width(),
            thumb.height()
        );
        self.encode(path, &thumb)
    }
}
