//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Identify | `image::image_dimensions` (header only) |
//! | Optimize PNG | `PngEncoder` with adaptive filtering, effort from the level |
//! | Optimize JPEG | `JpegEncoder` at the configured quality |
//! | Cover resize | `DynamicImage::resize_to_fill` with `Lanczos3` |
//!
//! Formats without an optimizing encoder here (GIF, SVG, WebP, ...) pass
//! through `optimize` unchanged.

use super::backend::{BackendError, Dimensions, ImageBackend, Optimized};
use super::params::{Effort, OptimizeParams, Quality, ResizeParams};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(bytes: &[u8], format: ImageFormat, path: &Path) -> Result<DynamicImage, BackendError> {
    image::load_from_memory_with_format(bytes, format).map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    })
}

fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    image::ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

fn encode_png(img: &DynamicImage, effort: Effort) -> Result<Vec<u8>, BackendError> {
    let compression = match effort {
        Effort::Fast => CompressionType::Fast,
        Effort::Default => CompressionType::Default,
        Effort::Best => CompressionType::Best,
    };
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, compression, PngFilter::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {}", e)))?;
    Ok(out)
}

fn encode_jpeg(img: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.value());
    // JPEG has no alpha channel.
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(out)
}

/// Save a DynamicImage to the given path, keeping the source's format.
fn save_image(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        BackendError::ProcessingFailed(format!("Unsupported output format: {}", e))
    })?;
    let bytes = match format {
        ImageFormat::Jpeg => encode_jpeg(img, quality)?,
        ImageFormat::Png => encode_png(img, Effort::Default)?,
        other => {
            let mut cursor = std::io::Cursor::new(Vec::new());
            img.write_to(&mut cursor, other).map_err(|e| {
                BackendError::ProcessingFailed(format!("{:?} encode failed: {}", other, e))
            })?;
            cursor.into_inner()
        }
    };
    std::fs::write(path, bytes).map_err(BackendError::Io)
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn optimize(&self, params: &OptimizeParams) -> Result<Optimized, BackendError> {
        let original = std::fs::read(&params.source)?;
        let reencoded = match ImageFormat::from_path(&params.source) {
            Ok(ImageFormat::Png) => {
                let img = decode(&original, ImageFormat::Png, &params.source)?;
                Some(encode_png(&img, params.level.effort())?)
            }
            Ok(ImageFormat::Jpeg) => {
                let img = decode(&original, ImageFormat::Jpeg, &params.source)?;
                Some(encode_jpeg(&img, params.quality)?)
            }
            _ => None,
        };

        let original_size = original.len() as u64;
        let bytes = match reencoded {
            Some(smaller) if smaller.len() < original.len() => smaller,
            _ => original,
        };
        Ok(Optimized {
            bytes,
            original_size,
        })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let filled = img.resize_to_fill(params.width, params.height, FilterType::Lanczos3);
        save_image(&filled, &params.output, params.quality)
    }
}
