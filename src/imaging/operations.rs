//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take settings, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::calculate_cover_dimensions;
use super::params::{OptimizationLevel, OptimizeParams, Quality, ResizeParams};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &(impl ImageBackend + ?Sized), path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Optimize `source` and write the result to `destination`.
///
/// Returns `(bytes_before, bytes_after)`. Nothing is written when the backend
/// fails.
pub fn optimize_to(
    backend: &(impl ImageBackend + ?Sized),
    source: &Path,
    destination: &Path,
    level: OptimizationLevel,
    quality: Quality,
) -> Result<(u64, u64)> {
    let optimized = backend.optimize(&OptimizeParams {
        source: source.to_path_buf(),
        level,
        quality,
    })?;
    std::fs::write(destination, &optimized.bytes)?;
    Ok((optimized.original_size, optimized.optimized_size()))
}

/// Write a cover-fit variant of `source` at `width` to `output`.
///
/// Returns the dimensions written.
pub fn resize_cover(
    backend: &(impl ImageBackend + ?Sized),
    source: &Path,
    output: &Path,
    width: u32,
    quality: Quality,
) -> Result<(u32, u32)> {
    let original = get_dimensions(backend, source)?;
    let (width, height) = calculate_cover_dimensions(original, width);
    backend.resize(&ResizeParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        width,
        height,
        quality,
    })?;
    Ok((width, height))
}
