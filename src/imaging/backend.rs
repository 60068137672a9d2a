//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the asset
//! pipeline needs: identify, optimize, and cover-fit resize.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust on the
//! `image` crate, statically linked into the binary.

use super::params::{OptimizeParams, ResizeParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Result of an optimize operation. `bytes` is what should be written to the
/// destination; it is never larger than the original file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimized {
    pub bytes: Vec<u8>,
    pub original_size: u64,
}

impl Optimized {
    pub fn optimized_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: batch transforms call them from rayon
/// worker threads.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Re-encode a file as small as the settings allow, without writing it.
    fn optimize(&self, params: &OptimizeParams) -> Result<Optimized, BackendError>;

    /// Resize with a cover fit and write the result to `params.output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
