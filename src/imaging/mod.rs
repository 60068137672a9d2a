//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Optimize** | re-encode PNG / JPEG, keep the smaller file |
//! | **Cover resize** | `resize_to_fill` + Lanczos3 |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, Optimized};
pub use calculations::{calculate_cover_dimensions, savings_percent};
pub use operations::{get_dimensions, optimize_to, resize_cover};
pub use params::{Effort, OptimizationLevel, OptimizeParams, Quality, ResizeParams};
pub use rust_backend::RustBackend;
