//! Shared test utilities for the assetline test suite.
//!
//! Builds throwaway project trees in the conventional layout, with real
//! images generated by the `image` crate so both the mock and the pure-Rust
//! backend can be exercised against the same fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let uploads = tmp.path().join("_assets/uploads");
//! assert!(uploads.join("photo.jpg").exists());
//! ```

use image::{ImageBuffer, Rgb, Rgba};
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// Empty project with the source root in place.
pub fn make_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("_assets")).unwrap();
    tmp
}

/// Project populated with one file per asset class:
///
/// ```text
/// _assets/
/// ├── fonts/inter.woff2
/// ├── images/logo.png
/// ├── images/icons/star.png
/// ├── uploads/photo.jpg            (200x150)
/// ├── uploads/banner.png           (300x100)
/// ├── styles/scss/main.scss
/// ├── styles/scss/_vars.scss
/// ├── styles/libs/normalize.css
/// └── js/app.js
/// ```
pub fn setup_fixtures() -> TempDir {
    let tmp = make_project();
    let src = tmp.path().join("_assets");

    write_file(&src.join("fonts/inter.woff2"), b"wOF2 font bytes");
    write_png(&src.join("images/logo.png"), 32, 32);
    write_png(&src.join("images/icons/star.png"), 16, 16);
    write_jpeg(&src.join("uploads/photo.jpg"), 200, 150);
    write_png(&src.join("uploads/banner.png"), 300, 100);
    write_file(
        &src.join("styles/scss/_vars.scss"),
        b"$accent: #336699;\n",
    );
    write_file(
        &src.join("styles/scss/main.scss"),
        b"@use 'vars';\n\nbody {\n  color: vars.$accent;\n  .nav { display: flex; }\n}\n",
    );
    write_file(
        &src.join("styles/libs/normalize.css"),
        b"html { line-height: 1.15; }\n",
    );
    write_file(
        &src.join("js/app.js"),
        b"function greet(name) {\n  return 'hi ' + name;\n}\n",
    );
    tmp
}

// =========================================================================
// File writers
// =========================================================================

/// Write `bytes` to `path`, creating parent directories.
pub fn write_file(path: &Path, bytes: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// Write a gradient PNG with an alpha channel.
pub fn write_png(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128, 255])
    });
    img.save(path).unwrap();
}

/// Write a gradient JPEG.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, 90, (y * 255 / height.max(1)) as u8])
    });
    img.save(path).unwrap();
}

/// Relative paths of every file under `dir`, sorted, with `/` separators.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}
