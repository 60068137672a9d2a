//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pipeline stages (which decide which files to touch)
//! and the [`backend`](super::backend) (which does the pixel work), so tests
//! can swap in a mock backend without changing pipeline logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1-100, default 90). Clamped on construction.
//! - [`OptimizationLevel`]: Compression effort (0-7, default 5). Clamped on construction.
//! - [`OptimizeParams`]: Source file plus the settings used to re-encode it.
//! - [`ResizeParams`]: Full specification for a cover-fit resize.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// How hard the optimizer tries to shrink lossless formats (0-7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizationLevel(u8);

/// PNG compression effort derived from an [`OptimizationLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effort {
    Fast,
    Default,
    Best,
}

impl OptimizationLevel {
    pub fn new(value: u8) -> Self {
        Self(value.min(7))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn effort(self) -> Effort {
        match self.0 {
            0..=1 => Effort::Fast,
            2..=4 => Effort::Default,
            _ => Effort::Best,
        }
    }
}

impl Default for OptimizationLevel {
    fn default() -> Self {
        Self(5)
    }
}

/// Parameters for re-encoding a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeParams {
    pub source: PathBuf,
    pub level: OptimizationLevel,
    pub quality: Quality,
}

/// Parameters for a cover-fit resize: scale to fill `width`×`height`,
/// centre-crop any overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn level_clamps_and_maps_to_effort() {
        assert_eq!(OptimizationLevel::new(12).value(), 7);
        assert_eq!(OptimizationLevel::new(0).effort(), Effort::Fast);
        assert_eq!(OptimizationLevel::new(3).effort(), Effort::Default);
        assert_eq!(OptimizationLevel::default().effort(), Effort::Best);
    }
}
