//! Transform specs and the batch runner.
//!
//! A [`TransformSpec`] pairs a [`SourceGlob`] with a destination directory
//! and the options of one asset class. The full set for a project is an
//! [`AssetPlan`], built once at start-up from [`PipelineConfig`] and the
//! [`BuildMode`], and shared read-only by every task.
//!
//! ## Layout
//!
//! ```text
//! _assets/                         _site/assets/
//! ├── fonts/**/*           copy  → fonts/
//! ├── images/**/*      optimize  → images/
//! ├── uploads/*        optimize  → uploads/
//! │                      resize  → images/<width>w/
//! ├── styles/scss/main.scss      → styles/main.min.css
//! ├── styles/libs/**/*.css       → styles/libs/<rel>.min.css
//! └── js/*.js                    → js/<name>.min.js
//! ```
//!
//! ## Batches
//!
//! [`run_batch`] fans the files of one spec out over the rayon pool and
//! collects a [`FileOutcome`] per file. A failing file never stops its
//! siblings; the caller decides from the [`BatchReport`] whether failures
//! fail the task.

use crate::config::{BuildMode, PipelineConfig};
use crate::error::TaskError;
use crate::freshness::is_stale;
use crate::imaging::{OptimizationLevel, Quality};
use crate::sources::{GlobError, SourceGlob};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageOptions {
    pub level: OptimizationLevel,
    pub quality: Quality,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleOptions {
    /// browserslist queries for vendor prefixing.
    pub targets: Vec<String>,
    /// Inline source map appended to the output.
    pub source_maps: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOptions {
    pub minifier: Vec<String>,
    pub source_maps: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeOptions {
    pub width: u32,
    pub quality: Quality,
}

/// What a spec does to each matched file.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOptions {
    Copy,
    Optimize(ImageOptions),
    Style(StyleOptions),
    Script(ScriptOptions),
    Resize(ResizeOptions),
}

/// One asset class: input glob, output directory, options.
#[derive(Debug, Clone)]
pub struct TransformSpec {
    pub name: String,
    pub source: SourceGlob,
    pub destination: PathBuf,
    pub options: TransformOptions,
}

impl TransformSpec {
    /// Output path for a matched source. Relative structure under the glob
    /// base is preserved; styles and scripts gain a `.min` suffix.
    pub fn output_path(&self, source: &Path) -> Option<PathBuf> {
        let rel = self.source.relative(source)?;
        let rel = match &self.options {
            TransformOptions::Style(_) => with_min_suffix(rel, "css"),
            TransformOptions::Script(_) => with_min_suffix(rel, "js"),
            _ => rel.to_path_buf(),
        };
        Some(self.destination.join(rel))
    }

    /// Create the destination directory and its parents. Idempotent.
    pub fn ensure_destination(&self) -> Result<(), TaskError> {
        fs::create_dir_all(&self.destination).map_err(|e| TaskError::io(&self.destination, e))
    }
}

/// `a/b/name.ext` → `a/b/name.min.<ext>`. Names already ending in `.min`
/// are not suffixed twice.
fn with_min_suffix(rel: &Path, ext: &str) -> PathBuf {
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = if stem.ends_with(".min") {
        format!("{stem}.{ext}")
    } else {
        format!("{stem}.min.{ext}")
    };
    rel.with_file_name(name)
}

/// Every transform of one project.
#[derive(Debug, Clone)]
pub struct AssetPlan {
    pub fonts: TransformSpec,
    pub images_general: TransformSpec,
    pub images_uploads: TransformSpec,
    pub style_main: TransformSpec,
    pub style_vendor: TransformSpec,
    pub scripts: TransformSpec,
    /// One spec per responsive width, in configured order.
    pub responsive: Vec<TransformSpec>,
    /// Build output root, removed by `clean`.
    pub build_root: PathBuf,
}

impl AssetPlan {
    pub fn from_config(
        root: &Path,
        config: &PipelineConfig,
        mode: BuildMode,
    ) -> Result<Self, GlobError> {
        let src = root.join(&config.paths.source);
        let build = root.join(&config.paths.build);
        let source_maps = mode.is_development();

        let image_options = TransformOptions::Optimize(ImageOptions {
            level: OptimizationLevel::new(config.images.optimization_level),
            quality: Quality::new(config.images.jpeg_quality),
        });
        let style_options = TransformOptions::Style(StyleOptions {
            targets: config.styles.targets.clone(),
            source_maps,
        });

        let spec = |name: &str, pattern: &str, dest: &str, options: TransformOptions| {
            Ok::<_, GlobError>(TransformSpec {
                name: name.to_string(),
                source: SourceGlob::single(&src, pattern)?,
                destination: build.join(dest),
                options,
            })
        };

        let responsive = config
            .responsive
            .widths
            .iter()
            .map(|&width| {
                spec(
                    &format!("resize:{width}w"),
                    "uploads/*",
                    &format!("images/{width}w"),
                    TransformOptions::Resize(ResizeOptions {
                        width,
                        quality: Quality::new(config.images.jpeg_quality),
                    }),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            fonts: spec("fonts", "fonts/**/*", "fonts", TransformOptions::Copy)?,
            images_general: spec("images:general", "images/**/*", "images", image_options.clone())?,
            images_uploads: spec("images:uploads", "uploads/*", "uploads", image_options)?,
            style_main: spec(
                "styles:main",
                "styles/scss/main.scss",
                "styles",
                style_options.clone(),
            )?,
            style_vendor: spec("styles:vendor", "styles/libs/**/*.css", "styles/libs", style_options)?,
            scripts: spec(
                "scripts",
                "js/*.js",
                "js",
                TransformOptions::Script(ScriptOptions {
                    minifier: config.scripts.minifier.clone(),
                    source_maps,
                }),
            )?,
            responsive,
            build_root: build,
        })
    }
}

/// Result of one file in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileReport {
    Written { bytes_before: u64, bytes_after: u64 },
    /// Destination already up to date.
    Skipped,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub result: Result<FileReport, TaskError>,
}

/// Collected outcomes of one spec, in source order.
#[derive(Debug)]
pub struct BatchReport {
    pub spec: String,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(FileReport::Written { .. })))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(FileReport::Skipped)))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Log every failed file with its path.
    pub fn log_failures(&self) {
        for outcome in self.failures() {
            if let Err(e) = &outcome.result {
                tracing::error!(
                    spec = %self.spec,
                    file = %outcome.source.display(),
                    "{e}"
                );
            }
        }
    }

    /// Turn any failure into [`TaskError::Batch`].
    pub fn into_result(self) -> Result<Self, TaskError> {
        let failed = self.failed();
        if failed > 0 {
            return Err(TaskError::Batch {
                spec: self.spec,
                failed,
                total: self.outcomes.len(),
            });
        }
        Ok(self)
    }
}

/// Run `op(source, destination)` for every file the spec matches.
///
/// With `stale_only`, files whose destination is up to date are reported as
/// [`FileReport::Skipped`] without calling `op`. The destination directory
/// (and each file's parent) is created before `op` runs.
pub fn run_batch<F>(spec: &TransformSpec, stale_only: bool, op: F) -> Result<BatchReport, TaskError>
where
    F: Fn(&Path, &Path) -> Result<FileReport, TaskError> + Sync,
{
    spec.ensure_destination()?;
    let files: Vec<(PathBuf, PathBuf)> = spec
        .source
        .files()
        .into_iter()
        .filter_map(|source| spec.output_path(&source).map(|dest| (source, dest)))
        .collect();
    tracing::debug!(spec = %spec.name, files = files.len(), "batch start");

    let outcomes = files
        .into_par_iter()
        .map(|(source, destination)| {
            let result = if stale_only && !is_stale(&source, &destination) {
                tracing::debug!(file = %source.display(), "up to date");
                Ok(FileReport::Skipped)
            } else {
                prepare_parent(&destination).and_then(|()| op(&source, &destination))
            };
            FileOutcome {
                source,
                destination,
                result,
            }
        })
        .collect();

    Ok(BatchReport {
        spec: spec.name.clone(),
        outcomes,
    })
}

fn prepare_parent(destination: &Path) -> Result<(), TaskError> {
    match destination.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e)),
        None => Ok(()),
    }
}

/// Write `bytes` to `destination`, returning the number of bytes written.
pub fn write_output(destination: &Path, bytes: &[u8]) -> Result<u64, TaskError> {
    fs::write(destination, bytes).map_err(|e| TaskError::io(destination, e))?;
    Ok(bytes.len() as u64)
}

/// Size of a file on disk, for before/after reports.
pub fn file_size(path: &Path) -> Result<u64, TaskError> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| TaskError::io(path, e))
}
