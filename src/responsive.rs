//! Responsive image variants.
//!
//! Every upload is written once per configured width under
//! `images/<width>w/`, keeping its file name:
//!
//! ```text
//! _assets/uploads/photo.jpg  →  _site/assets/images/640w/photo.jpg
//!                               _site/assets/images/960w/photo.jpg
//!                               _site/assets/images/1280w/photo.jpg
//!                               _site/assets/images/1600w/photo.jpg
//! ```
//!
//! Variants use a cover fit at the target width with the height taken from
//! the source aspect ratio. Sources narrower than a target keep their size.
//! Production builds only; the development graph never reaches this stage.

use crate::error::TaskError;
use crate::imaging::{ImageBackend, resize_cover};
use crate::transform::{
    BatchReport, FileReport, TransformOptions, TransformSpec, file_size, run_batch,
};

/// Produce the variants of every width. One report per width, in order.
///
/// Failed files are logged and skipped; neither the remaining files nor the
/// remaining widths are affected.
pub fn resize_all(
    specs: &[TransformSpec],
    backend: &(impl ImageBackend + ?Sized),
) -> Result<Vec<BatchReport>, TaskError> {
    specs.iter().map(|spec| resize_width(spec, backend)).collect()
}

fn resize_width(
    spec: &TransformSpec,
    backend: &(impl ImageBackend + ?Sized),
) -> Result<BatchReport, TaskError> {
    let TransformOptions::Resize(options) = &spec.options else {
        return Err(TaskError::Configuration(format!(
            "'{}' is not a resize transform",
            spec.name
        )));
    };

    let report = run_batch(spec, false, |source, destination| {
        let (width, height) =
            resize_cover(backend, source, destination, options.width, options.quality)?;
        tracing::debug!(file = %destination.display(), width, height, "variant written");
        Ok(FileReport::Written {
            bytes_before: file_size(source)?,
            bytes_after: file_size(destination)?,
        })
    })?;
    report.log_failures();
    Ok(report)
}
