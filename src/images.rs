//! Image optimization streams.
//!
//! `images:general` (`images/**/*`) and `images:uploads` (`uploads/*`) run
//! the same pipeline over different specs:
//!
//! ```text
//! glob → staleness filter → optimize → write → size report
//! ```
//!
//! A file that fails to decode or write is logged and left out; the rest of
//! the stream carries on and the task still succeeds.

use crate::error::TaskError;
use crate::imaging::{ImageBackend, optimize_to};
use crate::transform::{BatchReport, FileReport, TransformOptions, TransformSpec, run_batch};

/// Optimize every stale file matched by `spec`.
pub fn optimize_stream(
    spec: &TransformSpec,
    backend: &(impl ImageBackend + ?Sized),
) -> Result<BatchReport, TaskError> {
    let TransformOptions::Optimize(options) = &spec.options else {
        return Err(TaskError::Configuration(format!(
            "'{}' is not an image transform",
            spec.name
        )));
    };

    let report = run_batch(spec, true, |source, destination| {
        let (bytes_before, bytes_after) =
            optimize_to(backend, source, destination, options.level, options.quality)?;
        Ok(FileReport::Written {
            bytes_before,
            bytes_after,
        })
    })?;
    report.log_failures();
    Ok(report)
}
