//! Font copy.

use crate::error::TaskError;
use crate::transform::{BatchReport, FileReport, TransformSpec, run_batch};
use std::fs;

/// Copy every file matched by `spec` unchanged.
pub fn copy_fonts(spec: &TransformSpec) -> Result<BatchReport, TaskError> {
    let report = run_batch(spec, false, |source, destination| {
        let bytes = fs::copy(source, destination).map_err(|e| TaskError::io(source, e))?;
        Ok(FileReport::Written {
            bytes_before: bytes,
            bytes_after: bytes,
        })
    })?;
    report.log_failures();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildMode, PipelineConfig};
    use crate::test_helpers::{list_files, setup_fixtures, write_file};
    use crate::transform::AssetPlan;

    #[test]
    fn copies_nested_fonts() {
        let tmp = setup_fixtures();
        write_file(&tmp.path().join("_assets/fonts/mono/code.ttf"), b"ttf");
        let plan =
            AssetPlan::from_config(tmp.path(), &PipelineConfig::default(), BuildMode::Production)
                .unwrap();

        let report = copy_fonts(&plan.fonts).unwrap();

        assert_eq!(report.written(), 2);
        assert_eq!(
            list_files(&plan.fonts.destination),
            vec!["inter.woff2", "mono/code.ttf"]
        );
        assert_eq!(
            fs::read(plan.fonts.destination.join("mono/code.ttf")).unwrap(),
            b"ttf"
        );
    }
}
