//! Script minification.
//!
//! Each `js/*.js` file is minified on its own by an external minifier
//! (`terser --compress --mangle` unless configured otherwise) and written as
//! `js/<name>.min.js`. In development the minifier is asked for an inline
//! source map.
//!
//! Unlike stylesheets, a script that fails to minify fails the task. The
//! remaining files are still processed first, and a failed file never
//! overwrites its previous output.

use crate::command::{self, CommandError};
use crate::error::TaskError;
use crate::reload::ReloadSink;
use crate::transform::{
    BatchReport, FileReport, ScriptOptions, TransformOptions, TransformSpec, file_size, run_batch,
    write_output,
};
use std::path::Path;

/// Minifies one script file into bytes.
pub trait ScriptMinifier: Send + Sync {
    fn minify(&self, source: &Path, options: &ScriptOptions) -> Result<Vec<u8>, CommandError>;
}

/// Runs the configured minifier command with the source path appended and
/// reads the result from stdout.
#[derive(Debug, Default)]
pub struct ExternalMinifier;

impl ExternalMinifier {
    /// Full command line for one file.
    pub fn argv(source: &Path, options: &ScriptOptions) -> Vec<String> {
        let mut argv = options.minifier.clone();
        argv.push(source.to_string_lossy().to_string());
        if options.source_maps {
            argv.push("--source-map".to_string());
            argv.push("url=inline".to_string());
        }
        argv
    }
}

impl ScriptMinifier for ExternalMinifier {
    fn minify(&self, source: &Path, options: &ScriptOptions) -> Result<Vec<u8>, CommandError> {
        let cwd = source.parent().unwrap_or(Path::new("."));
        let output = command::run(&Self::argv(source, options), cwd)?;
        if !output.stderr.is_empty() {
            tracing::debug!(file = %source.display(), "{}", output.stderr);
        }
        Ok(output.stdout)
    }
}

/// Minify every file matched by `spec`; any failure fails the task once all
/// files were attempted.
pub fn build_scripts(
    spec: &TransformSpec,
    minifier: &(impl ScriptMinifier + ?Sized),
    reload: &ReloadSink,
) -> Result<BatchReport, TaskError> {
    let TransformOptions::Script(options) = &spec.options else {
        return Err(TaskError::Configuration(format!(
            "'{}' is not a script transform",
            spec.name
        )));
    };

    let report = run_batch(spec, false, |source, destination| {
        let code = minifier.minify(source, options)?;
        Ok(FileReport::Written {
            bytes_before: file_size(source)?,
            bytes_after: write_output(destination, &code)?,
        })
    })?;
    report.log_failures();

    if report.written() > 0 {
        reload.reload();
    }
    report.into_result()
}
