//! Stylesheet pipeline.
//!
//! Both style specs (`styles:main` and `styles:vendor`) run the same chain:
//!
//! ```text
//! SCSS/CSS ──grass──▶ CSS ──lightningcss──▶ prefixed, minified CSS (+ inline map in dev)
//! ```
//!
//! Output is built entirely in memory and written only after every step
//! succeeded, so a syntax error never replaces the last good stylesheet.
//! Compile errors are logged and the task still succeeds: in watch mode the
//! developer fixes the file and the next save rebuilds it.
//!
//! In development every written stylesheet is pushed to the reload sink as
//! an injection, addressed by its URL path under the site root.

use crate::error::TaskError;
use crate::reload::ReloadSink;
use crate::transform::{
    BatchReport, FileReport, StyleOptions, TransformOptions, TransformSpec, file_size, run_batch,
    write_output,
};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("SCSS: {0}")]
    Sass(String),
    #[error("CSS: {0}")]
    Css(String),
    #[error("browserslist: {0}")]
    Targets(String),
}

/// Turns one style source into final CSS text.
pub trait StyleCompiler: Send + Sync {
    fn compile(&self, source: &Path, options: &StyleOptions) -> Result<String, StyleError>;
}

/// grass for SCSS, lightningcss for prefixing and minification.
#[derive(Debug, Default)]
pub struct NativeStyleCompiler;

impl StyleCompiler for NativeStyleCompiler {
    fn compile(&self, source: &Path, options: &StyleOptions) -> Result<String, StyleError> {
        let sass_options = grass::Options::default().style(grass::OutputStyle::Expanded);
        let css = grass::from_path(source, &sass_options).map_err(|e| StyleError::Sass(e.to_string()))?;
        postprocess(&css, &source.to_string_lossy(), options)
    }
}

/// Prefix and minify compiled CSS; append an inline source map when asked.
pub fn postprocess(css: &str, filename: &str, options: &StyleOptions) -> Result<String, StyleError> {
    let browsers =
        Browsers::from_browserslist(&options.targets).map_err(|e| StyleError::Targets(e.to_string()))?;
    let targets = Targets {
        browsers,
        ..Targets::default()
    };

    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| StyleError::Css(e.to_string()))?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;

    let mut source_map = if options.source_maps {
        let mut map = SourceMap::new("/");
        map.add_source(filename);
        map.set_source_content(0, css)
            .map_err(|e| StyleError::Css(e.to_string()))?;
        Some(map)
    } else {
        None
    };

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            source_map: source_map.as_mut(),
            ..PrinterOptions::default()
        })
        .map_err(|e| StyleError::Css(e.to_string()))?;

    let mut code = printed.code;
    if let Some(map) = source_map.as_mut() {
        let url = map
            .to_data_url(None)
            .map_err(|e| StyleError::Css(e.to_string()))?;
        code.push_str(&format!("\n/*# sourceMappingURL={url} */\n"));
    }
    Ok(code)
}

/// Compile every file matched by `spec`.
///
/// Returns the batch report with compile failures included; they are logged
/// here and never turned into a task failure.
pub fn build_styles(
    spec: &TransformSpec,
    compiler: &(impl StyleCompiler + ?Sized),
    site_root: &Path,
    reload: &ReloadSink,
) -> Result<BatchReport, TaskError> {
    let TransformOptions::Style(options) = &spec.options else {
        return Err(TaskError::Configuration(format!(
            "'{}' is not a style transform",
            spec.name
        )));
    };

    let report = run_batch(spec, false, |source, destination| {
        let css = compiler
            .compile(source, options)
            .map_err(|e| TaskError::Compile {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(FileReport::Written {
            bytes_before: file_size(source)?,
            bytes_after: write_output(destination, css.as_bytes())?,
        })
    })?;
    report.log_failures();

    for outcome in &report.outcomes {
        if matches!(outcome.result, Ok(FileReport::Written { .. }))
            && let Some(url) = url_path(site_root, &outcome.destination)
        {
            reload.inject(url);
        }
    }
    Ok(report)
}

/// URL path of a file served from `site_root`: `/assets/styles/main.min.css`.
pub fn url_path(site_root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(site_root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(format!("/{}", parts.join("/")))
}
