//! CLI output formatting.
//!
//! Tracing carries diagnostics on stderr; this module renders the user-facing
//! reports on stdout. Each report has a `format_*` function returning
//! `Vec<String>` for testability and a `print_*` wrapper that writes it.
//! Format functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Batch
//!
//! One line per written file, paths relative to the build root, then a
//! summary line:
//!
//! ```text
//! images/logo.png  14.2 kB → 11.9 kB  (-16.2%)
//! styles/main.min.css  3.1 kB
//! images:general: 1 written, 4 up to date
//! ```
//!
//! ## Tasks
//!
//! ```text
//! css        fonts, images and stylesheets
//!     fonts → images:general | images:uploads → styles:main → styles:vendor
//! ```

use crate::imaging::savings_percent;
use crate::transform::{BatchReport, FileReport};
use std::path::Path;

// ============================================================================
// Sizes
// ============================================================================

/// Human-readable byte count with decimal units.
///
/// ```text
/// 512 B
/// 1.5 kB
/// 2.35 MB
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["kB", "MB", "GB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {unit}")
}

/// One written file. Shows the change only when the size changed.
pub fn format_file_line(path: &str, before: u64, after: u64) -> String {
    if before == after {
        return format!("{path}  {}", format_size(after));
    }
    format!(
        "{path}  {} → {}  ({:+.1}%)",
        format_size(before),
        format_size(after),
        -savings_percent(before, after)
    )
}

// ============================================================================
// Batches
// ============================================================================

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// File lines plus a summary for one batch, paths shown relative to
/// `build_root`.
pub fn format_batch_summary(report: &BatchReport, build_root: &Path) -> Vec<String> {
    let mut lines: Vec<String> = report
        .outcomes
        .iter()
        .filter_map(|outcome| match outcome.result {
            Ok(FileReport::Written {
                bytes_before,
                bytes_after,
            }) => Some(format_file_line(
                &display_path(&outcome.destination, build_root),
                bytes_before,
                bytes_after,
            )),
            _ => None,
        })
        .collect();

    if report.total() == 0 {
        lines.push(format!("{}: no matching files", report.spec));
        return lines;
    }

    let mut parts = vec![format!("{} written", report.written())];
    if report.skipped() > 0 {
        parts.push(format!("{} up to date", report.skipped()));
    }
    if report.failed() > 0 {
        parts.push(format!("{} failed", report.failed()));
    }
    lines.push(format!("{}: {}", report.spec, parts.join(", ")));
    lines
}

pub fn print_batch_summary(report: &BatchReport, build_root: &Path) {
    for line in format_batch_summary(report, build_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Task list
// ============================================================================

/// One entry point for `tasks`.
pub struct TaskListing<'a> {
    pub name: &'a str,
    pub description: &'a str,
    /// Leaf stages in run order; members of a parallel group share a stage.
    pub stages: Vec<Vec<String>>,
}

/// Entry points with their descriptions and leaf plans.
pub fn format_task_list(tasks: &[TaskListing<'_>]) -> Vec<String> {
    let width = tasks.iter().map(|t| t.name.len()).max().unwrap_or(0);
    let mut lines = Vec::new();
    for task in tasks {
        lines.push(format!("{:<width$}  {}", task.name, task.description));
        let plan: Vec<String> = task.stages.iter().map(|stage| stage.join(" | ")).collect();
        if plan.len() > 1 || plan.first().is_some_and(|p| p != task.name) {
            lines.push(format!("    {}", plan.join(" → ")));
        }
    }
    lines
}

pub fn print_task_list(tasks: &[TaskListing<'_>]) {
    for line in format_task_list(tasks) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
