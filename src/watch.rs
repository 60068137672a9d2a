//! File watching for development builds.
//!
//! A [`WatchBinding`] ties a source glob to the task that rebuilds it and to
//! the way the browser should refresh afterwards. Filesystem events are
//! debounced, matched against the bindings, and each matched task is run
//! once per burst, in binding order. The browser reloads once, after the
//! whole burst. A failed rebuild is logged and the watcher keeps going.
//!
//! | Glob (under the source root unless noted) | Task | Refresh |
//! |---|---|---|
//! | `images/**/*` | `images:general` | reload |
//! | `uploads/*` | `images:uploads` | reload |
//! | `styles/scss/**/*.scss` | `styles:main` | inject |
//! | `styles/libs/**/*.css` | `styles:vendor` | inject |
//! | `js/*.js` | `scripts` | reload |
//! | project `**/*.{html,md,markdown,MD,yml}`, `_config.yml`, minus the site root and `node_modules` | `buildSiteGenerator` | reload |
//!
//! Style tasks push their own injections, so an `inject` binding adds
//! nothing after the task succeeds.

use crate::config::PipelineConfig;
use crate::error::TaskError;
use crate::graph::{RunReport, TaskFailure};
use crate::reload::ReloadSink;
use crate::sources::{GlobError, SourceGlob};
use notify::{EventKind, RecursiveMode, Watcher};
use notify_debouncer_full::{DebounceEventResult, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Full page reload.
    Reload,
    /// Stylesheet injection, sent by the style pipeline itself.
    Inject,
}

#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub glob: SourceGlob,
    pub task: String,
    pub refresh: Refresh,
}

/// The bindings of a project rooted at `root`.
pub fn bindings(root: &Path, config: &PipelineConfig) -> Result<Vec<WatchBinding>, GlobError> {
    let src = root.join(&config.paths.source);
    let site = config.paths.site.to_string_lossy().replace('\\', "/");
    let site_exclude = format!("!{}/**", site.trim_end_matches('/'));

    let bind = |glob: SourceGlob, task: &str, refresh: Refresh| WatchBinding {
        glob,
        task: task.to_string(),
        refresh,
    };

    Ok(vec![
        bind(
            SourceGlob::single(&src, "images/**/*")?,
            "images:general",
            Refresh::Reload,
        ),
        bind(
            SourceGlob::single(&src, "uploads/*")?,
            "images:uploads",
            Refresh::Reload,
        ),
        bind(
            SourceGlob::single(&src, "styles/scss/**/*.scss")?,
            "styles:main",
            Refresh::Inject,
        ),
        bind(
            SourceGlob::single(&src, "styles/libs/**/*.css")?,
            "styles:vendor",
            Refresh::Inject,
        ),
        bind(
            SourceGlob::single(&src, "js/*.js")?,
            "scripts",
            Refresh::Reload,
        ),
        bind(
            SourceGlob::new(
                root,
                &[
                    "**/*.{html,md,markdown,MD,yml}",
                    "_config.yml",
                    site_exclude.as_str(),
                    "!node_modules/**",
                ],
            )?,
            "buildSiteGenerator",
            Refresh::Reload,
        ),
    ])
}

/// Bindings touched by any of `paths`, in binding order, one per task.
pub fn matched<'a>(bindings: &'a [WatchBinding], paths: &[PathBuf]) -> Vec<&'a WatchBinding> {
    let mut hits: Vec<&WatchBinding> = Vec::new();
    for binding in bindings {
        if hits.iter().any(|b| b.task == binding.task) {
            continue;
        }
        if paths.iter().any(|p| binding.glob.matches(p)) {
            hits.push(binding);
        }
    }
    hits
}

/// Run the tasks bound to `paths`, then refresh the browser once if any
/// reload-bound task succeeded. Reloads the tasks request themselves are
/// folded into that one. Returns the number of tasks that succeeded.
pub fn dispatch<R>(bindings: &[WatchBinding], paths: &[PathBuf], run: R, sink: &ReloadSink) -> usize
where
    R: Fn(&str) -> Result<RunReport, TaskFailure>,
{
    let burst = sink.burst();
    let mut succeeded = 0;
    for binding in matched(bindings, paths) {
        tracing::info!(task = %binding.task, "change detected");
        match run(&binding.task) {
            Ok(_) => {
                succeeded += 1;
                if binding.refresh == Refresh::Reload {
                    sink.reload();
                }
            }
            Err(failure) => tracing::error!("{failure}; still watching"),
        }
    }
    drop(burst);
    succeeded
}

/// Watch `root` recursively and dispatch on a background thread.
///
/// The thread owns the watcher and lives until the process exits.
pub fn spawn<R>(
    root: &Path,
    bindings: Vec<WatchBinding>,
    debounce: Duration,
    sink: ReloadSink,
    run: R,
) -> Result<JoinHandle<()>, TaskError>
where
    R: Fn(&str) -> Result<RunReport, TaskFailure> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Vec<PathBuf>>();
    let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
        match result {
            Ok(events) => {
                let paths: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| !matches!(e.event.kind, EventKind::Access(_)))
                    .flat_map(|e| e.event.paths)
                    .collect();
                if !paths.is_empty() {
                    let _ = tx.send(paths);
                }
            }
            Err(errors) => {
                for e in errors {
                    tracing::warn!("watch error: {e}");
                }
            }
        }
    })?;
    debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
    tracing::info!(root = %root.display(), bindings = bindings.len(), "watching for changes");

    thread::Builder::new()
        .name("assetline-watch".into())
        .spawn(move || {
            let _debouncer = debouncer;
            for paths in rx {
                tracing::debug!(?paths, "changed");
                dispatch(&bindings, &paths, &run, &sink);
            }
        })
        .map_err(|e| TaskError::io(root, e))
}
