//! Site generator invocation.

use crate::command;
use crate::error::TaskError;
use crate::reload::ReloadSink;
use std::path::Path;

/// Run the site generator in `root`. A non-zero exit fails the task; on
/// success the reload sink is told to refresh the page.
pub fn build_site(root: &Path, argv: &[String], reload: &ReloadSink) -> Result<(), TaskError> {
    let output = command::run(argv, root)?;
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        let line = line.trim();
        if !line.is_empty() {
            tracing::debug!(target: "assetline::site", "{line}");
        }
    }
    reload.reload();
    Ok(())
}
