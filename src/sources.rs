//! Source globs.
//!
//! A [`SourceGlob`] is a set of gitignore-style patterns anchored at a base
//! directory. The base is the longest literal directory prefix shared by the
//! positive patterns (`_assets/images/**/*` → `_assets/images`); it is also
//! the point relative output paths are computed from, so
//! `_assets/images/icons/a.png` lands at `<dest>/icons/a.png`.
//!
//! Patterns prefixed with `!` exclude matches. Later patterns win over
//! earlier ones, so exclusions go last. `*` never crosses a directory
//! separator; `**` does.
//!
//! The same glob serves both directions: [`SourceGlob::files`] enumerates
//! sources for a transform and [`SourceGlob::matches`] tests paths reported
//! by the file watcher.

use ignore::overrides::{Override, OverrideBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum GlobError {
    #[error("invalid glob '{pattern}': {source}")]
    Invalid {
        pattern: String,
        source: ignore::Error,
    },
    #[error("pattern '{pattern}' does not start with the shared base '{base}'")]
    OutsideBase { pattern: String, base: String },
    #[error("a glob needs at least one non-negated pattern")]
    Empty,
}

/// Compiled glob patterns anchored at a base directory.
#[derive(Debug, Clone)]
pub struct SourceGlob {
    base: PathBuf,
    patterns: Vec<String>,
    overrides: Override,
}

impl SourceGlob {
    /// Compile a single pattern relative to `root`.
    pub fn single(root: &Path, pattern: &str) -> Result<Self, GlobError> {
        Self::new(root, &[pattern])
    }

    /// Compile several patterns relative to `root`. Every pattern must start
    /// with the literal prefix shared by the positive ones.
    pub fn new<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Self, GlobError> {
        let patterns: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();

        let mut positives = patterns.iter().filter(|p| !p.starts_with('!'));
        let first = positives.next().ok_or(GlobError::Empty)?;
        let mut prefix = literal_prefix(first);
        for pattern in positives {
            let other = literal_prefix(pattern);
            let shared = prefix
                .iter()
                .zip(&other)
                .take_while(|(a, b)| a == b)
                .count();
            prefix.truncate(shared);
        }

        let mut base = root.to_path_buf();
        for segment in &prefix {
            base.push(segment);
        }

        let mut builder = OverrideBuilder::new(&base);
        for pattern in &patterns {
            let (negated, body) = match pattern.strip_prefix('!') {
                Some(body) => (true, body),
                None => (false, pattern.as_str()),
            };
            let rest = strip_segments(body, &prefix).ok_or_else(|| GlobError::OutsideBase {
                pattern: pattern.clone(),
                base: prefix.join("/"),
            })?;
            // Anchor at the base: a bare `*` would otherwise match at any depth.
            let glob = format!("{}/{}", if negated { "!" } else { "" }, rest);
            builder.add(&glob).map_err(|source| GlobError::Invalid {
                pattern: pattern.clone(),
                source,
            })?;
        }
        let overrides = builder.build().map_err(|source| GlobError::Invalid {
            pattern: patterns.join(", "),
            source,
        })?;

        Ok(Self {
            base,
            patterns,
            overrides,
        })
    }

    /// Directory the patterns are anchored at.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The patterns as written, for diagnostics.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Path of `path` relative to the base, if it lies under it.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.base).ok()
    }

    /// Whether a file path is selected by the patterns.
    pub fn matches(&self, path: &Path) -> bool {
        match self.relative(path) {
            Some(rel) if !rel.as_os_str().is_empty() => {
                self.overrides.matched(rel, false).is_whitelist()
            }
            _ => false,
        }
    }

    /// All matching files, sorted by path. A missing base yields nothing.
    pub fn files(&self) -> Vec<PathBuf> {
        if !self.base.is_dir() {
            tracing::debug!(base = %self.base.display(), "glob base does not exist");
            return Vec::new();
        }
        let walker = WalkDir::new(&self.base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() || entry.depth() == 0 {
                    return true;
                }
                match entry.path().strip_prefix(&self.base) {
                    Ok(rel) => !self.overrides.matched(rel, true).is_ignore(),
                    Err(_) => true,
                }
            });

        let mut files: Vec<PathBuf> = walker
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.matches(path))
            .collect();
        files.sort();
        files
    }
}

/// Leading path segments free of glob syntax. The final segment always
/// names the files and is never part of the prefix.
fn literal_prefix(pattern: &str) -> Vec<String> {
    let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let Some((_, dirs)) = segments.split_last() else {
        return Vec::new();
    };
    dirs.iter()
        .take_while(|s| !s.contains(|c: char| matches!(c, '*' | '?' | '[' | '{')) && **s != ".")
        .map(|s| s.to_string())
        .collect()
}

fn strip_segments(pattern: &str, prefix: &[String]) -> Option<String> {
    let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < prefix.len() {
        return None;
    }
    let (head, tail) = segments.split_at(prefix.len());
    if head.iter().zip(prefix).all(|(a, b)| *a == b.as_str()) {
        Some(tail.join("/"))
    } else {
        None
    }
}
