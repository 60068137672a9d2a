//! Leaf task errors.
//!
//! Every leaf action returns [`TaskError`]; the graph wraps it in a
//! [`TaskFailure`](crate::graph::TaskFailure) naming the leaf that failed.

use crate::command::CommandError;
use crate::imaging::BackendError;
use crate::sources::GlobError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path}: {message}")]
    Compile { path: PathBuf, message: String },
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Image(#[from] BackendError),
    #[error("{failed} of {total} files failed in {spec}")]
    Batch {
        spec: String,
        failed: usize,
        total: usize,
    },
    #[error(transparent)]
    Glob(#[from] GlobError),
    #[error("file watcher: {0}")]
    Watch(#[from] notify::Error),
    #[error("dev server error: {0}")]
    Server(String),
}

impl TaskError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        TaskError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
