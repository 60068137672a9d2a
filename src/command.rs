//! External command runner.
//!
//! The site generator and the script minifier are separate programs. Both go
//! through [`run`], which captures stdout and stderr and turns a non-zero
//! exit into [`CommandError::Exit`] carrying the tail of stderr. Helpers the
//! pipeline does not wait on, like the browser opener, use [`spawn_detached`].

use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("'{program}' exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("empty command line")]
    Empty,
}

/// Captured output of a successful run.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Run `argv` in `cwd` to completion.
pub fn run<S: AsRef<str>>(argv: &[S], cwd: &Path) -> Result<CommandOutput, CommandError> {
    let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
    let program = program.as_ref();
    tracing::debug!(
        program,
        args = ?args.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
        cwd = %cwd.display(),
        "spawning"
    );

    let output = Command::new(program)
        .args(args.iter().map(AsRef::as_ref))
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        return Err(CommandError::Exit {
            program: program.to_string(),
            status: output.status,
            stderr: tail(&stderr, 20),
        });
    }
    Ok(CommandOutput {
        stdout: output.stdout,
        stderr,
    })
}

/// Start `argv` without waiting for it. The child is reaped on a background
/// thread.
pub fn spawn_detached<S: AsRef<str>>(argv: &[S]) -> Result<(), CommandError> {
    let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
    let program = program.as_ref();
    tracing::debug!(program, "spawning detached");

    let mut child = Command::new(program)
        .args(args.iter().map(AsRef::as_ref))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

/// Last `lines` lines of `text`.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
