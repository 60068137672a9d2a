//! Staleness checks for incremental builds.
//!
//! A destination is *fresh* when it exists and its modification time is at
//! least the source's. Anything we cannot prove fresh is stale: a missing
//! destination, an unreadable timestamp on either side, or a platform that
//! does not report modification times. Reprocessing a file is always safe;
//! skipping a stale one is not.

use std::path::Path;
use std::time::SystemTime;

/// Whether `destination` must be rebuilt from `source`.
pub fn is_stale(source: &Path, destination: &Path) -> bool {
    let Some(dest_modified) = modified(destination) else {
        return true;
    };
    let Some(source_modified) = modified(source) else {
        return true;
    };
    source_modified > dest_modified
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{FileTime, set_file_mtime};
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path, unix_secs: i64) {
        fs::write(path, b"x").unwrap();
        set_file_mtime(path, FileTime::from_unix_time(unix_secs, 0)).unwrap();
    }

    #[test]
    fn missing_destination_is_stale() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.png");
        touch(&src, 1_000);
        assert!(is_stale(&src, &tmp.path().join("out/a.png")));
    }

    #[test]
    fn newer_destination_is_fresh() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.png");
        let dst = tmp.path().join("b.png");
        touch(&src, 1_000);
        touch(&dst, 2_000);
        assert!(!is_stale(&src, &dst));
    }

    #[test]
    fn equal_timestamps_are_fresh() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.png");
        let dst = tmp.path().join("b.png");
        touch(&src, 1_500);
        touch(&dst, 1_500);
        assert!(!is_stale(&src, &dst));
    }

    #[test]
    fn older_destination_is_stale() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.png");
        let dst = tmp.path().join("b.png");
        touch(&src, 3_000);
        touch(&dst, 2_000);
        assert!(is_stale(&src, &dst));
    }

    #[test]
    fn unreadable_source_is_stale() {
        let tmp = TempDir::new().unwrap();
        let dst = tmp.path().join("b.png");
        touch(&dst, 2_000);
        assert!(is_stale(&tmp.path().join("gone.png"), &dst));
    }
}
