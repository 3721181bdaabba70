//! Ownership of the files one request writes to the transient directory.
//!
//! Paths are tracked as soon as they are created and removed when the request
//! finishes, whichever way it finishes. [`TransientFiles::release`] is the
//! normal path; the `Drop` impl removes whatever is left if the request future
//! is abandoned before reaching it.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// A transient file that could not be removed. Logged, never surfaced.
#[derive(Debug, thiserror::Error)]
#[error("failed to delete transient file {}: {source}", path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Outcome of releasing a request's transient files.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<CleanupError>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TransientFiles {
    paths: Vec<PathBuf>,
}

impl TransientFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of `path`. Call before the first byte is written so a
    /// partial file is still removed.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Stops tracking `path`, leaving the file on disk.
    pub fn forget(&mut self, path: &Path) -> bool {
        let before = self.paths.len();
        self.paths.retain(|tracked| tracked != path);
        before != self.paths.len()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Deletes every tracked file exactly once.
    pub async fn release(mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for path in std::mem::take(&mut self.paths) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "transient file removed");
                    report.removed.push(path);
                }
                Err(source) => {
                    let error = CleanupError { path, source };
                    warn!(%error, "transient file left on disk");
                    report.failures.push(error);
                }
            }
        }

        report
    }
}

// Only reached when a request future is abandoned before `release`. The
// removal blocks the current worker so the files are gone when drop returns.
impl Drop for TransientFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "abandoned transient file removed"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    let error = CleanupError { path, source };
                    warn!(%error, "abandoned transient file left on disk");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drop_inside_runtime_removes_files_before_returning() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("2-abandoned.png");
        std::fs::write(&path, b"x").expect("write");

        let mut files = TransientFiles::new();
        files.track(&path);
        drop(files);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn release_removes_tracked_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let first = dir.path().join("1-a.pdf");
        let second = dir.path().join("1-b.png");
        std::fs::write(&first, b"a").expect("write");
        std::fs::write(&second, b"b").expect("write");

        let mut files = TransientFiles::new();
        files.track(&first);
        files.track(&second);

        let report = files.release().await;
        assert!(report.is_clean());
        assert_eq!(report.removed.len(), 2);
        assert!(!first.exists());
        assert!(!second.exists());
    }

    #[tokio::test]
    async fn release_reports_missing_files_without_stopping() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("never-written.pdf");
        let present = dir.path().join("present.pdf");
        std::fs::write(&present, b"x").expect("write");

        let mut files = TransientFiles::new();
        files.track(&missing);
        files.track(&present);

        let report = files.release().await;
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, missing);
        assert_eq!(report.removed, vec![present.clone()]);
        assert!(!present.exists());
    }

    #[test]
    fn drop_removes_unreleased_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("abandoned.pdf");
        std::fs::write(&path, b"x").expect("write");

        {
            let mut files = TransientFiles::new();
            files.track(&path);
        }

        assert!(!path.exists());
    }

    #[test]
    fn forget_leaves_file_in_place() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("kept.pdf");
        std::fs::write(&path, b"x").expect("write");

        let mut files = TransientFiles::new();
        files.track(&path);
        assert!(files.forget(&path));
        drop(files);

        assert!(path.exists());
    }
}
