use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::error;

use crate::errors::CovError;

/// Snapshot of a test file taken before a candidate is spliced in.
///
/// Dropping the guard writes the snapshot back unless `commit` was called,
/// so every early return and propagated error leaves the file as it was.
#[derive(Debug)]
pub struct TestFileGuard {
    path: PathBuf,
    original: String,
    restore_on_drop: bool,
}

impl TestFileGuard {
    pub fn snapshot(path: &Path) -> Result<Self, CovError> {
        let original = fs::read_to_string(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            original,
            restore_on_drop: true,
        })
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn write(&self, content: &str) -> Result<(), CovError> {
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Keeps the current on-disk content.
    pub fn commit(mut self) {
        self.restore_on_drop = false;
    }

    pub fn restore(mut self) -> Result<(), CovError> {
        self.restore_on_drop = false;
        fs::write(&self.path, &self.original)?;
        Ok(())
    }
}

impl Drop for TestFileGuard {
    fn drop(&mut self) {
        if self.restore_on_drop {
            if let Err(e) = fs::write(&self.path, &self.original) {
                error!(test_file = %self.path.display(), error = %e, "failed to restore test file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn test_file(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_app.py");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn drop_restores_snapshot() {
        let (_dir, path) = test_file("original\n");
        {
            let guard = TestFileGuard::snapshot(&path).unwrap();
            guard.write("modified\n").unwrap();
            assert_eq!(fs::read_to_string(&path).unwrap(), "modified\n");
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "original\n");
    }

    #[test]
    fn commit_keeps_modification() {
        let (_dir, path) = test_file("original\n");
        let guard = TestFileGuard::snapshot(&path).unwrap();
        guard.write("modified\n").unwrap();
        guard.commit();
        assert_eq!(fs::read_to_string(&path).unwrap(), "modified\n");
    }

    #[test]
    fn restore_is_explicit_and_final() {
        let (_dir, path) = test_file("original\n");
        let guard = TestFileGuard::snapshot(&path).unwrap();
        assert_eq!(guard.original(), "original\n");
        guard.write("modified\n").unwrap();
        guard.restore().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "original\n");
    }

    #[test]
    fn restores_when_error_propagates() {
        fn failing_step(path: &Path) -> Result<(), CovError> {
            let guard = TestFileGuard::snapshot(path)?;
            guard.write("half written")?;
            Err(CovError::RuntimeError(String::from("boom")))
        }
        let (_dir, path) = test_file("original\n");
        assert!(failing_step(&path).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "original\n");
    }
}
