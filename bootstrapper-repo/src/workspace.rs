//! Ephemeral workspace owned by one pipeline run.
//!
//! ```text
//! <tmp>/openmcp.cloud.bootstrapper-XXXX/
//!   download/    template resources as fetched
//!   templates/   templates rearranged into the repository layout
//!   repo/        clone of the deployment repository
//!   auth/        credential helper files for git
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::error::{io_err, RepoError};

const PREFIX: &str = "openmcp.cloud.bootstrapper-";

#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
}

impl Workspace {
    /// Create the workspace below the system temp directory.
    pub fn create() -> Result<Self, RepoError> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        let root = dir.path().to_path_buf();
        tracing::trace!("created working dir {}", root.display());

        let ws = Self { dir: Some(dir), root };
        for sub in [ws.download_dir(), ws.templates_dir(), ws.repo_dir(), ws.auth_dir()] {
            fs::create_dir_all(&sub).map_err(|e| io_err(&sub, e))?;
        }
        Ok(ws)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn download_dir(&self) -> PathBuf {
        self.root.join("download")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.root.join("repo")
    }

    pub fn auth_dir(&self) -> PathBuf {
        self.root.join("auth")
    }

    /// Remove the workspace. Failures are logged, never returned.
    pub fn cleanup(&mut self) {
        if let Some(dir) = self.dir.take() {
            tracing::trace!("removing working dir {}", self.root.display());
            if let Err(e) = dir.close() {
                tracing::warn!("failed to remove working dir {}: {e}", self.root.display());
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Copy the tree below `src` into `dst`, creating `dst` if needed.
pub(crate) fn copy_dir(src: &Path, dst: &Path) -> Result<(), RepoError> {
    fs::metadata(src).map_err(|e| io_err(src, e))?;
    fs::create_dir_all(dst).map_err(|e| io_err(dst, e))?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            io_err(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            fs::copy(entry.path(), &target).map_err(|e| io_err(&target, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_lays_out_subdirectories() {
        let ws = Workspace::create().expect("workspace");
        let name = ws.root().file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with(PREFIX), "{name}");
        assert!(ws.templates_dir().is_dir());
        assert!(ws.repo_dir().is_dir());
        assert!(ws.download_dir().is_dir());
        assert!(ws.auth_dir().is_dir());
    }

    #[test]
    fn cleanup_removes_everything_and_is_idempotent() {
        let mut ws = Workspace::create().expect("workspace");
        let root = ws.root().to_path_buf();
        fs::write(ws.repo_dir().join("file"), "x").expect("write");
        ws.cleanup();
        assert!(!root.exists());
        ws.cleanup();
    }

    #[test]
    fn drop_removes_workspace() {
        let root = {
            let ws = Workspace::create().expect("workspace");
            ws.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn copy_dir_preserves_nested_layout() {
        let src = tempfile::TempDir::new().expect("tempdir");
        let dst = tempfile::TempDir::new().expect("tempdir");
        fs::create_dir_all(src.path().join("a/b")).expect("mkdir");
        fs::write(src.path().join("a/b/c.yaml"), "c").expect("write");
        fs::write(src.path().join("top.yaml"), "t").expect("write");

        copy_dir(src.path(), &dst.path().join("out")).expect("copy");
        assert_eq!(fs::read_to_string(dst.path().join("out/a/b/c.yaml")).expect("read"), "c");
        assert_eq!(fs::read_to_string(dst.path().join("out/top.yaml")).expect("read"), "t");
    }

    #[test]
    fn copy_dir_fails_for_missing_source() {
        let dst = tempfile::TempDir::new().expect("tempdir");
        let err = copy_dir(Path::new("/definitely/not/here"), dst.path()).unwrap_err();
        assert!(matches!(err, RepoError::Io { .. }), "got: {err}");
    }
}
