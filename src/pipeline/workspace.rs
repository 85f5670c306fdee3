//! Scratch directory holding one run's script and build artifact.
//!
//! A directory counts as ours only while it holds [`MARKER`]. Leftovers from a
//! crashed session are reclaimed before the next run; anything else is never
//! reused or deleted.

use crate::error::{Result, RunError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Ownership marker written into every workspace this tool creates.
pub const MARKER: &str = ".jvm-scratch-workspace";

#[derive(Debug, Clone)]
pub struct TempWorkspace {
    dir: PathBuf,
}

impl TempWorkspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn exists(&self) -> bool {
        std::fs::symlink_metadata(&self.dir)
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// True when the directory exists and carries our marker.
    pub fn is_owned(&self) -> bool {
        self.exists()
            && std::fs::symlink_metadata(self.dir.join(MARKER))
                .map(|m| m.is_file())
                .unwrap_or(false)
    }

    fn io_error(&self, source: std::io::Error) -> RunError {
        RunError::WorkspaceIo {
            path: self.dir.clone(),
            source,
        }
    }

    /// Start from a fresh, empty directory marked as ours.
    ///
    /// A leftover workspace of ours is removed first so stale artifacts can never
    /// satisfy the next run. An existing directory that is not ours is refused
    /// unless it is empty.
    pub async fn prepare(&self) -> Result<()> {
        if self.is_owned() {
            info!(dir = %self.dir.display(), "reclaiming leftover workspace");
            tokio::fs::remove_dir_all(&self.dir)
                .await
                .map_err(|e| self.io_error(e))?;
        } else if self.exists() && !self.is_empty().await? {
            return Err(self.io_error(std::io::Error::new(
                ErrorKind::AlreadyExists,
                "directory exists and was not created by jvm-scratch",
            )));
        }
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::write(self.dir.join(MARKER), b"")
            .await
            .map_err(|e| self.io_error(e))
    }

    async fn is_empty(&self) -> Result<bool> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| self.io_error(e))?;
        let first = entries.next_entry().await.map_err(|e| self.io_error(e))?;
        Ok(first.is_none())
    }

    fn skip_foreign(&self) -> bool {
        if self.is_owned() {
            return false;
        }
        if self.exists() {
            warn!(dir = %self.dir.display(), "not removing a directory this tool did not create");
        }
        true
    }

    /// Write `text` verbatim to `name` and return its absolute path.
    pub async fn write_script(&self, name: &str, text: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(absolute(&path))
    }

    pub async fn artifact(&self, name: &str) -> Option<PathBuf> {
        let path = self.dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(absolute(&path)),
            _ => None,
        }
    }

    /// Remove the directory tree. `Ok(false)` when there was nothing to remove.
    pub async fn remove(&self) -> std::io::Result<bool> {
        if self.skip_foreign() {
            return Ok(false);
        }
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                debug!(dir = %self.dir.display(), "workspace removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Blocking variant for drop guards and shutdown paths.
    pub fn remove_now(&self) -> std::io::Result<bool> {
        if self.skip_foreign() {
            return Ok(false);
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(dir = %self.dir.display(), "failed to remove workspace: {e}");
                Err(e)
            }
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
