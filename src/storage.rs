//! Scoped temporary storage for uploads.
//!
//! [`TempStore`] owns the directory and is handed to the pipeline explicitly,
//! so tests and concurrent servers never share a hidden global location.
//! Every file it creates is wrapped in a [`ScopedFile`], which removes the
//! file when dropped. Cleanup is therefore tied to ownership: it happens
//! exactly once on every exit path, including a cancelled request future.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// A directory of per-request temporary files.
#[derive(Clone, Debug)]
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    /// Uses `dir` for temporary files, creating it (and its parents) if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The directory still exists and is a directory.
    pub fn is_ready(&self) -> bool {
        self.dir.is_dir()
    }

    /// Creates a uniquely named empty file and returns a writable handle to it
    /// together with the guard that removes it.
    pub(crate) fn create(&self) -> io::Result<(tokio::fs::File, ScopedFile)> {
        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".avif")
            .tempfile_in(&self.dir)?
            .into_parts();
        // Removal is handled by ScopedFile so that failures get logged.
        let path = path.keep().map_err(|e| e.error)?;
        Ok((tokio::fs::File::from_std(file), ScopedFile { path }))
    }
}

/// A temporary file removed when this guard is dropped.
#[derive(Debug)]
pub struct ScopedFile {
    path: PathBuf,
}

impl ScopedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed temporary file"),
            Err(e) => warn!(path = %self.path.display(), "failed to remove temporary file: {e}"),
        }
    }
}
