//! Host lifecycle.
//!
//! A [`Session`] is what the host hands the pipeline before the first
//! rewrite: the resolved source root, the temp directory that artifacts are
//! written to, and whether this is an interactive (dev) run. Opening a
//! session creates the temp directory; closing it removes the directory and
//! everything generated into it.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Session {
    source_root: PathBuf,
    temp_dir: String,
    temp_path: PathBuf,
    interactive: bool,
}

impl Session {
    /// Resolve `<source_root>/<temp_dir>` and make sure it exists.
    pub fn open(source_root: &Path, temp_dir: &str, interactive: bool) -> io::Result<Self> {
        let session = Self::resolve(source_root, temp_dir, interactive)?;
        session.ensure_temp_dir()?;
        Ok(session)
    }

    /// Resolve paths without touching the filesystem.
    pub fn resolve(source_root: &Path, temp_dir: &str, interactive: bool) -> io::Result<Self> {
        let source_root = std::path::absolute(source_root)?;
        let temp_path = source_root.join(temp_dir);
        Ok(Self {
            source_root,
            temp_dir: temp_dir.to_string(),
            temp_path,
            interactive,
        })
    }

    pub fn ensure_temp_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.temp_path)
    }

    /// Remove the temp directory recursively. Returns whether there was
    /// anything to remove.
    pub fn close(&self) -> io::Result<bool> {
        if !self.temp_path.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&self.temp_path)?;
        tracing::debug!(path = %self.temp_path.display(), "removed temp directory");
        Ok(true)
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Temp directory as configured, used as the prefix of rewritten
    /// references.
    pub fn temp_dir(&self) -> &str {
        &self.temp_dir
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }
}
