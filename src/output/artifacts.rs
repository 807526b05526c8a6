use crate::output::naming::artifact_basename;
use crate::targets::Target;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Failure to persist an artifact
#[derive(Debug, Error)]
#[error("{}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Directory layout for artifacts under one output root
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn html_dir(&self) -> PathBuf {
        self.root.join("html")
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.root.join("screenshots")
    }

    /// Creates `html/` and `screenshots/` if missing
    pub fn ensure_dirs(&self) -> Result<(), WriteError> {
        for dir in [self.html_dir(), self.screenshot_dir()] {
            fs::create_dir_all(&dir).map_err(|source| WriteError { path: dir, source })?;
        }
        Ok(())
    }
}

/// Artifact paths derived from a target; computed, never stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub basename: String,
    pub html_path: PathBuf,
    pub png_path: PathBuf,
}

impl ArtifactRecord {
    pub fn for_target(layout: &OutputLayout, target: &Target) -> Self {
        let basename = artifact_basename(target.as_str());
        Self {
            html_path: layout.html_dir().join(format!("{}.html", basename)),
            png_path: layout.screenshot_dir().join(format!("{}.png", basename)),
            basename,
        }
    }
}

/// Atomically writes `bytes` to `path` through a temp file in the same directory
///
/// A crash mid-write leaves at most a stray temp file, never a truncated
/// artifact under the final name. An existing artifact is replaced.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let wrap = |source: io::Error| WriteError {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(wrap)?;
    tmp.write_all(bytes).map_err(wrap)?;
    tmp.as_file_mut().sync_all().map_err(wrap)?;
    tmp.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}
