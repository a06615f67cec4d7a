//! Working directory management for pipeline runs.
//!
//! A [`Workspace`] wraps the one directory shared by all jobs. It derives
//! job-unique file names, hands out scoped palette files, and removes
//! artifacts left behind by an earlier process.

use std::path::{Path, PathBuf};

use tempfile::TempPath;

/// Extensions of files the pipeline writes; anything else is left alone by
/// [`Workspace::sweep_stale`].
const ARTIFACT_EXTENSIONS: &[&str] = &[
    "mp4", "mp3", "gif", "png", "m4a", "webm", "part", "ytdl", "fetchinfo",
];

/// The shared working directory.
///
/// # Example
///
/// ```no_run
/// use cf_av::Workspace;
///
/// let workspace = Workspace::new("./downloads");
/// workspace.ensure().unwrap();
/// let out = workspace.output_path("job_1", "gif");
/// assert!(out.ends_with("job_1_processed.gif"));
/// ```
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path to the directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist.
    pub fn ensure(&self) -> cf_core::Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| cf_core::Error::io(&self.root, e))
    }

    /// Where a fetched source named `name` lands.
    pub fn source_path(&self, name: &str, ext: &str) -> PathBuf {
        self.root.join(format!("{name}.{ext}"))
    }

    /// Where the encoded candidate for `name` is written.
    pub fn output_path(&self, name: &str, ext: &str) -> PathBuf {
        self.root.join(format!("{name}_processed.{ext}"))
    }

    /// Reserve a palette file for one loop encode.
    ///
    /// The returned [`TempPath`] deletes the file when dropped, so the palette
    /// cannot outlive the scope that encodes with it.
    pub fn palette(&self, name: &str) -> cf_core::Result<TempPath> {
        tempfile::Builder::new()
            .prefix(&format!("{name}_palette_"))
            .suffix(".png")
            .tempfile_in(&self.root)
            .map(|file| file.into_temp_path())
            .map_err(|e| cf_core::Error::io(&self.root, e))
    }

    /// Remove leftover artifacts from a previous run.
    ///
    /// Returns the number of files removed. A missing directory counts as
    /// clean.
    pub fn sweep_stale(&self) -> cf_core::Result<usize> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(cf_core::Error::io(&self.root, e)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| cf_core::Error::io(&self.root, e))?;
            let path = entry.path();
            if !path.is_file() || !is_artifact(&path) {
                continue;
            }
            remove_file(&path)?;
            removed += 1;
        }

        if removed > 0 {
            tracing::info!("removed {removed} stale artifact(s) from {}", self.root.display());
        }
        Ok(removed)
    }
}

fn is_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ARTIFACT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Delete a file; a file that is already gone is not an error.
pub fn remove_file(path: &Path) -> cf_core::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(cf_core::Error::io(path, e)),
    }
}
