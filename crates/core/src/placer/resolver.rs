//! Collision-free destination paths inside a batch directory.
//!
//! A name that is already taken gets a numeric disambiguator inserted before
//! its extension: `app.log`, `app_2.log`, `app_3.log`, …
//!
//! [`PathResolver::reserve`] claims the name by creating the file with
//! `create_new`, so two writers racing for the same name can never both win.
//! [`PathResolver::resolve`] only inspects the directory and is useful for
//! previews; its answer may be stale by the time the caller acts on it.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};

use super::error::PlacerError;

/// A destination path that has been created exclusively for the caller.
#[derive(Debug)]
pub struct Reservation {
    pub path: PathBuf,
    /// Empty file opened for writing.
    pub file: File,
}

/// Resolves unique filenames within one directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    dir: PathBuf,
}

impl PathResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the first candidate path with no filesystem entry.
    ///
    /// Only a not-found answer counts as free. Any other inspection failure
    /// is reported instead of being treated as available.
    pub async fn resolve(&self, filename: &str) -> Result<PathBuf, PlacerError> {
        let name = sanitize_filename(filename)?;
        let (stem, ext) = split_filename(name);

        let mut counter = 1u64;
        loop {
            let path = candidate_path(&self.dir, stem, ext, counter);
            // symlink_metadata so a dangling link still counts as taken
            match fs::symlink_metadata(&path).await {
                Ok(_) => counter += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(path),
                Err(e) => return Err(PlacerError::ResolutionFailed { path, source: e }),
            }
        }
    }

    /// Finds a free candidate and creates it in the same step.
    ///
    /// The collision signal is the `AlreadyExists` failure of exclusive
    /// creation, never a separate existence check.
    pub async fn reserve(&self, filename: &str) -> Result<Reservation, PlacerError> {
        let name = sanitize_filename(filename)?;
        let (stem, ext) = split_filename(name);

        let mut counter = 1u64;
        loop {
            let path = candidate_path(&self.dir, stem, ext, counter);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok(Reservation { path, file }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
                Err(e) => return Err(PlacerError::CreateFailed { path, source: e }),
            }
        }
    }
}

/// Rejects filenames that are empty or could leave the target directory.
pub fn sanitize_filename(filename: &str) -> Result<&str, PlacerError> {
    if filename.is_empty() {
        return Err(PlacerError::invalid_filename(filename, "filename is empty"));
    }
    if filename == "." || filename == ".." {
        return Err(PlacerError::invalid_filename(
            filename,
            "filename refers to a directory",
        ));
    }
    if filename.contains(['/', '\\']) {
        return Err(PlacerError::invalid_filename(
            filename,
            "filename contains a path separator",
        ));
    }
    if filename.contains('\0') {
        return Err(PlacerError::invalid_filename(
            filename,
            "filename contains a NUL byte",
        ));
    }
    Ok(filename)
}

/// Splits at the last `.`; the extension keeps its dot.
///
/// `app.log` → (`app`, `.log`), `readme` → (`readme`, ``),
/// `archive.tar.gz` → (`archive.tar`, `.gz`).
pub fn split_filename(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) => filename.split_at(idx),
        None => (filename, ""),
    }
}

/// Builds the candidate for `counter`. Counter 1 is the bare name.
pub fn candidate_path(dir: &Path, stem: &str, ext: &str, counter: u64) -> PathBuf {
    if counter <= 1 {
        dir.join(format!("{stem}{ext}"))
    } else {
        dir.join(format!("{stem}_{counter}{ext}"))
    }
}
