//! Error types for the placer module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while placing an upload batch.
///
/// Batch-level variants ([`PlacerError::is_fatal`]) abort the whole batch
/// before any file is written. The rest are reported per file.
#[derive(Debug, Error)]
pub enum PlacerError {
    /// The batch carried no files.
    #[error("Upload batch contains no files")]
    EmptyBatch,

    /// Filename is empty or would escape the batch directory.
    #[error("Invalid filename {name:?}: {reason}")]
    InvalidFilename { name: String, reason: &'static str },

    /// No root was requested and the working directory is unavailable.
    #[error("Failed to determine destination root")]
    RootResolutionFailed {
        #[source]
        source: std::io::Error,
    },

    /// Configured default root exists but cannot hold batches.
    #[error("Invalid destination root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// Failed to create the timestamped batch directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open the incoming stream.
    #[error("Failed to open upload stream for {filename}")]
    OpenFailed {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create the destination file.
    #[error("Failed to create destination file: {path}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copy stopped part way. The partial file stays on disk.
    #[error("Failed to copy into {path} after {bytes_copied} bytes")]
    CopyFailed {
        path: PathBuf,
        bytes_copied: u64,
        #[source]
        source: std::io::Error,
    },

    /// Inspecting a candidate path failed for a reason other than "not found".
    #[error("Failed to inspect candidate path: {path}")]
    ResolutionFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacerErrorKind {
    RequestInvalid,
    RootResolutionFailed,
    DirectoryCreateFailed,
    FileOpenFailed,
    FileCreateFailed,
    FileCopyFailed,
    PathResolutionFailed,
}

impl PlacerError {
    /// Creates an invalid filename error.
    pub fn invalid_filename(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidFilename {
            name: name.into(),
            reason,
        }
    }

    /// Classifies this error.
    pub fn kind(&self) -> PlacerErrorKind {
        match self {
            Self::EmptyBatch | Self::InvalidFilename { .. } => PlacerErrorKind::RequestInvalid,
            Self::RootResolutionFailed { .. } | Self::InvalidRoot { .. } => {
                PlacerErrorKind::RootResolutionFailed
            }
            Self::DirectoryCreationFailed { .. } => PlacerErrorKind::DirectoryCreateFailed,
            Self::OpenFailed { .. } => PlacerErrorKind::FileOpenFailed,
            Self::CreateFailed { .. } => PlacerErrorKind::FileCreateFailed,
            Self::CopyFailed { .. } => PlacerErrorKind::FileCopyFailed,
            Self::ResolutionFailed { .. } => PlacerErrorKind::PathResolutionFailed,
        }
    }

    /// Whether this error aborts the whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EmptyBatch
                | Self::RootResolutionFailed { .. }
                | Self::InvalidRoot { .. }
                | Self::DirectoryCreationFailed { .. }
        )
    }
}

impl PlacerErrorKind {
    /// Stable snake_case name, as used in API payloads and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestInvalid => "request_invalid",
            Self::RootResolutionFailed => "root_resolution_failed",
            Self::DirectoryCreateFailed => "directory_create_failed",
            Self::FileOpenFailed => "file_open_failed",
            Self::FileCreateFailed => "file_create_failed",
            Self::FileCopyFailed => "file_copy_failed",
            Self::PathResolutionFailed => "path_resolution_failed",
        }
    }
}
