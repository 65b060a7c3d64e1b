//! Types for the placer module.

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tokio::io::AsyncRead;

use super::error::PlacerError;

/// Directory name pattern for a batch: two-digit year, sortable.
const BATCH_DIR_FORMAT: &str = "%y-%m-%d_%H-%M-%S";

/// Readable byte stream of an uploaded file.
pub type UploadReader = Box<dyn AsyncRead + Send + Unpin>;

/// Upload capture time, shared by every file of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BatchStamp(NaiveDateTime);

impl BatchStamp {
    /// Captures the current local time, to the second.
    pub fn now() -> Self {
        Self(Local::now().naive_local().trunc_subsecs(0))
    }

    /// Wraps an explicit timestamp.
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self(at)
    }

    /// Renders the batch directory name, e.g. `24-03-09_14-05-00`.
    pub fn dir_name(&self) -> String {
        self.0.format(BATCH_DIR_FORMAT).to_string()
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }
}

/// Where the bytes of an uploaded file come from.
pub enum UploadContent {
    /// Fully buffered in memory.
    Memory(Vec<u8>),
    /// Spooled to a file on disk by the transport layer.
    Spooled(PathBuf),
    /// Any other async reader.
    Reader(UploadReader),
}

impl fmt::Debug for UploadContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(bytes) => f.debug_tuple("Memory").field(&bytes.len()).finish(),
            Self::Spooled(path) => f.debug_tuple("Spooled").field(path).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// A named byte stream received in an upload.
#[derive(Debug)]
pub struct IncomingFile {
    /// Client-supplied filename. Untrusted.
    pub filename: String,
    pub content: UploadContent,
}

impl IncomingFile {
    pub fn from_bytes(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: UploadContent::Memory(bytes.into()),
        }
    }

    pub fn from_path(filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            content: UploadContent::Spooled(path.into()),
        }
    }

    pub fn from_reader(filename: impl Into<String>, reader: UploadReader) -> Self {
        Self {
            filename: filename.into(),
            content: UploadContent::Reader(reader),
        }
    }
}

/// One upload request ready for placement.
#[derive(Debug)]
pub struct UploadBatch {
    /// Requested destination root. `None` or empty selects the default.
    pub root: Option<PathBuf>,
    /// Capture time shared by all files of the batch.
    pub stamp: BatchStamp,
    /// Files in request order.
    pub files: Vec<IncomingFile>,
}

impl UploadBatch {
    /// Creates a batch stamped with the current time.
    pub fn new(root: Option<PathBuf>, files: Vec<IncomingFile>) -> Self {
        Self::with_stamp(root, BatchStamp::now(), files)
    }

    pub fn with_stamp(root: Option<PathBuf>, stamp: BatchStamp, files: Vec<IncomingFile>) -> Self {
        Self { root, stamp, files }
    }
}

/// Information about a stored file.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedFile {
    /// Final path on disk.
    pub path: PathBuf,
    /// Bytes written.
    pub size_bytes: u64,
    /// Hex SHA-256 of the stored bytes, when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Outcome for one input file, in input order.
#[derive(Debug)]
pub struct FileOutcome {
    /// Filename as received.
    pub filename: String,
    pub result: Result<PlacedFile, PlacerError>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of placing a batch. Some files may have failed.
#[derive(Debug)]
pub struct BatchPlacement {
    /// Directory holding this batch's files.
    pub batch_dir: PathBuf,
    pub stamp: BatchStamp,
    /// One entry per input file, same order as the input.
    pub outcomes: Vec<FileOutcome>,
    /// Bytes stored across successful files.
    pub total_bytes: u64,
    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl BatchPlacement {
    /// Files that were stored.
    pub fn placed(&self) -> impl Iterator<Item = &PlacedFile> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Files that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &PlacerError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.filename.as_str(), e)))
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(FileOutcome::is_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> BatchStamp {
        BatchStamp::from_datetime(
            NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap(),
        )
    }

    #[test]
    fn test_dir_name_is_fixed_width() {
        assert_eq!(stamp(2024, 3, 9, 4, 5, 6).dir_name(), "24-03-09_04-05-06");
        assert_eq!(stamp(2031, 12, 31, 23, 59, 59).dir_name(), "31-12-31_23-59-59");
    }

    #[test]
    fn test_dir_names_sort_chronologically() {
        let earlier = stamp(2024, 9, 30, 23, 59, 59);
        let later = stamp(2024, 10, 1, 0, 0, 0);
        assert!(earlier.dir_name() < later.dir_name());
    }

    #[test]
    fn test_batch_placement_accessors() {
        let placement = BatchPlacement {
            batch_dir: PathBuf::from("/data/logs/24-03-09_04-05-06"),
            stamp: stamp(2024, 3, 9, 4, 5, 6),
            outcomes: vec![
                FileOutcome {
                    filename: "a.log".to_string(),
                    result: Ok(PlacedFile {
                        path: PathBuf::from("/data/logs/24-03-09_04-05-06/a.log"),
                        size_bytes: 3,
                        sha256: None,
                    }),
                },
                FileOutcome {
                    filename: "../b.log".to_string(),
                    result: Err(PlacerError::invalid_filename("../b.log", "contains a path separator")),
                },
            ],
            total_bytes: 3,
            duration_ms: 1,
        };

        assert_eq!(placement.success_count(), 1);
        assert!(!placement.all_succeeded());
        assert_eq!(placement.placed().count(), 1);
        let failures: Vec<_> = placement.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec!["../b.log"]);
    }

    #[test]
    fn test_upload_content_debug_hides_bytes() {
        let file = IncomingFile::from_bytes("a.log", b"secret".to_vec());
        let debug = format!("{:?}", file);
        assert!(debug.contains("Memory(6)"));
        assert!(!debug.contains("secret"));
    }
}
