//! Mock placer for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::placer::{
    BatchPlacement, BatchStamp, FileOutcome, PlacedFile, Placer, PlacerError, UploadBatch,
    UploadContent,
};

/// A recorded batch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedBatch {
    /// Requested root, as received.
    pub root: Option<PathBuf>,
    pub stamp: BatchStamp,
    /// Filenames in request order.
    pub filenames: Vec<String>,
}

/// Mock implementation of the Placer trait.
///
/// Nothing touches the disk. Batches are recorded, files "land" under
/// `/mock/logs/<stamp>/` and the caller can script failures:
/// - a batch-level error for the next call
/// - copy failures for specific filenames
#[derive(Debug, Default)]
pub struct MockPlacer {
    batches: Arc<RwLock<Vec<RecordedBatch>>>,
    /// If set, the next call fails with this error.
    next_error: Arc<RwLock<Option<PlacerError>>>,
    /// Filenames whose copy fails.
    failing: Arc<RwLock<HashSet<String>>>,
}

impl MockPlacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded batches.
    pub async fn recorded_batches(&self) -> Vec<RecordedBatch> {
        self.batches.read().await.clone()
    }

    pub async fn batch_count(&self) -> usize {
        self.batches.read().await.len()
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: PlacerError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every file with this name fail as if the disk filled up.
    pub async fn fail_copies_of(&self, filename: &str) {
        self.failing.write().await.insert(filename.to_string());
    }
}

#[async_trait]
impl Placer for MockPlacer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn place(&self, batch: UploadBatch) -> Result<BatchPlacement, PlacerError> {
        self.batches.write().await.push(RecordedBatch {
            root: batch.root.clone(),
            stamp: batch.stamp,
            filenames: batch.files.iter().map(|f| f.filename.clone()).collect(),
        });

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if batch.files.is_empty() {
            return Err(PlacerError::EmptyBatch);
        }

        let batch_dir = PathBuf::from("/mock/logs").join(batch.stamp.dir_name());
        let failing = self.failing.read().await;

        let mut total_bytes = 0;
        let outcomes = batch
            .files
            .into_iter()
            .map(|file| {
                let path = batch_dir.join(&file.filename);
                let size_bytes = match &file.content {
                    UploadContent::Memory(bytes) => bytes.len() as u64,
                    UploadContent::Spooled(path) => {
                        std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
                    }
                    UploadContent::Reader(_) => 0,
                };
                let result = if failing.contains(&file.filename) {
                    Err(PlacerError::CopyFailed {
                        path,
                        bytes_copied: 0,
                        source: io::Error::other("no space left on device"),
                    })
                } else {
                    total_bytes += size_bytes;
                    Ok(PlacedFile {
                        path,
                        size_bytes,
                        sha256: None,
                    })
                };
                FileOutcome {
                    filename: file.filename,
                    result,
                }
            })
            .collect();

        Ok(BatchPlacement {
            batch_dir,
            stamp: batch.stamp,
            outcomes,
            total_bytes,
            duration_ms: 0,
        })
    }

    async fn validate(&self) -> Result<(), PlacerError> {
        Ok(())
    }
}
