//! Trait definitions for the placer module.

use async_trait::async_trait;

use super::error::PlacerError;
use super::types::{BatchPlacement, UploadBatch};

/// A placer that stores upload batches.
#[async_trait]
pub trait Placer: Send + Sync {
    /// Returns the name of this placer implementation.
    fn name(&self) -> &str;

    /// Stores every file of the batch.
    ///
    /// `Err` is returned only for batch-level failures. Per-file failures are
    /// reported inside the returned [`BatchPlacement`].
    async fn place(&self, batch: UploadBatch) -> Result<BatchPlacement, PlacerError>;

    /// Validates that the placer is properly configured and ready.
    async fn validate(&self) -> Result<(), PlacerError>;
}
