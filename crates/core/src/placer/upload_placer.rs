//! File system backed upload placer.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs::{self, DirBuilder, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};

use super::config::PlacerConfig;
use super::error::PlacerError;
use super::resolver::{sanitize_filename, PathResolver, Reservation};
use super::traits::Placer;
use super::types::{
    BatchPlacement, BatchStamp, FileOutcome, IncomingFile, PlacedFile, UploadBatch,
    UploadContent, UploadReader,
};

/// A file whose name is valid and whose destination is reserved.
///
/// Holds no open handles, so a batch of any size stages without touching
/// the descriptor limit.
struct Staged {
    content: UploadContent,
    path: PathBuf,
}

/// Stores upload batches under `<root>/<logs_dir>/<stamp>/`.
pub struct UploadPlacer {
    config: PlacerConfig,
}

impl UploadPlacer {
    /// Creates a new placer with the given configuration.
    pub fn new(config: PlacerConfig) -> Self {
        Self { config }
    }

    /// Creates a placer with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PlacerConfig::default())
    }

    pub fn config(&self) -> &PlacerConfig {
        &self.config
    }

    /// Picks the root for a batch: the requested one if non-empty, then the
    /// configured default, then the working directory.
    pub fn resolve_root(&self, requested: Option<&Path>) -> Result<PathBuf, PlacerError> {
        if let Some(root) = requested.filter(|p| !p.as_os_str().is_empty()) {
            return Ok(root.to_path_buf());
        }
        if let Some(root) = &self.config.default_root {
            return Ok(root.clone());
        }
        std::env::current_dir().map_err(|source| PlacerError::RootResolutionFailed { source })
    }

    /// Directory for a batch stamped `stamp` under `root`.
    pub fn batch_dir(&self, root: &Path, stamp: &BatchStamp) -> PathBuf {
        root.join(&self.config.logs_dir).join(stamp.dir_name())
    }

    /// Creates the batch directory and any missing ancestors. Existing
    /// directories are fine.
    async fn ensure_batch_dir(&self, dir: &Path) -> Result<(), PlacerError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(self.config.directory_mode);

        builder
            .create(dir)
            .await
            .map_err(|e| PlacerError::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source: e,
            })
    }

    /// Opens the incoming stream.
    async fn open_content(
        filename: &str,
        content: UploadContent,
    ) -> Result<UploadReader, PlacerError> {
        match content {
            UploadContent::Memory(bytes) => Ok(Box::new(Cursor::new(bytes))),
            UploadContent::Spooled(path) => {
                let file = File::open(&path)
                    .await
                    .map_err(|e| PlacerError::OpenFailed {
                        filename: filename.to_string(),
                        source: e,
                    })?;
                Ok(Box::new(file))
            }
            UploadContent::Reader(reader) => Ok(reader),
        }
    }

    /// Fails early when a spooled source is missing, before any name is
    /// reserved for it.
    async fn check_source(filename: &str, spooled: Option<&Path>) -> Result<(), PlacerError> {
        if let Some(path) = spooled {
            fs::metadata(path)
                .await
                .map_err(|e| PlacerError::OpenFailed {
                    filename: filename.to_string(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Validates the name, checks the source and reserves the destination.
    async fn stage(
        resolver: &PathResolver,
        file: IncomingFile,
    ) -> (String, Result<Staged, PlacerError>) {
        let IncomingFile { filename, content } = file;

        let staged = async {
            sanitize_filename(&filename)?;
            let spooled = match &content {
                UploadContent::Spooled(path) => Some(path.as_path()),
                _ => None,
            };
            Self::check_source(&filename, spooled).await?;
            // Only the name is kept. The handle closes here and the file is
            // reopened inside the bounded copy step.
            let Reservation { path, .. } = resolver.reserve(&filename).await?;
            Ok::<_, PlacerError>(Staged { content, path })
        }
        .await;

        (filename, staged)
    }

    /// Copies one staged file and wraps the result.
    async fn finish(&self, filename: String, staged: Result<Staged, PlacerError>) -> FileOutcome {
        let result = match staged {
            Ok(Staged { content, path }) => self.copy_into(&filename, content, path).await,
            Err(e) => Err(e),
        };
        FileOutcome { filename, result }
    }

    /// Copies the source into the reserved file, hashing on the way if enabled.
    async fn copy_into(
        &self,
        filename: &str,
        content: UploadContent,
        path: PathBuf,
    ) -> Result<PlacedFile, PlacerError> {
        let mut reader = match Self::open_content(filename, content).await {
            Ok(reader) => reader,
            Err(e) => {
                // Release the empty reservation. Should removal fail, the
                // leftover empty file only costs later uploads a suffix.
                let _ = fs::remove_file(&path).await;
                return Err(e);
            }
        };

        let file = match OpenOptions::new().write(true).open(&path).await {
            Ok(file) => file,
            Err(e) => return Err(PlacerError::CreateFailed { path, source: e }),
        };

        // A zero-sized buffer would read nothing and report an empty file
        let buffer_size = self.config.buffer_size.max(1);
        let mut writer = BufWriter::with_capacity(buffer_size, file);

        let mut hasher = if self.config.compute_checksums {
            Some(Sha256::new())
        } else {
            None
        };

        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; buffer_size];

        loop {
            let bytes_read = match reader.read(&mut buffer).await {
                Ok(n) => n,
                Err(e) => return Err(copy_failed(path, writer, e).await),
            };

            if bytes_read == 0 {
                break;
            }

            if let Some(ref mut h) = hasher {
                h.update(&buffer[..bytes_read]);
            }

            if let Err(e) = writer.write_all(&buffer[..bytes_read]).await {
                return Err(copy_failed(path, writer, e).await);
            }

            total_bytes += bytes_read as u64;
        }

        if let Err(e) = writer.flush().await {
            return Err(copy_failed(path, writer, e).await);
        }

        Ok(PlacedFile {
            path,
            size_bytes: total_bytes,
            sha256: hasher.map(|h| format!("{:x}", h.finalize())),
        })
    }

    /// Runs the placement.
    async fn run_placement(&self, batch: UploadBatch) -> Result<BatchPlacement, PlacerError> {
        let start = Instant::now();

        if batch.files.is_empty() {
            return Err(PlacerError::EmptyBatch);
        }

        let root = self.resolve_root(batch.root.as_deref())?;
        let batch_dir = self.batch_dir(&root, &batch.stamp);
        self.ensure_batch_dir(&batch_dir).await?;

        // Reserve in input order so duplicate names within a batch get
        // their suffixes in the order they were sent.
        let resolver = PathResolver::new(&batch_dir);
        let mut staged = Vec::with_capacity(batch.files.len());
        for file in batch.files {
            staged.push(Self::stage(&resolver, file).await);
        }

        // At most `max_parallel_copies` files are open at once. `buffered`
        // keeps results in input order regardless of completion.
        let outcomes: Vec<FileOutcome> = stream::iter(staged)
            .map(|(filename, staged)| self.finish(filename, staged).boxed())
            .buffered(self.config.max_parallel_copies.max(1))
            .collect()
            .await;

        let total_bytes = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|p| p.size_bytes)
            .sum();

        Ok(BatchPlacement {
            batch_dir,
            stamp: batch.stamp,
            outcomes,
            total_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Builds a copy error after pushing whatever was buffered to disk.
///
/// `bytes_copied` is the length of the file afterwards, so bytes stuck in a
/// buffer that failed to flush are never counted.
async fn copy_failed(
    path: PathBuf,
    mut writer: BufWriter<File>,
    error: std::io::Error,
) -> PlacerError {
    let _ = writer.flush().await;
    // The reservation started empty, so its length is what reached disk
    let bytes_copied = match writer.get_ref().metadata().await {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    };
    PlacerError::CopyFailed {
        path,
        bytes_copied,
        source: error,
    }
}

#[async_trait]
impl Placer for UploadPlacer {
    fn name(&self) -> &str {
        "fs"
    }

    async fn place(&self, batch: UploadBatch) -> Result<BatchPlacement, PlacerError> {
        self.run_placement(batch).await
    }

    async fn validate(&self) -> Result<(), PlacerError> {
        let Some(root) = &self.config.default_root else {
            return Ok(());
        };

        match fs::metadata(root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(PlacerError::InvalidRoot {
                path: root.clone(),
                reason: "not a directory".to_string(),
            }),
            // Created on first upload
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PlacerError::InvalidRoot {
                path: root.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
