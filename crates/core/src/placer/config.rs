//! Configuration for the placer module.

use std::path::PathBuf;

use crate::config::StorageConfig;

/// Configuration for the upload placer.
#[derive(Debug, Clone)]
pub struct PlacerConfig {
    /// Root used when a batch names none. `None` means the working directory.
    pub default_root: Option<PathBuf>,

    /// Directory under the root that holds timestamped batches.
    pub logs_dir: String,

    /// Buffer size for file copies in bytes.
    pub buffer_size: usize,

    /// Maximum files copied at once within one batch.
    pub max_parallel_copies: usize,

    /// Whether to compute a SHA-256 while copying.
    pub compute_checksums: bool,

    /// Permissions for created directories (Unix only, octal).
    pub directory_mode: u32,
}

impl Default for PlacerConfig {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for PlacerConfig {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            default_root: storage.default_root.clone(),
            logs_dir: storage.logs_dir.clone(),
            buffer_size: storage.buffer_size,
            max_parallel_copies: storage.max_parallel_copies,
            compute_checksums: storage.compute_checksums,
            directory_mode: storage.directory_mode,
        }
    }
}

impl PlacerConfig {
    /// Sets the root used when a batch names none.
    pub fn with_default_root(mut self, path: PathBuf) -> Self {
        self.default_root = Some(path);
        self
    }

    /// Enables checksum calculation.
    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.compute_checksums = enabled;
        self
    }

    /// Sets the buffer size for copies.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets how many files of one batch are copied at once.
    pub fn with_max_parallel_copies(mut self, limit: usize) -> Self {
        self.max_parallel_copies = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlacerConfig::default();
        assert_eq!(config.buffer_size, 64 * 1024);
        assert_eq!(config.logs_dir, "logs");
        assert_eq!(config.max_parallel_copies, 4);
        assert!(config.compute_checksums);
        assert!(config.default_root.is_none());
    }

    #[test]
    fn test_from_storage_config() {
        let storage = StorageConfig {
            default_root: Some(PathBuf::from("/srv/logs")),
            logs_dir: "uploads".to_string(),
            ..Default::default()
        };
        let config = PlacerConfig::from(&storage);
        assert_eq!(config.default_root, Some(PathBuf::from("/srv/logs")));
        assert_eq!(config.logs_dir, "uploads");
    }

    #[test]
    fn test_config_builder() {
        let config = PlacerConfig::default()
            .with_checksums(false)
            .with_buffer_size(1024)
            .with_max_parallel_copies(1)
            .with_default_root(PathBuf::from("/data"));

        assert!(!config.compute_checksums);
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.max_parallel_copies, 1);
        assert_eq!(config.default_root, Some(PathBuf::from("/data")));
    }
}
