use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for a whole request, upload copy included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    6088
}

fn default_request_timeout() -> u64 {
    300
}

/// Where and how uploaded files are stored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root used when a request does not name one. Falls back to the
    /// working directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_root: Option<PathBuf>,

    /// Directory under the root that holds the timestamped batches.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    /// Buffer size for file copies in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Maximum files copied at once within one batch.
    #[serde(default = "default_max_parallel_copies")]
    pub max_parallel_copies: usize,

    /// Whether to compute a SHA-256 of every stored file.
    #[serde(default = "default_true")]
    pub compute_checksums: bool,

    /// Permissions for created directories (Unix only, octal).
    #[serde(default = "default_dir_mode")]
    pub directory_mode: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_root: None,
            logs_dir: default_logs_dir(),
            buffer_size: default_buffer_size(),
            max_parallel_copies: default_max_parallel_copies(),
            compute_checksums: true,
            directory_mode: default_dir_mode(),
        }
    }
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

fn default_buffer_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_max_parallel_copies() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_dir_mode() -> u32 {
    0o755
}

/// Upload endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Maximum accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Multipart field carrying the log files.
    #[serde(default = "default_file_field")]
    pub file_field: String,
    /// Multipart field carrying the JSON batch descriptor.
    #[serde(default = "default_desc_field")]
    pub desc_field: String,
    /// Whether callers may pick their own destination root via `save_path`.
    #[serde(default = "default_true")]
    pub allow_root_override: bool,
    /// Where file fields are buffered while a request is read. Unset means
    /// the system temp directory.
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
            file_field: default_file_field(),
            desc_field: default_desc_field(),
            allow_root_override: true,
            spool_dir: None,
        }
    }
}

fn default_max_body_bytes() -> usize {
    512 * 1024 * 1024 // 512 MB
}

fn default_file_field() -> String {
    "file".to_string()
}

fn default_desc_field() -> String {
    "desc".to_string()
}
