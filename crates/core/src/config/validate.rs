use std::path::{Component, Path};

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Storage buffer size and copy parallelism are non-zero
/// - `storage.logs_dir` is a plain relative path that stays under the root
/// - Upload body limit is non-zero and multipart field names are set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Storage validation
    if config.storage.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "storage.buffer_size cannot be 0".to_string(),
        ));
    }
    if config.storage.max_parallel_copies == 0 {
        return Err(ConfigError::ValidationError(
            "storage.max_parallel_copies cannot be 0".to_string(),
        ));
    }
    if !is_contained_relative(&config.storage.logs_dir) {
        return Err(ConfigError::ValidationError(format!(
            "storage.logs_dir must be a relative path without '..': {:?}",
            config.storage.logs_dir
        )));
    }

    // Upload validation
    if config.upload.max_body_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "upload.max_body_bytes cannot be 0".to_string(),
        ));
    }
    if config.upload.file_field.is_empty() || config.upload.desc_field.is_empty() {
        return Err(ConfigError::ValidationError(
            "upload.file_field and upload.desc_field cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn is_contained_relative(dir: &str) -> bool {
    let path = Path::new(dir);
    !dir.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
