pub mod config;
pub mod placer;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, ServerConfig, StorageConfig, UploadConfig,
};
pub use placer::{
    BatchPlacement, BatchStamp, FileOutcome, IncomingFile, PathResolver, PlacedFile, Placer,
    PlacerConfig, PlacerError, PlacerErrorKind, UploadBatch, UploadPlacer,
};
