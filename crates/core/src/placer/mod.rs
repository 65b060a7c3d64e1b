//! Placer module for storing uploaded log batches.
//!
//! Each batch lands in `<root>/<logs_dir>/<yy-mm-dd_HH-MM-SS>/`. Files keep
//! their uploaded names unless a name is taken, in which case a `_2`, `_3`,
//! … disambiguator goes before the extension.
//!
//! # Features
//!
//! - Race-free name reservation via exclusive file creation
//! - Per-file results: one bad file never sinks its siblings
//! - Deterministic suffixes for duplicate names within a batch
//! - Bounded concurrent copies with optional SHA-256
//! - Filename sanitization against directory traversal
//!
//! # Example
//!
//! ```ignore
//! use logdrop_core::placer::{IncomingFile, Placer, UploadBatch, UploadPlacer};
//!
//! let placer = UploadPlacer::with_defaults();
//!
//! let batch = UploadBatch::new(
//!     Some(PathBuf::from("/var/log/collected")),
//!     vec![
//!         IncomingFile::from_bytes("app.log", app_log_bytes),
//!         IncomingFile::from_bytes("app.log", other_app_log_bytes),
//!     ],
//! );
//!
//! let result = placer.place(batch).await?;
//! for outcome in &result.outcomes {
//!     match &outcome.result {
//!         Ok(placed) => println!("{} -> {}", outcome.filename, placed.path.display()),
//!         Err(e) => println!("{} failed: {}", outcome.filename, e),
//!     }
//! }
//! ```

mod config;
mod error;
mod resolver;
mod traits;
mod types;
mod upload_placer;

pub use config::PlacerConfig;
pub use error::{PlacerError, PlacerErrorKind};
pub use resolver::{candidate_path, sanitize_filename, split_filename, PathResolver, Reservation};
pub use traits::Placer;
pub use types::{
    BatchPlacement, BatchStamp, FileOutcome, IncomingFile, PlacedFile, UploadBatch,
    UploadContent, UploadReader,
};
pub use upload_placer::UploadPlacer;
