//! Testing utilities and mock implementations.
//!
//! Lets the HTTP layer be exercised against placement outcomes that are
//! awkward to provoke on a real filesystem, such as a full disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use logdrop_core::testing::MockPlacer;
//!
//! let placer = MockPlacer::new();
//! placer.fail_copies_of("huge.log").await;
//!
//! // Use in AppState...
//! ```

mod mock_placer;

pub use mock_placer::{MockPlacer, RecordedBatch};
