//! HTTP boundary of the logdrop log collector.
//!
//! Decodes multipart uploads into [`logdrop_core::UploadBatch`]es, hands them
//! to a [`logdrop_core::Placer`], and maps the outcome to JSON responses.
//! Request logging and metrics live here so the core stays side-effect free.

pub mod api;
pub mod metrics;
pub mod state;
