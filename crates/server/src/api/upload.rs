//! Log upload handler.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use logdrop_core::{
    BatchPlacement, BatchStamp, IncomingFile, PlacerError, PlacerErrorKind, UploadBatch,
    UploadConfig,
};

use crate::metrics::{
    UPLOAD_BATCHES_TOTAL, UPLOAD_BYTES_TOTAL, UPLOAD_FILES_TOTAL, UPLOAD_PLACEMENT_DURATION,
};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

/// Batch descriptor sent as JSON in the `desc` multipart field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadDescriptor {
    /// Free-form log type tag, e.g. "app" or "crash".
    #[serde(rename = "type", default)]
    pub log_type: String,
    /// Destination root override. Empty means the server default.
    #[serde(default)]
    pub save_path: String,
}

impl UploadDescriptor {
    /// Decodes the raw `desc` field.
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                return Err(ApiError::bad_request(
                    "desc parameter is required",
                    None,
                ))
            }
        };
        serde_json::from_str(raw).map_err(|e| {
            ApiError::bad_request("desc parameter is not valid JSON", Some(e.to_string()))
        })
    }

    /// Requested destination root, checked against the upload policy.
    pub fn root(&self, config: &UploadConfig) -> Result<Option<PathBuf>, ApiError> {
        let save_path = self.save_path.trim();
        if save_path.is_empty() {
            return Ok(None);
        }
        if !config.allow_root_override {
            return Err(ApiError::bad_request(
                "save_path overrides are disabled on this server",
                None,
            ));
        }
        Ok(Some(PathBuf::from(save_path)))
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub code: u16,
    pub message: String,
    pub request_id: String,
    /// Local time the batch was received.
    pub received_at: BatchStamp,
    /// Batch directory.
    pub save_path: PathBuf,
    /// Stored paths, successes only, in upload order.
    pub files: Vec<PathBuf>,
    /// One entry per uploaded file, in upload order.
    pub results: Vec<FileResult>,
}

#[derive(Debug, Serialize)]
pub struct FileResult {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FileError>,
}

#[derive(Debug, Serialize)]
pub struct FileError {
    pub kind: PlacerErrorKind,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request-level failure, rendered as [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: &str, detail: Option<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
            detail,
        }
    }

    fn from_multipart(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: "Failed to read multipart body".to_string(),
            detail: Some(err.body_text()),
        }
    }

    fn spool_failed(err: io::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Failed to buffer uploaded file".to_string(),
            detail: Some(err.to_string()),
        }
    }

    fn from_placer(err: &PlacerError) -> Self {
        let (status, message) = match err.kind() {
            PlacerErrorKind::RequestInvalid => (StatusCode::BAD_REQUEST, "No log files uploaded"),
            PlacerErrorKind::RootResolutionFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unable to determine storage root",
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unable to create log storage directory",
            ),
        };
        Self {
            status,
            message: message.to_string(),
            detail: Some(error_chain(err)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                code: self.status.as_u16(),
                message: self.message,
                error: self.detail,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /upload-logs
///
/// Stores every `file` field of a multipart upload under a batch directory
/// named after the request time.
pub async fn upload_logs(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let request_id = Uuid::new_v4();
    // One stamp per request: every file lands in the same directory.
    let stamp = BatchStamp::now();
    let upload_config = &state.config().upload;

    // `_spool` owns the buffered file fields and removes them when the
    // handler returns, after placement has copied them out.
    let UploadForm {
        desc: desc_raw,
        files,
        spool: _spool,
    } = match read_form(multipart, upload_config).await {
        Ok(form) => form,
        Err(e) => return Err(reject(request_id, e)),
    };

    let desc = UploadDescriptor::parse(desc_raw.as_deref()).map_err(|e| reject(request_id, e))?;
    let root = desc.root(upload_config).map_err(|e| reject(request_id, e))?;

    info!(
        %request_id,
        log_type = %desc.log_type,
        files = files.len(),
        root = ?root,
        "upload received"
    );

    let batch = UploadBatch::with_stamp(root, stamp, files);
    let placement = match state.placer().place(batch).await {
        Ok(placement) => placement,
        Err(e) => {
            warn!(%request_id, error = %error_chain(&e), "upload batch rejected");
            return Err(reject(request_id, ApiError::from_placer(&e)));
        }
    };

    record_placement_metrics(&placement);
    for (filename, err) in placement.failures() {
        warn!(
            %request_id,
            filename,
            kind = err.kind().as_str(),
            error = %error_chain(err),
            "file not stored"
        );
    }
    info!(
        %request_id,
        batch_dir = %placement.batch_dir.display(),
        stored = placement.success_count(),
        failed = placement.outcomes.len() - placement.success_count(),
        bytes = placement.total_bytes,
        duration_ms = placement.duration_ms,
        "upload batch placed"
    );

    let (status, message) = batch_status(&placement);
    Ok((
        status,
        Json(UploadResponse {
            code: status.as_u16(),
            message: message.to_string(),
            request_id: request_id.to_string(),
            received_at: placement.stamp,
            save_path: placement.batch_dir.clone(),
            files: placement.placed().map(|p| p.path.clone()).collect(),
            results: file_results(&placement),
        }),
    ))
}

/// Decoded multipart form.
struct UploadForm {
    desc: Option<String>,
    files: Vec<IncomingFile>,
    /// Per-request directory holding the file fields. Deleted on drop.
    spool: Option<TempDir>,
}

/// Pulls the descriptor and file fields out of the form. Unknown fields are
/// skipped.
///
/// File fields are streamed chunk by chunk into a per-request spool
/// directory, so memory use does not grow with the upload size.
async fn read_form(
    mut multipart: Multipart,
    config: &UploadConfig,
) -> Result<UploadForm, ApiError> {
    let mut desc: Option<String> = None;
    let mut files = Vec::new();
    let mut spool: Option<TempDir> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(ApiError::from_multipart)? {
        let name = field.name().unwrap_or("").to_string();
        if name == config.desc_field {
            desc = Some(field.text().await.map_err(ApiError::from_multipart)?);
        } else if name == config.file_field {
            // A missing filename is rejected per file by the placer
            let filename = field.file_name().unwrap_or("").to_string();

            let dir = match &spool {
                Some(dir) => dir.path().to_path_buf(),
                None => {
                    let dir = create_spool(config)?;
                    let path = dir.path().to_path_buf();
                    spool = Some(dir);
                    path
                }
            };
            let path = dir.join(files.len().to_string());

            let mut out = File::create(&path).await.map_err(ApiError::spool_failed)?;
            while let Some(chunk) = field.chunk().await.map_err(ApiError::from_multipart)? {
                out.write_all(&chunk).await.map_err(ApiError::spool_failed)?;
            }
            out.flush().await.map_err(ApiError::spool_failed)?;

            files.push(IncomingFile::from_path(filename, path));
        }
    }

    Ok(UploadForm { desc, files, spool })
}

fn create_spool(config: &UploadConfig) -> Result<TempDir, ApiError> {
    let parent = config.spool_dir.clone().unwrap_or_else(std::env::temp_dir);
    tempfile::Builder::new()
        .prefix("logdrop-")
        .tempdir_in(parent)
        .map_err(ApiError::spool_failed)
}

fn reject(request_id: Uuid, err: ApiError) -> ApiError {
    UPLOAD_BATCHES_TOTAL.with_label_values(&["rejected"]).inc();
    warn!(
        %request_id,
        status = err.status.as_u16(),
        message = %err.message,
        detail = err.detail.as_deref().unwrap_or(""),
        "upload rejected"
    );
    err
}

/// 200 when every file was stored, 207 when some were, otherwise 400 if
/// every failure was the client's fault and 500 if not.
fn batch_status(placement: &BatchPlacement) -> (StatusCode, &'static str) {
    let stored = placement.success_count();
    if placement.all_succeeded() {
        (StatusCode::OK, "Log files uploaded")
    } else if stored > 0 {
        (StatusCode::MULTI_STATUS, "Some log files could not be stored")
    } else if placement
        .failures()
        .all(|(_, e)| e.kind() == PlacerErrorKind::RequestInvalid)
    {
        (StatusCode::BAD_REQUEST, "No valid log files uploaded")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store log files")
    }
}

fn file_results(placement: &BatchPlacement) -> Vec<FileResult> {
    placement
        .outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(placed) => FileResult {
                filename: outcome.filename.clone(),
                path: Some(placed.path.clone()),
                size_bytes: Some(placed.size_bytes),
                sha256: placed.sha256.clone(),
                error: None,
            },
            Err(e) => FileResult {
                filename: outcome.filename.clone(),
                path: None,
                size_bytes: None,
                sha256: None,
                error: Some(FileError {
                    kind: e.kind(),
                    message: error_chain(e),
                }),
            },
        })
        .collect()
}

fn record_placement_metrics(placement: &BatchPlacement) {
    let outcome = match (placement.all_succeeded(), placement.success_count()) {
        (true, _) => "complete",
        (false, 0) => "failed",
        (false, _) => "partial",
    };
    UPLOAD_BATCHES_TOTAL.with_label_values(&[outcome]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(placement.total_bytes);
    UPLOAD_PLACEMENT_DURATION.observe(placement.duration_ms as f64 / 1000.0);

    for outcome in &placement.outcomes {
        let label = match &outcome.result {
            Ok(_) => "stored",
            Err(e) => e.kind().as_str(),
        };
        UPLOAD_FILES_TOTAL.with_label_values(&[label]).inc();
    }
}

/// Error message including its sources, e.g.
/// `Failed to create directory: /x: Permission denied (os error 13)`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
