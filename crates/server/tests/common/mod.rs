//! Common test utilities for in-process API testing.
//!
//! Builds the real router over an [`UploadPlacer`] rooted in a temp
//! directory, so uploads land on disk without a listening socket.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use logdrop_core::{Config, Placer, PlacerConfig, UploadConfig, UploadPlacer};
use logdrop_server::{api::create_router, state::AppState};

pub const BOUNDARY: &str = "logdrop-test-boundary";

/// In-process server with its default root in a temp directory.
pub struct TestFixture {
    pub router: Router,
    pub temp_dir: TempDir,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_upload_config(UploadConfig::default())
    }

    pub fn with_upload_config(upload: UploadConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.storage.default_root = Some(temp_dir.path().to_path_buf());
        config.upload = upload;

        let placer = UploadPlacer::new(PlacerConfig::from(&config.storage));
        let state = Arc::new(AppState::new(config, Arc::new(placer)));

        Self {
            router: create_router(state),
            temp_dir,
        }
    }

    /// Fixture around an arbitrary placer, e.g. a mock.
    pub fn with_placer(placer: Arc<dyn Placer>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state = Arc::new(AppState::new(Config::default(), placer));

        Self {
            router: create_router(state),
            temp_dir,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Every batch directory created under `root/logs`.
    pub fn batch_dirs(&self) -> Vec<PathBuf> {
        let logs = self.root().join("logs");
        let Ok(entries) = std::fs::read_dir(&logs) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries.map(|e| e.unwrap().path()).collect();
        dirs.sort();
        dirs
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn upload(&self, form: MultipartForm) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri("/upload-logs")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(form.finish()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Hand-rolled multipart body so tests control every byte, including
/// filenames a real client would refuse to send.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn desc(self, log_type: &str, save_path: &str) -> Self {
        let desc = serde_json::json!({ "type": log_type, "save_path": save_path });
        self.text("desc", &desc.to_string())
    }

    pub fn file(mut self, name: &str, filename: &str, content: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, filename
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}

#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
