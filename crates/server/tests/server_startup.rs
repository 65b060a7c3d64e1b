use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::{multipart, Client};
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config
fn minimal_config(port: u16, root: &std::path::Path) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[storage]
default_root = "{}"
"#,
        port,
        root.display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_logdrop"))
        .env("LOGDROP_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let root = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, root.path()));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_upload_over_http() {
    let port = get_available_port();
    let root = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, root.path()));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let form = multipart::Form::new()
        .text("desc", r#"{"type":"app","save_path":""}"#)
        .part(
            "file",
            multipart::Part::bytes(b"hello from the device\n".to_vec()).file_name("device.log"),
        )
        .part(
            "file",
            multipart::Part::bytes(b"again\n".to_vec()).file_name("device.log"),
        );

    let response = Client::new()
        .post(format!("http://127.0.0.1:{}/upload-logs", port))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 200);
    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[1].as_str().unwrap().ends_with("device_2.log"));

    let batch_dir = std::path::PathBuf::from(json["save_path"].as_str().unwrap());
    assert!(batch_dir.starts_with(root.path().join("logs")));
    assert_eq!(
        std::fs::read_to_string(batch_dir.join("device.log")).unwrap(),
        "hello from the device\n"
    );

    server.kill().await.ok();
}

#[tokio::test]
async fn test_env_overrides_config_file() {
    let port = get_available_port();
    let root = TempDir::new().unwrap();
    // File says port 1, env wins
    let config = write_config(&minimal_config(1, root.path()));

    let mut server = tokio::process::Command::new(env!("CARGO_BIN_EXE_logdrop"))
        .env("LOGDROP_CONFIG", config.path())
        .env("LOGDROP_SERVER__PORT", port.to_string())
        .env("RUST_LOG", "error")
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server");

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start on the overridden port"
    );

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_logdrop"))
            .env("LOGDROP_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 0
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_logdrop"))
            .env("LOGDROP_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_default_root_that_is_a_file_exits_with_error() {
    let not_a_dir = NamedTempFile::new().unwrap();
    let config = write_config(&minimal_config(get_available_port(), not_a_dir.path()));

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_logdrop"))
            .env("LOGDROP_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
