//! Shared helpers for integration tests that run the real binary.
//!
//! Each test gets its own server process on a free port with a fresh
//! database in a temp directory. The process is killed on drop.

use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::{NamedTempFile, TempDir};
use tokio::time::sleep;

/// Find an available port
pub fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Render a config file pointing at the given port and database
pub fn config_with_db(port: u16, db_path: &str) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[audit]
buffer_size = 100
"#,
        port, db_path
    )
}

/// Spawn the server and return a handle
pub async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_qline"))
        .env("QLINE_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
pub async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
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

/// A running server process and everything keeping it alive.
pub struct TestServer {
    pub port: u16,
    pub client: Client,
    pub process: tokio::process::Child,
    _config_file: NamedTempFile,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Start a server on a free port with a fresh database.
    pub async fn start() -> Self {
        let port = get_available_port();
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config_content = config_with_db(port, db_path.to_str().unwrap());

        let mut config_file = NamedTempFile::new().unwrap();
        config_file.write_all(config_content.as_bytes()).unwrap();
        config_file.flush().unwrap();

        let process = spawn_server(config_file.path()).await;

        assert!(
            wait_for_server(port, 40).await,
            "Server did not start in time"
        );

        // Give a moment for initialization
        sleep(Duration::from_millis(100)).await;

        Self {
            port,
            client: Client::new(),
            process,
            _config_file: config_file,
            _temp_dir: temp_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// Register a worker and return its JSON representation.
    pub async fn create_worker(&self, display_name: &str, counter_number: u32) -> Value {
        let response = self
            .client
            .post(self.url("/api/v1/workers"))
            .json(&json!({
                "display_name": display_name,
                "counter_number": counter_number,
            }))
            .send()
            .await
            .expect("Failed to create worker");
        assert_eq!(response.status(), 201);
        response.json().await.expect("Failed to parse worker JSON")
    }

    /// Create a ticket and return its JSON representation.
    pub async fn create_ticket(&self, contact: &str, worker_id: i64) -> Value {
        let response = self
            .client
            .post(self.url("/api/v1/tickets"))
            .json(&json!({
                "contact": contact,
                "worker_id": worker_id,
            }))
            .send()
            .await
            .expect("Failed to create ticket");
        assert_eq!(response.status(), 201);
        response.json().await.expect("Failed to parse ticket JSON")
    }

    /// Kill the process and start a new one on the same config and database.
    pub async fn restart(mut self) -> Self {
        self.process.kill().await.ok();

        self.process = spawn_server(self._config_file.path()).await;
        assert!(
            wait_for_server(self.port, 40).await,
            "Server did not restart in time"
        );
        sleep(Duration::from_millis(100)).await;

        self
    }

    pub async fn stop(mut self) {
        self.process.kill().await.ok();
    }
}
