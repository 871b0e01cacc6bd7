//! Mock-server fixtures and payload builders

use nexus_client::{ClientConfig, MemoryTokenStore, NexusClient};
use serde_json::{Value, json};
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::FileOptions;

/// Refresh token the tests sign in with
pub const INITIAL_TOKEN: &str = "initial-refresh-token";

/// Challenge sent by the server when the access token expired
pub const EXPIRED_CHALLENGE: &str =
    r#"Bearer error="invalid_token", error_description="The token expired at '01/01/2024 00:00:00'""#;

/// Configuration pointing at the mock server, with short timers
pub fn test_config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::from_base_url(&server.uri()).unwrap();
    config.poll_interval = Duration::from_millis(10);
    config.progress_interval = Duration::ZERO;
    config
}

/// Signed-out client backed by an in-memory token store
pub fn test_client(config: ClientConfig) -> (NexusClient, MemoryTokenStore) {
    let store = MemoryTokenStore::new();
    let client = NexusClient::with_token_store(config, Arc::new(store.clone())).unwrap();
    (client, store)
}

/// Answer a refresh of `from` with the pair `(access, refresh)`
pub async fn mount_refresh(server: &MockServer, from: &str, access: &str, refresh: &str) {
    refresh_mock(from, access, refresh).mount(server).await;
}

/// A mock answering a refresh of `from` with the pair `(access, refresh)`
pub fn refresh_mock(from: &str, access: &str, refresh: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/api/v1/users/tokens/refresh"))
        .and(body_json(json!({ "refreshToken": from })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": access,
            "refreshToken": refresh,
        })))
}

/// Client signed in with [`INITIAL_TOKEN`]; the access token is `access-1`
pub async fn signed_in_client(
    server: &MockServer,
    config: ClientConfig,
) -> (NexusClient, MemoryTokenStore) {
    mount_refresh(server, INITIAL_TOKEN, "access-1", "refresh-1").await;
    let (client, store) = test_client(config);
    client
        .sign_in(INITIAL_TOKEN, &CancellationToken::new())
        .await
        .unwrap();
    (client, store)
}

/// Encode samples the way the data endpoint streams them
pub fn encode_samples(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Catalog item JSON for a resource with unit and description properties
pub fn catalog_item_json(resource_id: &str, unit: &str, description: &str) -> Value {
    json!({
        "resource": {
            "id": resource_id,
            "properties": {
                "unit": unit,
                "description": description,
            },
        },
        "representation": {
            "dataType": "FLOAT64",
            "samplePeriod": "00:00:01",
        },
    })
}

/// Build a zip archive in memory
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Response head for a raw octet-stream response, optionally declaring a length
pub fn raw_head(content_length: Option<usize>) -> Vec<u8> {
    let mut head = String::from("HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\n");
    match content_length {
        Some(len) => head.push_str(&format!("Content-Length: {}\r\n", len)),
        None => head.push_str("Connection: close\r\n"),
    }
    head.push_str("\r\n");
    head.into_bytes()
}

/// Serve a single connection from a raw TCP socket
///
/// Each `(delay, bytes)` step sleeps, then writes; the connection is closed
/// after the last step. Returns the base URL.
pub async fn serve_raw(steps: Vec<(Duration, Vec<u8>)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 8192];
        let _ = socket.read(&mut request).await;

        for (delay, bytes) in steps {
            tokio::time::sleep(delay).await;
            if socket.write_all(&bytes).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }
    });

    format!("http://{}", addr)
}
