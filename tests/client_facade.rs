//! Client facade: configuration header, session persistence, blocking adapter

mod common;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{TimeZone, Utc};
use common::*;
use nexus_client::auth::token_key;
use nexus_client::{FileTokenStore, MemoryTokenStore, NexusClient, blocking};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STATUS_PATH: &str = "/api/v1/jobs/job-1/status";

async fn mount_status(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "Running", "progress": 0.0 })),
        )
        .mount(server)
        .await;
}

async fn last_request_has_header(server: &MockServer, name: &str) -> bool {
    let requests = server.received_requests().await.unwrap();
    requests
        .last()
        .map(|request| request.headers.contains_key(name))
        .unwrap_or(false)
}

#[tokio::test]
async fn attached_configuration_is_sent_until_released() {
    let server = MockServer::start().await;
    let (client, _store) = test_client(test_config(&server));
    mount_status(&server).await;
    let cancel = CancellationToken::new();

    let configuration = json!({ "csv:separator": ";", "resampling": { "period": "00:01:00" } });
    let expected = STANDARD.encode(serde_json::to_vec(&configuration).unwrap());

    let guard = client.attach_configuration(&configuration).unwrap();
    assert_eq!(
        client
            .executor()
            .transport()
            .default_header("Nexus-Configuration"),
        Some(expected.clone())
    );

    client.jobs().get_job_status("job-1", &cancel).await.unwrap();
    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests
            .last()
            .and_then(|r| r.headers.get("Nexus-Configuration"))
            .and_then(|v| v.to_str().ok()),
        Some(expected.as_str())
    );

    guard.release();
    client.jobs().get_job_status("job-1", &cancel).await.unwrap();
    assert!(!last_request_has_header(&server, "Nexus-Configuration").await);
}

#[tokio::test]
async fn dropping_the_guard_clears_configuration() {
    let server = MockServer::start().await;
    let (client, _store) = test_client(test_config(&server));

    {
        let _guard = client.attach_configuration(&json!({ "a": 1 })).unwrap();
        assert!(
            client
                .executor()
                .transport()
                .default_header("Nexus-Configuration")
                .is_some()
        );
    }

    assert_eq!(
        client
            .executor()
            .transport()
            .default_header("Nexus-Configuration"),
        None
    );
}

#[tokio::test]
async fn attaching_again_replaces_and_clear_removes() {
    let server = MockServer::start().await;
    let (client, _store) = test_client(test_config(&server));
    let transport = client.executor().transport();

    let first = client.attach_configuration(&json!({ "a": 1 })).unwrap();
    let second = client.attach_configuration(&json!({ "b": 2 })).unwrap();
    assert_eq!(
        transport.default_header("Nexus-Configuration"),
        Some(STANDARD.encode(br#"{"b":2}"#))
    );

    client.clear_configuration();
    assert_eq!(transport.default_header("Nexus-Configuration"), None);

    // guards released after an explicit clear stay harmless
    first.release();
    second.release();
    assert_eq!(transport.default_header("Nexus-Configuration"), None);
}

#[tokio::test]
async fn rotated_token_survives_a_new_client_instance() {
    let server = MockServer::start().await;
    let token_dir = TempDir::new().unwrap();
    let mut config = test_config(&server);
    config.token_dir = Some(token_dir.path().to_path_buf());

    mount_refresh(&server, INITIAL_TOKEN, "access-1", "refresh-1").await;
    refresh_mock("refresh-1", "access-2", "refresh-2")
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let first = NexusClient::new(config.clone()).unwrap();
    first.sign_in(INITIAL_TOKEN, &cancel).await.unwrap();

    let record = FileTokenStore::new(token_dir.path()).record_path(&token_key(INITIAL_TOKEN));
    assert_eq!(std::fs::read_to_string(&record).unwrap(), "refresh-1");

    // a later process signs in with the same initial token and resumes the rotation
    let second = NexusClient::new(config).unwrap();
    second.sign_in(INITIAL_TOKEN, &cancel).await.unwrap();

    assert!(second.is_authenticated());
    assert_eq!(std::fs::read_to_string(&record).unwrap(), "refresh-2");
}

#[tokio::test]
async fn sign_out_drops_credential() {
    let server = MockServer::start().await;
    let (client, _store) = signed_in_client(&server, test_config(&server)).await;

    client.sign_out();

    assert!(!client.is_authenticated());
    assert_eq!(
        client.executor().transport().default_header("Authorization"),
        None
    );
}

#[test]
fn invalid_base_url_is_a_config_error() {
    let config = nexus_client::ClientConfig::from_base_url("mailto:nexus@example.com").unwrap();

    let err = NexusClient::new(config).err().unwrap();

    assert!(matches!(err, nexus_client::Error::Config { .. }));
}

#[test]
fn blocking_client_signs_in_and_loads() {
    let server = tokio_test::block_on(MockServer::start());
    let path_t1 = "/sample/temperature/T1/1_s";

    tokio_test::block_on(async {
        mount_refresh(&server, INITIAL_TOKEN, "access-1", "refresh-1").await;
        Mock::given(method("POST"))
            .and(path("/api/v1/catalogs/search-items"))
            .and(header("Authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                path_t1: catalog_item_json("T1", "°C", "inside"),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/data"))
            .and(query_param("resourcePath", path_t1))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(encode_samples(&[7.0, 8.0])))
            .mount(&server)
            .await;
    });

    let client = blocking::NexusClient::with_token_store(
        test_config(&server),
        Arc::new(MemoryTokenStore::new()),
    )
    .unwrap();
    let cancel = CancellationToken::new();

    client.sign_in(INITIAL_TOKEN, &cancel).unwrap();
    assert!(client.is_authenticated());

    let data = client
        .load(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            &[path_t1.to_string()],
            None,
            &cancel,
        )
        .unwrap();

    assert_eq!(data[path_t1].values, vec![7.0, 8.0]);
}
