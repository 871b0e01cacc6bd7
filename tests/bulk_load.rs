//! Bulk loading against a mock Nexus service

mod common;

use chrono::{TimeZone, Utc};
use common::*;
use nexus_client::{Error, FrameError};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const T1: &str = "/sample/temperature/T1/1_s";
const T2: &str = "/sample/temperature/T2/1_s";

fn period() -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    (
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
    )
}

async fn mount_catalog(server: &MockServer, items: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/v1/catalogs/search-items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(items))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_data(server: &MockServer, resource_path: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/v1/data"))
        .and(query_param("resourcePath", resource_path))
        .and(query_param("begin", "2024-01-01T00:00:00Z"))
        .and(query_param("end", "2024-01-02T00:00:00Z"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn load_decodes_every_path_and_reports_progress() {
    let server = MockServer::start().await;
    let (client, _store) = signed_in_client(&server, test_config(&server)).await;

    mount_catalog(
        &server,
        json!({
            T1: catalog_item_json("T1", "°C", "inside"),
            T2: catalog_item_json("T2", "°C", "outside"),
        }),
    )
    .await;
    mount_data(
        &server,
        T1,
        ResponseTemplate::new(200).set_body_bytes(encode_samples(&[1.0, 2.5, -3.0])),
    )
    .await;
    mount_data(
        &server,
        T2,
        ResponseTemplate::new(200).set_body_bytes(encode_samples(&[42.0])),
    )
    .await;

    let progress = Mutex::new(Vec::new());
    let record = |p: f64| progress.lock().unwrap().push(p);
    let on_progress: &(dyn Fn(f64) + Send + Sync) = &record;

    let (begin, end) = period();
    let paths = vec![T1.to_string(), T2.to_string(), T1.to_string()];
    let data = client
        .load(begin, end, &paths, Some(on_progress), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(data.len(), 2);

    let t1 = &data[T1];
    assert_eq!(t1.name, "T1");
    assert_eq!(t1.unit.as_deref(), Some("°C"));
    assert_eq!(t1.description.as_deref(), Some("inside"));
    assert_eq!(t1.sample_period, Duration::from_secs(1));
    assert_eq!(t1.values, vec![1.0, 2.5, -3.0]);
    assert_eq!(data[T2].values, vec![42.0]);

    assert_eq!(*progress.lock().unwrap(), vec![0.5, 1.0]);
}

#[tokio::test]
async fn load_aborts_on_first_failing_resource() {
    let server = MockServer::start().await;
    let (client, _store) = signed_in_client(&server, test_config(&server)).await;

    mount_catalog(
        &server,
        json!({
            T1: catalog_item_json("T1", "°C", "inside"),
            T2: catalog_item_json("T2", "°C", "outside"),
        }),
    )
    .await;
    mount_data(
        &server,
        T1,
        ResponseTemplate::new(200).set_body_bytes(encode_samples(&[1.0])),
    )
    .await;
    mount_data(
        &server,
        T2,
        ResponseTemplate::new(500).set_body_string("storage offline"),
    )
    .await;

    let progress = Mutex::new(Vec::new());
    let record = |p: f64| progress.lock().unwrap().push(p);
    let on_progress: &(dyn Fn(f64) + Send + Sync) = &record;

    let (begin, end) = period();
    let err = client
        .load(
            begin,
            end,
            &[T1.to_string(), T2.to_string()],
            Some(on_progress),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some("N00.500"));
    assert_eq!(*progress.lock().unwrap(), vec![0.5]);
}

#[tokio::test]
async fn load_rejects_misaligned_stream_length() {
    let server = MockServer::start().await;
    let (client, _store) = signed_in_client(&server, test_config(&server)).await;

    mount_catalog(&server, json!({ T1: catalog_item_json("T1", "°C", "inside") })).await;
    mount_data(
        &server,
        T1,
        ResponseTemplate::new(200).set_body_bytes(vec![0u8; 12]),
    )
    .await;

    let (begin, end) = period();
    let err = client
        .load(begin, end, &[T1.to_string()], None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Frame(FrameError::LengthInvalid(12))));
}

#[tokio::test]
async fn load_fails_when_catalog_omits_a_path() {
    let server = MockServer::start().await;
    let (client, _store) = signed_in_client(&server, test_config(&server)).await;

    mount_catalog(&server, json!({ T1: catalog_item_json("T1", "°C", "inside") })).await;
    mount_data(
        &server,
        T1,
        ResponseTemplate::new(200).set_body_bytes(encode_samples(&[1.0])),
    )
    .await;

    let (begin, end) = period();
    let err = client
        .load(
            begin,
            end,
            &[T1.to_string(), T2.to_string()],
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingCatalogItem(p) if p == T2));
}

#[tokio::test]
async fn load_of_nothing_makes_no_requests() {
    let server = MockServer::start().await;
    let (client, _store) = test_client(test_config(&server));

    let (begin, end) = period();
    let data = client
        .load(begin, end, &[], None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(data.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
