// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTP snapshot delivery against a mocked collector

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rust_powermeter::delivery::{HttpSnapshotSink, SnapshotSink};
use rust_powermeter::error::DeliveryError;
use rust_powermeter::snapshot::Snapshot;

fn snapshot() -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.insert_group("VOLTAGE", &[230.0]);
    snapshot.insert_group("FREQUENCY", &[50.0]);
    snapshot
}

#[tokio::test]
async fn test_created_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/data"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "VOLTAGE_Channel1": 230.0,
            "FREQUENCY_Channel1": 50.0
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"status": 201, "message": "Successfully received data"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sink =
        HttpSnapshotSink::new(format!("{}/data", server.uri()), Duration::from_secs(2)).unwrap();
    sink.submit(&snapshot()).await.unwrap();
}

#[tokio::test]
async fn test_other_success_codes_are_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let sink =
        HttpSnapshotSink::new(format!("{}/data", server.uri()), Duration::from_secs(2)).unwrap();
    let err = sink.submit(&snapshot()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Status { status: 200, .. }), "{:?}", err);
}

#[tokio::test]
async fn test_server_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let sink =
        HttpSnapshotSink::new(format!("{}/data", server.uri()), Duration::from_secs(2)).unwrap();
    match sink.submit(&snapshot()).await {
        Err(DeliveryError::Status { status, body, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "database unavailable");
        }
        other => panic!("expected a status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_collector_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let sink = HttpSnapshotSink::new(
        format!("{}/data", server.uri()),
        Duration::from_millis(100),
    )
    .unwrap();
    let err = sink.submit(&snapshot()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transport { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_unreachable_collector_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let sink = HttpSnapshotSink::new(
        format!("http://127.0.0.1:{}/data", port),
        Duration::from_secs(1),
    )
    .unwrap();
    let err = sink.submit(&snapshot()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Transport { .. }), "{:?}", err);
}
