//! HTTP contract tests for the remote gateway.

use std::sync::Arc;
use std::time::Duration;

use resync_core::{QueuedOperation, Record, RecordKey, SyncCredentials, Table};
use resync_engine::{CredentialStore, HttpGateway, RemoteGateway, SyncEngine, SyncError};
use resync_storage::{LocalStore, MemoryStore, OperationQueue, RecordStore};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(server: &MockServer) -> HttpGateway {
    let credentials =
        CredentialStore::with(SyncCredentials::new(&server.uri(), "anon-key").unwrap());
    HttpGateway::new(credentials, Duration::from_secs(2))
}

fn op(payload: serde_json::Value) -> QueuedOperation {
    QueuedOperation::new(Table::Bookings, Record::from_json(payload).unwrap())
}

#[tokio::test]
async fn create_posts_without_id() {
    let server = MockServer::start().await;
    let queued = op(json!({"id": null, "room": "A1", "slot": "10:00"}));

    Mock::given(method("POST"))
        .and(path("/rest/v1/bookings"))
        .and(header("authorization", "Bearer anon-key"))
        .and(header("apikey", "anon-key"))
        .and(header("prefer", "return=representation"))
        .and(header("idempotency-key", queued.id.to_string().as_str()))
        .and(body_json(json!({"room": "A1", "slot": "10:00"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([{"id": 77, "room": "A1", "slot": "10:00"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let record = gateway_for(&server).send(&queued).await.unwrap();
    assert_eq!(record.id, Some(77));
    assert_eq!(record.get("room"), Some(&json!("A1")));
}

#[tokio::test]
async fn update_patches_by_id() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", "eq.12"))
        .and(body_json(json!({"status": "approved"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 12, "status": "approved"}])))
        .expect(1)
        .mount(&server)
        .await;

    let record = gateway_for(&server)
        .send(&op(json!({"id": 12, "status": "approved"})))
        .await
        .unwrap();
    assert_eq!(record.id, Some(12));
}

#[tokio::test]
async fn error_status_is_remote_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .send(&op(json!({"room": "A1"})))
        .await
        .unwrap_err();
    match err {
        SyncError::RemoteRejected { status, body } => {
            assert_eq!(status, 409);
            assert_eq!(body, "duplicate key");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([{"id": 1}]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let credentials =
        CredentialStore::with(SyncCredentials::new(&server.uri(), "anon-key").unwrap());
    let gateway = HttpGateway::new(credentials, Duration::from_millis(50));
    let err = gateway.send(&op(json!({"room": "A1"}))).await.unwrap_err();
    assert!(matches!(err, SyncError::TimeoutExceeded), "got {err:?}");
    assert!(err.aborts_cycle());
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let credentials = CredentialStore::with(SyncCredentials::new(&uri, "anon-key").unwrap());
    let gateway = HttpGateway::new(credentials, Duration::from_secs(2));
    let err = gateway.send(&op(json!({"room": "A1"}))).await.unwrap_err();
    assert!(matches!(err, SyncError::NetworkUnreachable(_)), "got {err:?}");
}

#[tokio::test]
async fn no_credentials_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(CredentialStore::new(), Duration::from_secs(2));
    let err = gateway.send(&op(json!({"room": "A1"}))).await.unwrap_err();
    assert!(matches!(err, SyncError::CredentialsMissing));
    server.verify().await;
}

#[tokio::test]
async fn created_without_body_is_delivered_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let queued = op(json!({"room": "A1"}));
    let placeholder = RecordKey::local(Table::Bookings, queued.id);
    store
        .write_and_enqueue(&[(placeholder.clone(), queued.payload.clone())], &queued)
        .unwrap();

    let engine = SyncEngine::new(store.clone(), Arc::new(gateway_for(&server)));
    for _ in 0..3 {
        engine.drain().await;
    }

    assert!(store.is_empty().unwrap());
    // No server id came back, so the optimistic copy stays readable.
    assert!(store.get(&placeholder).unwrap().is_some());
    server.verify().await;
}

#[tokio::test]
async fn update_with_no_content_keeps_addressed_id() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(query_param("id", "eq.12"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let record = gateway_for(&server)
        .send(&op(json!({"id": 12, "status": "approved"})))
        .await
        .unwrap();
    assert_eq!(record.id, Some(12));
    assert_eq!(record.get("status"), Some(&json!("approved")));
}
