
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use auction_relayer::http::{router, HttpState};
use auction_relayer::ledger::{ContractCall, Ledger, LedgerError};
use test_harness::{test_service, TestService};

fn create_test_app() -> (TestService, Router) {
    let t = test_service(2, Duration::ZERO, Duration::ZERO);
    let app = router(HttpState {
        requests: Arc::clone(&t.service.requests),
    });
    (t, app)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_t, app) = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_buy_modifier_returns_type_and_value() {
    let (t, app) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/buyModifier",
            json!({ "address": "0x00000000000000000000000000000000000000Ab" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let kind = body["type"].as_u64().unwrap();
    let value = body["value"].as_u64().unwrap();
    assert!(kind <= 4);
    assert!((2..=10).contains(&value));

    let writes = t.ledger.writes();
    assert_eq!(writes.len(), 1);
    match &writes[0].call {
        ContractCall::BuyModifier {
            owner,
            kind: recorded_kind,
            value: recorded_value,
        } => {
            assert_eq!(owner.as_str(), "0x00000000000000000000000000000000000000ab");
            assert_eq!(u64::from(recorded_kind.index()), kind);
            assert_eq!(u64::from(*recorded_value), value);
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn test_buy_modifier_rejects_bad_address() {
    let (t, app) = create_test_app();

    let response = app
        .oneshot(post_json("/buyModifier", json!({ "address": "not-an-address" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
    assert_eq!(t.service.queue.pool().stats().checkouts, 0);
}

#[tokio::test]
async fn test_buy_modifier_rejects_missing_field() {
    let (_t, app) = create_test_app();

    let response = app
        .oneshot(post_json("/buyModifier", json!({})))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_participate_returns_sealed_number() {
    let (t, app) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/participateRandomAuction",
            json!({
                "address": "0x00000000000000000000000000000000000000c1",
                "auction": 4,
                "password": "hunter2",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let number = body["number"].as_u64().unwrap() as u32;
    assert!((1..=100).contains(&number));

    let writes = t.ledger.writes();
    match &writes[0].call {
        ContractCall::ParticipateRandomAuction {
            commitment,
            auction_id,
            ..
        } => {
            let expected = t.ledger.create_commitment(number, "hunter2").await.unwrap();
            assert_eq!(*commitment, expected);
            assert_eq!(*auction_id, 4);
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn test_participate_random_alias() {
    let (_t, app) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/participateRandom",
            json!({
                "address": "0x00000000000000000000000000000000000000c2",
                "auction": 1,
                "password": "pw",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["number"].is_u64());
}

#[tokio::test]
async fn test_participate_rejects_empty_password() {
    let (t, app) = create_test_app();

    let response = app
        .oneshot(post_json(
            "/participateRandomAuction",
            json!({
                "address": "0x00000000000000000000000000000000000000c3",
                "auction": 1,
                "password": "",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(t.ledger.writes().is_empty());
}

#[tokio::test]
async fn test_ledger_failure_is_internal_error() {
    let (t, app) = create_test_app();
    t.ledger
        .fail_next_send(LedgerError::Reverted("auction closed".to_string()));

    let response = app
        .oneshot(post_json(
            "/participateRandomAuction",
            json!({
                "address": "0x00000000000000000000000000000000000000c4",
                "auction": 9,
                "password": "pw",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_pool_status_endpoint() {
    let (_t, app) = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/api/pool").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["pool"]["total"], 2);
    assert_eq!(body["pool"]["available"], 2);
    assert_eq!(body["pool"]["in_flight"], 0);
    assert_eq!(body["pool"]["closed"], false);
    assert_eq!(body["queue"]["limit"], 2);
    assert_eq!(body["queue"]["submitted"], 0);
}

#[tokio::test]
async fn test_jobs_endpoint_lists_finished_requests() {
    let (t, app) = create_test_app();
    t.service
        .requests
        .buy_modifier("0x00000000000000000000000000000000000000d1".parse().unwrap())
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/api/jobs").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let jobs = body.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["status"], "completed");
    assert_eq!(jobs[0]["credential"], "admin-1");
}
