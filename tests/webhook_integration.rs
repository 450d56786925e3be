// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for Intervals.icu webhook handling.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use workout_sync::config::Config;
use workout_sync::models::Provider;

mod common;

const SECRET: &str = "hook_secret";

/// Test app with a configured webhook secret.
async fn secret_app() -> (
    axum::Router,
    std::sync::Arc<workout_sync::AppState>,
    std::sync::Arc<common::FakeBackend>,
) {
    let config = Config {
        intervals_webhook_secret: Some(SECRET.to_string()),
        ..Config::test_default()
    };
    common::create_test_app_with(config, "http://127.0.0.1:9").await
}

fn webhook_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook/intervals")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn run_activity(id: &str) -> Value {
    json!({
        "id": id,
        "type": "Run",
        "name": "Morning Run",
        "start_date_local": "2024-05-01T07:00:00",
        "distance": 10000.0,
        "moving_time": 3000.0,
        "average_heartrate": 150.0,
        "icu_training_load": 80.0
    })
}

fn uploaded(activity: Value) -> Value {
    json!({
        "athlete_id": "i12345",
        "type": "ACTIVITY_UPLOADED",
        "timestamp": "2024-05-01T08:00:00Z",
        "activity": activity
    })
}

#[tokio::test]
async fn test_webhook_creates_record_once() {
    let (app, state, backend) = secret_app().await;

    let payload = json!({ "secret": SECRET, "events": [uploaded(run_activity("i100"))] });

    let response = app.clone().oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["processed"], 1);
    assert_eq!(json["created"], 1);

    // Redelivery of the same activity must not create a second record
    let response = app.oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::json_body(response).await;
    assert_eq!(json["created"], 0);

    assert_eq!(backend.created(), 1);
    let row = state.sync_service.ledgers().intervals.get("i100").unwrap();
    assert_eq!(row.local_record_id.as_deref(), Some("rec_1"));

    let draft = &backend.drafts()[0];
    assert_eq!(draft.source, "intervals");
    assert_eq!(draft.source_id, "i100");
    assert_eq!(draft.activity.duration_minutes, Some(50));
}

#[tokio::test]
async fn test_webhook_rejects_wrong_secret() {
    let (app, state, backend) = secret_app().await;

    let payload = json!({ "secret": "nope", "events": [uploaded(run_activity("i100"))] });
    let response = app.clone().oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let payload = json!({ "events": [uploaded(run_activity("i100"))] });
    let response = app.oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(backend.created(), 0);
    assert!(state.sync_service.ledgers().intervals.is_empty());
}

#[tokio::test]
async fn test_webhook_without_configured_secret_accepts_all() {
    let (app, _, backend) = common::create_test_app().await;

    let payload = json!({ "events": [uploaded(run_activity("i7"))] });
    let response = app.oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.created(), 1);
}

#[tokio::test]
async fn test_webhook_delete_is_noop() {
    let (app, state, backend) = secret_app().await;

    let create = json!({ "secret": SECRET, "events": [uploaded(run_activity("i100"))] });
    app.clone().oneshot(webhook_request(&create)).await.unwrap();

    let delete = json!({
        "secret": SECRET,
        "events": [{ "type": "ACTIVITY_DELETED", "deleted_events": [100] }]
    });
    let response = app.oneshot(webhook_request(&delete)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::json_body(response).await;
    assert_eq!(json["processed"], 1);
    assert_eq!(json["created"], 0);

    // Local history survives the upstream delete
    let row = state.sync_service.ledgers().intervals.get("i100").unwrap();
    assert!(row.local_record_id.is_some());
    assert_eq!(backend.created(), 1);
}

#[tokio::test]
async fn test_webhook_calendar_events_use_prefixed_ids() {
    let (app, state, backend) = secret_app().await;

    let payload = json!({
        "secret": SECRET,
        "events": [{
            "type": "CALENDAR_UPDATED",
            "events": [
                {
                    "id": 555,
                    "type": "Ride",
                    "name": "Endurance ride",
                    "start_date_local": "2024-05-02T00:00:00",
                    "moving_time": 5400.0
                },
                { "id": 556, "category": "NOTE", "name": "Rest day", "start_date_local": "2024-05-03T00:00:00" }
            ]
        }]
    });

    let response = app.oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::json_body(response).await;
    assert_eq!(json["created"], 1);

    let ledger = &state.sync_service.ledgers().intervals;
    assert!(ledger.get("cal_555").is_some());
    assert!(ledger.get("cal_556").is_none());
    assert_eq!(backend.drafts()[0].source_id, "cal_555");
}

#[tokio::test]
async fn test_webhook_backend_down_records_ledger_only() {
    let (app, state, backend) = secret_app().await;
    backend.set_healthy(false);

    let payload = json!({ "secret": SECRET, "events": [uploaded(run_activity("i200"))] });
    let response = app.clone().oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json_body(response).await["created"], 0);

    let row = state.sync_service.ledgers().intervals.get("i200").unwrap();
    assert!(row.local_record_id.is_none());

    // Next delivery after the backend recovers creates the record
    backend.set_healthy(true);
    let response = app.oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(common::json_body(response).await["created"], 1);
    assert_eq!(
        state
            .sync_service
            .list_records(Provider::Intervals)
            .len(),
        1
    );
}

#[tokio::test]
async fn test_webhook_bad_event_does_not_fail_batch() {
    let (app, _, backend) = secret_app().await;

    let payload = json!({
        "secret": SECRET,
        "events": [
            uploaded(json!({ "id": "i300", "type": "Run" })),
            { "type": "SOMETHING_NEW" },
            uploaded(run_activity("i301"))
        ]
    });
    let response = app.oneshot(webhook_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = common::json_body(response).await;
    assert_eq!(json["processed"], 3);
    assert_eq!(json["created"], 1);
    assert_eq!(backend.created(), 1);
}

#[tokio::test]
async fn test_webhook_odd_event_shapes_keep_valid_siblings() {
    let (app, _, backend) = secret_app().await;

    let odd_events = [
        // No type at all
        json!({ "athlete_id": "i12345", "timestamp": "2024-05-01T08:00:00Z" }),
        // Explicit nulls for the array fields
        json!({ "type": "ACTIVITY_DELETED", "deleted_events": null, "events": null }),
        // Epoch seconds instead of an ISO timestamp
        json!({ "type": "ACTIVITY_UPDATED", "timestamp": 1714546800 }),
        // Not an object
        json!("garbage"),
    ];

    for (n, odd) in odd_events.into_iter().enumerate() {
        let id = format!("i40{}", n);
        let payload = json!({ "secret": SECRET, "events": [odd, uploaded(run_activity(&id))] });
        let response = app.clone().oneshot(webhook_request(&payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "batch {}", n);
        let json = common::json_body(response).await;
        assert_eq!(json["processed"], 2, "batch {}", n);
        assert_eq!(json["created"], 1, "batch {}", n);
    }
    assert_eq!(backend.created(), 4);
}

#[tokio::test]
async fn test_webhook_non_json_body_is_bad_request() {
    let (app, _, backend) = secret_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/webhook/intervals")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(backend.created(), 0);
}

/// App whose Intervals.icu API (a mock server) lists the same activity the
/// webhook delivers.
async fn intervals_app(
    server: &MockServer,
) -> (
    axum::Router,
    std::sync::Arc<workout_sync::AppState>,
    std::sync::Arc<common::FakeBackend>,
) {
    Mock::given(method("GET"))
        .and(path("/athlete/i99/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([run_activity("i1")])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/activity/i1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_activity("i1")))
        .mount(server)
        .await;

    let config = Config {
        intervals_api_key: Some("key".to_string()),
        intervals_athlete_id: Some("i99".to_string()),
        intervals_webhook_secret: Some(SECRET.to_string()),
        ..Config::test_default()
    };
    common::create_test_app_with(config, &server.uri()).await
}

fn sync_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/sync/intervals")
        .header(header::AUTHORIZATION, "Bearer test_api_token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "oldest": "2024-05-01", "newest": "2024-05-31" }).to_string(),
        ))
        .unwrap()
}

fn local_record_id(state: &workout_sync::AppState) -> Option<String> {
    state
        .sync_service
        .ledgers()
        .intervals
        .get("i1")
        .and_then(|row| row.local_record_id.clone())
}

#[tokio::test]
async fn test_webhook_then_manual_sync_creates_one_record() {
    let server = MockServer::start().await;
    let (app, state, backend) = intervals_app(&server).await;
    let hook = json!({ "secret": SECRET, "events": [uploaded(run_activity("i1"))] });

    let response = app.clone().oneshot(webhook_request(&hook)).await.unwrap();
    assert_eq!(common::json_body(response).await["created"], 1);
    let recorded = local_record_id(&state);
    assert!(recorded.is_some());

    let response = app.oneshot(sync_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = common::json_body(response).await;
    assert_eq!(report["total"], 1);
    assert_eq!(report["created"], 0);

    assert_eq!(backend.created(), 1);
    assert_eq!(local_record_id(&state), recorded);
}

#[tokio::test]
async fn test_manual_sync_then_webhook_creates_one_record() {
    let server = MockServer::start().await;
    let (app, state, backend) = intervals_app(&server).await;
    let hook = json!({ "secret": SECRET, "events": [uploaded(run_activity("i1"))] });

    let response = app.clone().oneshot(sync_request()).await.unwrap();
    assert_eq!(common::json_body(response).await["created"], 1);
    let recorded = local_record_id(&state);
    assert!(recorded.is_some());

    let response = app.oneshot(webhook_request(&hook)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json_body(response).await["created"], 0);

    assert_eq!(backend.created(), 1);
    assert_eq!(local_record_id(&state), recorded);
}

#[tokio::test]
async fn test_concurrent_webhook_and_sync_create_one_record() {
    let server = MockServer::start().await;
    let (app, state, backend) = intervals_app(&server).await;
    let hook = json!({ "secret": SECRET, "events": [uploaded(run_activity("i1"))] });

    let (hooked, synced) = tokio::join!(
        app.clone().oneshot(webhook_request(&hook)),
        app.clone().oneshot(sync_request())
    );
    let hooked = common::json_body(hooked.unwrap()).await;
    let synced = common::json_body(synced.unwrap()).await;

    let created = hooked["created"].as_u64().unwrap() + synced["created"].as_u64().unwrap();
    assert_eq!(created, 1);
    assert_eq!(backend.created(), 1);
    assert_eq!(state.sync_service.ledgers().intervals.len(), 1);
    assert!(local_record_id(&state).is_some());
}
