// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Operator routes reject requests without the API token
//! 2. Operator routes accept requests with the API token
//! 3. Public routes stay reachable and carry the security headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;

const TOKEN: &str = "test_api_token"; // Matches Config::test_default()

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _, _) = common::create_test_app().await;

    let response = app.oneshot(get("/api/status", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = common::json_body(response).await;
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_route_with_wrong_token() {
    let (app, _, _) = common::create_test_app().await;

    let response = app
        .oneshot(get("/api/status", Some("not_the_token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_with_token() {
    let (app, _, _) = common::create_test_app().await;

    let response = app.oneshot(get("/api/status", Some(TOKEN))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = common::json_body(response).await;
    assert_eq!(json["strava"]["connected"], false);
    assert_eq!(json["intervals"]["configured"], false);
    assert_eq!(json["ledger_rows"]["strava"], 0);
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _, _) = common::create_test_app().await;

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    let json = common::json_body(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _, _) = common::create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/status")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn test_pro_data_parse_endpoint() {
    let (app, _, _) = common::create_test_app().await;

    let text = "Lap,Time,Distance,Pace,Avg HR\n1,4:50,1.00,4:50,148\n2,4:45,1.00,4:45,155";
    let response = app
        .oneshot(post_json(
            "/api/pro-data/parse",
            Some(TOKEN),
            json!({ "text": text, "sportType": "running" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = common::json_body(response).await;
    assert_eq!(json["kind"], "intervals");
    assert_eq!(json["rows"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_provider_is_bad_request() {
    let (app, _, _) = common::create_test_app().await;

    let response = app
        .oneshot(post_json("/api/sync/garmin", Some(TOKEN), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::json_body(response).await;
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_sync_without_credentials_is_not_connected() {
    let (app, _, _) = common::create_test_app().await;

    let response = app
        .oneshot(post_json("/api/sync/strava", Some(TOKEN), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    let json = common::json_body(response).await;
    assert_eq!(json["error"], "not_connected");
}

#[tokio::test]
async fn test_auth_start_without_client_id() {
    let (app, _, _) = common::create_test_app().await;

    let response = app.oneshot(get("/auth/strava", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_auth_start_redirects_to_strava() {
    let config = workout_sync::config::Config {
        strava_client_id: Some("12345".to_string()),
        strava_client_secret: Some("shh".to_string()),
        ..workout_sync::config::Config::test_default()
    };
    let (app, _, _) = common::create_test_app_with(config, "https://strava.test").await;

    let response = app.oneshot(get("/auth/strava", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://strava.test/oauth/authorize?client_id=12345"));
    assert!(location.contains("scope=activity:read_all"));
    assert!(location.contains(
        "redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fstrava%2Fcallback"
    ));
}

#[tokio::test]
async fn test_auth_callback_with_bad_state() {
    let (app, _, _) = common::create_test_app().await;

    let response = app
        .oneshot(get("/auth/strava/callback?code=abc&state=forged", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://localhost:5173?strava=error"
    );
}
