// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use workout_sync::error::AppError;

#[test]
fn test_is_provider_token_error_matches() {
    let err = AppError::Provider("HTTP 400 Bad Request: invalid_grant".to_string());
    assert!(err.is_provider_token_error());

    let err = AppError::Provider(AppError::PROVIDER_TOKEN_ERROR.to_string());
    assert!(err.is_provider_token_error());
}

#[test]
fn test_is_provider_token_error_no_match() {
    let err = AppError::Provider(AppError::PROVIDER_RATE_LIMIT.to_string());
    assert!(!err.is_provider_token_error());

    let err = AppError::Provider("Internal Server Error".to_string());
    assert!(!err.is_provider_token_error());

    let err = AppError::BadRequest("invalid".to_string());
    assert!(!err.is_provider_token_error());

    // Unrelated provider complaints that happen to say "invalid"
    let err = AppError::Provider("HTTP 400 Bad Request: invalid date parameter".to_string());
    assert!(!err.is_provider_token_error());

    let err = AppError::Provider("JSON parse error: invalid type: null".to_string());
    assert!(!err.is_provider_token_error());
}

#[test]
fn test_is_rate_limited() {
    assert!(AppError::Provider(AppError::PROVIDER_RATE_LIMIT.to_string()).is_rate_limited());
    assert!(!AppError::Provider("HTTP 500".to_string()).is_rate_limited());
    assert!(!AppError::Backend(AppError::PROVIDER_RATE_LIMIT.to_string()).is_rate_limited());
}

#[test]
fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (
            AppError::NotConnected("strava".to_string()),
            StatusCode::PRECONDITION_FAILED,
        ),
        (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
        (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
        (
            AppError::SyncInProgress("strava".to_string()),
            StatusCode::CONFLICT,
        ),
        (AppError::Provider("x".to_string()), StatusCode::BAD_GATEWAY),
        (
            AppError::Backend("x".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            AppError::Storage("disk full".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, status) in cases {
        assert_eq!(err.into_response().status(), status);
    }
}

#[tokio::test]
async fn test_storage_details_are_hidden() {
    let response = AppError::Storage("/var/lib/secret path".to_string()).into_response();
    let body = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "storage_error");
    assert!(json.get("details").is_none());
}
