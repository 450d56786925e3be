// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth connect flow.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed `state` parameter stays valid.
const STATE_MAX_AGE_MS: i64 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(auth_start))
        .route("/auth/strava/callback", get(auth_callback))
}

/// Sign `return_url` and the current time into an opaque `state` value.
///
/// Format before encoding: `return_url|timestamp_hex|signature_hex`.
pub fn sign_state(return_url: &str, now_ms: i64, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", return_url, now_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify signature and age, returning the embedded return URL.
pub fn verify_state(state: &str, secret: &[u8], now_ms: i64) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;

    // The URL may itself contain '|', so split from the right.
    let mut parts = decoded.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let return_url = parts.next()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", return_url, timestamp_hex).as_bytes());
    let signature = hex::decode(signature_hex).ok()?;
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_at = i64::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms - issued_at > STATE_MAX_AGE_MS || issued_at > now_ms + 60_000 {
        tracing::warn!(issued_at, "OAuth state expired");
        return None;
    }

    Some(return_url.to_string())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Start OAuth flow - redirect to Strava authorization.
async fn auth_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    // Client credentials from the environment seed the store on first use.
    state
        .settings
        .seed_strava_client(
            state.config.strava_client_id.as_deref(),
            state.config.strava_client_secret.as_deref(),
        )
        .await?;

    let client_id = state
        .settings
        .strava_credential()
        .await?
        .client_id
        .ok_or_else(|| AppError::NotConnected("Strava client id not configured".to_string()))?;

    let oauth_state = sign_state(&state.config.frontend_url, now_ms(), &state.config.oauth_state_key)?;
    let callback_url = format!("{}/auth/strava/callback", state.config.api_url);
    let auth_url = state
        .token_broker
        .client()
        .authorize_url(&client_id, &callback_url, &oauth_state);

    tracing::info!(
        client_id = %client_id,
        callback_url = %callback_url,
        "Starting OAuth flow, redirecting to Strava"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn frontend_redirect(frontend_url: &str, outcome: &str) -> Redirect {
    Redirect::temporary(&format!("{}?strava={}", frontend_url, outcome))
}

/// OAuth callback - verify state, exchange the code, return to the frontend.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let Some(frontend_url) = params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &state.config.oauth_state_key, now_ms()))
    else {
        tracing::warn!("Invalid or expired OAuth state");
        return frontend_redirect(&state.config.frontend_url, "error");
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return frontend_redirect(&frontend_url, "error");
    }

    let Some(code) = params.code else {
        tracing::warn!("OAuth callback without code");
        return frontend_redirect(&frontend_url, "error");
    };

    match state.token_broker.exchange_authorization_code(&code).await {
        Ok(credential) => {
            tracing::info!(
                athlete_id = ?credential.athlete_id,
                "OAuth successful, credentials stored"
            );
            frontend_redirect(&frontend_url, "connected")
        }
        Err(e) => {
            tracing::error!(error = %e, "Strava token exchange failed");
            frontend_redirect(&frontend_url, "error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"secret_key";
    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_state_round_trip() {
        let state = sign_state("https://example.com", NOW, SECRET).unwrap();
        assert_eq!(
            verify_state(&state, SECRET, NOW + 1000),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn test_state_url_with_pipe() {
        let state = sign_state("https://example.com/?a=1|2", NOW, SECRET).unwrap();
        assert_eq!(
            verify_state(&state, SECRET, NOW).as_deref(),
            Some("https://example.com/?a=1|2")
        );
    }

    #[test]
    fn test_state_invalid_signature() {
        let payload = format!("https://example.com|{:x}|invalid_signature", NOW);
        let state = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        assert_eq!(verify_state(&state, SECRET, NOW), None);
    }

    #[test]
    fn test_state_wrong_secret() {
        let state = sign_state("https://example.com", NOW, SECRET).unwrap();
        assert_eq!(verify_state(&state, b"wrong_key", NOW), None);
    }

    #[test]
    fn test_state_expired() {
        let state = sign_state("https://example.com", NOW, SECRET).unwrap();
        assert!(verify_state(&state, SECRET, NOW + STATE_MAX_AGE_MS).is_some());
        assert_eq!(verify_state(&state, SECRET, NOW + STATE_MAX_AGE_MS + 1), None);
    }

    #[test]
    fn test_state_malformed() {
        let state = URL_SAFE_NO_PAD.encode("invalid|format");
        assert_eq!(verify_state(&state, SECRET, NOW), None);
        assert_eq!(verify_state("%%%", SECRET, NOW), None);
    }
}
