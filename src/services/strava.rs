// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client and OAuth token lifecycle.
//!
//! Handles:
//! - Activity listing and detail fetches (raw JSON, kept verbatim)
//! - Authorization code exchange and token refresh
//! - Deauthorization on disconnect
//! - Rate limit / token error detection

use crate::db::SettingsRepository;
use crate::error::AppError;
use crate::models::OAuthCredential;
use crate::time_utils::now_unix;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;

const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
const STRAVA_OAUTH_BASE: &str = "https://www.strava.com/oauth";

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
}

impl StravaClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_urls(STRAVA_API_BASE, STRAVA_OAUTH_BASE, timeout)
    }

    /// Client pointed at alternative hosts (used by tests).
    pub fn with_base_urls(api_base: &str, oauth_base: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
        }
    }

    /// URL of the consent page the user is redirected to.
    pub fn authorize_url(&self, client_id: &str, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope=activity:read_all&state={}",
            self.oauth_base,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// List activities started in `[after, before]` (unix seconds), one page.
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: i64,
        before: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>, AppError> {
        let url = format!("{}/athlete/activities", self.api_base);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("before", before.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await?;

        check_response_json(response).await
    }

    /// Get a detailed activity (with laps) by ID.
    pub async fn get_activity(&self, access_token: &str, activity_id: &str) -> Result<Value, AppError> {
        let url = format!("{}/activities/{}", self.api_base, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("include_all_efforts", "false")])
            .send()
            .await?;

        check_response_json(response).await
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Token exchange failed: {}", e)))?;

        check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Token refresh request failed: {}", e)))?;

        check_response_json(response).await
    }

    /// Deauthorize the application for the connected athlete.
    ///
    /// This invalidates all access and refresh tokens for the user
    /// and removes the app from their Strava settings.
    pub async fn deauthorize(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/deauthorize", self.oauth_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Deauthorization request failed: {}", e)))?;

        check_status(response).await?;
        Ok(())
    }
}

/// Map a non-2xx response to a provider error, passing successes through.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        tracing::warn!(url = %response.url(), "Provider rate limit hit (429)");
        return Err(AppError::Provider(AppError::PROVIDER_RATE_LIMIT.to_string()));
    }

    if status.as_u16() == 401 {
        return Err(AppError::Provider(AppError::PROVIDER_TOKEN_ERROR.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::Provider(format!("HTTP {}: {}", status, body)))
}

/// Check response status and parse the JSON body.
pub(crate) async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    check_status(response)
        .await?
        .json()
        .await
        .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)))
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

impl StravaAthlete {
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.firstname.as_deref(), self.lastname.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TokenBroker - token lifecycle on top of the credential store
// ─────────────────────────────────────────────────────────────────────────────

/// Connection summary for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StravaStatus {
    pub connected: bool,
    pub client_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub athlete_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub athlete_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// True when a token expiring at `expires_at` must be refreshed at `now`.
///
/// A missing expiry is treated as already expired.
pub fn needs_refresh(now: i64, expires_at: Option<i64>) -> bool {
    match expires_at {
        Some(expires_at) => now >= expires_at - TOKEN_REFRESH_MARGIN_SECS,
        None => true,
    }
}

/// Owns the Strava OAuth token lifecycle.
///
/// All credential state lives in the injected [`SettingsRepository`]; the
/// broker itself only holds the lock that serializes refreshes.
pub struct TokenBroker {
    client: StravaClient,
    settings: SettingsRepository,
    refresh_lock: Mutex<()>,
}

impl TokenBroker {
    pub fn new(client: StravaClient, settings: SettingsRepository) -> Self {
        Self {
            client,
            settings,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn client(&self) -> &StravaClient {
        &self.client
    }

    /// Get a usable access token, refreshing it if it expires within 5 minutes.
    ///
    /// Returns `Ok(None)` when Strava is not connected or the refresh failed.
    /// Stored credentials are left in place on refresh failure.
    pub async fn get_valid_access_token(&self) -> Result<Option<String>, AppError> {
        let credential = self.settings.strava_credential().await?;
        if !credential.is_complete() {
            return Ok(None);
        }
        if !needs_refresh(now_unix(), credential.expires_at) {
            return Ok(credential.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let credential = self.settings.strava_credential().await?;
        if !credential.is_complete() {
            return Ok(None);
        }
        if !needs_refresh(now_unix(), credential.expires_at) {
            return Ok(credential.access_token);
        }

        tracing::info!(
            expires_at = credential.expires_at,
            "Strava access token expiring, refreshing"
        );

        let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            credential.client_id.as_deref(),
            credential.client_secret.as_deref(),
            credential.refresh_token.as_deref(),
        ) else {
            return Ok(None);
        };

        match self
            .client
            .refresh_token(client_id, client_secret, refresh_token)
            .await
        {
            Ok(tokens) => {
                self.settings
                    .save_strava_tokens(&tokens.access_token, &tokens.refresh_token, tokens.expires_at)
                    .await?;
                tracing::info!(expires_at = tokens.expires_at, "Strava token refreshed");
                Ok(Some(tokens.access_token))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    token_error = e.is_provider_token_error(),
                    "Strava token refresh failed, keeping stored credentials"
                );
                Ok(None)
            }
        }
    }

    /// Exchange an authorization code and persist the full credential set.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<OAuthCredential, AppError> {
        let stored = self.settings.strava_credential().await?;
        let (Some(client_id), Some(client_secret)) =
            (stored.client_id.clone(), stored.client_secret.clone())
        else {
            return Err(AppError::NotConnected(
                "Strava client id/secret not configured".to_string(),
            ));
        };

        let tokens = self
            .client
            .exchange_code(&client_id, &client_secret, code)
            .await?;

        let credential = OAuthCredential {
            client_id: Some(client_id),
            client_secret: Some(client_secret),
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            expires_at: Some(tokens.expires_at),
            athlete_id: Some(tokens.athlete.id.to_string()),
            athlete_name: tokens.athlete.display_name(),
        };
        self.settings.save_strava_credential(&credential).await?;

        tracing::info!(athlete_id = tokens.athlete.id, "Strava connected");
        Ok(credential)
    }

    /// Best-effort deauthorization; failures are logged only.
    pub async fn revoke(&self, access_token: &str) {
        if let Err(e) = self.client.deauthorize(access_token).await {
            tracing::warn!(error = %e, "Strava deauthorization failed, continuing");
        } else {
            tracing::info!("Strava deauthorization successful");
        }
    }

    /// Revoke (if possible) and delete every stored Strava credential.
    pub async fn disconnect(&self) -> Result<(), AppError> {
        let credential = self.settings.strava_credential().await?;
        if let Some(token) = credential.access_token.as_deref() {
            self.revoke(token).await;
        }
        self.settings.clear_strava().await?;
        tracing::info!("Strava disconnected");
        Ok(())
    }

    pub async fn status(&self) -> Result<StravaStatus, AppError> {
        let credential = self.settings.strava_credential().await?;
        Ok(StravaStatus {
            connected: credential.is_complete(),
            client_configured: credential.client_id.is_some() && credential.client_secret.is_some(),
            athlete_id: credential.athlete_id,
            athlete_name: credential.athlete_name,
            expires_at: credential.expires_at,
        })
    }
}
