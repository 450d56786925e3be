// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Provider credential sets as held by the credential store.

/// Strava OAuth credential set.
///
/// Every field is optional at rest: the client id/secret may be configured
/// long before the first authorization, and a disconnect removes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthCredential {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Access token expiry (unix seconds)
    pub expires_at: Option<i64>,
    pub athlete_id: Option<String>,
    pub athlete_name: Option<String>,
}

impl OAuthCredential {
    /// True when every field needed to call the API (and refresh) is present.
    pub fn is_complete(&self) -> bool {
        self.client_id.is_some()
            && self.client_secret.is_some()
            && self.access_token.is_some()
            && self.refresh_token.is_some()
    }
}

/// Intervals.icu settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalsSettings {
    pub api_key: Option<String>,
    pub athlete_id: Option<String>,
    /// Shared secret expected in webhook payloads. `None` accepts everything.
    pub webhook_secret: Option<String>,
}

impl IntervalsSettings {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.athlete_id.is_some()
    }
}
