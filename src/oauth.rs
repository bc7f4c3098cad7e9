/// OAuth 2.0 handshake with the social platforms
///
/// Covers the consent redirect, the authorization-code exchange and the token
/// endpoint call shared with connector refreshes.

use crate::{
    config::OAuthApp,
    connectors::Platform,
    error::{AppError, AppResult},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::RngCore;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Lifetime of a pending consent state
pub const STATE_TTL: Duration = Duration::from_secs(600);

/// Storage for pending OAuth states
#[derive(Clone, Default)]
pub struct OAuthStateStore {
    states: Arc<RwLock<HashMap<String, OAuthStateData>>>,
}

#[derive(Clone, Debug)]
pub struct OAuthStateData {
    pub user_id: String,
    pub platform: Platform,
    pub created_at: Instant,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and remember a fresh state for `user_id`
    pub async fn issue(&self, user_id: &str, platform: Platform) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let state = URL_SAFE_NO_PAD.encode(bytes);

        let mut states = self.states.write().await;
        states.insert(
            state.clone(),
            OAuthStateData {
                user_id: user_id.to_string(),
                platform,
                created_at: Instant::now(),
            },
        );
        state
    }

    /// Consume a state. Each state can be taken once, and only before it expires.
    pub async fn take(&self, state: &str) -> Option<OAuthStateData> {
        let mut states = self.states.write().await;
        let data = states.remove(state)?;
        if data.created_at.elapsed() > STATE_TTL {
            debug!("OAuth state expired");
            return None;
        }
        Some(data)
    }

    /// Drop expired states, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, data| data.created_at.elapsed() <= STATE_TTL);
        before - states.len()
    }
}

/// How a token endpoint expects the client to identify itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuth {
    /// POST form with `client_id` and `client_secret`
    Form,
    /// POST form with `client_key` and `client_secret`
    ClientKey,
    /// POST form, credentials in an HTTP Basic header
    Basic,
    /// GET with credentials in the query string
    Query,
    /// GET with only the supplied parameters
    BareQuery,
}

impl ClientAuth {
    /// Style used for the authorization-code exchange
    pub fn for_exchange(platform: Platform) -> Self {
        match platform {
            Platform::Facebook => ClientAuth::Query,
            Platform::TikTok => ClientAuth::ClientKey,
            Platform::Pinterest => ClientAuth::Basic,
            Platform::Instagram | Platform::LinkedIn | Platform::YouTube => ClientAuth::Form,
        }
    }
}

/// Tokens returned by a platform token endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenGrant {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs))
    }
}

/// Provider consent URL for `platform`
pub fn authorization_url(platform: Platform, app: &OAuthApp, state: &str) -> AppResult<String> {
    let client_param = if platform == Platform::TikTok {
        "client_key"
    } else {
        "client_id"
    };

    let mut params = vec![
        (client_param, app.client_id.as_str()),
        ("redirect_uri", app.redirect_uri.as_str()),
        ("response_type", "code"),
        ("scope", platform.default_scopes()),
        ("state", state),
    ];

    if platform == Platform::YouTube {
        // Google only issues a refresh token with offline access
        params.push(("access_type", "offline"));
        params.push(("prompt", "consent"));
    }

    let url = Url::parse_with_params(&app.endpoints.authorize_url, &params)
        .map_err(|e| AppError::Internal(format!("Invalid authorize URL for {}: {}", platform, e)))?;

    Ok(url.to_string())
}

/// Exchange an authorization code for tokens
pub async fn exchange_code(
    http: &reqwest::Client,
    platform: Platform,
    app: &OAuthApp,
    code: &str,
) -> AppResult<TokenGrant> {
    let params = [
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("redirect_uri", app.redirect_uri.clone()),
    ];

    request_token(
        http,
        app,
        &app.endpoints.token_url,
        ClientAuth::for_exchange(platform),
        &params,
    )
    .await
}

/// Call a token endpoint and parse the grant
pub async fn request_token(
    http: &reqwest::Client,
    app: &OAuthApp,
    url: &str,
    auth: ClientAuth,
    params: &[(&str, String)],
) -> AppResult<TokenGrant> {
    let mut fields: Vec<(&str, String)> = params.to_vec();

    let request = match auth {
        ClientAuth::Form => {
            fields.push(("client_id", app.client_id.clone()));
            fields.push(("client_secret", app.client_secret.clone()));
            http.post(url).form(&fields)
        }
        ClientAuth::ClientKey => {
            fields.push(("client_key", app.client_id.clone()));
            fields.push(("client_secret", app.client_secret.clone()));
            http.post(url).form(&fields)
        }
        ClientAuth::Basic => http
            .post(url)
            .basic_auth(&app.client_id, Some(&app.client_secret))
            .form(&fields),
        ClientAuth::Query => {
            fields.push(("client_id", app.client_id.clone()));
            fields.push(("client_secret", app.client_secret.clone()));
            http.get(url).query(&fields)
        }
        ClientAuth::BareQuery => http.get(url).query(&fields),
    };

    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "Token endpoint rejected request");
        return Err(AppError::Upstream(format!(
            "Token endpoint returned {}: {}",
            status, body
        )));
    }

    let grant: TokenGrant = response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("Malformed token response: {}", e)))?;

    if grant.access_token.is_empty() {
        return Err(AppError::Upstream(
            "Token response carried no access token".to_string(),
        ));
    }

    Ok(grant)
}
