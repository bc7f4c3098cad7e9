/// Per-connector runtime state and the shared authenticated request path
use super::{PlatformUserInfo, PostResult, SocialConnector};
use crate::{
    config::OAuthApp,
    connections::{ConnectionStore, EncryptedTokens, IdentityUpdate},
    connectors::Platform,
    crypto::TokenCodec,
    db::models::SocialConnection,
    error::{AppError, AppResult},
    metrics,
    oauth::TokenGrant,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Decrypted tokens held for the lifetime of a connector
#[derive(Debug, Clone, Default)]
struct SessionTokens {
    access_token: String,
    refresh_token: Option<String>,
}

/// HTTP client, decrypted tokens and the connection record behind one connector
pub struct ConnectorSession {
    http: reqwest::Client,
    store: ConnectionStore,
    codec: Arc<TokenCodec>,
    platform: Platform,
    app: OAuthApp,
    connection: RwLock<SocialConnection>,
    tokens: RwLock<SessionTokens>,
}

impl ConnectorSession {
    /// Build a session, decrypting the stored tokens.
    ///
    /// A token that fails to decrypt becomes empty; requests then fail upstream
    /// and the refresh path gets a chance to recover.
    pub fn new(
        http: reqwest::Client,
        store: ConnectionStore,
        codec: Arc<TokenCodec>,
        platform: Platform,
        app: OAuthApp,
        connection: SocialConnection,
    ) -> Self {
        let access_token = codec.decrypt(&connection.access_token);
        let refresh_token = connection
            .refresh_token
            .as_deref()
            .map(|t| codec.decrypt(t))
            .filter(|t| !t.is_empty());

        Self {
            http,
            store,
            codec,
            platform,
            app,
            connection: RwLock::new(connection),
            tokens: RwLock::new(SessionTokens {
                access_token,
                refresh_token,
            }),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn app(&self) -> &OAuthApp {
        &self.app
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Base URL for platform API calls, without trailing slash
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.app.endpoints.api_base.trim_end_matches('/'), path)
    }

    pub async fn connection_id(&self) -> String {
        self.connection.read().await.id.clone()
    }

    /// Page or board the connection targets ('' for the account itself)
    pub async fn page_id(&self) -> String {
        self.connection.read().await.page_id.clone()
    }

    pub async fn platform_user_id(&self) -> Option<String> {
        self.connection.read().await.platform_user_id.clone()
    }

    pub async fn access_token(&self) -> String {
        self.tokens.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.refresh_token.clone()
    }

    /// Persist a refreshed grant and switch this session over to it.
    ///
    /// A grant without a refresh token keeps the current one.
    pub async fn apply_refreshed_tokens(&self, grant: &TokenGrant) -> AppResult<()> {
        let refresh_token = match &grant.refresh_token {
            Some(t) if !t.is_empty() => Some(t.clone()),
            _ => self.refresh_token().await,
        };

        let encrypted = EncryptedTokens {
            access_token: self.codec.encrypt(&grant.access_token),
            refresh_token: refresh_token.as_deref().map(|t| self.codec.encrypt(t)),
            expires_at: grant.expires_at(),
        };

        let id = self.connection_id().await;
        self.store.update_tokens(&id, &encrypted).await?;

        {
            let mut connection = self.connection.write().await;
            connection.access_token = encrypted.access_token.clone();
            connection.refresh_token = encrypted.refresh_token.clone();
            connection.token_expires_at = encrypted.expires_at;
        }

        let mut tokens = self.tokens.write().await;
        tokens.access_token = grant.access_token.clone();
        tokens.refresh_token = refresh_token;

        Ok(())
    }

    /// Record a failure on the connection; logs instead of failing
    pub async fn record_error(&self, message: &str) {
        let id = self.connection_id().await;
        warn!(platform = %self.platform, connection_id = %id, "{}", message);
        if let Err(e) = self.store.record_error(&id, message).await {
            warn!(connection_id = %id, error = %e, "Failed to store connection error");
        }
    }

    /// Conclude a `get_user_info` call: persist on success, record the error otherwise
    pub async fn finish_user_info(
        &self,
        result: AppResult<PlatformUserInfo>,
    ) -> Option<PlatformUserInfo> {
        let info = match result {
            Ok(info) => info,
            Err(e) => {
                self.record_error(&format!("User info fetch failed: {}", e)).await;
                return None;
            }
        };

        let update = IdentityUpdate {
            platform_user_id: info.platform_user_id.clone(),
            username: info.username.clone(),
            display_name: info.display_name.clone(),
            profile_url: info.profile_url.clone(),
            is_verified: info.is_verified,
        };

        let id = self.connection_id().await;
        if let Err(e) = self.store.update_user_info(&id, &update).await {
            self.record_error(&format!("Failed to save user info: {}", e)).await;
            return None;
        }

        {
            let mut connection = self.connection.write().await;
            connection.platform_user_id = Some(update.platform_user_id);
            connection.platform_username = update.username;
            connection.display_name = update.display_name;
            connection.profile_url = update.profile_url;
            connection.is_verified = update.is_verified;
            connection.last_error = None;
        }

        Some(info)
    }

    /// Conclude a refresh attempt: persist on success, record the error otherwise
    pub async fn finish_refresh(&self, result: AppResult<TokenGrant>) -> bool {
        let outcome = match result {
            Ok(grant) => self.apply_refreshed_tokens(&grant).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                metrics::record_token_refresh(self.platform.as_str(), true);
                info!(platform = %self.platform, "Access token refreshed");
                true
            }
            Err(e) => {
                metrics::record_token_refresh(self.platform.as_str(), false);
                self.record_error(&format!("Token refresh failed: {}", e)).await;
                false
            }
        }
    }

    /// Conclude a publish attempt
    pub async fn finish_post(&self, result: AppResult<PostResult>) -> PostResult {
        match result {
            Ok(post) => post,
            Err(e) => {
                let message = format!("Post failed: {}", e);
                self.record_error(&message).await;
                PostResult::failed(message)
            }
        }
    }
}

/// Send an authenticated request on behalf of `connector`.
///
/// `build` produces the request from the shared client; the bearer token is
/// added here. A 401 triggers exactly one refresh and, if it succeeds, exactly
/// one resend with the new token. Whatever the resend returns is final.
pub async fn make_request<C, F>(connector: &C, build: F) -> AppResult<Response>
where
    C: SocialConnector + ?Sized,
    F: Fn(&reqwest::Client) -> RequestBuilder + Send + Sync,
{
    let session = connector.session();
    let platform = session.platform();

    let token = session.access_token().await;
    let response = build(session.http()).bearer_auth(&token).send().await?;
    metrics::record_connector_request(platform.as_str(), response.status().as_u16());

    if response.status() != StatusCode::UNAUTHORIZED {
        return Ok(response);
    }

    debug!(platform = %platform, "Platform returned 401, refreshing token");
    if !connector.refresh_access_token().await {
        return Ok(response);
    }

    let token = session.access_token().await;
    let retried = build(session.http()).bearer_auth(&token).send().await?;
    metrics::record_connector_request(platform.as_str(), retried.status().as_u16());

    Ok(retried)
}

/// Parse a successful JSON response, or turn the status and body into an error
pub async fn read_json(response: Response) -> AppResult<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Upstream(format!("{}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("Malformed response body: {}", e)))
}

/// String field from a JSON object, treating empty strings as absent
pub fn json_str(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
