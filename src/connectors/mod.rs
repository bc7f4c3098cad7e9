/// Social platform connectors
///
/// Each supported platform implements [`SocialConnector`]. Connectors never
/// surface errors to their callers: failures are logged, stored on the
/// connection as `last_error` and reported through the return value.

pub mod factory;
pub mod platform;
pub mod session;

mod facebook;
mod instagram;
mod linkedin;
mod pinterest;
mod tiktok;
mod youtube;

pub use facebook::FacebookConnector;
pub use factory::ConnectorFactory;
pub use instagram::InstagramConnector;
pub use linkedin::LinkedInConnector;
pub use pinterest::PinterestConnector;
pub use platform::Platform;
pub use session::{make_request, ConnectorSession};
pub use tiktok::TikTokConnector;
pub use youtube::YouTubeConnector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity of the connected account on the platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformUserInfo {
    pub platform_user_id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
    pub is_verified: bool,
}

/// Result of a publish attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResult {
    pub success: bool,
    pub post_id: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl PostResult {
    pub fn published(post_id: impl Into<String>, url: Option<String>) -> Self {
        Self {
            success: true,
            post_id: Some(post_id.into()),
            url,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            post_id: None,
            url: None,
            error: Some(error.into()),
        }
    }
}

/// Capabilities every platform connector provides
#[async_trait]
pub trait SocialConnector: Send + Sync {
    fn platform(&self) -> Platform;

    fn session(&self) -> &ConnectorSession;

    /// Fetch the account identity and persist it onto the connection
    async fn get_user_info(&self) -> Option<PlatformUserInfo>;

    /// Exchange the refresh credential for new tokens and persist them
    async fn refresh_access_token(&self) -> bool;

    /// Publish `text`, attaching `media_urls` where the platform supports it
    async fn post_content(&self, text: &str, media_urls: &[String]) -> PostResult;

    /// Lightweight liveness probe
    async fn validate_connection(&self) -> bool;
}

/// Early result for platforms that cannot publish without media
pub(crate) fn require_media(platform: Platform, media_urls: &[String]) -> Option<PostResult> {
    if platform.requires_media() && media_urls.iter().all(|u| u.trim().is_empty()) {
        return Some(PostResult::failed(format!(
            "{} requires at least one media URL",
            platform
        )));
    }
    None
}


#[cfg(test)]
mod tests {
    use super::testing::harness;
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_unauthorized_refreshes_once_and_retries_once() {
        let server = MockServer::start_async().await;
        let stale = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v2/userinfo")
                    .header("authorization", "Bearer old-token");
                then.status(401);
            })
            .await;
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/refresh")
                    .body_contains("grant_type=refresh_token")
                    .body_contains("refresh_token=old-refresh");
                then.status(200).json_body(json!({
                    "access_token": "new-token",
                    "refresh_token": "new-refresh",
                    "expires_in": 5184000
                }));
            })
            .await;
        let fresh = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v2/userinfo")
                    .header("authorization", "Bearer new-token");
                then.status(200).json_body(json!({
                    "sub": "li-42",
                    "name": "Ada Lovelace",
                    "email_verified": true
                }));
            })
            .await;

        let h = harness(Platform::LinkedIn, &server, "", "old-token", Some("old-refresh")).await;
        let connector = h.connector().await;

        let info = connector.get_user_info().await.unwrap();

        stale.assert_hits_async(1).await;
        refresh.assert_hits_async(1).await;
        fresh.assert_hits_async(1).await;
        assert_eq!(info.platform_user_id, "li-42");

        assert_eq!(h.stored_access_token().await, "new-token");
        let row = h.store.get(&h.connection_id).await.unwrap();
        assert_eq!(
            h.codec.decrypt(row.refresh_token.as_deref().unwrap()),
            "new-refresh"
        );
        assert!(row.token_expires_at.is_some());
        assert_eq!(row.platform_user_id.as_deref(), Some("li-42"));
        assert_eq!(connector.session().access_token().await, "new-token");
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_not_retried() {
        let server = MockServer::start_async().await;
        let userinfo = server
            .mock_async(|when, then| {
                when.method(GET).path("/v2/userinfo");
                then.status(401);
            })
            .await;
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/refresh");
                then.status(200).json_body(json!({ "access_token": "new-token" }));
            })
            .await;

        let h = harness(Platform::LinkedIn, &server, "", "old-token", Some("old-refresh")).await;
        let connector = h.connector().await;

        assert!(connector.get_user_info().await.is_none());

        userinfo.assert_hits_async(2).await;
        refresh.assert_hits_async(1).await;

        let row = h.store.get(&h.connection_id).await.unwrap();
        assert!(row.last_error.is_some());
        // Refresh grant without a refresh token keeps the old one
        assert_eq!(
            h.codec.decrypt(row.refresh_token.as_deref().unwrap()),
            "old-refresh"
        );
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_response() {
        let server = MockServer::start_async().await;
        let userinfo = server
            .mock_async(|when, then| {
                when.method(GET).path("/v2/userinfo");
                then.status(401);
            })
            .await;
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/refresh");
                then.status(400).body("invalid_grant");
            })
            .await;

        let h = harness(Platform::LinkedIn, &server, "", "old-token", Some("old-refresh")).await;
        let connector = h.connector().await;

        assert!(!connector.validate_connection().await);
        userinfo.assert_hits_async(1).await;
        refresh.assert_hits_async(1).await;
        assert_eq!(h.stored_access_token().await, "old-token");
    }

    #[tokio::test]
    async fn test_media_platforms_reject_text_only_posts_offline() {
        for platform in [Platform::Instagram, Platform::TikTok, Platform::Pinterest] {
            let server = MockServer::start_async().await;
            let any = server
                .mock_async(|when, then| {
                    when.path_contains("/");
                    then.status(200).json_body(json!({ "id": "x" }));
                })
                .await;

            let h = harness(platform, &server, "board-1", "token", Some("refresh")).await;
            let connector = h.connector().await;

            let result = connector.post_content("hello", &[]).await;
            assert!(!result.success, "{} accepted a text-only post", platform);
            assert!(result.error.unwrap().contains("media"));

            let blank = connector.post_content("hello", &["  ".to_string()]).await;
            assert!(!blank.success);

            any.assert_hits_async(0).await;
        }
    }

    #[test]
    fn test_require_media() {
        assert!(require_media(Platform::Facebook, &[]).is_none());
        assert!(require_media(Platform::Pinterest, &[]).is_some());
        assert!(require_media(Platform::Pinterest, &["https://img".to_string()]).is_none());
    }
}
