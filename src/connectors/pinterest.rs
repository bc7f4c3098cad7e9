/// Pinterest API v5 connector
use super::{
    require_media,
    session::{json_str, make_request, read_json},
    ConnectorSession, Platform, PlatformUserInfo, PostResult, SocialConnector,
};
use crate::{
    error::{AppError, AppResult},
    oauth::{request_token, ClientAuth, TokenGrant},
};
use async_trait::async_trait;
use serde_json::json;

pub struct PinterestConnector {
    session: ConnectorSession,
}

impl PinterestConnector {
    pub fn new(session: ConnectorSession) -> Self {
        Self { session }
    }

    async fn fetch_identity(&self) -> AppResult<PlatformUserInfo> {
        let url = self.session.api_url("/user_account");
        let response = make_request(self, |http| http.get(&url)).await?;
        let body = read_json(response).await?;

        let username = json_str(&body, "username");
        let platform_user_id = json_str(&body, "id")
            .or_else(|| username.clone())
            .ok_or_else(|| AppError::Upstream("Pinterest account has no id".to_string()))?;

        Ok(PlatformUserInfo {
            platform_user_id,
            profile_url: username
                .as_ref()
                .map(|u| format!("https://www.pinterest.com/{}/", u)),
            display_name: json_str(&body, "business_name").or_else(|| username.clone()),
            username,
            is_verified: false,
        })
    }

    /// Pin an image to the connection's board
    async fn publish(&self, description: &str, image_url: &str) -> AppResult<PostResult> {
        let board_id = self.session.page_id().await;
        if board_id.is_empty() {
            return Err(AppError::Validation(
                "Pinterest connection has no board selected".to_string(),
            ));
        }

        let payload = json!({
            "board_id": board_id,
            "description": description,
            "media_source": { "source_type": "image_url", "url": image_url }
        });

        let url = self.session.api_url("/pins");
        let response = make_request(self, |http| http.post(&url).json(&payload)).await?;
        let body = read_json(response).await?;

        let pin_id = json_str(&body, "id")
            .ok_or_else(|| AppError::Upstream("Pin response has no id".to_string()))?;
        let pin_url = format!("https://www.pinterest.com/pin/{}/", pin_id);

        Ok(PostResult::published(pin_id, Some(pin_url)))
    }

    async fn request_refresh(&self) -> AppResult<TokenGrant> {
        let refresh_token = self
            .session
            .refresh_token()
            .await
            .ok_or_else(|| AppError::Validation("No refresh token stored".to_string()))?;

        let app = self.session.app();
        request_token(
            self.session.http(),
            app,
            &app.endpoints.refresh_url,
            ClientAuth::Basic,
            &[
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }
}

#[async_trait]
impl SocialConnector for PinterestConnector {
    fn platform(&self) -> Platform {
        Platform::Pinterest
    }

    fn session(&self) -> &ConnectorSession {
        &self.session
    }

    async fn get_user_info(&self) -> Option<PlatformUserInfo> {
        let result = self.fetch_identity().await;
        self.session.finish_user_info(result).await
    }

    async fn refresh_access_token(&self) -> bool {
        let result = self.request_refresh().await;
        self.session.finish_refresh(result).await
    }

    async fn post_content(&self, text: &str, media_urls: &[String]) -> PostResult {
        if let Some(rejected) = require_media(Platform::Pinterest, media_urls) {
            return rejected;
        }
        let image_url = media_urls
            .iter()
            .map(|u| u.trim())
            .find(|u| !u.is_empty())
            .unwrap_or_default();

        let result = self.publish(text, image_url).await;
        self.session.finish_post(result).await
    }

    async fn validate_connection(&self) -> bool {
        self.fetch_identity().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::harness;
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_pin_goes_to_board() {
        let server = MockServer::start_async().await;
        let pins = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/pins")
                    .body_contains("\"board_id\":\"board-1\"")
                    .body_contains("https://cdn.example/pin.png");
                then.status(201).json_body(json!({ "id": "987" }));
            })
            .await;

        let h = harness(Platform::Pinterest, &server, "board-1", "pin-token", Some("pin-refresh")).await;
        let result = h
            .connector()
            .await
            .post_content("Spring", &["https://cdn.example/pin.png".to_string()])
            .await;

        pins.assert_async().await;
        assert!(result.success);
        assert_eq!(result.url.as_deref(), Some("https://www.pinterest.com/pin/987/"));
    }

    #[tokio::test]
    async fn test_missing_board_fails_without_request() {
        let server = MockServer::start_async().await;
        let pins = server
            .mock_async(|when, then| {
                when.path("/pins");
                then.status(201).json_body(json!({ "id": "1" }));
            })
            .await;

        let h = harness(Platform::Pinterest, &server, "", "pin-token", None).await;
        let result = h
            .connector()
            .await
            .post_content("x", &["https://cdn.example/pin.png".to_string()])
            .await;

        assert!(!result.success);
        pins.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_refresh_uses_basic_auth() {
        let server = MockServer::start_async().await;
        let refresh = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/refresh")
                    .header_exists("authorization")
                    .body_contains("refresh_token=pin-refresh");
                then.status(200).json_body(json!({
                    "access_token": "pin-token-2",
                    "refresh_token": "pin-refresh-2",
                    "expires_in": 2592000
                }));
            })
            .await;

        let h = harness(Platform::Pinterest, &server, "board-1", "pin-token", Some("pin-refresh")).await;
        let connector = h.connector().await;
        assert!(connector.refresh_access_token().await);

        refresh.assert_async().await;
        assert_eq!(connector.session().refresh_token().await.as_deref(), Some("pin-refresh-2"));
    }
}
