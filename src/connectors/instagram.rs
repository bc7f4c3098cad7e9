/// Instagram Graph API connector
///
/// Publishing is a two-step flow: create a media container, then publish it.
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

pub struct InstagramConnector {
    session: ConnectorSession,
}

impl InstagramConnector {
    pub fn new(session: ConnectorSession) -> Self {
        Self { session }
    }

    async fn fetch_identity(&self) -> AppResult<PlatformUserInfo> {
        let page_id = self.session.page_id().await;
        let node = if page_id.is_empty() { "me".to_string() } else { page_id };

        let url = self.session.api_url(&format!("/{}", node));
        let response = make_request(self, |http| {
            http.get(&url).query(&[("fields", "id,username,name")])
        })
        .await?;
        let body = read_json(response).await?;

        let platform_user_id = json_str(&body, "id")
            .ok_or_else(|| AppError::Upstream("Instagram account response has no id".to_string()))?;
        let username = json_str(&body, "username");

        Ok(PlatformUserInfo {
            platform_user_id,
            profile_url: username
                .as_ref()
                .map(|u| format!("https://www.instagram.com/{}", u)),
            display_name: json_str(&body, "name"),
            username,
            is_verified: false,
        })
    }

    /// Business account that owns published media
    async fn account_id(&self) -> AppResult<String> {
        let page_id = self.session.page_id().await;
        if !page_id.is_empty() {
            return Ok(page_id);
        }
        match self.session.platform_user_id().await {
            Some(id) => Ok(id),
            None => Ok(self.fetch_identity().await?.platform_user_id),
        }
    }

    async fn publish(&self, caption: &str, image_url: &str) -> AppResult<PostResult> {
        let account = self.account_id().await?;

        let container_url = self.session.api_url(&format!("/{}/media", account));
        let container = json!({ "image_url": image_url, "caption": caption });
        let response = make_request(self, |http| http.post(&container_url).json(&container)).await?;
        let creation_id = json_str(&read_json(response).await?, "id")
            .ok_or_else(|| AppError::Upstream("Media container response has no id".to_string()))?;

        let publish_url = self.session.api_url(&format!("/{}/media_publish", account));
        let publish = json!({ "creation_id": creation_id });
        let response = make_request(self, |http| http.post(&publish_url).json(&publish)).await?;
        let media_id = json_str(&read_json(response).await?, "id")
            .ok_or_else(|| AppError::Upstream("Publish response has no id".to_string()))?;

        Ok(PostResult::published(media_id, None))
    }

    /// Long-lived Instagram tokens refresh themselves
    async fn request_refresh(&self) -> AppResult<TokenGrant> {
        let current = self.session.access_token().await;
        if current.is_empty() {
            return Err(AppError::Validation("No access token to refresh".to_string()));
        }

        let app = self.session.app();
        request_token(
            self.session.http(),
            app,
            &app.endpoints.refresh_url,
            ClientAuth::BareQuery,
            &[
                ("grant_type", "ig_refresh_token".to_string()),
                ("access_token", current),
            ],
        )
        .await
    }
}

#[async_trait]
impl SocialConnector for InstagramConnector {
    fn platform(&self) -> Platform {
        Platform::Instagram
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
        if let Some(rejected) = require_media(Platform::Instagram, media_urls) {
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
    async fn test_container_then_publish() {
        let server = MockServer::start_async().await;
        let container = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/17841400/media")
                    .body_contains("https://cdn.example/p.jpg")
                    .body_contains("New drop");
                then.status(200).json_body(json!({ "id": "container-1" }));
            })
            .await;
        let publish = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/17841400/media_publish")
                    .body_contains("container-1");
                then.status(200).json_body(json!({ "id": "media-9" }));
            })
            .await;

        let h = harness(Platform::Instagram, &server, "17841400", "ig-token", None).await;
        let result = h
            .connector()
            .await
            .post_content("New drop", &["https://cdn.example/p.jpg".to_string()])
            .await;

        container.assert_async().await;
        publish.assert_async().await;
        assert!(result.success);
        assert_eq!(result.post_id.as_deref(), Some("media-9"));
    }

    #[tokio::test]
    async fn test_identity_builds_profile_url() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/me").query_param("fields", "id,username,name");
                then.status(200)
                    .json_body(json!({ "id": "42", "username": "shopkeeper", "name": "Shop" }));
            })
            .await;

        let h = harness(Platform::Instagram, &server, "", "ig-token", None).await;
        let info = h.connector().await.get_user_info().await.unwrap();

        assert_eq!(info.username.as_deref(), Some("shopkeeper"));
        assert_eq!(
            info.profile_url.as_deref(),
            Some("https://www.instagram.com/shopkeeper")
        );
    }

    #[tokio::test]
    async fn test_refresh_uses_ig_refresh_token_grant() {
        let server = MockServer::start_async().await;
        let refresh = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/oauth/refresh")
                    .query_param("grant_type", "ig_refresh_token")
                    .query_param("access_token", "ig-token");
                then.status(200)
                    .json_body(json!({ "access_token": "ig-token-2", "expires_in": 5184000 }));
            })
            .await;

        let h = harness(Platform::Instagram, &server, "", "ig-token", None).await;
        assert!(h.connector().await.refresh_access_token().await);

        refresh.assert_async().await;
        assert_eq!(h.stored_access_token().await, "ig-token-2");
    }
}
