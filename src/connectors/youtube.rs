/// YouTube Data API v3 connector
use super::{
    session::{json_str, make_request, read_json},
    ConnectorSession, Platform, PlatformUserInfo, PostResult, SocialConnector,
};
use crate::{
    error::{AppError, AppResult},
    oauth::{request_token, ClientAuth, TokenGrant},
};
use async_trait::async_trait;
use serde_json::json;

pub struct YouTubeConnector {
    session: ConnectorSession,
}

impl YouTubeConnector {
    pub fn new(session: ConnectorSession) -> Self {
        Self { session }
    }

    async fn fetch_identity(&self) -> AppResult<PlatformUserInfo> {
        let url = self.session.api_url("/channels");
        let response = make_request(self, |http| {
            http.get(&url).query(&[("part", "snippet"), ("mine", "true")])
        })
        .await?;
        let body = read_json(response).await?;

        let channel = body
            .get("items")
            .and_then(|items| items.get(0))
            .ok_or_else(|| AppError::Upstream("Account has no YouTube channel".to_string()))?;
        let channel_id = json_str(channel, "id")
            .ok_or_else(|| AppError::Upstream("Channel has no id".to_string()))?;
        let snippet = channel.get("snippet").cloned().unwrap_or_default();

        Ok(PlatformUserInfo {
            profile_url: Some(format!("https://www.youtube.com/channel/{}", channel_id)),
            platform_user_id: channel_id,
            username: json_str(&snippet, "customUrl"),
            display_name: json_str(&snippet, "title"),
            is_verified: false,
        })
    }

    /// Channel bulletin; links are appended to the text
    async fn publish(&self, text: &str, media_urls: &[String]) -> AppResult<PostResult> {
        let mut description = text.to_string();
        for link in media_urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            description.push('\n');
            description.push_str(link);
        }

        let payload = json!({ "snippet": { "description": description } });
        let url = self.session.api_url("/activities");
        let response = make_request(self, |http| {
            http.post(&url).query(&[("part", "snippet")]).json(&payload)
        })
        .await?;
        let body = read_json(response).await?;

        let activity_id = json_str(&body, "id")
            .ok_or_else(|| AppError::Upstream("Activity response has no id".to_string()))?;

        Ok(PostResult::published(activity_id, None))
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
            ClientAuth::Form,
            &[
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }
}

#[async_trait]
impl SocialConnector for YouTubeConnector {
    fn platform(&self) -> Platform {
        Platform::YouTube
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
        let result = self.publish(text, media_urls).await;
        self.session.finish_post(result).await
    }

    async fn validate_connection(&self) -> bool {
        self.fetch_identity().await.is_ok()
    }
}
