/// TikTok Open API v2 connector
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
use serde_json::{json, Value};

const USER_FIELDS: &str = "open_id,union_id,avatar_url,display_name,username,profile_deep_link,is_verified";

pub struct TikTokConnector {
    session: ConnectorSession,
}

/// TikTok wraps payloads in `data` and reports failures in `error.code`
fn unwrap_data(body: Value) -> AppResult<Value> {
    if let Some(code) = body
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
    {
        if code != "ok" {
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or_default();
            return Err(AppError::Upstream(format!("TikTok error {}: {}", code, message)));
        }
    }

    body.get("data")
        .cloned()
        .ok_or_else(|| AppError::Upstream("TikTok response has no data".to_string()))
}

impl TikTokConnector {
    pub fn new(session: ConnectorSession) -> Self {
        Self { session }
    }

    async fn fetch_identity(&self) -> AppResult<PlatformUserInfo> {
        let url = self.session.api_url("/user/info/");
        let response = make_request(self, |http| http.get(&url).query(&[("fields", USER_FIELDS)])).await?;
        let data = unwrap_data(read_json(response).await?)?;
        let user = data.get("user").cloned().unwrap_or_default();

        let platform_user_id = json_str(&user, "open_id")
            .ok_or_else(|| AppError::Upstream("TikTok user has no open_id".to_string()))?;

        Ok(PlatformUserInfo {
            platform_user_id,
            username: json_str(&user, "username"),
            display_name: json_str(&user, "display_name"),
            profile_url: json_str(&user, "profile_deep_link"),
            is_verified: user
                .get("is_verified")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        })
    }

    /// Direct post where TikTok pulls the video from `video_url`
    async fn publish(&self, title: &str, video_url: &str) -> AppResult<PostResult> {
        let payload = json!({
            "post_info": {
                "title": title,
                "privacy_level": "PUBLIC_TO_EVERYONE",
                "disable_comment": false
            },
            "source_info": {
                "source": "PULL_FROM_URL",
                "video_url": video_url
            }
        });

        let url = self.session.api_url("/post/publish/video/init/");
        let response = make_request(self, |http| http.post(&url).json(&payload)).await?;
        let data = unwrap_data(read_json(response).await?)?;

        let publish_id = json_str(&data, "publish_id")
            .ok_or_else(|| AppError::Upstream("TikTok response has no publish_id".to_string()))?;

        Ok(PostResult::published(publish_id, None))
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
            ClientAuth::ClientKey,
            &[
                ("grant_type", "refresh_token".to_string()),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }
}

#[async_trait]
impl SocialConnector for TikTokConnector {
    fn platform(&self) -> Platform {
        Platform::TikTok
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
        if let Some(rejected) = require_media(Platform::TikTok, media_urls) {
            return rejected;
        }
        let video_url = media_urls
            .iter()
            .map(|u| u.trim())
            .find(|u| !u.is_empty())
            .unwrap_or_default();

        let result = self.publish(text, video_url).await;
        self.session.finish_post(result).await
    }

    async fn validate_connection(&self) -> bool {
        self.fetch_identity().await.is_ok()
    }
}
