/// Facebook Graph API connector (user or page feed)
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

pub struct FacebookConnector {
    session: ConnectorSession,
}

impl FacebookConnector {
    pub fn new(session: ConnectorSession) -> Self {
        Self { session }
    }

    /// Feed owner: the connected page, or the user when there is none
    async fn feed_target(&self) -> String {
        let page_id = self.session.page_id().await;
        if page_id.is_empty() {
            "me".to_string()
        } else {
            page_id
        }
    }

    async fn fetch_identity(&self) -> AppResult<PlatformUserInfo> {
        let url = self.session.api_url("/me");
        let response = make_request(self, |http| {
            http.get(&url).query(&[("fields", "id,name,link")])
        })
        .await?;
        let body = read_json(response).await?;

        let platform_user_id = json_str(&body, "id")
            .ok_or_else(|| AppError::Upstream("Graph /me response has no id".to_string()))?;

        Ok(PlatformUserInfo {
            platform_user_id,
            username: None,
            display_name: json_str(&body, "name"),
            profile_url: json_str(&body, "link"),
            is_verified: false,
        })
    }

    async fn publish(&self, text: &str, media_urls: &[String]) -> AppResult<PostResult> {
        let target = self.feed_target().await;

        let mut payload = json!({ "message": text });
        if let Some(link) = media_urls.iter().find(|u| !u.trim().is_empty()) {
            payload["link"] = json!(link);
        }

        let url = self.session.api_url(&format!("/{}/feed", target));
        let response = make_request(self, |http| http.post(&url).json(&payload)).await?;
        let body = read_json(response).await?;

        let post_id = json_str(&body, "id")
            .ok_or_else(|| AppError::Upstream("Feed response has no id".to_string()))?;
        let post_url = format!("https://www.facebook.com/{}", post_id);

        Ok(PostResult::published(post_id, Some(post_url)))
    }

    /// Facebook has no refresh token; the current long-lived token is exchanged
    async fn request_refresh(&self) -> AppResult<TokenGrant> {
        let current = self.session.access_token().await;
        if current.is_empty() {
            return Err(AppError::Validation("No access token to exchange".to_string()));
        }

        let app = self.session.app();
        request_token(
            self.session.http(),
            app,
            &app.endpoints.refresh_url,
            ClientAuth::Query,
            &[
                ("grant_type", "fb_exchange_token".to_string()),
                ("fb_exchange_token", current),
            ],
        )
        .await
    }
}

#[async_trait]
impl SocialConnector for FacebookConnector {
    fn platform(&self) -> Platform {
        Platform::Facebook
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
