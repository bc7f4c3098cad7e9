/// LinkedIn member connector (OpenID userinfo + UGC posts)
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

pub struct LinkedInConnector {
    session: ConnectorSession,
}

impl LinkedInConnector {
    pub fn new(session: ConnectorSession) -> Self {
        Self { session }
    }

    async fn fetch_identity(&self) -> AppResult<PlatformUserInfo> {
        let url = self.session.api_url("/v2/userinfo");
        let response = make_request(self, |http| http.get(&url)).await?;
        let body = read_json(response).await?;

        let platform_user_id = json_str(&body, "sub")
            .ok_or_else(|| AppError::Upstream("userinfo response has no sub".to_string()))?;

        Ok(PlatformUserInfo {
            platform_user_id,
            username: json_str(&body, "email"),
            display_name: json_str(&body, "name"),
            profile_url: None,
            is_verified: body
                .get("email_verified")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        })
    }

    async fn author_urn(&self) -> AppResult<String> {
        let person_id = match self.session.platform_user_id().await {
            Some(id) => id,
            None => self.fetch_identity().await?.platform_user_id,
        };
        Ok(format!("urn:li:person:{}", person_id))
    }

    async fn publish(&self, text: &str, media_urls: &[String]) -> AppResult<PostResult> {
        let author = self.author_urn().await?;

        let article = media_urls.iter().find(|u| !u.trim().is_empty());
        let share_content = match article {
            Some(link) => json!({
                "shareCommentary": { "text": text },
                "shareMediaCategory": "ARTICLE",
                "media": [{ "status": "READY", "originalUrl": link }]
            }),
            None => json!({
                "shareCommentary": { "text": text },
                "shareMediaCategory": "NONE"
            }),
        };

        let payload = json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": { "com.linkedin.ugc.ShareContent": share_content },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" }
        });

        let url = self.session.api_url("/v2/ugcPosts");
        let response = make_request(self, |http| {
            http.post(&url)
                .header("X-Restli-Protocol-Version", "2.0.0")
                .json(&payload)
        })
        .await?;

        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = read_json(response).await?;

        let post_id = header_id
            .or_else(|| json_str(&body, "id"))
            .ok_or_else(|| AppError::Upstream("ugcPosts response has no id".to_string()))?;
        let post_url = format!("https://www.linkedin.com/feed/update/{}", post_id);

        Ok(PostResult::published(post_id, Some(post_url)))
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
impl SocialConnector for LinkedInConnector {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
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

#[cfg(test)]
mod tests {
    use super::super::testing::harness;
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_post_uses_person_urn() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v2/userinfo");
                then.status(200).json_body(json!({ "sub": "abc123", "name": "A" }));
            })
            .await;
        let post = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v2/ugcPosts")
                    .header("x-restli-protocol-version", "2.0.0")
                    .body_contains("urn:li:person:abc123")
                    .body_contains("Launch day");
                then.status(201)
                    .header("x-restli-id", "urn:li:share:777")
                    .json_body(json!({}));
            })
            .await;

        let h = harness(Platform::LinkedIn, &server, "", "token", Some("refresh")).await;
        let connector = h.connector().await;

        let result = connector.post_content("Launch day", &[]).await;
        post.assert_async().await;
        assert!(result.success);
        assert_eq!(result.post_id.as_deref(), Some("urn:li:share:777"));
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_fails() {
        let server = MockServer::start_async().await;
        let h = harness(Platform::LinkedIn, &server, "", "token", None).await;
        let connector = h.connector().await;

        assert!(!connector.refresh_access_token().await);
        let row = h.store.get(&h.connection_id).await.unwrap();
        assert!(row.last_error.unwrap().contains("refresh"));
    }
}
