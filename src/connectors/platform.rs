/// Supported social platforms
use crate::config::PlatformEndpoints;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    LinkedIn,
    YouTube,
    TikTok,
    Pinterest,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::LinkedIn,
        Platform::YouTube,
        Platform::TikTok,
        Platform::Pinterest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::LinkedIn => "linkedin",
            Platform::YouTube => "youtube",
            Platform::TikTok => "tiktok",
            Platform::Pinterest => "pinterest",
        }
    }

    /// Platforms that cannot publish a text-only post
    pub fn requires_media(&self) -> bool {
        matches!(
            self,
            Platform::Instagram | Platform::TikTok | Platform::Pinterest
        )
    }

    /// Platforms that extend the access token itself instead of using a refresh token
    pub fn refreshes_with_access_token(&self) -> bool {
        matches!(self, Platform::Facebook | Platform::Instagram)
    }

    /// OAuth scopes requested during the consent step
    pub fn default_scopes(&self) -> &'static str {
        match self {
            Platform::Facebook => "public_profile,pages_show_list,pages_manage_posts,pages_read_engagement",
            Platform::Instagram => "instagram_basic,instagram_content_publish",
            Platform::LinkedIn => "openid profile email w_member_social",
            Platform::YouTube => {
                "https://www.googleapis.com/auth/youtube https://www.googleapis.com/auth/youtube.readonly"
            }
            Platform::TikTok => "user.info.basic,user.info.profile,video.publish",
            Platform::Pinterest => "boards:read,pins:read,pins:write,user_accounts:read",
        }
    }

    /// Vendor endpoints used when no override is configured
    pub fn default_endpoints(&self) -> PlatformEndpoints {
        let (api_base, authorize_url, token_url, refresh_url) = match self {
            Platform::Facebook => (
                "https://graph.facebook.com/v18.0",
                "https://www.facebook.com/v18.0/dialog/oauth",
                "https://graph.facebook.com/v18.0/oauth/access_token",
                "https://graph.facebook.com/v18.0/oauth/access_token",
            ),
            Platform::Instagram => (
                "https://graph.facebook.com/v18.0",
                "https://api.instagram.com/oauth/authorize",
                "https://api.instagram.com/oauth/access_token",
                "https://graph.instagram.com/refresh_access_token",
            ),
            Platform::LinkedIn => (
                "https://api.linkedin.com",
                "https://www.linkedin.com/oauth/v2/authorization",
                "https://www.linkedin.com/oauth/v2/accessToken",
                "https://www.linkedin.com/oauth/v2/accessToken",
            ),
            Platform::YouTube => (
                "https://www.googleapis.com/youtube/v3",
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
                "https://oauth2.googleapis.com/token",
            ),
            Platform::TikTok => (
                "https://open.tiktokapis.com/v2",
                "https://www.tiktok.com/v2/auth/authorize/",
                "https://open.tiktokapis.com/v2/oauth/token/",
                "https://open.tiktokapis.com/v2/oauth/token/",
            ),
            Platform::Pinterest => (
                "https://api.pinterest.com/v5",
                "https://www.pinterest.com/oauth/",
                "https://api.pinterest.com/v5/oauth/token",
                "https://api.pinterest.com/v5/oauth/token",
            ),
        };

        PlatformEndpoints {
            api_base: api_base.to_string(),
            authorize_url: authorize_url.to_string(),
            token_url: token_url.to_string(),
            refresh_url: refresh_url.to_string(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "linkedin" => Ok(Platform::LinkedIn),
            "youtube" => Ok(Platform::YouTube),
            "tiktok" => Ok(Platform::TikTok),
            "pinterest" => Ok(Platform::Pinterest),
            other => Err(AppError::Validation(format!("Unsupported platform: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("LinkedIn".parse::<Platform>().unwrap(), Platform::LinkedIn);
        assert_eq!(" TIKTOK ".parse::<Platform>().unwrap(), Platform::TikTok);
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_round_trip_names() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn test_media_requirements() {
        assert!(Platform::Instagram.requires_media());
        assert!(Platform::Pinterest.requires_media());
        assert!(Platform::TikTok.requires_media());
        assert!(!Platform::Facebook.requires_media());
        assert!(!Platform::LinkedIn.requires_media());
        assert!(!Platform::YouTube.requires_media());

        assert!(Platform::Facebook.refreshes_with_access_token());
        assert!(!Platform::LinkedIn.refreshes_with_access_token());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Platform::YouTube).unwrap();
        assert_eq!(json, "\"youtube\"");
    }
}
