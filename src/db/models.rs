/// Database records
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user's public storefront
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub is_public: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ordered link shown on a storefront
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CustomLink {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub url: String,
    pub position: i64,
    pub is_active: bool,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Promotional banner shown on a storefront
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Banner {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub image_url: String,
    pub target_url: String,
    pub position: i64,
    pub is_active: bool,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// OAuth grant linking a local user to one external social account.
///
/// `access_token` and `refresh_token` hold ciphertext produced by
/// [`crate::crypto::TokenCodec`].
#[derive(Debug, Clone, FromRow)]
pub struct SocialConnection {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub page_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub platform_user_id: Option<String>,
    pub platform_username: Option<String>,
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub last_error: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Connection as exposed over the API (no tokens)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionView {
    pub id: String,
    pub platform: String,
    pub page_id: String,
    pub platform_user_id: Option<String>,
    pub platform_username: Option<String>,
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<SocialConnection> for ConnectionView {
    fn from(c: SocialConnection) -> Self {
        Self {
            id: c.id,
            platform: c.platform,
            page_id: c.page_id,
            platform_user_id: c.platform_user_id,
            platform_username: c.platform_username,
            display_name: c.display_name,
            profile_url: c.profile_url,
            is_active: c.is_active,
            is_verified: c.is_verified,
            token_expires_at: c.token_expires_at,
            last_error: c.last_error,
            last_sync_at: c.last_sync_at,
            created_at: c.created_at,
        }
    }
}
