/// Storefront profiles
use crate::{
    db::models::Profile,
    error::{AppError, AppResult},
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

const SELECT_PROFILE: &str = r#"
    SELECT id, user_id, username, display_name, bio, is_public, view_count, created_at, updated_at
    FROM profile
"#;

fn default_true() -> bool {
    true
}

/// Body of `PUT /api/profile`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileInput {
    #[validate(length(min = 3, max = 30))]
    pub username: String,
    #[validate(length(max = 100))]
    pub display_name: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

/// Letters, digits, `_`, `.` and `-`
fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[derive(Clone)]
pub struct ProfileManager {
    db: SqlitePool,
}

impl ProfileManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create or update the caller's profile
    pub async fn upsert_own(&self, user_id: &str, input: &ProfileInput) -> AppResult<Profile> {
        input.validate()?;

        let username = input.username.trim().to_ascii_lowercase();
        if !is_valid_username(&username) {
            return Err(AppError::Validation(
                "Username may only contain letters, digits, '_', '.' and '-'".to_string(),
            ));
        }

        let owner: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM profile WHERE username = ?")
                .bind(&username)
                .fetch_optional(&self.db)
                .await?;
        if matches!(owner, Some(ref other) if other != user_id) {
            return Err(AppError::Conflict(format!("Username {} is taken", username)));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO profile (id, user_id, username, display_name, bio, is_public,
                                 view_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                display_name = excluded.display_name,
                bio = excluded.bio,
                is_public = excluded.is_public,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&username)
        .bind(&input.display_name)
        .bind(&input.bio)
        .bind(input.is_public)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        self.get_for_user(user_id).await
    }

    /// The caller's own profile, public or not
    pub async fn get_for_user(&self, user_id: &str) -> AppResult<Profile> {
        sqlx::query_as::<_, Profile>(&format!("{} WHERE user_id = ?", SELECT_PROFILE))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
    }

    /// A public profile by username (case-insensitive)
    pub async fn get_by_username(&self, username: &str) -> AppResult<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            "{} WHERE username = ? AND is_public = 1",
            SELECT_PROFILE
        ))
        .bind(username.trim().to_ascii_lowercase())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", username)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;

    fn input(username: &str) -> ProfileInput {
        ProfileInput {
            username: username.to_string(),
            display_name: Some("Shop".to_string()),
            bio: None,
            is_public: true,
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_profile_per_user() {
        let profiles = ProfileManager::new(create_memory_pool().await.unwrap());

        let first = profiles.upsert_own("u1", &input("MyShop")).await.unwrap();
        assert_eq!(first.username, "myshop");

        let second = profiles.upsert_own("u1", &input("myshop2")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.username, "myshop2");
    }

    #[tokio::test]
    async fn test_username_conflict_and_format() {
        let profiles = ProfileManager::new(create_memory_pool().await.unwrap());
        profiles.upsert_own("u1", &input("taken")).await.unwrap();

        assert!(matches!(
            profiles.upsert_own("u2", &input("Taken")).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            profiles.upsert_own("u2", &input("no spaces")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            profiles.upsert_own("u2", &input("ab")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_private_profiles_are_hidden() {
        let profiles = ProfileManager::new(create_memory_pool().await.unwrap());
        let mut private = input("hidden");
        private.is_public = false;
        profiles.upsert_own("u1", &private).await.unwrap();

        assert!(profiles.get_by_username("hidden").await.is_err());
        assert!(profiles.get_for_user("u1").await.is_ok());
    }
}
