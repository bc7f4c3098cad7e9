/// Custom links shown on a storefront
use crate::{
    db::models::CustomLink,
    error::{AppError, AppResult},
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

/// Active links a user may have at once
pub const MAX_ACTIVE_LINKS: i64 = 10;

const SELECT_LINK: &str = r#"
    SELECT id, user_id, title, url, position, is_active, click_count, created_at, updated_at
    FROM custom_link
"#;

/// Body of `POST /api/links`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLink {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(url)]
    pub url: String,
}

#[derive(Clone)]
pub struct LinkManager {
    db: SqlitePool,
}

impl LinkManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Add a link at the end of the user's list.
    ///
    /// The cap is checked before the insert without locking, so concurrent
    /// creations can exceed it.
    pub async fn create(&self, user_id: &str, link: &NewLink) -> AppResult<CustomLink> {
        link.validate()?;

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM custom_link WHERE user_id = ? AND is_active = 1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        if active >= MAX_ACTIVE_LINKS {
            return Err(AppError::Validation(format!(
                "Maximum of {} active links reached",
                MAX_ACTIVE_LINKS
            )));
        }

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM custom_link WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO custom_link (id, user_id, title, url, position, is_active,
                                     click_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(link.title.trim())
        .bind(link.url.trim())
        .bind(position)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        self.get(&id).await
    }

    async fn get(&self, id: &str) -> AppResult<CustomLink> {
        sqlx::query_as::<_, CustomLink>(&format!("{} WHERE id = ?", SELECT_LINK))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Link {} not found", id)))
    }

    /// An active link by id (public click tracking)
    pub async fn get_active(&self, id: &str) -> AppResult<CustomLink> {
        sqlx::query_as::<_, CustomLink>(&format!("{} WHERE id = ? AND is_active = 1", SELECT_LINK))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Link {} not found", id)))
    }

    /// Every link the user owns, active first, in display order
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<CustomLink>> {
        let links = sqlx::query_as::<_, CustomLink>(&format!(
            "{} WHERE user_id = ? ORDER BY is_active DESC, position ASC",
            SELECT_LINK
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(links)
    }

    /// Links shown on the public storefront
    pub async fn list_active(&self, user_id: &str) -> AppResult<Vec<CustomLink>> {
        let links = sqlx::query_as::<_, CustomLink>(&format!(
            "{} WHERE user_id = ? AND is_active = 1 ORDER BY position ASC",
            SELECT_LINK
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(links)
    }

    /// Hide a link; its click history stays
    pub async fn deactivate(&self, user_id: &str, id: &str) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE custom_link SET is_active = 0, updated_at = ? WHERE id = ? AND user_id = ? AND is_active = 1",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Link {} not found", id)));
        }
        Ok(())
    }
}
