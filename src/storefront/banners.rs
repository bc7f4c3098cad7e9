/// Promotional banners shown on a storefront
use crate::{
    db::models::Banner,
    error::{AppError, AppResult},
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

pub const MAX_ACTIVE_BANNERS: i64 = 5;

const SELECT_BANNER: &str = r#"
    SELECT id, user_id, title, image_url, target_url, position, is_active, click_count,
           created_at, updated_at
    FROM banner
"#;

/// Body of `POST /api/banners`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBanner {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(url)]
    pub image_url: String,
    #[validate(url)]
    pub target_url: String,
}

#[derive(Clone)]
pub struct BannerManager {
    db: SqlitePool,
}

impl BannerManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Add a banner; same unlocked cap check as links
    pub async fn create(&self, user_id: &str, banner: &NewBanner) -> AppResult<Banner> {
        banner.validate()?;

        let active: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM banner WHERE user_id = ? AND is_active = 1")
                .bind(user_id)
                .fetch_one(&self.db)
                .await?;

        if active >= MAX_ACTIVE_BANNERS {
            return Err(AppError::Validation(format!(
                "Maximum of {} active banners reached",
                MAX_ACTIVE_BANNERS
            )));
        }

        let position: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(position), -1) + 1 FROM banner WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.db)
                .await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO banner (id, user_id, title, image_url, target_url, position, is_active,
                                click_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(banner.title.trim())
        .bind(banner.image_url.trim())
        .bind(banner.target_url.trim())
        .bind(position)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        self.get_active(&id).await
    }

    pub async fn get_active(&self, id: &str) -> AppResult<Banner> {
        sqlx::query_as::<_, Banner>(&format!("{} WHERE id = ? AND is_active = 1", SELECT_BANNER))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Banner {} not found", id)))
    }

    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Banner>> {
        let banners = sqlx::query_as::<_, Banner>(&format!(
            "{} WHERE user_id = ? ORDER BY is_active DESC, position ASC",
            SELECT_BANNER
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(banners)
    }

    pub async fn list_active(&self, user_id: &str) -> AppResult<Vec<Banner>> {
        let banners = sqlx::query_as::<_, Banner>(&format!(
            "{} WHERE user_id = ? AND is_active = 1 ORDER BY position ASC",
            SELECT_BANNER
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(banners)
    }

    pub async fn deactivate(&self, user_id: &str, id: &str) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE banner SET is_active = 0, updated_at = ? WHERE id = ? AND user_id = ? AND is_active = 1",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Banner {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_memory_pool;

    fn banner(n: usize) -> NewBanner {
        NewBanner {
            title: format!("Sale {}", n),
            image_url: format!("https://cdn.example.com/{}.png", n),
            target_url: "https://shop.example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_cap_of_five_active_banners() {
        let banners = BannerManager::new(create_memory_pool().await.unwrap());
        for n in 0..5 {
            banners.create("u1", &banner(n)).await.unwrap();
        }
        assert!(matches!(
            banners.create("u1", &banner(5)).await,
            Err(AppError::Validation(_))
        ));

        let first = banners.list_active("u1").await.unwrap().remove(0);
        banners.deactivate("u1", &first.id).await.unwrap();
        assert!(banners.create("u1", &banner(6)).await.is_ok());
    }

    #[tokio::test]
    async fn test_target_url_must_be_valid() {
        let banners = BannerManager::new(create_memory_pool().await.unwrap());
        let mut bad = banner(0);
        bad.target_url = "javascript alert".to_string();
        assert!(banners.create("u1", &bad).await.is_err());
    }
}
