/// Social connection persistence
///
/// Connections are created by the OAuth handshake, mutated by token refresh and
/// profile sync, and soft-disabled on disconnect. Tokens arrive here already
/// encrypted.

use crate::{
    connectors::Platform,
    db::models::SocialConnection,
    error::{AppError, AppResult},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, platform, page_id, access_token, refresh_token, token_expires_at,
           platform_user_id, platform_username, display_name, profile_url,
           is_active, is_verified, last_error, last_sync_at, created_at, updated_at
    FROM social_connection
"#;

/// Identity fields written back by a profile sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUpdate {
    pub platform_user_id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
    pub is_verified: bool,
}

/// Encrypted token set ready to persist
#[derive(Debug, Clone)]
pub struct EncryptedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Store for `social_connection` rows
#[derive(Clone)]
pub struct ConnectionStore {
    db: SqlitePool,
}

impl ConnectionStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Persist the result of a successful OAuth handshake.
    ///
    /// An active connection for the same (user, platform, page) is updated in place,
    /// otherwise a new row is inserted.
    pub async fn upsert_from_handshake(
        &self,
        user_id: &str,
        platform: Platform,
        page_id: &str,
        tokens: EncryptedTokens,
    ) -> AppResult<SocialConnection> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let existing: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM social_connection
            WHERE user_id = ? AND platform = ? AND page_id = ? AND is_active = 1
            "#,
        )
        .bind(user_id)
        .bind(platform.as_str())
        .bind(page_id)
        .fetch_optional(&mut *tx)
        .await?;

        let id = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE social_connection
                    SET access_token = ?, refresh_token = ?, token_expires_at = ?,
                        last_error = NULL, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&tokens.access_token)
                .bind(&tokens.refresh_token)
                .bind(tokens.expires_at)
                .bind(now)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => {
                let id = Uuid::new_v4().to_string();
                sqlx::query(
                    r#"
                    INSERT INTO social_connection
                        (id, user_id, platform, page_id, access_token, refresh_token,
                         token_expires_at, is_active, is_verified, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, 1, 0, ?, ?)
                    "#,
                )
                .bind(&id)
                .bind(user_id)
                .bind(platform.as_str())
                .bind(page_id)
                .bind(&tokens.access_token)
                .bind(&tokens.refresh_token)
                .bind(tokens.expires_at)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                id
            }
        };

        tx.commit().await?;
        self.get(&id).await
    }

    /// Fetch a connection by id
    pub async fn get(&self, id: &str) -> AppResult<SocialConnection> {
        sqlx::query_as::<_, SocialConnection>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Connection {} not found", id)))
    }

    /// Fetch an active connection owned by `user_id`
    pub async fn get_for_user(&self, user_id: &str, id: &str) -> AppResult<SocialConnection> {
        sqlx::query_as::<_, SocialConnection>(&format!(
            "{} WHERE id = ? AND user_id = ? AND is_active = 1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Connection {} not found", id)))
    }

    /// Active connections for a user
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<SocialConnection>> {
        let rows = sqlx::query_as::<_, SocialConnection>(&format!(
            "{} WHERE user_id = ? AND is_active = 1 ORDER BY created_at ASC",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Active connections whose access token expires before `before`
    pub async fn list_expiring(&self, before: DateTime<Utc>) -> AppResult<Vec<SocialConnection>> {
        let rows = sqlx::query_as::<_, SocialConnection>(&format!(
            "{} WHERE is_active = 1 AND token_expires_at IS NOT NULL AND token_expires_at < ?
             ORDER BY token_expires_at ASC",
            SELECT_COLUMNS
        ))
        .bind(before)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Replace the stored tokens after a refresh
    pub async fn update_tokens(&self, id: &str, tokens: &EncryptedTokens) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE social_connection
            SET access_token = ?, refresh_token = ?, token_expires_at = ?,
                last_error = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expires_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Write synced platform identity onto the connection
    pub async fn update_user_info(&self, id: &str, identity: &IdentityUpdate) -> AppResult<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE social_connection
            SET platform_user_id = ?, platform_username = ?, display_name = ?,
                profile_url = ?, is_verified = ?, last_error = NULL,
                last_sync_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&identity.platform_user_id)
        .bind(&identity.username)
        .bind(&identity.display_name)
        .bind(&identity.profile_url)
        .bind(identity.is_verified)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Remember the most recent failure against a connection
    pub async fn record_error(&self, id: &str, message: &str) -> AppResult<()> {
        sqlx::query("UPDATE social_connection SET last_error = ?, updated_at = ? WHERE id = ?")
            .bind(message)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Soft-disable a connection owned by `user_id`
    pub async fn deactivate(&self, user_id: &str, id: &str) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE social_connection
            SET is_active = 0, updated_at = ?
            WHERE id = ? AND user_id = ? AND is_active = 1
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Connection {} not found", id)));
        }

        Ok(())
    }
}
