/// Social connection endpoints: OAuth handshake and connector operations
use crate::{
    auth::AuthContext,
    connections::EncryptedTokens,
    connectors::{Platform, PlatformUserInfo, PostResult},
    context::AppContext,
    db::models::ConnectionView,
    error::{AppError, AppResult},
    oauth,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build connection routes.
///
/// The second path segment is a platform name for the handshake routes and a
/// connection id everywhere else; the router needs a single parameter name there.
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/connections", get(list_connections))
        .route("/api/connections/:id", delete(disconnect))
        .route("/api/connections/:id/authorize", get(authorize))
        .route("/api/connections/:id/callback", post(callback))
        .route("/api/connections/:id/sync", post(sync))
        .route("/api/connections/:id/validate", post(validate))
        .route("/api/connections/:id/refresh", post(refresh))
        .route("/api/connections/:id/posts", post(publish))
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
    pub state: String,
    /// Page, channel or board to act on; empty means the account itself
    #[serde(default)]
    pub page_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub text: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

/// Active connections of the caller
async fn list_connections(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<ConnectionView>>> {
    let connections = ctx.connections.list_for_user(&auth.user_id).await?;
    Ok(Json(connections.into_iter().map(ConnectionView::from).collect()))
}

/// Start the consent flow for a platform
async fn authorize(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(platform): Path<String>,
) -> AppResult<Json<AuthorizeResponse>> {
    let platform: Platform = platform.parse()?;
    let app = ctx.config.platform(platform)?;
    if !app.is_configured() {
        return Err(AppError::Validation(format!(
            "{} client credentials are not configured",
            platform
        )));
    }

    let state = ctx.oauth_states.issue(&auth.user_id, platform).await;
    let url = oauth::authorization_url(platform, app, &state)?;

    Ok(Json(AuthorizeResponse { url, state }))
}

/// Finish the consent flow: exchange the code and store the connection
async fn callback(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(platform): Path<String>,
    Json(req): Json<CallbackRequest>,
) -> AppResult<Json<ConnectionView>> {
    let platform: Platform = platform.parse()?;

    let pending = ctx
        .oauth_states
        .take(&req.state)
        .await
        .ok_or_else(|| AppError::Validation("Unknown or expired OAuth state".to_string()))?;

    if pending.user_id != auth.user_id || pending.platform != platform {
        tracing::warn!(user_id = %auth.user_id, %platform, "OAuth state does not match caller");
        return Err(AppError::Authorization(
            "OAuth state was issued for another request".to_string(),
        ));
    }

    let app = ctx.config.platform(platform)?;
    let grant = oauth::exchange_code(&ctx.http, platform, app, &req.code).await?;

    let tokens = EncryptedTokens {
        access_token: ctx.codec.encrypt(&grant.access_token),
        refresh_token: grant.refresh_token.as_deref().map(|t| ctx.codec.encrypt(t)),
        expires_at: grant.expires_at(),
    };
    let page_id = req.page_id.unwrap_or_default();
    let connection = ctx
        .connections
        .upsert_from_handshake(&auth.user_id, platform, page_id.trim(), tokens)
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        %platform,
        connection_id = %connection.id,
        "Social account connected"
    );

    // Identity is best effort; a failure is kept as last_error on the row
    let connection_id = connection.id.clone();
    let connector = ctx.connectors.create(connection)?;
    connector.get_user_info().await;

    let connection = ctx.connections.get(&connection_id).await?;
    Ok(Json(ConnectionView::from(connection)))
}

/// Refresh identity fields from the platform
async fn sync(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<PlatformUserInfo>> {
    let connection = ctx.connections.get_for_user(&auth.user_id, &id).await?;
    let connector = ctx.connectors.create(connection)?;

    match connector.get_user_info().await {
        Some(info) => Ok(Json(info)),
        None => {
            let connection = ctx.connections.get(&id).await?;
            Err(AppError::Upstream(connection.last_error.unwrap_or_else(|| {
                "Failed to fetch user info".to_string()
            })))
        }
    }
}

async fn validate(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let connection = ctx.connections.get_for_user(&auth.user_id, &id).await?;
    let connector = ctx.connectors.create(connection)?;
    let valid = connector.validate_connection().await;

    Ok(Json(serde_json::json!({ "valid": valid })))
}

async fn refresh(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let connection = ctx.connections.get_for_user(&auth.user_id, &id).await?;
    let connector = ctx.connectors.create(connection)?;
    let refreshed = connector.refresh_access_token().await;

    Ok(Json(serde_json::json!({ "refreshed": refreshed })))
}

/// Publish through a connection. Platform failures are reported in the body.
async fn publish(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(req): Json<PublishRequest>,
) -> AppResult<Json<PostResult>> {
    if req.text.trim().is_empty() && req.media_urls.is_empty() {
        return Err(AppError::Validation("Post text or media is required".to_string()));
    }

    let connection = ctx.connections.get_for_user(&auth.user_id, &id).await?;
    let connector = ctx.connectors.create(connection)?;
    let result = connector.post_content(&req.text, &req.media_urls).await;

    if !result.success {
        tracing::warn!(connection_id = %id, error = ?result.error, "Publish failed");
    }
    Ok(Json(result))
}

/// Soft-disable a connection
async fn disconnect(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    ctx.connections.deactivate(&auth.user_id, &id).await?;
    tracing::info!(user_id = %auth.user_id, connection_id = %id, "Connection disabled");
    Ok(StatusCode::NO_CONTENT)
}
