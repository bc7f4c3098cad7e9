/// Banner management endpoints
use crate::{
    auth::AuthContext, context::AppContext, db::models::Banner, error::AppResult,
    storefront::NewBanner,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

/// Build banner routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/banners", get(list_banners).post(create_banner))
        .route("/api/banners/:id", delete(delete_banner))
}

async fn list_banners(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<Banner>>> {
    Ok(Json(ctx.banners.list_for_user(&auth.user_id).await?))
}

async fn create_banner(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<NewBanner>,
) -> AppResult<(StatusCode, Json<Banner>)> {
    let banner = ctx.banners.create(&auth.user_id, &req).await?;
    Ok((StatusCode::CREATED, Json(banner)))
}

async fn delete_banner(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    ctx.banners.deactivate(&auth.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
