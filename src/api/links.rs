/// Custom link management endpoints
use crate::{
    auth::AuthContext, context::AppContext, db::models::CustomLink, error::AppResult,
    storefront::NewLink,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

/// Build link routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/links", get(list_links).post(create_link))
        .route("/api/links/:id", delete(delete_link))
}

/// All of the caller's links, active ones first
async fn list_links(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Vec<CustomLink>>> {
    Ok(Json(ctx.links.list_for_user(&auth.user_id).await?))
}

async fn create_link(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<NewLink>,
) -> AppResult<(StatusCode, Json<CustomLink>)> {
    let link = ctx.links.create(&auth.user_id, &req).await?;
    tracing::debug!(user_id = %auth.user_id, link_id = %link.id, "Link created");
    Ok((StatusCode::CREATED, Json(link)))
}

async fn delete_link(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    ctx.links.deactivate(&auth.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
