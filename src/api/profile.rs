/// Owner profile endpoints
use crate::{
    auth::AuthContext, context::AppContext, db::models::Profile, error::AppResult,
    storefront::ProfileInput,
};
use axum::{extract::State, routing::get, Json, Router};

/// Build profile routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/profile", get(get_profile).put(put_profile))
}

/// Fetch the caller's profile
async fn get_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<Json<Profile>> {
    let profile = ctx.profiles.get_for_user(&auth.user_id).await?;
    Ok(Json(profile))
}

/// Create or update the caller's profile
async fn put_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<ProfileInput>,
) -> AppResult<Json<Profile>> {
    let profile = ctx.profiles.upsert_own(&auth.user_id, &req).await?;
    tracing::info!(user_id = %auth.user_id, username = %profile.username, "Profile saved");
    Ok(Json(profile))
}
