/// Public storefront endpoints: page rendering data plus view and click tracking
use crate::{
    analytics::{TrackOutcome, TrackTarget, VisitorInfo},
    context::AppContext,
    db::models::{Banner, CustomLink, Profile},
    error::{AppError, AppResult},
};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;

/// Build public routes (no authentication)
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/public/:username", get(get_storefront))
        .route("/api/public/:username/view", post(track_view))
        .route("/api/public/links/:id/click", post(track_link_click))
        .route("/api/public/banners/:id/click", post(track_banner_click))
}

/// Everything a storefront page renders
#[derive(Debug, Serialize)]
pub struct Storefront {
    pub profile: PublicProfile,
    pub links: Vec<PublicLink>,
    pub banners: Vec<PublicBanner>,
}

/// Profile without owner-only fields
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublicLink {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct PublicBanner {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub target_url: String,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub tracked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<Profile> for PublicProfile {
    fn from(p: Profile) -> Self {
        Self {
            username: p.username,
            display_name: p.display_name,
            bio: p.bio,
        }
    }
}

impl From<CustomLink> for PublicLink {
    fn from(l: CustomLink) -> Self {
        Self {
            id: l.id,
            title: l.title,
            url: l.url,
        }
    }
}

impl From<Banner> for PublicBanner {
    fn from(b: Banner) -> Self {
        Self {
            id: b.id,
            title: b.title,
            image_url: b.image_url,
            target_url: b.target_url,
        }
    }
}

async fn get_storefront(
    State(ctx): State<AppContext>,
    Path(username): Path<String>,
) -> AppResult<Json<Storefront>> {
    let profile = ctx.profiles.get_by_username(&username).await?;
    let links = ctx.links.list_active(&profile.user_id).await?;
    let banners = ctx.banners.list_active(&profile.user_id).await?;

    Ok(Json(Storefront {
        profile: profile.into(),
        links: links.into_iter().map(PublicLink::from).collect(),
        banners: banners.into_iter().map(PublicBanner::from).collect(),
    }))
}

async fn track_view(
    State(ctx): State<AppContext>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> AppResult<Json<TrackResponse>> {
    let profile = ctx.profiles.get_by_username(&username).await?;
    let visitor = VisitorInfo::from_request(&headers, peer.map(|ConnectInfo(addr)| addr));

    let outcome = ctx.tracker.track(&TrackTarget::ProfileView(profile), &visitor).await;
    respond(outcome, None)
}

/// Record a link click and hand back the destination
async fn track_link_click(
    State(ctx): State<AppContext>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<TrackResponse>> {
    let link = ctx.links.get_active(&id).await?;
    let url = link.url.clone();
    let visitor = VisitorInfo::from_request(&headers, peer.map(|ConnectInfo(addr)| addr));

    let outcome = ctx.tracker.track(&TrackTarget::LinkClick(link), &visitor).await;
    respond(outcome, Some(url))
}

async fn track_banner_click(
    State(ctx): State<AppContext>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<Json<TrackResponse>> {
    let banner = ctx.banners.get_active(&id).await?;
    let url = banner.target_url.clone();
    let visitor = VisitorInfo::from_request(&headers, peer.map(|ConnectInfo(addr)| addr));

    let outcome = ctx.tracker.track(&TrackTarget::BannerClick(banner), &visitor).await;
    respond(outcome, Some(url))
}

fn respond(outcome: TrackOutcome, url: Option<String>) -> AppResult<Json<TrackResponse>> {
    match outcome {
        TrackOutcome::RateLimited { retry_after } => {
            Err(AppError::RateLimitExceeded { retry_after })
        }
        _ => Ok(Json(TrackResponse { tracked: true, url })),
    }
}
