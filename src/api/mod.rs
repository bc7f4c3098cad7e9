/// API routes and handlers
pub mod banners;
pub mod connections;
pub mod health;
pub mod links;
pub mod middleware;
pub mod profile;
pub mod public;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(profile::routes())
        .merge(links::routes())
        .merge(banners::routes())
        .merge(connections::routes())
        .merge(public::routes())
}
