/// Linkshelf - link-in-bio storefront backend
///
/// Storefront profiles with custom links and banners, OAuth connections to
/// social platforms, and rate-limited view and click analytics.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod connections;
pub mod connectors;
pub mod context;
pub mod crypto;
pub mod db;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod oauth;
pub mod rate_limit;
pub mod server;
pub mod storefront;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{AppError, AppResult};
