/// Background task implementations
use crate::{
    connectors::Platform, context::AppContext, db::models::SocialConnection, error::AppResult,
    rate_limit::CounterStore,
};
use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};

/// How far ahead of expiry tokens are refreshed
const REFRESH_HORIZON_HOURS: i64 = 24;

/// Concurrent platform calls during a sweep
const REFRESH_CONCURRENCY: usize = 4;

/// Summary of one refresh sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub attempted: usize,
    pub refreshed: usize,
}

/// Whether a connection has anything to refresh with
fn is_refreshable(connection: &SocialConnection) -> bool {
    let has_refresh_token = connection
        .refresh_token
        .as_deref()
        .is_some_and(|t| !t.is_empty());

    has_refresh_token
        || connection
            .platform
            .parse::<Platform>()
            .map(|p| p.refreshes_with_access_token())
            .unwrap_or(false)
}

/// Refresh tokens that expire within the horizon
pub async fn refresh_expiring_tokens(ctx: &AppContext) -> AppResult<RefreshSummary> {
    let horizon = Utc::now() + ChronoDuration::hours(REFRESH_HORIZON_HOURS);
    let candidates: Vec<SocialConnection> = ctx
        .connections
        .list_expiring(horizon)
        .await?
        .into_iter()
        .filter(is_refreshable)
        .collect();

    let attempted = candidates.len();
    let refreshed = AtomicUsize::new(0);
    let counter = &refreshed;

    stream::iter(candidates)
        .for_each_concurrent(REFRESH_CONCURRENCY, move |connection| {
            async move {
                let id = connection.id.clone();
                match ctx.connectors.create(connection) {
                    Ok(connector) => {
                        if connector.refresh_access_token().await {
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(e) => tracing::warn!(connection_id = %id, "Skipping refresh: {}", e),
                }
            }
        })
        .await;

    Ok(RefreshSummary {
        attempted,
        refreshed: refreshed.into_inner(),
    })
}

/// Drop expired rate-limit counters, OAuth states and idle limiter keys
pub async fn purge_expired_state(ctx: &AppContext) -> AppResult<usize> {
    let counters = ctx.counter_limiter.store().purge_expired().await?;
    let states = ctx.oauth_states.purge_expired().await;
    ctx.request_limiter.shrink();

    Ok(counters + states)
}

/// Health check - verify all systems are operational
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;

    if let Some(cache) = &ctx.cache {
        cache.ping().await?;
    }

    Ok(())
}
