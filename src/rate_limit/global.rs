/// Per-IP request rate limiting middleware
use crate::{
    analytics::utils::extract_client_ip,
    config::RateLimitConfig,
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

fn nonzero(value: u32, fallback: u32) -> NonZeroU32 {
    NonZeroU32::new(value)
        .or_else(|| NonZeroU32::new(fallback))
        .unwrap_or(NonZeroU32::MIN)
}

/// Keyed token-bucket limiter with separate quotas for authenticated and
/// anonymous callers
#[derive(Clone)]
pub struct RequestRateLimiter {
    authenticated: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    unauthenticated: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl RequestRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let auth_quota = Quota::per_second(nonzero(config.authenticated_rps, 50))
            .allow_burst(nonzero(config.burst_size, 50));

        let unauth_quota = Quota::per_second(nonzero(config.unauthenticated_rps, 10))
            .allow_burst(nonzero(config.burst_size / 5, 10));

        Self {
            authenticated: Arc::new(GovernorLimiter::keyed(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::keyed(unauth_quota)),
        }
    }

    /// Check rate limit for an authenticated caller
    pub fn check_authenticated(&self, ip: IpAddr) -> AppResult<()> {
        self.authenticated
            .check_key(&ip)
            .map_err(|_| AppError::RateLimitExceeded {
                retry_after: Duration::from_secs(1),
            })
    }

    /// Check rate limit for an anonymous caller
    pub fn check_unauthenticated(&self, ip: IpAddr) -> AppResult<()> {
        self.unauthenticated
            .check_key(&ip)
            .map_err(|_| AppError::RateLimitExceeded {
                retry_after: Duration::from_secs(1),
            })
    }

    /// Forget idle keys
    pub fn shrink(&self) {
        self.authenticated.retain_recent();
        self.unauthenticated.retain_recent();
        self.authenticated.shrink_to_fit();
        self.unauthenticated.shrink_to_fit();
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Response {
    if !ctx.config.rate_limit.enabled {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = extract_client_ip(request.headers(), peer)
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let has_auth_header = request.headers().get("authorization").is_some();

    let result = if has_auth_header {
        ctx.request_limiter.check_authenticated(ip)
    } else {
        ctx.request_limiter.check_unauthenticated(ip)
    };

    match result {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::debug!(%ip, "Request rate limit exceeded");
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_limit_per_ip() {
        let limiter = RequestRateLimiter::new(&RateLimitConfig {
            enabled: true,
            authenticated_rps: 10,
            unauthenticated_rps: 5,
            burst_size: 5,
        });
        let a: IpAddr = "198.51.100.1".parse().unwrap();
        let b: IpAddr = "198.51.100.2".parse().unwrap();

        for _ in 0..5 {
            assert!(limiter.check_authenticated(a).is_ok());
        }
        assert!(limiter.check_authenticated(a).is_err());

        // Another client has its own bucket
        assert!(limiter.check_authenticated(b).is_ok());
    }

    #[test]
    fn test_zero_config_falls_back_to_defaults() {
        let limiter = RequestRateLimiter::new(&RateLimitConfig {
            enabled: true,
            authenticated_rps: 0,
            unauthenticated_rps: 0,
            burst_size: 0,
        });
        let ip: IpAddr = "192.0.2.10".parse().unwrap();
        assert!(limiter.check_unauthenticated(ip).is_ok());
    }
}
