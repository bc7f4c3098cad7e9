/// Public view and click tracking
///
/// Each attempt passes two fixed-window gates before anything is written:
/// an abuse limit per (visitor, target) that rejects the request, and a
/// recording limit per (visitor, profile owner) that silently skips it.
/// Recorded attempts append an event row and bump the denormalized counter.

use super::utils::{anonymize_addr, extract_client_ip, sanitize_referrer, truncate_user_agent};
use crate::{
    config::TrackingConfig,
    db::models::{Banner, CustomLink, Profile},
    metrics,
    rate_limit::FixedWindowLimiter,
};
use axum::http::{header, HeaderMap};
use chrono::Utc;
use sqlx::SqlitePool;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, warn};

/// Action name shared by every recording-gate check
const RECORD_ACTION: &str = "record";

/// What is being tracked
#[derive(Debug, Clone)]
pub enum TrackTarget {
    ProfileView(Profile),
    LinkClick(CustomLink),
    BannerClick(Banner),
}

impl TrackTarget {
    /// Label used for limiter actions and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            TrackTarget::ProfileView(_) => "profile_view",
            TrackTarget::LinkClick(_) => "link_click",
            TrackTarget::BannerClick(_) => "banner_click",
        }
    }

    pub fn target_id(&self) -> &str {
        match self {
            TrackTarget::ProfileView(p) => &p.id,
            TrackTarget::LinkClick(l) => &l.id,
            TrackTarget::BannerClick(b) => &b.id,
        }
    }

    /// User whose storefront the target belongs to
    pub fn owner_id(&self) -> &str {
        match self {
            TrackTarget::ProfileView(p) => &p.user_id,
            TrackTarget::LinkClick(l) => &l.user_id,
            TrackTarget::BannerClick(b) => &b.user_id,
        }
    }

    fn event_insert_sql(&self) -> &'static str {
        match self {
            TrackTarget::ProfileView(_) => {
                "INSERT INTO profile_view (profile_id, ip_address, user_agent, referrer, viewed_at) VALUES (?, ?, ?, ?, ?)"
            }
            TrackTarget::LinkClick(_) => {
                "INSERT INTO link_click (link_id, ip_address, user_agent, referrer, clicked_at) VALUES (?, ?, ?, ?, ?)"
            }
            TrackTarget::BannerClick(_) => {
                "INSERT INTO banner_click (banner_id, ip_address, user_agent, referrer, clicked_at) VALUES (?, ?, ?, ?, ?)"
            }
        }
    }

    fn counter_update_sql(&self) -> &'static str {
        match self {
            TrackTarget::ProfileView(_) => "UPDATE profile SET view_count = view_count + 1 WHERE id = ?",
            TrackTarget::LinkClick(_) => "UPDATE custom_link SET click_count = click_count + 1 WHERE id = ?",
            TrackTarget::BannerClick(_) => "UPDATE banner SET click_count = click_count + 1 WHERE id = ?",
        }
    }
}

/// Raw visitor data taken from the request
#[derive(Debug, Clone, Default)]
pub struct VisitorInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: String,
    pub referrer: Option<String>,
}

impl VisitorInfo {
    pub fn from_request(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let header_str = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            ip: extract_client_ip(headers, peer),
            user_agent: header_str(header::USER_AGENT).unwrap_or_default(),
            referrer: header_str(header::REFERER),
        }
    }

    fn key(&self) -> String {
        self.ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Result of one tracking attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Event row written and counter bumped
    Recorded,
    /// Event insert failed; only the counter update ran
    CounterOnly,
    /// Over the recording limit; nothing written
    Suppressed,
    /// Over the abuse limit; the caller gets a 429
    RateLimited { retry_after: Duration },
}

impl TrackOutcome {
    /// Whether the caller is told the attempt was tracked
    pub fn is_tracked(&self) -> bool {
        !matches!(self, TrackOutcome::RateLimited { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrackOutcome::Recorded => "recorded",
            TrackOutcome::CounterOnly => "counter_only",
            TrackOutcome::Suppressed => "suppressed",
            TrackOutcome::RateLimited { .. } => "rate_limited",
        }
    }
}

#[derive(Clone)]
pub struct AnalyticsTracker {
    db: SqlitePool,
    limiter: FixedWindowLimiter,
    limits: TrackingConfig,
}

impl AnalyticsTracker {
    pub fn new(db: SqlitePool, limiter: FixedWindowLimiter, limits: TrackingConfig) -> Self {
        Self {
            db,
            limiter,
            limits,
        }
    }

    /// Run one attempt through both gates and record it
    pub async fn track(&self, target: &TrackTarget, visitor: &VisitorInfo) -> TrackOutcome {
        let outcome = self.track_inner(target, visitor).await;
        metrics::record_tracking_event(target.kind(), outcome.label());
        outcome
    }

    async fn track_inner(&self, target: &TrackTarget, visitor: &VisitorInfo) -> TrackOutcome {
        let visitor_key = visitor.key();

        let limit = match target {
            TrackTarget::ProfileView(_) => self.limits.profile_view_limit,
            TrackTarget::LinkClick(_) | TrackTarget::BannerClick(_) => self.limits.click_limit,
        };
        let window = Duration::from_secs(self.limits.window_secs);
        let abuse_key = format!("{}:{}", visitor_key, target.target_id());

        if self
            .limiter
            .is_rate_limited(&abuse_key, target.kind(), limit, window)
            .await
        {
            debug!(kind = target.kind(), target_id = %target.target_id(), "Tracking rate limited");
            return TrackOutcome::RateLimited {
                retry_after: FixedWindowLimiter::window_remaining(window),
            };
        }

        let record_key = format!("{}:{}", visitor_key, target.owner_id());
        if self
            .limiter
            .is_rate_limited(
                &record_key,
                RECORD_ACTION,
                self.limits.record_limit,
                Duration::from_secs(self.limits.record_window_secs),
            )
            .await
        {
            debug!(kind = target.kind(), target_id = %target.target_id(), "Tracking suppressed");
            return TrackOutcome::Suppressed;
        }

        let event_written = self.insert_event(target, visitor).await;
        self.bump_counter(target).await;

        if event_written {
            TrackOutcome::Recorded
        } else {
            TrackOutcome::CounterOnly
        }
    }

    async fn insert_event(&self, target: &TrackTarget, visitor: &VisitorInfo) -> bool {
        let ip_address = visitor.ip.map(|ip| anonymize_addr(ip).to_string());
        let user_agent = truncate_user_agent(&visitor.user_agent);
        let referrer = visitor.referrer.as_deref().and_then(sanitize_referrer);

        let result = sqlx::query(target.event_insert_sql())
            .bind(target.target_id())
            .bind(ip_address)
            .bind(user_agent)
            .bind(referrer)
            .bind(Utc::now())
            .execute(&self.db)
            .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(kind = target.kind(), target_id = %target.target_id(), error = %e, "Failed to record tracking event");
                false
            }
        }
    }

    async fn bump_counter(&self, target: &TrackTarget) {
        if let Err(e) = sqlx::query(target.counter_update_sql())
            .bind(target.target_id())
            .execute(&self.db)
            .await
        {
            warn!(kind = target.kind(), target_id = %target.target_id(), error = %e, "Failed to increment counter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::create_memory_pool,
        rate_limit::MemoryCounterStore,
        storefront::{LinkManager, NewLink, ProfileInput, ProfileManager},
    };
    use std::sync::Arc;

    struct Fixture {
        db: SqlitePool,
        tracker: AnalyticsTracker,
        profile: Profile,
        link: CustomLink,
    }

    async fn fixture(limits: TrackingConfig) -> Fixture {
        let db = create_memory_pool().await.unwrap();
        let profile = ProfileManager::new(db.clone())
            .upsert_own(
                "owner",
                &ProfileInput {
                    username: "store".to_string(),
                    display_name: None,
                    bio: None,
                    is_public: true,
                },
            )
            .await
            .unwrap();
        let link = LinkManager::new(db.clone())
            .create(
                "owner",
                &NewLink {
                    title: "Shop".to_string(),
                    url: "https://shop.example.com".to_string(),
                },
            )
            .await
            .unwrap();

        let limiter = FixedWindowLimiter::new(Arc::new(MemoryCounterStore::new()));
        Fixture {
            tracker: AnalyticsTracker::new(db.clone(), limiter, limits),
            db,
            profile,
            link,
        }
    }

    fn visitor(ip: &str) -> VisitorInfo {
        VisitorInfo {
            ip: Some(ip.parse().unwrap()),
            user_agent: "Mozilla/5.0".to_string(),
            referrer: Some("https://ig.example/?utm=1&session_token=zzz".to_string()),
        }
    }

    async fn click_count(db: &SqlitePool, link_id: &str) -> i64 {
        sqlx::query_scalar("SELECT click_count FROM custom_link WHERE id = ?")
            .bind(link_id)
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_records_sanitized_event() {
        let f = fixture(TrackingConfig::default()).await;
        let target = TrackTarget::LinkClick(f.link.clone());

        let outcome = f.tracker.track(&target, &visitor("203.0.113.77")).await;
        assert_eq!(outcome, TrackOutcome::Recorded);
        assert_eq!(click_count(&f.db, &f.link.id).await, 1);

        let (ip, referrer): (Option<String>, Option<String>) =
            sqlx::query_as("SELECT ip_address, referrer FROM link_click WHERE link_id = ?")
                .bind(&f.link.id)
                .fetch_one(&f.db)
                .await
                .unwrap();
        assert_eq!(ip.as_deref(), Some("203.0.113.0"));
        assert_eq!(referrer.as_deref(), Some("https://ig.example/?utm=1"));
    }

    #[tokio::test]
    async fn test_profile_view_abuse_limit() {
        let limits = TrackingConfig {
            record_limit: 100,
            ..TrackingConfig::default()
        };
        let f = fixture(limits).await;
        let target = TrackTarget::ProfileView(f.profile.clone());
        let v = visitor("198.51.100.1");

        for _ in 0..10 {
            assert!(f.tracker.track(&target, &v).await.is_tracked());
        }
        let outcome = f.tracker.track(&target, &v).await;
        assert!(matches!(outcome, TrackOutcome::RateLimited { .. }));
        assert!(!outcome.is_tracked());

        let views: i64 = sqlx::query_scalar("SELECT view_count FROM profile WHERE id = ?")
            .bind(&f.profile.id)
            .fetch_one(&f.db)
            .await
            .unwrap();
        assert_eq!(views, 10);

        // A different visitor is not affected
        assert!(f.tracker.track(&target, &visitor("198.51.100.2")).await.is_tracked());
    }

    #[tokio::test]
    async fn test_record_limit_suppresses_silently() {
        let f = fixture(TrackingConfig::default()).await;
        let target = TrackTarget::LinkClick(f.link.clone());
        let v = visitor("192.0.2.5");

        for _ in 0..5 {
            assert_eq!(f.tracker.track(&target, &v).await, TrackOutcome::Recorded);
        }
        let outcome = f.tracker.track(&target, &v).await;
        assert_eq!(outcome, TrackOutcome::Suppressed);
        assert!(outcome.is_tracked());
        assert_eq!(click_count(&f.db, &f.link.id).await, 5);
    }

    #[tokio::test]
    async fn test_failed_insert_still_counts() {
        let f = fixture(TrackingConfig::default()).await;
        sqlx::query("DROP TABLE link_click").execute(&f.db).await.unwrap();

        let outcome = f
            .tracker
            .track(&TrackTarget::LinkClick(f.link.clone()), &visitor("192.0.2.9"))
            .await;

        assert_eq!(outcome, TrackOutcome::CounterOnly);
        assert!(outcome.is_tracked());
        assert_eq!(click_count(&f.db, &f.link.id).await, 1);
    }

    #[tokio::test]
    async fn test_missing_ip_uses_shared_bucket() {
        let limits = TrackingConfig {
            click_limit: 2,
            ..TrackingConfig::default()
        };
        let f = fixture(limits).await;
        let target = TrackTarget::LinkClick(f.link.clone());
        let anonymous = VisitorInfo::default();

        assert_eq!(f.tracker.track(&target, &anonymous).await, TrackOutcome::Recorded);
        assert_eq!(f.tracker.track(&target, &anonymous).await, TrackOutcome::Recorded);
        assert!(matches!(
            f.tracker.track(&target, &anonymous).await,
            TrackOutcome::RateLimited { .. }
        ));

        let ip: Option<String> = sqlx::query_scalar("SELECT ip_address FROM link_click LIMIT 1")
            .fetch_one(&f.db)
            .await
            .unwrap();
        assert!(ip.is_none());
    }

    #[test]
    fn test_visitor_from_request() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.1, 10.0.0.1".parse().unwrap());
        headers.insert(header::USER_AGENT, "curl/8".parse().unwrap());
        headers.insert(header::REFERER, "https://t.co/x".parse().unwrap());

        let v = VisitorInfo::from_request(&headers, None);
        assert_eq!(v.ip, Some("203.0.113.1".parse().unwrap()));
        assert_eq!(v.user_agent, "curl/8");
        assert_eq!(v.referrer.as_deref(), Some("https://t.co/x"));
    }
}
