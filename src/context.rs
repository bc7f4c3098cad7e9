/// Application context and dependency injection
use crate::{
    analytics::AnalyticsTracker,
    cache::CacheClient,
    config::ServerConfig,
    connections::ConnectionStore,
    connectors::ConnectorFactory,
    crypto::TokenCodec,
    db,
    error::{AppError, AppResult},
    oauth::OAuthStateStore,
    rate_limit::{
        CounterStore, FixedWindowLimiter, MemoryCounterStore, RedisCounterStore,
        RequestRateLimiter,
    },
    storefront::{BannerManager, LinkManager, ProfileManager},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timeout applied to every platform API call
const PLATFORM_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub http: reqwest::Client,
    pub codec: Arc<TokenCodec>,
    // Social connections
    pub connections: ConnectionStore,
    pub connectors: ConnectorFactory,
    pub oauth_states: OAuthStateStore,
    // Storefront
    pub profiles: ProfileManager,
    pub links: LinkManager,
    pub banners: BannerManager,
    // Tracking and rate limiting
    pub tracker: AnalyticsTracker,
    pub counter_limiter: FixedWindowLimiter,
    pub request_limiter: RequestRateLimiter,
    pub cache: Option<CacheClient>,
    pub started_at: Instant,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        // Initialize database
        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        // Redis is optional; counters fall back to process memory
        let cache = if config.cache.enabled {
            Some(CacheClient::new(&config.cache).await?)
        } else {
            tracing::info!("Cache disabled - using in-process rate limit counters");
            None
        };

        Self::assemble(config, db, cache)
    }

    /// Context over an existing pool with in-process counters
    pub fn with_pool(config: ServerConfig, db: SqlitePool) -> AppResult<Self> {
        Self::assemble(config, db, None)
    }

    fn assemble(config: ServerConfig, db: SqlitePool, cache: Option<CacheClient>) -> AppResult<Self> {
        let config = Arc::new(config);

        // Key material is derived once and shared
        let codec = Arc::new(TokenCodec::new(&config.security.token_encryption_key)?);

        let http = reqwest::Client::builder()
            .timeout(PLATFORM_HTTP_TIMEOUT)
            .user_agent(concat!("linkshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let counter_store: Arc<dyn CounterStore> = match &cache {
            Some(client) => Arc::new(RedisCounterStore::new(client.clone())),
            None => Arc::new(MemoryCounterStore::new()),
        };
        let counter_limiter = FixedWindowLimiter::new(counter_store);

        let connections = ConnectionStore::new(db.clone());
        let connectors =
            ConnectorFactory::new(http.clone(), connections.clone(), codec.clone(), config.clone());
        let tracker =
            AnalyticsTracker::new(db.clone(), counter_limiter.clone(), config.tracking.clone());

        Ok(Self {
            request_limiter: RequestRateLimiter::new(&config.rate_limit),
            profiles: ProfileManager::new(db.clone()),
            links: LinkManager::new(db.clone()),
            banners: BannerManager::new(db.clone()),
            oauth_states: OAuthStateStore::new(),
            config,
            db,
            http,
            codec,
            connections,
            connectors,
            tracker,
            counter_limiter,
            cache,
            started_at: Instant::now(),
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> AppResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                AppError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }
}
