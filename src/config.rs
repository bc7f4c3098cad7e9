/// Configuration management for Linkshelf
use crate::connectors::Platform;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub tracking: TrackingConfig,
    pub cache: CacheConfig,
    pub platforms: HashMap<Platform, OAuthApp>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub public_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Secrets used at runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Secret the OAuth token encryption key is derived from
    pub token_encryption_key: String,
    /// HS256 secret for verifying API access tokens
    pub jwt_secret: String,
}

/// Global request rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
    pub burst_size: u32,
}

/// Limits for public view/click tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Profile views allowed per (ip, profile) per window
    pub profile_view_limit: u64,
    /// Link or banner clicks allowed per (ip, target) per window
    pub click_limit: u64,
    pub window_secs: u64,
    /// Recorded events per (ip, profile owner) per record window
    pub record_limit: u64,
    pub record_window_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            profile_view_limit: 10,
            click_limit: 20,
            window_secs: 300,
            record_limit: 5,
            record_window_secs: 60,
        }
    }
}

/// Counter cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Use Redis for rate-limit counters (in-process map otherwise)
    pub enabled: bool,
    pub redis_url: String,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "linkshelf:".to_string(),
        }
    }
}

/// Provider endpoints for one platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformEndpoints {
    pub api_base: String,
    pub authorize_url: String,
    pub token_url: String,
    pub refresh_url: String,
}

/// OAuth application registered with a platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthApp {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub redirect_uri: String,
    pub endpoints: PlatformEndpoints,
}

impl OAuthApp {
    /// Load one platform's app credentials, falling back to the vendor endpoints
    pub fn from_env(platform: Platform, public_url: &str) -> Self {
        let prefix = format!("LINKSHELF_{}", platform.as_str().to_uppercase());
        let defaults = platform.default_endpoints();
        let var = |suffix: &str| env::var(format!("{}_{}", prefix, suffix)).ok();

        Self {
            client_id: var("CLIENT_ID").unwrap_or_default(),
            client_secret: var("CLIENT_SECRET").unwrap_or_default(),
            redirect_uri: var("REDIRECT_URI").unwrap_or_else(|| {
                format!("{}/connect/{}/callback", public_url, platform.as_str())
            }),
            endpoints: PlatformEndpoints {
                api_base: var("API_BASE").unwrap_or(defaults.api_base),
                authorize_url: var("AUTHORIZE_URL").unwrap_or(defaults.authorize_url),
                token_url: var("TOKEN_URL").unwrap_or(defaults.token_url),
                refresh_url: var("REFRESH_URL").unwrap_or(defaults.refresh_url),
            },
        }
    }

    /// Whether client credentials were supplied
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("LINKSHELF_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("LINKSHELF_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("LINKSHELF_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let data_directory: PathBuf = env::var("LINKSHELF_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("LINKSHELF_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("linkshelf.sqlite"));

        let token_encryption_key = env::var("LINKSHELF_TOKEN_ENCRYPTION_KEY").map_err(|_| {
            AppError::Validation("Token encryption key required".to_string())
        })?;
        let jwt_secret = env::var("LINKSHELF_JWT_SECRET")
            .map_err(|_| AppError::Validation("JWT secret required".to_string()))?;

        let rate_limit = RateLimitConfig {
            enabled: env_or("LINKSHELF_RATE_LIMITS_ENABLED", true),
            authenticated_rps: env_or("LINKSHELF_RATE_LIMIT_AUTHENTICATED_RPS", 50),
            unauthenticated_rps: env_or("LINKSHELF_RATE_LIMIT_UNAUTHENTICATED_RPS", 10),
            burst_size: env_or("LINKSHELF_RATE_LIMIT_BURST", 50),
        };

        let defaults = TrackingConfig::default();
        let tracking = TrackingConfig {
            profile_view_limit: env_or("LINKSHELF_PROFILE_VIEW_LIMIT", defaults.profile_view_limit),
            click_limit: env_or("LINKSHELF_CLICK_LIMIT", defaults.click_limit),
            window_secs: env_or("LINKSHELF_TRACKING_WINDOW_SECS", defaults.window_secs),
            record_limit: env_or("LINKSHELF_RECORD_LIMIT", defaults.record_limit),
            record_window_secs: env_or("LINKSHELF_RECORD_WINDOW_SECS", defaults.record_window_secs),
        };

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig {
            enabled: env_or("LINKSHELF_CACHE_ENABLED", false),
            redis_url: env::var("LINKSHELF_REDIS_URL").unwrap_or(cache_defaults.redis_url),
            key_prefix: env::var("LINKSHELF_CACHE_KEY_PREFIX").unwrap_or(cache_defaults.key_prefix),
        };

        let platforms = Platform::ALL
            .iter()
            .map(|p| (*p, OAuthApp::from_env(*p, &public_url)))
            .collect();

        let logging = LoggingConfig {
            level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            json: env::var("LINKSHELF_LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            security: SecurityConfig {
                token_encryption_key,
                jwt_secret,
            },
            rate_limit,
            tracking,
            cache,
            platforms,
            logging,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.security.token_encryption_key.len() < 32 {
            return Err(AppError::Validation(
                "Token encryption key must be at least 32 characters".to_string(),
            ));
        }

        if self.security.jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        Ok(())
    }

    /// App credentials for a platform
    pub fn platform(&self, platform: Platform) -> AppResult<&OAuthApp> {
        self.platforms.get(&platform).ok_or_else(|| {
            AppError::Validation(format!("Platform {} is not configured", platform))
        })
    }

    /// Config suitable for tests: in-memory friendly paths, fixed secrets, vendor endpoints
    pub fn for_tests() -> Self {
        let public_url = "http://localhost:8080".to_string();
        let platforms = Platform::ALL
            .iter()
            .map(|p| {
                (
                    *p,
                    OAuthApp {
                        client_id: format!("{}-client", p.as_str()),
                        client_secret: format!("{}-secret", p.as_str()),
                        redirect_uri: format!("{}/connect/{}/callback", public_url, p.as_str()),
                        endpoints: p.default_endpoints(),
                    },
                )
            })
            .collect();

        Self {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8080,
                public_url,
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                database: PathBuf::from("./data/linkshelf.sqlite"),
            },
            security: SecurityConfig {
                token_encryption_key: "test-token-encryption-key-0123456789abcdef".to_string(),
                jwt_secret: "test-jwt-secret-0123456789abcdef0123456789".to_string(),
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                authenticated_rps: 50,
                unauthenticated_rps: 10,
                burst_size: 50,
            },
            tracking: TrackingConfig::default(),
            cache: CacheConfig::default(),
            platforms,
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_short_secrets() {
        let mut config = ServerConfig::for_tests();
        assert!(config.validate().is_ok());

        config.security.token_encryption_key = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_test_config_has_every_platform() {
        let config = ServerConfig::for_tests();
        for platform in Platform::ALL {
            let app = config.platform(platform).unwrap();
            assert!(app.is_configured());
            assert!(app.redirect_uri.ends_with("/callback"));
        }
    }

    #[test]
    fn test_client_secret_not_serialized() {
        let config = ServerConfig::for_tests();
        let json = serde_json::to_string(&config.platforms[&Platform::Facebook]).unwrap();
        assert!(!json.contains("facebook-secret"));
    }
}
