/// Builds the connector matching a stored connection
use super::{
    ConnectorSession, FacebookConnector, InstagramConnector, LinkedInConnector, PinterestConnector,
    Platform, SocialConnector, TikTokConnector, YouTubeConnector,
};
use crate::{
    config::ServerConfig,
    connections::ConnectionStore,
    crypto::TokenCodec,
    db::models::SocialConnection,
    error::{AppError, AppResult},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct ConnectorFactory {
    http: reqwest::Client,
    store: ConnectionStore,
    codec: Arc<TokenCodec>,
    config: Arc<ServerConfig>,
}

impl ConnectorFactory {
    pub fn new(
        http: reqwest::Client,
        store: ConnectionStore,
        codec: Arc<TokenCodec>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            http,
            store,
            codec,
            config,
        }
    }

    /// Connector for the platform recorded on `connection`
    pub fn create(&self, connection: SocialConnection) -> AppResult<Box<dyn SocialConnector>> {
        let platform: Platform = connection.platform.parse()?;
        self.build(platform, connection)
    }

    /// Connector for a platform given by name.
    ///
    /// The name must agree with the connection's own platform.
    pub fn create_for_platform(
        &self,
        name: &str,
        connection: SocialConnection,
    ) -> AppResult<Box<dyn SocialConnector>> {
        let platform: Platform = name.parse()?;
        if !connection.platform.eq_ignore_ascii_case(platform.as_str()) {
            return Err(AppError::Validation(format!(
                "Connection belongs to {}, not {}",
                connection.platform, platform
            )));
        }
        self.build(platform, connection)
    }

    fn build(
        &self,
        platform: Platform,
        connection: SocialConnection,
    ) -> AppResult<Box<dyn SocialConnector>> {
        let app = self.config.platform(platform)?.clone();
        let session = ConnectorSession::new(
            self.http.clone(),
            self.store.clone(),
            self.codec.clone(),
            platform,
            app,
            connection,
        );

        Ok(match platform {
            Platform::Facebook => Box::new(FacebookConnector::new(session)),
            Platform::Instagram => Box::new(InstagramConnector::new(session)),
            Platform::LinkedIn => Box::new(LinkedInConnector::new(session)),
            Platform::YouTube => Box::new(YouTubeConnector::new(session)),
            Platform::TikTok => Box::new(TikTokConnector::new(session)),
            Platform::Pinterest => Box::new(PinterestConnector::new(session)),
        })
    }
}
