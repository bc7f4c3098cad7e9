use crate::{context::AppContext, metrics};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::token_refresh_job(Arc::clone(&self)));
        tokio::spawn(Self::expired_state_cleanup_job(Arc::clone(&self)));

        // Spawn monitoring tasks
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Refresh tokens close to expiry (runs every 30 minutes)
    async fn token_refresh_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(1800)); // Every 30 minutes

        loop {
            interval.tick().await;
            info!("Running token refresh sweep");
            let start = Instant::now();

            match tasks::refresh_expiring_tokens(&scheduler.context).await {
                Ok(summary) => {
                    if summary.attempted > 0 {
                        info!(
                            "Refreshed {} of {} expiring connections",
                            summary.refreshed, summary.attempted
                        );
                    }
                    metrics::record_background_job(
                        "token_refresh",
                        "success",
                        start.elapsed().as_secs_f64(),
                    );
                }
                Err(e) => {
                    error!("Token refresh sweep failed: {}", e);
                    metrics::record_background_job(
                        "token_refresh",
                        "failure",
                        start.elapsed().as_secs_f64(),
                    );
                }
            }
        }
    }

    /// Purge expired counters and OAuth states (runs every 5 minutes)
    async fn expired_state_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300)); // Every 5 minutes

        loop {
            interval.tick().await;
            let start = Instant::now();

            match tasks::purge_expired_state(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Purged {} expired counters and OAuth states", count);
                    }
                    metrics::record_background_job(
                        "state_cleanup",
                        "success",
                        start.elapsed().as_secs_f64(),
                    );
                }
                Err(e) => {
                    error!("Failed to purge expired state: {}", e);
                    metrics::record_background_job(
                        "state_cleanup",
                        "failure",
                        start.elapsed().as_secs_f64(),
                    );
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300)); // Every 5 minutes

        loop {
            interval.tick().await;

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => {
                    // Silent success - health is good
                }
                Err(e) => error!("Health check failed: {}", e),
            }
        }
    }
}
