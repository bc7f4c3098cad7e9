/// Linkshelf - link-in-bio storefront backend
use linkshelf::{config::ServerConfig, context::AppContext, error::AppResult, jobs, server};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration first so the log format can follow it
    let config = ServerConfig::from_env()?;

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "linkshelf=debug,tower_http=debug".into());
    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    print_banner();

    // Create application context
    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    __    _       __        __         ________
   / /   (_)___  / /_______/ /_  ___  / / __/
  / /   / / __ \/ //_/ ___/ __ \/ _ \/ / /_
 / /___/ / / / / ,< (__  ) / / /  __/ / __/
/_____/_/_/ /_/_/|_/____/_/ /_/\___/_/_/

        Link-in-bio storefront backend v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
