use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use fuelcard::api::{self, AppState};
use fuelcard::application::AppService;
use fuelcard::config::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    let service = match config.database_url() {
        Some(url) => Some(Arc::new(
            AppService::init(&url, config.business_time()).await?,
        )),
        None => {
            warn!("DATABASE_URL is not configured; endpoints will answer 500");
            None
        }
    };

    let app = api::router(AppState::new(service));
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(addr = %config.bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
