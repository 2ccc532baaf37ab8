mod api;
mod browser;
mod config;
mod db;
mod debug_capture;
mod error;
mod extractor;
mod matcher;
mod models;
mod rate_limit;
mod retry;
mod runner;
mod scheduler;
mod site;
mod strategy;
#[cfg(test)]
mod testing;
mod worker;

use axum::{
    routing::{get, post},
    Router,
};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "startup aborted");
            return Err(e.into());
        }
    };
    info!(
        site = %config.site.name,
        batch_size = config.site.batch_size,
        retry_count = config.site.retry_count,
        debug_path = %config.site.debug_path.display(),
        "configuration loaded"
    );

    if std::env::args().any(|arg| arg == "--serve") {
        serve(config).await
    } else {
        runner::run_once(&config).await?;
        Ok(())
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let port = config.port;
    let state = Arc::new(api::AppState::new(config));

    let app = Router::new()
        .route("/scrape", post(api::trigger_scrape))
        .route("/scrape/status", get(api::scrape_status))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
