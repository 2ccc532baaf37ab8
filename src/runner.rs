use std::sync::Arc;
use tracing::info;

use crate::browser::ChromeDriver;
use crate::config::{AppConfig, SiteConfig, TargetSource};
use crate::db::{self, PgResultStore};
use crate::debug_capture::DebugCapturer;
use crate::error::ScrapeError;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::scheduler::{BatchScheduler, RunReport};
use crate::site::ConfiguredSite;
use crate::worker::Pipeline;

/// One end-to-end run: open the store, load names, drive the browser
/// through every pending target, close the store.
pub async fn run_once(config: &AppConfig) -> Result<RunReport, ScrapeError> {
    let site_config = Arc::new(config.site.clone());
    info!(site = %site_config.name, url = %site_config.target_url, "starting run");

    let pool = db::connect(&config.database_url).await?;
    db::init_db(&pool).await?;
    let store = PgResultStore::new(pool);

    let outcome = drive(config, site_config, &store).await;

    store.pool().close().await;
    info!("database disconnected");
    outcome
}

async fn drive(
    config: &AppConfig,
    site_config: Arc<SiteConfig>,
    store: &PgResultStore,
) -> Result<RunReport, ScrapeError> {
    let targets = match &config.targets {
        TargetSource::File(path) => db::load_targets_from_file(path).await?,
        TargetSource::Table => db::load_targets_from_table(store.pool()).await?,
    };
    info!(count = targets.len(), "loaded targets");

    let capturer = if site_config.capture_debug {
        DebugCapturer::new(site_config.debug_path.clone())
    } else {
        info!("debug capture disabled");
        DebugCapturer::disabled()
    };

    let driver = Arc::new(ChromeDriver::launch(config.headless)?);
    let pipeline = Pipeline::new(
        driver,
        Arc::new(ConfiguredSite::new(site_config.clone())),
        capturer,
        RetryPolicy::new(site_config.retry_count, site_config.retry_cooldown()),
    );
    let mut pacer = RateLimiter::from_millis(site_config.pacing_min_ms, site_config.pacing_max_ms);

    let report = BatchScheduler::new(site_config.batch_size)
        .run(&targets, store, &pipeline, &mut pacer)
        .await;
    drop(pipeline);
    info!("browser closed");
    report
}
