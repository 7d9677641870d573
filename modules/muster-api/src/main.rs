use std::sync::Arc;

use anyhow::Result;
use muster_api::{build_router, AppState};
use muster_common::Config;
use muster_logbus::PgLogBus;
use muster_queue::RedisQueueBroker;
use muster_store::{PgStore, Store};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("muster=info".parse()?))
        .init();

    let config = Config::from_env();
    config.log_redacted();

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let log_bus = PgLogBus::connect(&config.database_url).await?;
    log_bus.migrate().await?;

    let queue = RedisQueueBroker::connect(&config.redis_url).await?;

    let state = Arc::new(AppState {
        store: Arc::new(store),
        queue: Arc::new(queue),
        log_bus: Arc::new(log_bus),
        config: config.clone(),
    });

    let app = build_router(state);

    info!("job api starting on {}", config.job_api_bind);
    let listener = tokio::net::TcpListener::bind(&config.job_api_bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
