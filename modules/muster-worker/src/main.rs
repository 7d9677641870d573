//! The worker pool process: spec §4.7/§4.9/§4.10 tied together. Owns the
//! Scraper Runtime, the Matcher and the Dispatcher; the Job API is a
//! separate binary that only enqueues work for this one to drain.
//!
//! Grounded on `rootsignal-scout-supervisor/src/main.rs`'s shape (load
//! config, connect, run); the multi-task spawn-and-join-on-shutdown pattern
//! is this workspace's own, built from the `watch::Receiver<bool>` shutdown
//! signal already threaded through `QueueBroker::dequeue`,
//! `BrowserPool::checkout` and `Dispatcher::run`.

use std::sync::Arc;

use anyhow::Result;
use browserless_client::BrowserlessClient;
use muster_browser::BrowserPool;
use muster_common::Config;
use muster_dispatcher::{Dispatcher, DispatcherConfig};
use muster_logbus::PgLogBus;
use muster_matcher::Matcher;
use muster_queue::{QueueName, RedisQueueBroker};
use muster_scraper::{ModuleRegistry, ScraperRuntime};
use muster_store::PgStore;
use muster_worker::{run_match_worker, run_scrape_like_worker};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("muster=info".parse()?))
        .init();

    info!("muster worker pool starting");

    let config = Config::from_env();
    config.log_redacted();

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;
    let store: Arc<dyn muster_store::Store> = Arc::new(store);

    let log_bus = PgLogBus::connect(&config.database_url).await?;
    log_bus.migrate().await?;
    let log_bus: Arc<dyn muster_logbus::LogBus> = Arc::new(log_bus);

    let queue = RedisQueueBroker::connect(&config.redis_url).await?;
    let queue: Arc<dyn muster_queue::QueueBroker> = Arc::new(queue);

    let browserless = BrowserlessClient::new(&config.browserless_url, config.browserless_token.as_deref());
    let browser_pool = Arc::new(BrowserPool::with_size(browserless, config.browser_pool_size));

    // Concrete scraper modules are out of scope here (spec §1: "per-source
    // scraping logic inside individual modules"); a real deployment
    // registers its modules before this point.
    let registry = Arc::new(ModuleRegistry::new());

    let runtime = Arc::new(ScraperRuntime::new(
        store.clone(),
        queue.clone(),
        log_bus.clone(),
        browser_pool,
        registry,
    ));
    let matcher = Arc::new(Matcher::new(store.clone()));
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), queue.clone(), DispatcherConfig::from_config(&config)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = tokio::task::JoinSet::new();

    for _ in 0..config.scrape_concurrency {
        let runtime = runtime.clone();
        let queue = queue.clone();
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move { run_scrape_like_worker(QueueName::Scrape, runtime, queue, shutdown_rx).await });
    }

    for _ in 0..config.instagram_concurrency {
        let runtime = runtime.clone();
        let queue = queue.clone();
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move { run_scrape_like_worker(QueueName::Instagram, runtime, queue, shutdown_rx).await });
    }

    for _ in 0..config.match_concurrency {
        let matcher = matcher.clone();
        let queue = queue.clone();
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move { run_match_worker(matcher, queue, shutdown_rx).await });
    }

    {
        let shutdown_rx = shutdown_rx.clone();
        tasks.spawn(async move { dispatcher.run(shutdown_rx).await });
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining in-flight jobs");
    shutdown_tx.send(true).ok();

    while tasks.join_next().await.is_some() {}

    info!("muster worker pool stopped");
    Ok(())
}
