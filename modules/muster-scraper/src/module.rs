//! The plugin contract scraper modules implement. Spec §4.6: per-source
//! scraping logic itself is out of scope — this crate owns the registry,
//! runtime and the contract a module is held to, not the scraping
//! heuristics for any particular site.
//!
//! Grounded on `rootsignal-scout/src/pipeline/traits.rs`'s
//! `ContentFetcher`/`SignalStore` split: collaborators behind a trait so the
//! runtime can be exercised with a fake module and no network.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use muster_browser::PooledPage;
use muster_browser::RateLimiter;
use muster_common::types::{PaginationType, Source};
use muster_common::RunId;
use muster_logbus::LogBus;
use muster_store::Store;

/// Static, discoverable metadata about a module. The Module Registry reads
/// this at startup; it never changes at runtime.
#[derive(Debug, Clone)]
pub struct ModuleMetadata {
    pub key: String,
    pub label: String,
    pub start_urls: Vec<String>,
    pub pagination_type: PaginationType,
    pub integration_tags: Vec<String>,
}

/// Everything a module needs to produce raw events, per job.
#[derive(Debug, Clone, Default)]
pub struct JobData {
    pub test_mode: bool,
    pub date_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Present for poster-import jobs: the uploaded file's bytes plus a
    /// caller-supplied content type. Vision/LLM extraction of this content
    /// is out of scope here — a module receiving this is expected to call
    /// out to an external extractor and treat its JSON response as input.
    pub uploaded_content: Option<UploadedContent>,
}

#[derive(Debug, Clone)]
pub struct UploadedContent {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Running totals a module reports back through its `RunContext`.
#[derive(Debug, Default)]
pub struct RunStats {
    pages_crawled: AtomicU64,
}

impl RunStats {
    pub fn record_page(&self) {
        self.pages_crawled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages_crawled(&self) -> u64 {
        self.pages_crawled.load(Ordering::Relaxed)
    }
}

/// A module-facing logger. Mirrors to process-local `tracing` and appends
/// to the Log Bus, per spec §4.3's "mirrors to process-local logging and
/// appends here." Every append also refreshes the run's heartbeat — per
/// spec §4.10(b), the Dispatcher's heartbeat reconciliation considers a run
/// stalled based on its last log activity, so a long-running but healthy
/// module (still logging) must keep pushing that deadline out.
pub struct RunLogger {
    run_id: RunId,
    source: String,
    log_bus: Arc<dyn LogBus>,
    store: Arc<dyn Store>,
}

impl RunLogger {
    pub fn new(run_id: RunId, source: impl Into<String>, log_bus: Arc<dyn LogBus>, store: Arc<dyn Store>) -> Self {
        Self { run_id, source: source.into(), log_bus, store }
    }

    pub async fn info(&self, msg: impl Into<String>) {
        self.log(muster_logbus::LogLevel::Info, msg, serde_json::json!({})).await;
    }

    pub async fn warn(&self, msg: impl Into<String>) {
        self.log(muster_logbus::LogLevel::Warn, msg, serde_json::json!({})).await;
    }

    pub async fn error(&self, msg: impl Into<String>) {
        self.log(muster_logbus::LogLevel::Error, msg, serde_json::json!({})).await;
    }

    pub async fn log(&self, level: muster_logbus::LogLevel, msg: impl Into<String>, fields: serde_json::Value) {
        let msg = msg.into();
        match level {
            muster_logbus::LogLevel::Error | muster_logbus::LogLevel::Fatal => {
                tracing::error!(run_id = %self.run_id, source = %self.source, "{msg}")
            }
            muster_logbus::LogLevel::Warn => {
                tracing::warn!(run_id = %self.run_id, source = %self.source, "{msg}")
            }
            muster_logbus::LogLevel::Debug | muster_logbus::LogLevel::Trace => {
                tracing::debug!(run_id = %self.run_id, source = %self.source, "{msg}")
            }
            muster_logbus::LogLevel::Info => {
                tracing::info!(run_id = %self.run_id, source = %self.source, "{msg}")
            }
        }

        let entry = muster_logbus::AppendEntry {
            run_id: self.run_id,
            level,
            source: self.source.clone(),
            msg,
            fields,
        };
        if let Err(e) = self.log_bus.append(entry).await {
            tracing::warn!(run_id = %self.run_id, error = %e, "failed to append to log bus (non-fatal)");
        }

        if let Err(e) = self.store.touch_run_heartbeat(self.run_id).await {
            tracing::warn!(run_id = %self.run_id, error = %e, "failed to refresh run heartbeat (non-fatal)");
        }
    }
}

/// Everything `ScraperModule::run` needs, built fresh per job by the
/// Scraper Runtime.
pub struct RunContext {
    pub page: PooledPage,
    pub source_id: muster_common::SourceId,
    pub run_id: RunId,
    pub source: Source,
    pub logger: RunLogger,
    pub job_data: JobData,
    pub stats: Arc<RunStats>,
    pub rate_limiter: Arc<RateLimiter>,
    shutdown: tokio::sync::watch::Receiver<bool>,
}

impl RunContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        page: PooledPage,
        source: Source,
        run_id: RunId,
        logger: RunLogger,
        job_data: JobData,
        rate_limiter: Arc<RateLimiter>,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Self {
        Self {
            page,
            source_id: source.id,
            run_id,
            source,
            logger,
            job_data,
            stats: Arc::new(RunStats::default()),
            rate_limiter,
            shutdown,
        }
    }

    /// Modules call this (or an equivalent delay helper) before each
    /// outbound fetch, per spec §4.7 step 4.
    pub async fn throttle(&mut self) -> Result<(), muster_browser::BrowserPoolError> {
        self.rate_limiter.acquire(&mut self.shutdown).await
    }

    pub fn record_page(&self) {
        self.stats.record_page();
    }
}

/// Raw event shape as produced by a module, before normalization. Spec
/// §4.6.
#[derive(Debug, Clone, Default)]
pub struct RawEvent {
    pub source_event_id: Option<String>,
    pub title: String,
    pub start: String,
    pub end: Option<String>,
    pub timezone: Option<String>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub organizer: Option<String>,
    pub category: Option<String>,
    pub price: Option<String>,
    pub tags: BTreeSet<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub description_html: Option<String>,
    pub raw: serde_json::Value,
}

/// The contract every scraper module implements. The runtime treats
/// `run`'s returned sequence as finite, non-restartable and fully
/// materialized — no incremental/streaming modules.
#[async_trait]
pub trait ScraperModule: Send + Sync {
    fn metadata(&self) -> &ModuleMetadata;

    async fn run(&self, ctx: &mut RunContext) -> anyhow::Result<Vec<RawEvent>>;
}
