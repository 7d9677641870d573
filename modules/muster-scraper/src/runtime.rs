//! Orchestrates one scrape job end-to-end. Spec §4.7.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use muster_browser::{BrowserPool, RateLimiter};
use muster_common::types::{RunPatch, RunStatus, Source};
use muster_common::{JobId, PipelineError, RunId, SourceId};
use muster_logbus::LogBus;
use muster_queue::{EnqueueOptions, QueueBroker, QueueName};
use muster_store::Store;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn, Instrument};

use crate::module::{JobData, RunContext, RunLogger};
use crate::normalizer::normalize;
use crate::registry::ModuleRegistry;

/// Match jobs re-queued after a scrape look back this far, per spec §4.7
/// step 9.
const MATCH_LOOKBACK_DAYS: i64 = 30;
const MATCH_JOB_DELAY_SECONDS: i64 = 5;

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    pub events_found: i64,
    pub pages_crawled: i64,
}

pub struct ScraperRuntime {
    store: Arc<dyn Store>,
    queue: Arc<dyn QueueBroker>,
    log_bus: Arc<dyn LogBus>,
    browser_pool: Arc<BrowserPool>,
    registry: Arc<ModuleRegistry>,
    rate_limiters: Mutex<HashMap<SourceId, Arc<RateLimiter>>>,
}

impl ScraperRuntime {
    pub fn new(
        store: Arc<dyn Store>,
        queue: Arc<dyn QueueBroker>,
        log_bus: Arc<dyn LogBus>,
        browser_pool: Arc<BrowserPool>,
        registry: Arc<ModuleRegistry>,
    ) -> Self {
        Self { store, queue, log_bus, browser_pool, registry, rate_limiters: Mutex::new(HashMap::new()) }
    }

    async fn rate_limiter_for(&self, source: &Source) -> Arc<RateLimiter> {
        let mut limiters = self.rate_limiters.lock().await;
        limiters
            .entry(source.id)
            .or_insert_with(|| Arc::new(RateLimiter::new(source.rate_limit_per_min)))
            .clone()
    }

    /// Runs one scrape job against an already-created `run_id` (the Job API
    /// and the Dispatcher both create the `Run` row at enqueue time so a
    /// `RunId` can be handed back to the caller synchronously; see spec
    /// §4.11's `SubmitScrape(...) → RunId`). Never panics; every failure
    /// path finalizes the run and returns `Ok` with the resulting status —
    /// only a Store/infrastructure error surfaces as `Err`.
    ///
    /// Opens the `scrape_job` span for the duration of the run, carrying
    /// `job_id`/`run_id`/`source_id` so a single `grep` of JSON logs
    /// reconstructs one run.
    pub async fn run_scrape_job(
        &self,
        job_id: JobId,
        run_id: RunId,
        source_id: SourceId,
        job_data: JobData,
        shutdown: watch::Receiver<bool>,
    ) -> Result<RunOutcome, PipelineError> {
        let span = tracing::info_span!("scrape_job", %job_id, %run_id, %source_id);
        self.run_scrape_job_inner(run_id, source_id, job_data, shutdown).instrument(span).await
    }

    async fn run_scrape_job_inner(
        &self,
        run_id: RunId,
        source_id: SourceId,
        job_data: JobData,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunOutcome, PipelineError> {
        // Step 1: read Source.
        let source = match self.store.get_source(source_id).await? {
            Some(s) if s.active => s,
            _ => return self.finalize_failed(run_id, 0, PipelineError::SourceInactive).await,
        };

        // Step 2: resolve module.
        let module = match self.registry.get(&source.module_key) {
            Ok(m) => m,
            Err(e) => return self.finalize_failed(run_id, 0, e).await,
        };

        // Step 3: transition to running.
        self.store
            .update_run(run_id, RunPatch { status: Some(RunStatus::Running), ..Default::default() })
            .await?;

        // Step 4: check out a page, build RunContext.
        let page = match self.browser_pool.checkout(&mut shutdown).await {
            Ok(p) => p,
            Err(_) => return self.finalize_failed(run_id, 0, PipelineError::Cancelled).await,
        };

        let rate_limiter = self.rate_limiter_for(&source).await;
        let logger = RunLogger::new(run_id, source.name.clone(), self.log_bus.clone(), self.store.clone());
        let mut ctx = RunContext::new(page, source.clone(), run_id, logger, job_data, rate_limiter, shutdown.clone());

        if ctx.throttle().await.is_err() {
            return self.finalize_failed(run_id, 0, PipelineError::Cancelled).await;
        }

        // Step 5: invoke the module.
        let raw_events = match module.run(&mut ctx).await {
            Ok(events) => events,
            Err(e) => {
                let pages_crawled = ctx.stats.pages_crawled() as i64;
                ctx.logger.error(format!("module failed: {e}")).await;
                return self.finalize_failed(run_id, pages_crawled, PipelineError::ModuleFailure(e.to_string())).await;
            }
        };
        let pages_crawled = ctx.stats.pages_crawled() as i64;

        // Step 6: normalize + upsert each event.
        let attempted = raw_events.len();
        let mut saved = 0usize;
        for raw in raw_events {
            let scraped_at = Utc::now();
            match normalize(raw, &source, run_id, scraped_at) {
                Ok(normalized) => {
                    for warning in &normalized.warnings {
                        ctx.logger.warn(warning.clone()).await;
                    }
                    match self.store.upsert_event_raw(&normalized.event).await {
                        Ok(_) => saved += 1,
                        Err(e) => ctx.logger.warn(format!("failed to persist event: {e}")).await,
                    }
                }
                Err(e) => ctx.logger.warn(format!("failed to normalize event: {e}")).await,
            }
        }

        // Step 7: release the page, always.
        ctx.page.release();

        // Step 8: finalize status per the failure-semantics table.
        let status = if attempted == 0 {
            RunStatus::Success
        } else if saved == 0 {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };

        self.store
            .update_run(
                run_id,
                RunPatch {
                    status: Some(status),
                    finished_at: Some(Utc::now()),
                    events_found: Some(saved as i64),
                    pages_crawled: Some(pages_crawled),
                    ..Default::default()
                },
            )
            .await?;

        info!(%run_id, %status, saved, attempted, pages_crawled, "scrape run finished");

        // Step 9: re-queue a match job if anything was saved.
        if saved > 0 {
            self.enqueue_match_job(run_id, source_id).await?;
        }

        Ok(RunOutcome { run_id, status, events_found: saved as i64, pages_crawled })
    }

    async fn enqueue_match_job(&self, run_id: RunId, source_id: SourceId) -> Result<(), PipelineError> {
        let start_date = Utc::now() - ChronoDuration::days(MATCH_LOOKBACK_DAYS);
        let payload = serde_json::json!({
            "source_ids": [source_id],
            "start_date": start_date,
        });
        let opts = EnqueueOptions {
            delay: Some(ChronoDuration::seconds(MATCH_JOB_DELAY_SECONDS)),
            job_id: Some(format!("match-after-scrape-{run_id}").into()),
            max_attempts: None,
        };
        self.queue
            .enqueue(QueueName::Match, payload, opts)
            .await
            .map_err(|e| PipelineError::Other(anyhow::anyhow!("failed to enqueue match job: {e}")))?;
        Ok(())
    }

    async fn finalize_failed(
        &self,
        run_id: RunId,
        pages_crawled: i64,
        err: PipelineError,
    ) -> Result<RunOutcome, PipelineError> {
        warn!(%run_id, error = %err, "scrape run failed");
        self.store
            .update_run(
                run_id,
                RunPatch {
                    status: Some(RunStatus::Error),
                    finished_at: Some(Utc::now()),
                    events_found: Some(0),
                    pages_crawled: Some(pages_crawled),
                    errors: Some(err.to_json()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(RunOutcome { run_id, status: RunStatus::Error, events_found: 0, pages_crawled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_job_id_is_deterministic_per_run() {
        let run_id = RunId::new();
        let a = format!("match-after-scrape-{run_id}");
        let b = format!("match-after-scrape-{run_id}");
        assert_eq!(a, b);
    }
}
