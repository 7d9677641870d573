//! Per-queue worker loops. Spec §5: each queue drains at its own configured
//! concurrency (`scrape_concurrency`, `match_concurrency`,
//! `instagram_concurrency`); `N` of these loops run concurrently per queue,
//! each a plain `tokio::spawn`ed task sharing the same `QueueBroker`.
//!
//! Grounded on `muster_queue::RedisQueueBroker::dequeue`'s own
//! shutdown-aware polling loop — a worker loop here just wraps dequeue,
//! dispatch, ack/nack around that in a `loop { }`, the same shape
//! `rootsignal-scout-supervisor/src/supervisor.rs`'s ticker uses for its
//! own `tokio::select!` over a `watch::Receiver<bool>`.

use std::sync::Arc;

use muster_common::PipelineError;
use muster_matcher::Matcher;
use muster_queue::{Job, QueueBroker, QueueName};
use muster_scraper::ScraperRuntime;
use muster_store::EventMatchFilter;
use tokio::sync::watch;
use tracing::{info, warn, Instrument};

use crate::payload::{MatchJobPayload, ScrapeJobPayload};

/// Drains `QueueName::Scrape` or `QueueName::Instagram` — both run a
/// `ScraperRuntime` job against an already-created `Run`; the only
/// difference is which module the `Source.moduleKey` resolves to.
pub async fn run_scrape_like_worker(
    queue_name: QueueName,
    runtime: Arc<ScraperRuntime>,
    queue: Arc<dyn QueueBroker>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let job = match queue.dequeue(queue_name, &mut shutdown).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                info!(queue = %queue_name, "worker loop shutting down");
                return;
            }
            Err(e) => {
                warn!(queue = %queue_name, error = %e, "dequeue failed, retrying");
                continue;
            }
        };

        match handle_scrape_job(&runtime, &job, shutdown.clone()).await {
            Ok(()) => {
                if let Err(e) = queue.ack(&job).await {
                    warn!(job_id = %job.id, error = %e, "failed to ack completed job");
                }
            }
            Err(e) => {
                warn!(job_id = %job.id, queue = %queue_name, error = %e, "scrape job failed");
                if let Err(e) = queue.nack(&job, &e.to_string()).await {
                    warn!(job_id = %job.id, error = %e, "failed to nack failed job");
                }
            }
        }
    }
}

async fn handle_scrape_job(
    runtime: &ScraperRuntime,
    job: &Job,
    shutdown: watch::Receiver<bool>,
) -> Result<(), PipelineError> {
    let payload = ScrapeJobPayload::parse(&job.payload)?;
    let run_id = payload.run_id;
    let source_id = payload.source_id;
    let job_data = payload.into_job_data()?;

    let outcome = runtime.run_scrape_job(job.id.clone(), run_id, source_id, job_data, shutdown).await?;
    info!(%run_id, %source_id, status = %outcome.status, events_found = outcome.events_found, "scrape job processed");
    Ok(())
}

/// Drains `QueueName::Match`. Unlike scrape/instagram this has no `Run`
/// row — it reads already-persisted events and writes `Match` rows.
pub async fn run_match_worker(matcher: Arc<Matcher>, queue: Arc<dyn QueueBroker>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let job = match queue.dequeue(QueueName::Match, &mut shutdown).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                info!("match worker loop shutting down");
                return;
            }
            Err(e) => {
                warn!(error = %e, "dequeue failed, retrying");
                continue;
            }
        };

        match handle_match_job(&matcher, &job).await {
            Ok(()) => {
                if let Err(e) = queue.ack(&job).await {
                    warn!(job_id = %job.id, error = %e, "failed to ack completed match job");
                }
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "match job failed");
                if let Err(e) = queue.nack(&job, &e.to_string()).await {
                    warn!(job_id = %job.id, error = %e, "failed to nack failed match job");
                }
            }
        }
    }
}

/// Opens the `match_job` span for the duration of the run. Match jobs have
/// no single `run_id` (a match pass spans every source named in the
/// payload), so the span carries `job_id` and `source_ids` in its place.
async fn handle_match_job(matcher: &Matcher, job: &Job) -> Result<(), PipelineError> {
    let payload = MatchJobPayload::parse(&job.payload)?;
    let span = tracing::info_span!("match_job", job_id = %job.id, source_ids = ?payload.source_ids);
    async move {
        let filter = EventMatchFilter { source_ids: payload.source_ids, from: payload.start_date, to: payload.end_date };
        let outcome = matcher.run(filter).await?;
        info!(
            events_considered = outcome.events_considered,
            candidates_scored = outcome.candidates_scored,
            matches_persisted = outcome.matches_persisted,
            "match job processed"
        );
        Ok(())
    }
    .instrument(span)
    .await
}
