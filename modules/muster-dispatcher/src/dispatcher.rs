//! The Dispatcher: spec §4.10. Single ticker task that enqueues scrape jobs
//! for sources due for refresh, reconciles stale `running` runs, and sweeps
//! every queue for jobs whose lease expired (spec §4.2: a crashed worker's
//! job returns to `waiting`). Grounded on the teacher's supervisor tick loop
//! (acquire context, run a pass, never let one failing sub-step kill the
//! loop, log a summary).

use std::sync::Arc;

use muster_common::{PipelineError, SourceId};
use muster_queue::{EnqueueOptions, QueueBroker, QueueName};
use muster_store::{Page, RunFilter, Store};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::reconcile::reconcile_stale_runs;
use crate::schedule::{has_in_flight_run, is_due};

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub tick_interval: std::time::Duration,
    pub refresh_interval: chrono::Duration,
    pub heartbeat_timeout: chrono::Duration,
}

impl DispatcherConfig {
    pub fn from_config(config: &muster_common::Config) -> Self {
        Self {
            tick_interval: std::time::Duration::from_secs(config.dispatch_interval_seconds),
            refresh_interval: chrono::Duration::seconds(config.source_refresh_interval_seconds as i64),
            heartbeat_timeout: chrono::Duration::seconds(config.run_heartbeat_timeout_seconds as i64),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    pub sources_enqueued: usize,
    pub runs_reconciled: usize,
    pub leases_reclaimed: u64,
}

pub struct Dispatcher {
    store: Arc<dyn Store>,
    queue: Arc<dyn QueueBroker>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn QueueBroker>, config: DispatcherConfig) -> Self {
        Self { store, queue, config }
    }

    /// Sweeps every queue for leases past their deadline and returns them
    /// to `waiting`, per spec §4.2: "if the worker crashes, a
    /// heartbeat-timeout returns the job to `waiting`."
    async fn reclaim_expired_leases(&self) -> Result<u64, PipelineError> {
        let mut reclaimed = 0u64;
        for queue_name in QueueName::ALL {
            match self.queue.reclaim_expired_leases(queue_name).await {
                Ok(n) => reclaimed += n,
                Err(err) => warn!(queue = %queue_name, error = %err, "failed to reclaim expired leases"),
            }
        }
        Ok(reclaimed)
    }

    /// Runs until `shutdown` reports `true`, firing a tick on
    /// `config.tick_interval`. Errors within a tick are logged, never
    /// propagated — one bad tick shouldn't stop future ticks.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(stats) => info!(
                            sources_enqueued = stats.sources_enqueued,
                            runs_reconciled = stats.runs_reconciled,
                            leases_reclaimed = stats.leases_reclaimed,
                            "dispatcher tick complete"
                        ),
                        Err(err) => warn!(error = %err, "dispatcher tick failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("dispatcher shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Runs one enqueue + reconcile pass immediately, without waiting for
    /// the ticker. Used by the main loop and directly by tests.
    pub async fn tick(&self) -> Result<TickStats, PipelineError> {
        let runs_reconciled = reconcile_stale_runs(&self.store, self.config.heartbeat_timeout).await?.len();
        let sources_enqueued = self.enqueue_due_sources().await?;
        let leases_reclaimed = self.reclaim_expired_leases().await?;
        Ok(TickStats { sources_enqueued, runs_reconciled, leases_reclaimed })
    }

    async fn enqueue_due_sources(&self) -> Result<usize, PipelineError> {
        let sources = self.store.list_sources(true).await?;
        let now = chrono::Utc::now();
        let mut enqueued = 0;

        for source in sources {
            let latest_run = self
                .store
                .list_runs(RunFilter { source_id: Some(source.id), status: None }, Page { limit: 1, offset: 0 })
                .await?
                .into_iter()
                .next();

            if has_in_flight_run(latest_run.as_ref()) {
                continue;
            }
            if !is_due(latest_run.as_ref(), now, self.config.refresh_interval) {
                continue;
            }

            if let Err(err) = self.enqueue_scrape(source.id).await {
                warn!(source_id = %source.id, error = %err, "failed to enqueue due scrape job");
                continue;
            }
            enqueued += 1;
        }
        Ok(enqueued)
    }

    async fn enqueue_scrape(&self, source_id: SourceId) -> Result<(), PipelineError> {
        let run_id = self.store.create_run(source_id).await?;
        let payload = serde_json::json!({
            "run_id": run_id,
            "source_id": source_id,
            "test_mode": false,
        });
        self.queue
            .enqueue(QueueName::Scrape, payload, EnqueueOptions::default())
            .await
            .map_err(|err| PipelineError::Other(err.into()))?;
        Ok(())
    }
}
