//! Heartbeat reconciliation: spec §4.10(b) and §5 "a run whose container is
//! killed is recovered by the Dispatcher heartbeat reconciliation."

use std::sync::Arc;

use chrono::Utc;
use muster_common::types::RunPatch;
use muster_common::{PipelineError, RunId};
use muster_store::Store;
use tracing::warn;

/// Marks every `running` run whose last heartbeat predates `timeout` as
/// `error:heartbeat_timeout`. Best-effort per run: one bad row doesn't stop
/// the rest from being reconciled.
pub async fn reconcile_stale_runs(
    store: &Arc<dyn Store>,
    timeout: chrono::Duration,
) -> Result<Vec<RunId>, PipelineError> {
    let cutoff = Utc::now() - timeout;
    let stale = store.list_stale_running_runs(cutoff).await?;

    let mut reconciled = Vec::with_capacity(stale.len());
    for run in stale {
        let patch = RunPatch {
            status: Some(muster_common::types::RunStatus::Error),
            finished_at: Some(Utc::now()),
            events_found: None,
            pages_crawled: None,
            errors: Some(PipelineError::HeartbeatTimeout.to_json()),
            metadata: None,
        };
        match store.update_run(run.id, patch).await {
            Ok(()) => reconciled.push(run.id),
            Err(err) => warn!(run_id = %run.id, error = %err, "failed to reconcile stale run"),
        }
    }
    Ok(reconciled)
}

#[cfg(test)]
mod tests {
    // `reconcile_stale_runs` is exercised against a real Postgres container
    // in tests/dispatcher_test.rs; pure-logic coverage lives in schedule.rs.
}
