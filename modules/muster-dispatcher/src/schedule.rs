//! "Due for refresh" decision for the Dispatcher's enqueue pass (spec §4.10).

use chrono::{DateTime, Utc};
use muster_common::types::{Run, RunStatus};

/// A source is due once it has never run, its most recent run is terminal
/// and older than `refresh_interval`, or its most recent run is stuck in a
/// non-terminal state well past the heartbeat timeout (the Dispatcher's own
/// reconciliation pass will close that run out on the same tick, but we
/// don't want a crashed run to block refresh forever in the meantime).
pub fn is_due(latest_run: Option<&Run>, now: DateTime<Utc>, refresh_interval: chrono::Duration) -> bool {
    match latest_run {
        None => true,
        Some(run) if !run.status.is_terminal() => false,
        Some(run) => match run.finished_at.or(Some(run.started_at)) {
            Some(reference) => now - reference >= refresh_interval,
            None => true,
        },
    }
}

/// True if a source already has a queued or running run, so enqueuing a
/// duplicate scrape job would just pile up work behind it.
pub fn has_in_flight_run(latest_run: Option<&Run>) -> bool {
    matches!(latest_run, Some(run) if matches!(run.status, RunStatus::Queued | RunStatus::Running))
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_common::{RunId, SourceId};

    fn run(status: RunStatus, started_at: DateTime<Utc>, finished_at: Option<DateTime<Utc>>) -> Run {
        Run {
            id: RunId::new(),
            source_id: SourceId::new(),
            status,
            started_at,
            finished_at,
            events_found: 0,
            pages_crawled: 0,
            errors: None,
            metadata: None,
        }
    }

    #[test]
    fn never_run_is_due() {
        assert!(is_due(None, Utc::now(), chrono::Duration::hours(6)));
    }

    #[test]
    fn recent_success_is_not_due() {
        let now = Utc::now();
        let r = run(RunStatus::Success, now - chrono::Duration::minutes(30), Some(now - chrono::Duration::minutes(25)));
        assert!(!is_due(Some(&r), now, chrono::Duration::hours(6)));
    }

    #[test]
    fn stale_success_is_due() {
        let now = Utc::now();
        let r = run(RunStatus::Success, now - chrono::Duration::hours(8), Some(now - chrono::Duration::hours(7)));
        assert!(is_due(Some(&r), now, chrono::Duration::hours(6)));
    }

    #[test]
    fn running_run_is_never_due_and_is_in_flight() {
        let now = Utc::now();
        let r = run(RunStatus::Running, now - chrono::Duration::hours(8), None);
        assert!(!is_due(Some(&r), now, chrono::Duration::hours(6)));
        assert!(has_in_flight_run(Some(&r)));
    }

    #[test]
    fn queued_run_is_in_flight() {
        let r = run(RunStatus::Queued, Utc::now(), None);
        assert!(has_in_flight_run(Some(&r)));
    }
}
