//! `GET /queue/status`, `POST /queue/:queue/retry/:jobId`,
//! `POST /queue/:queue/clean` — spec §4.2's queue introspection surface,
//! exposed through the Job API rather than the admin UI (out of scope).

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use chrono::{Duration as ChronoDuration, Utc};
use muster_common::{JobId, PipelineError};
use muster_queue::{JobState, QueueBroker, QueueName};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueCounts {
    waiting: u64,
    active: u64,
    completed: u64,
    failed: u64,
    delayed: u64,
}

impl From<muster_queue::Counts> for QueueCounts {
    fn from(c: muster_queue::Counts) -> Self {
        Self { waiting: c.waiting, active: c.active, completed: c.completed, failed: c.failed, delayed: c.delayed }
    }
}

pub async fn queue_status(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let mut out = serde_json::Map::new();
    for queue in QueueName::ALL {
        let counts: QueueCounts = state.queue.counts(queue).await.map_err(ApiError::from)?.into();
        out.insert(queue.as_str().to_string(), serde_json::to_value(counts).expect("Counts serializes"));
    }
    Ok(Json(serde_json::Value::Object(out)))
}

fn parse_queue(name: &str) -> Result<QueueName, ApiError> {
    QueueName::from_str(name)
        .map_err(|_| ApiError::from(PipelineError::Validation(format!("unknown queue: {name}"))))
}

pub async fn retry_job(
    State(state): State<Arc<AppState>>,
    Path((queue, job_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let queue = parse_queue(&queue)?;
    state.queue.retry(queue, &JobId::from(job_id)).await.map_err(ApiError::from)?;
    Ok(Json(serde_json::json!({ "retried": true })))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanQueueRequest {
    pub state: String,
    pub older_than_hours: Option<i64>,
}

pub async fn clean_queue(
    State(state): State<Arc<AppState>>,
    Path(queue): Path<String>,
    Json(body): Json<CleanQueueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let queue = parse_queue(&queue)?;
    let job_state = match body.state.as_str() {
        "completed" => JobState::Completed,
        "failed" => JobState::Failed,
        other => {
            return Err(PipelineError::Validation(format!("clean does not support state: {other}")).into())
        }
    };
    let older_than = Utc::now() - ChronoDuration::hours(body.older_than_hours.unwrap_or(24));
    let removed = state.queue.clean(queue, job_state, older_than).await.map_err(ApiError::from)?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_queue_names() {
        assert!(parse_queue("scrape").is_ok());
        assert!(parse_queue("bogus").is_err());
    }
}
