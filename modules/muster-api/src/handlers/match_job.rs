//! `POST /match` — spec §4.11 `SubmitMatch(sourceIds, window) → jobId`.
//!
//! Unlike scrape/instagram jobs, a match job has no associated `Run` row —
//! it operates across events already persisted by prior scrape runs.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use muster_common::{JobId, PipelineError, SourceId};
use muster_queue::{EnqueueOptions, QueueBroker, QueueName};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitMatchRequest {
    pub source_ids: Vec<SourceId>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

pub async fn submit_match(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitMatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.source_ids.is_empty() {
        return Err(PipelineError::Validation("sourceIds must not be empty".into()).into());
    }

    let payload = serde_json::json!({
        "source_ids": body.source_ids,
        "start_date": body.start_date,
        "end_date": body.end_date,
    });

    let job_id = JobId::new_random();
    state
        .queue
        .enqueue(QueueName::Match, payload, EnqueueOptions { job_id: Some(job_id.clone()), ..Default::default() })
        .await
        .map_err(ApiError::from)?;

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "jobId": job_id }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_body() {
        let body: SubmitMatchRequest = serde_json::from_value(serde_json::json!({
            "sourceIds": ["11111111-1111-1111-1111-111111111111"],
            "startDate": "2026-01-01T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(body.source_ids.len(), 1);
        assert!(body.end_date.is_none());
    }
}
