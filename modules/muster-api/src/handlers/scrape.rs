//! `POST /scrape` — spec §4.11 `SubmitScrape(sourceId, {...}) → RunId`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use muster_common::{PipelineError, SourceId};
use muster_queue::{EnqueueOptions, QueueBroker, QueueName};
use muster_store::Store;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationOptions {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub path: Option<String>,
    pub format: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScrapeRequest {
    pub source_id: SourceId,
    pub test_mode: Option<bool>,
    pub pagination_options: Option<PaginationOptions>,
    pub uploaded_file: Option<UploadedFile>,
}

pub async fn submit_scrape(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitScrapeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let source = state
        .store
        .get_source(body.source_id)
        .await?
        .filter(|s| s.active)
        .ok_or(PipelineError::SourceInactive)?;

    let run_id = state.store.create_run(source.id).await?;
    let job_id = format!("scrape-{run_id}");

    let payload = serde_json::json!({
        "run_id": run_id,
        "source_id": source.id,
        "test_mode": body.test_mode.unwrap_or(false),
        "date_window": body.pagination_options.map(|p| serde_json::json!({
            "start_date": p.start_date,
            "end_date": p.end_date,
        })),
        "uploaded_file": body.uploaded_file.map(|f| serde_json::json!({
            "path": f.path,
            "format": f.format,
            "content": f.content,
        })),
    });

    state
        .queue
        .enqueue(QueueName::Scrape, payload, EnqueueOptions { job_id: Some(job_id.clone().into()), ..Default::default() })
        .await
        .map_err(ApiError::from)?;

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "runId": run_id, "jobId": job_id }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_body() {
        let body: SubmitScrapeRequest = serde_json::from_value(serde_json::json!({
            "sourceId": "11111111-1111-1111-1111-111111111111",
        }))
        .unwrap();
        assert!(body.test_mode.is_none());
        assert!(body.pagination_options.is_none());
    }

    #[test]
    fn deserializes_full_body() {
        let body: SubmitScrapeRequest = serde_json::from_value(serde_json::json!({
            "sourceId": "11111111-1111-1111-1111-111111111111",
            "testMode": true,
            "paginationOptions": {"startDate": "2026-01-01T00:00:00Z", "endDate": "2026-02-01T00:00:00Z"},
        }))
        .unwrap();
        assert_eq!(body.test_mode, Some(true));
        assert!(body.pagination_options.is_some());
    }
}
