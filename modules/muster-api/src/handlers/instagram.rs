//! `POST /instagram` — spec §4.11 `SubmitInstagram(sourceId, postLimit) → RunId`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use muster_common::types::SourceType;
use muster_common::{PipelineError, SourceId};
use muster_queue::{EnqueueOptions, QueueBroker, QueueName};
use muster_store::Store;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitInstagramRequest {
    pub source_id: SourceId,
    pub post_limit: Option<u32>,
}

pub async fn submit_instagram(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitInstagramRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let source = state
        .store
        .get_source(body.source_id)
        .await?
        .filter(|s| s.active)
        .ok_or(PipelineError::SourceInactive)?;

    if source.source_type != SourceType::Instagram {
        return Err(PipelineError::Validation(format!(
            "source {} is not an instagram source",
            source.id
        ))
        .into());
    }

    let run_id = state.store.create_run(source.id).await?;
    let job_id = format!("instagram-{run_id}");

    let payload = serde_json::json!({
        "run_id": run_id,
        "source_id": source.id,
        "post_limit": body.post_limit,
    });

    state
        .queue
        .enqueue(QueueName::Instagram, payload, EnqueueOptions { job_id: Some(job_id.clone().into()), ..Default::default() })
        .await
        .map_err(ApiError::from)?;

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "runId": run_id, "jobId": job_id }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_body() {
        let body: SubmitInstagramRequest = serde_json::from_value(serde_json::json!({
            "sourceId": "11111111-1111-1111-1111-111111111111",
            "postLimit": 25,
        }))
        .unwrap();
        assert_eq!(body.post_limit, Some(25));
    }
}
