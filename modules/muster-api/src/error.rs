//! The Job API never leaks internal errors verbatim (spec §7): every
//! failure path collapses to `{error, details?}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use muster_common::PipelineError;

pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl From<muster_queue::QueueError> for ApiError {
    fn from(err: muster_queue::QueueError) -> Self {
        Self(PipelineError::Other(err.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::SourceInactive | PipelineError::ModuleMissing(_) => StatusCode::NOT_FOUND,
            PipelineError::Cancelled => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(error = %self.0, "job api request failed");
        (status, Json(serde_json::json!({ "error": self.0.reason_code(), "details": self.0.to_string() }))).into_response()
    }
}
