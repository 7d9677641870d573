use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{instagram, logs, match_job, queue, scrape};
use crate::state::AppState;

/// The Job API surface, per spec §4.11/§6. The admin UI and the rest of the
/// REST façade are out of scope; this router exposes only job submission,
/// queue introspection and log streaming.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/scrape", post(scrape::submit_scrape))
        .route("/match", post(match_job::submit_match))
        .route("/instagram", post(instagram::submit_instagram))
        .route("/queue/status", get(queue::queue_status))
        .route("/queue/{queue}/retry/{jobId}", post(queue::retry_job))
        .route("/queue/{queue}/clean", post(queue::clean_queue))
        .route("/logs/stream/{runId}", get(logs::stream_logs))
        .route("/logs/history/{runId}", get(logs::log_history))
        .with_state(state)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!("http_request", method = %request.method(), path = %request.uri().path())
            }),
        )
}
