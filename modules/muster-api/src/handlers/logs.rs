//! `GET /logs/stream/:runId` (SSE) and `GET /logs/history/:runId` — spec
//! §4.3's log-stream wire format. No teacher precedent for SSE in this
//! codebase; built directly on `axum::response::sse` plus
//! `futures::stream::once`/`.chain()` over `LogBus::tail`'s own stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures::StreamExt;
use muster_common::{PipelineError, RunId};
use muster_logbus::LogBus;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(rename = "fromSequence")]
    pub from_sequence: Option<i64>,
}

fn parse_run_id(raw: &str) -> Result<RunId, ApiError> {
    Uuid::parse_str(raw)
        .map(RunId::from_uuid)
        .map_err(|_| ApiError::from(PipelineError::Validation(format!("invalid runId: {raw}"))))
}

fn log_event(run_id: RunId, entry: &muster_logbus::StoredEntry) -> Event {
    Event::default().event("log").json_data(serde_json::json!({
        "type": "log",
        "id": entry.seq,
        "timestamp": entry.ts.timestamp_millis(),
        "level": entry.level.wire_code(),
        "source": entry.source,
        "msg": entry.msg,
        "runId": run_id,
    })).unwrap_or_else(|_| Event::default().event("log").data("{}"))
}

pub async fn stream_logs(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let entries = state.log_bus.tail(run_id, query.from_sequence).await?;

    let connected = futures::stream::once(async move {
        let event = Event::default()
            .event("connected")
            .json_data(serde_json::json!({ "type": "connected", "runId": run_id }))
            .unwrap_or_else(|_| Event::default().event("connected").data("{}"));
        Result::<Event, Infallible>::Ok(event)
    });

    let logs = entries.map(move |res| {
        let event = match res {
            Ok(entry) => log_event(run_id, &entry),
            Err(err) => Event::default()
                .event("error")
                .json_data(serde_json::json!({ "type": "error", "message": err.to_string() }))
                .unwrap_or_else(|_| Event::default().event("error").data("{}")),
        };
        Result::<Event, Infallible>::Ok(event)
    });

    let stream = connected.chain(logs);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

pub async fn log_history(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = parse_run_id(&run_id)?;
    let entries = state.log_bus.history(run_id, 10_000).await?;
    let logs: Vec<_> = entries
        .iter()
        .map(|entry| {
            serde_json::json!({
                "id": entry.seq,
                "timestamp": entry.ts.timestamp_millis(),
                "level": entry.level.wire_code(),
                "source": entry.source,
                "msg": entry.msg,
                "runId": run_id,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "logs": logs })))
}
