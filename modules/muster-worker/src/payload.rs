//! Deserializes the snake_case internal job payloads `muster-api` and
//! `muster-dispatcher` enqueue (see `muster-scraper::runtime::enqueue_match_job`
//! and `muster-api`'s `scrape`/`instagram`/`match_job` handlers for the
//! producing side).

use chrono::{DateTime, Utc};
use muster_common::{PipelineError, RunId, SourceId};
use muster_scraper::{JobData, UploadedContent};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DateWindow {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UploadedFilePayload {
    #[serde(default)]
    pub path: Option<String>,
    pub format: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ScrapeJobPayload {
    pub run_id: RunId,
    pub source_id: SourceId,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub date_window: Option<DateWindow>,
    #[serde(default)]
    pub uploaded_file: Option<UploadedFilePayload>,
    /// Accepted but not modeled in the `ScraperModule` contract: per-source
    /// Instagram behavior (post counts, pagination depth) belongs to the
    /// module implementation, which is out of scope here.
    #[serde(default)]
    pub post_limit: Option<u32>,
}

impl ScrapeJobPayload {
    pub fn parse(raw: &serde_json::Value) -> Result<Self, PipelineError> {
        serde_json::from_value(raw.clone())
            .map_err(|e| PipelineError::Validation(format!("malformed scrape job payload: {e}")))
    }

    pub fn into_job_data(self) -> Result<JobData, PipelineError> {
        let uploaded_content = self
            .uploaded_file
            .map(|f| -> Result<UploadedContent, PipelineError> {
                let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &f.content)
                    .map_err(|e| PipelineError::Validation(format!("bad base64 uploaded content: {e}")))?;
                Ok(UploadedContent { content_type: f.format, bytes })
            })
            .transpose()?;

        Ok(JobData {
            test_mode: self.test_mode,
            date_window: self.date_window.and_then(|w| match (w.start_date, w.end_date) {
                (Some(s), Some(e)) => Some((s, e)),
                _ => None,
            }),
            uploaded_content,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MatchJobPayload {
    pub source_ids: Vec<SourceId>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl MatchJobPayload {
    pub fn parse(raw: &serde_json::Value) -> Result<Self, PipelineError> {
        serde_json::from_value(raw.clone())
            .map_err(|e| PipelineError::Validation(format!("malformed match job payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_scrape_payload() {
        let raw = serde_json::json!({
            "run_id": "11111111-1111-1111-1111-111111111111",
            "source_id": "22222222-2222-2222-2222-222222222222",
        });
        let payload = ScrapeJobPayload::parse(&raw).unwrap();
        assert!(!payload.test_mode);
        assert!(payload.date_window.is_none());
    }

    #[test]
    fn decodes_base64_uploaded_content() {
        let raw = serde_json::json!({
            "run_id": "11111111-1111-1111-1111-111111111111",
            "source_id": "22222222-2222-2222-2222-222222222222",
            "uploaded_file": {"format": "image/jpeg", "content": "aGVsbG8="},
        });
        let payload = ScrapeJobPayload::parse(&raw).unwrap().into_job_data().unwrap();
        let uploaded = payload.uploaded_content.unwrap();
        assert_eq!(uploaded.bytes, b"hello");
        assert_eq!(uploaded.content_type, "image/jpeg");
    }

    #[test]
    fn rejects_malformed_payload() {
        let raw = serde_json::json!({ "source_id": "not-a-uuid" });
        assert!(ScrapeJobPayload::parse(&raw).is_err());
    }

    #[test]
    fn parses_match_payload_with_optional_end_date() {
        let raw = serde_json::json!({
            "source_ids": ["11111111-1111-1111-1111-111111111111"],
            "start_date": "2026-01-01T00:00:00Z",
        });
        let payload = MatchJobPayload::parse(&raw).unwrap();
        assert_eq!(payload.source_ids.len(), 1);
        assert!(payload.end_date.is_none());
    }
}
