//! Database row shapes and their conversions to/from `muster_common::types`.
//! Kept separate from `store.rs` so the SQL-facing shape (flat columns,
//! `Vec<String>` instead of `BTreeSet`) doesn't leak into the domain types.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use muster_common::types::{
    CreatedBy, EventRaw, Match, MatchStatus, Run, RunStatus, Settings, Source, SourceType,
};
use muster_common::{EventRawId, MatchId, RunId, SourceId};
use sqlx::postgres::PgRow;
use sqlx::Row;

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SourceRow {
    pub id: SourceId,
    pub name: String,
    pub base_url: String,
    pub module_key: String,
    pub active: bool,
    pub default_timezone: String,
    pub rate_limit_per_min: i32,
    pub source_type: String,
    pub instagram_username: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<SourceRow> for Source {
    type Error = muster_common::PipelineError;

    fn try_from(row: SourceRow) -> Result<Self, Self::Error> {
        let source_type = match row.source_type.as_str() {
            "website" => SourceType::Website,
            "instagram" => SourceType::Instagram,
            "poster-import" => SourceType::PosterImport,
            other => {
                return Err(muster_common::PipelineError::Validation(format!(
                    "unknown source_type in storage: {other}"
                )))
            }
        };
        Ok(Source {
            id: row.id,
            name: row.name,
            base_url: row.base_url,
            module_key: row.module_key,
            active: row.active,
            default_timezone: row.default_timezone,
            rate_limit_per_min: row.rate_limit_per_min.max(0) as u32,
            source_type,
            instagram_username: row.instagram_username,
            notes: row.notes,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RunRow {
    pub id: RunId,
    pub source_id: SourceId,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub events_found: i64,
    pub pages_crawled: i64,
    pub errors: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl TryFrom<RunRow> for Run {
    type Error = muster_common::PipelineError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(Run {
            id: row.id,
            source_id: row.source_id,
            status: parse_run_status(&row.status)?,
            started_at: row.started_at,
            finished_at: row.finished_at,
            events_found: row.events_found,
            pages_crawled: row.pages_crawled,
            errors: row.errors,
            metadata: row.metadata,
        })
    }
}

pub(crate) fn parse_run_status(s: &str) -> Result<RunStatus, muster_common::PipelineError> {
    Ok(match s {
        "queued" => RunStatus::Queued,
        "running" => RunStatus::Running,
        "success" => RunStatus::Success,
        "partial" => RunStatus::Partial,
        "error" => RunStatus::Error,
        other => {
            return Err(muster_common::PipelineError::Validation(format!(
                "unknown run status in storage: {other}"
            )))
        }
    })
}

/// `events_raw` has more columns than `EventRaw` needs spelled out by hand
/// (plain column order from the migration), so this reads positionally via
/// `sqlx::query_as` against a tuple-like struct instead of a manual
/// `FromRow`.
#[derive(Debug, Clone)]
pub(crate) struct EventRawRow {
    pub id: EventRawId,
    pub source_id: SourceId,
    pub run_id: RunId,
    pub source_event_id: Option<String>,
    pub title: String,
    pub description_html: Option<String>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub timezone: String,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub organizer: Option<String>,
    pub category: Option<String>,
    pub price: Option<String>,
    pub tags: Vec<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub raw: serde_json::Value,
    pub content_hash: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for EventRawRow {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(EventRawRow {
            id: row.try_get("id")?,
            source_id: row.try_get("source_id")?,
            run_id: row.try_get("run_id")?,
            source_event_id: row.try_get("source_event_id")?,
            title: row.try_get("title")?,
            description_html: row.try_get("description_html")?,
            start_datetime: row.try_get("start_datetime")?,
            end_datetime: row.try_get("end_datetime")?,
            timezone: row.try_get("timezone")?,
            venue_name: row.try_get("venue_name")?,
            venue_address: row.try_get("venue_address")?,
            city: row.try_get("city")?,
            region: row.try_get("region")?,
            country: row.try_get("country")?,
            lat: row.try_get("lat")?,
            lon: row.try_get("lon")?,
            organizer: row.try_get("organizer")?,
            category: row.try_get("category")?,
            price: row.try_get("price")?,
            tags: row.try_get("tags")?,
            url: row.try_get("url")?,
            image_url: row.try_get("image_url")?,
            scraped_at: row.try_get("scraped_at")?,
            raw: row.try_get("raw")?,
            content_hash: row.try_get("content_hash")?,
        })
    }
}

impl From<EventRawRow> for EventRaw {
    fn from(row: EventRawRow) -> Self {
        EventRaw {
            id: row.id,
            source_id: row.source_id,
            run_id: row.run_id,
            source_event_id: row.source_event_id,
            title: row.title,
            description_html: row.description_html,
            start_datetime: row.start_datetime,
            end_datetime: row.end_datetime,
            timezone: row.timezone,
            venue_name: row.venue_name,
            venue_address: row.venue_address,
            city: row.city,
            region: row.region,
            country: row.country,
            lat: row.lat,
            lon: row.lon,
            organizer: row.organizer,
            category: row.category,
            price: row.price,
            tags: row.tags.into_iter().collect::<BTreeSet<_>>(),
            url: row.url,
            image_url: row.image_url,
            scraped_at: row.scraped_at,
            raw: row.raw,
            content_hash: row.content_hash,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MatchRow {
    pub id: MatchId,
    pub raw_id_a: EventRawId,
    pub raw_id_b: EventRawId,
    pub score: f64,
    pub reason: serde_json::Value,
    pub status: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MatchRow> for Match {
    type Error = muster_common::PipelineError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "open" => MatchStatus::Open,
            "confirmed" => MatchStatus::Confirmed,
            "rejected" => MatchStatus::Rejected,
            other => {
                return Err(muster_common::PipelineError::Validation(format!(
                    "unknown match status in storage: {other}"
                )))
            }
        };
        let created_by = CreatedBy::from_str(&row.created_by).map_err(
            muster_common::PipelineError::Validation,
        )?;
        Ok(Match {
            id: row.id,
            raw_id_a: row.raw_id_a,
            raw_id_b: row.raw_id_b,
            score: row.score,
            reason: row.reason,
            status,
            created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SettingsRow {
    pub feature_flags: serde_json::Value,
    pub credentials: serde_json::Value,
    pub prompt_text: Option<String>,
}

impl From<SettingsRow> for Settings {
    fn from(row: SettingsRow) -> Self {
        Settings {
            feature_flags: row.feature_flags.as_object().cloned().unwrap_or_default(),
            credentials: row.credentials.as_object().cloned().unwrap_or_default(),
            prompt_text: row.prompt_text,
        }
    }
}
