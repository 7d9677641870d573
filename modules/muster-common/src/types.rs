//! The data model from spec §3: `Source`, `Run`, `EventRaw`,
//! `EventCanonical`, `Match`, `Settings`, plus the small enums they're built
//! from.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EventRawId, RunId, SourceId};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Website,
    Instagram,
    PosterImport,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Website => write!(f, "website"),
            SourceType::Instagram => write!(f, "instagram"),
            SourceType::PosterImport => write!(f, "poster-import"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Success,
    Partial,
    Error,
}

impl RunStatus {
    /// §3 invariant: `finishedAt` is set iff the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Partial | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Queued => write!(f, "queued"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaginationType {
    None,
    Numbered,
    Infinite,
    Calendar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Open,
    Confirmed,
    Rejected,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Open => write!(f, "open"),
            MatchStatus::Confirmed => write!(f, "confirmed"),
            MatchStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// `createdBy` on a `Match`: `system` or `user:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatedBy {
    System,
    User(String),
}

impl fmt::Display for CreatedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreatedBy::System => write!(f, "system"),
            CreatedBy::User(id) => write!(f, "user:{id}"),
        }
    }
}

impl std::str::FromStr for CreatedBy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "system" {
            Ok(CreatedBy::System)
        } else if let Some(id) = s.strip_prefix("user:") {
            Ok(CreatedBy::User(id.to_string()))
        } else {
            Err(format!("unrecognized createdBy: {s}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub base_url: String,
    pub module_key: String,
    pub active: bool,
    pub default_timezone: String,
    pub rate_limit_per_min: u32,
    pub source_type: SourceType,
    /// Set for `instagram` sources; enforces the `instagramUsername`
    /// uniqueness invariant in spec §3.
    pub instagram_username: Option<String>,
    pub notes: Option<String>,
}

impl Source {
    /// §3: `moduleKey` unique across active `website` sources,
    /// `instagramUsername` unique for `instagram` sources. This checks the
    /// two-row case; the Store enforces it globally via a unique index.
    pub fn conflicts_with(&self, other: &Source) -> bool {
        if self.id == other.id {
            return false;
        }
        if !self.active || !other.active {
            return false;
        }
        match (self.source_type, other.source_type) {
            (SourceType::Website, SourceType::Website) => self.module_key == other.module_key,
            (SourceType::Instagram, SourceType::Instagram) => {
                matches!((&self.instagram_username, &other.instagram_username),
                    (Some(a), Some(b)) if a == b)
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub source_id: SourceId,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub events_found: i64,
    pub pages_crawled: i64,
    pub errors: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

impl Run {
    pub fn new_queued(id: RunId, source_id: SourceId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            source_id,
            status: RunStatus::Queued,
            started_at: now,
            finished_at: None,
            events_found: 0,
            pages_crawled: 0,
            errors: None,
            metadata: None,
        }
    }

    /// §8 invariant 5: terminal runs are immutable. Call before applying any
    /// patch in `Store::UpdateRun`.
    pub fn is_immutable(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A patch applied to a `Run` row. Every field is optional so callers only
/// touch what they changed.
#[derive(Debug, Clone, Default)]
pub struct RunPatch {
    pub status: Option<RunStatus>,
    pub finished_at: Option<DateTime<Utc>>,
    pub events_found: Option<i64>,
    pub pages_crawled: Option<i64>,
    pub errors: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// EventRaw
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRaw {
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
    pub tags: BTreeSet<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub raw: serde_json::Value,
    pub content_hash: String,
}

// ---------------------------------------------------------------------------
// EventCanonical
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCanonical {
    pub id: EventRawId,
    pub source_id: SourceId,
    pub title: String,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub timezone: String,
    pub venue_name: Option<String>,
    pub city: Option<String>,
    /// Ordered list of contributing `EventRaw` ids. §3 invariant: every id
    /// in this list must exist.
    pub merged_from_raw_ids: Vec<EventRawId>,
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: crate::ids::MatchId,
    pub raw_id_a: EventRawId,
    pub raw_id_b: EventRawId,
    pub score: f64,
    pub reason: serde_json::Value,
    pub status: MatchStatus,
    pub created_by: CreatedBy,
    pub created_at: DateTime<Utc>,
}

impl Match {
    /// Build a match enforcing the §3 invariant `rawIdA < rawIdB`,
    /// sorting the pair if given in the other order.
    pub fn new_open(
        id: crate::ids::MatchId,
        a: EventRawId,
        b: EventRawId,
        score: f64,
        reason: serde_json::Value,
        created_by: CreatedBy,
        now: DateTime<Utc>,
    ) -> Self {
        let (raw_id_a, raw_id_b) = if a < b { (a, b) } else { (b, a) };
        Self {
            id,
            raw_id_a,
            raw_id_b,
            score: score.clamp(0.0, 1.0),
            reason,
            status: MatchStatus::Open,
            created_by,
            created_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub feature_flags: serde_json::Map<String, serde_json::Value>,
    pub credentials: serde_json::Map<String, serde_json::Value>,
    pub prompt_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn source(module_key: &str, stype: SourceType, active: bool) -> Source {
        Source {
            id: SourceId::new(),
            name: "test".into(),
            base_url: "https://example.com".into(),
            module_key: module_key.into(),
            active,
            default_timezone: "America/Chicago".into(),
            rate_limit_per_min: 10,
            source_type: stype,
            instagram_username: None,
            notes: None,
        }
    }

    #[test]
    fn same_module_key_conflicts_for_active_website_sources() {
        let a = source("farmers_market", SourceType::Website, true);
        let b = source("farmers_market", SourceType::Website, true);
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn inactive_source_never_conflicts() {
        let a = source("farmers_market", SourceType::Website, true);
        let b = source("farmers_market", SourceType::Website, false);
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn different_module_keys_do_not_conflict() {
        let a = source("farmers_market", SourceType::Website, true);
        let b = source("night_market", SourceType::Website, true);
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn match_pair_is_always_sorted() {
        let a = EventRawId::from_uuid(Uuid::max());
        let b = EventRawId::from_uuid(Uuid::nil());
        let m = Match::new_open(
            crate::ids::MatchId::new(),
            a,
            b,
            0.9,
            serde_json::json!({}),
            CreatedBy::System,
            Utc::now(),
        );
        assert!(m.raw_id_a < m.raw_id_b);
    }

    #[test]
    fn created_by_round_trips() {
        use std::str::FromStr;
        assert_eq!(CreatedBy::System.to_string(), "system");
        assert_eq!(CreatedBy::User("42".into()).to_string(), "user:42");
        assert_eq!(CreatedBy::from_str("user:42").unwrap(), CreatedBy::User("42".into()));
        assert!(CreatedBy::from_str("garbage").is_err());
    }

    #[test]
    fn run_status_terminal() {
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Partial.is_terminal());
        assert!(RunStatus::Error.is_terminal());
    }
}
