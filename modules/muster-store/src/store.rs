//! Postgres-backed `Store`. Spec §4.1: durable typed access, idempotent
//! upserts, paginated and streaming queries.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, TryStreamExt};
use muster_common::types::{EventRaw, Match, MatchStatus, Run, RunPatch, RunStatus, Settings, Source};
use muster_common::{EventRawId, MatchId, PipelineError, RunId, SourceId};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::Result;
use crate::rows::{EventRawRow, MatchRow, RunRow, SettingsRow, SourceRow};

#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub source_id: Option<SourceId>,
    pub status: Option<RunStatus>,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 50, offset: 0 }
    }
}

/// Filter for `ListEventsForMatching`: a set of sources and a half-open
/// `[from, to)` time window. Empty `source_ids` means "all sources".
#[derive(Debug, Clone, Default)]
pub struct EventMatchFilter {
    pub source_ids: Vec<SourceId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub type EventRawStream = Pin<Box<dyn Stream<Item = Result<EventRaw>> + Send>>;

/// A proposed match pair ready for persistence, produced by the Matcher.
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub raw_id_a: EventRawId,
    pub raw_id_b: EventRawId,
    pub score: f64,
    pub reason: serde_json::Value,
}

/// Durable typed access to every table the pipeline owns. One trait so
/// callers (Scraper Runtime, Matcher, Dispatcher, Job API) depend on an
/// interface rather than a concrete Postgres pool — tests substitute an
/// in-memory fake.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_source(&self, id: SourceId) -> Result<Option<Source>>;
    async fn list_sources(&self, active_only: bool) -> Result<Vec<Source>>;

    async fn create_run(&self, source_id: SourceId) -> Result<RunId>;
    async fn update_run(&self, id: RunId, patch: RunPatch) -> Result<()>;
    async fn get_run(&self, id: RunId) -> Result<Option<Run>>;
    async fn list_runs(&self, filter: RunFilter, page: Page) -> Result<Vec<Run>>;
    /// Runs stuck `running` with no heartbeat since `older_than` — feeds the
    /// Dispatcher's reconciliation pass.
    async fn list_stale_running_runs(&self, older_than: DateTime<Utc>) -> Result<Vec<Run>>;
    async fn touch_run_heartbeat(&self, id: RunId) -> Result<()>;

    /// Insert or return the existing id, per the conflict-resolution order
    /// in spec §4.1.
    async fn upsert_event_raw(&self, ev: &EventRaw) -> Result<(EventRawId, bool)>;
    async fn list_events_for_matching(&self, filter: EventMatchFilter) -> Result<EventRawStream>;

    /// Atomically replace the open-match set: delete all `open` matches,
    /// then insert `new_matches`, in one transaction.
    async fn replace_open_matches(&self, new_matches: Vec<NewMatch>) -> Result<Vec<MatchId>>;
    async fn list_matches(&self, status: Option<MatchStatus>, page: Page) -> Result<Vec<Match>>;
    async fn set_match_status(&self, id: MatchId, status: MatchStatus) -> Result<()>;

    async fn settings(&self) -> Result<Settings>;
    async fn update_settings(&self, patch: Settings) -> Result<Settings>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            PipelineError::Other(anyhow::anyhow!("migration failed: {e}"))
        })?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_source(&self, id: SourceId) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"SELECT id, name, base_url, module_key, active, default_timezone,
                      rate_limit_per_min, source_type, instagram_username, notes
               FROM sources WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Source::try_from).transpose()
    }

    async fn list_sources(&self, active_only: bool) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"SELECT id, name, base_url, module_key, active, default_timezone,
                      rate_limit_per_min, source_type, instagram_username, notes
               FROM sources
               WHERE ($1 = false OR active)
               ORDER BY name"#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Source::try_from).collect()
    }

    async fn create_run(&self, source_id: SourceId) -> Result<RunId> {
        let id: RunId = sqlx::query_scalar::<_, RunId>(
            r#"INSERT INTO runs (source_id, status, started_at)
               VALUES ($1, 'queued', now())
               RETURNING id"#,
        )
        .bind(source_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_run(&self, id: RunId, patch: RunPatch) -> Result<()> {
        let current = self.get_run(id).await?.ok_or_else(|| {
            PipelineError::Validation(format!("run {id} not found"))
        })?;
        if current.is_immutable() {
            return Err(PipelineError::Validation(format!(
                "run {id} is terminal ({}) and cannot be mutated",
                current.status
            )));
        }

        sqlx::query(
            r#"UPDATE runs SET
                 status = COALESCE($2, status),
                 finished_at = COALESCE($3, finished_at),
                 events_found = COALESCE($4, events_found),
                 pages_crawled = COALESCE($5, pages_crawled),
                 errors = COALESCE($6, errors),
                 metadata = COALESCE($7, metadata),
                 last_heartbeat = now()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(patch.status.map(|s| s.to_string()))
        .bind(patch.finished_at)
        .bind(patch.events_found)
        .bind(patch.pages_crawled)
        .bind(patch.errors)
        .bind(patch.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_run(&self, id: RunId) -> Result<Option<Run>> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"SELECT id, source_id, status, started_at, finished_at,
                      events_found, pages_crawled, errors, metadata
               FROM runs WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Run::try_from).transpose()
    }

    async fn list_runs(&self, filter: RunFilter, page: Page) -> Result<Vec<Run>> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"SELECT id, source_id, status, started_at, finished_at,
                      events_found, pages_crawled, errors, metadata
               FROM runs
               WHERE ($1::uuid IS NULL OR source_id = $1)
                 AND ($2::text IS NULL OR status = $2)
               ORDER BY started_at DESC
               LIMIT $3 OFFSET $4"#,
        )
        .bind(filter.source_id)
        .bind(filter.status.map(|s| s.to_string()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Run::try_from).collect()
    }

    async fn list_stale_running_runs(&self, older_than: DateTime<Utc>) -> Result<Vec<Run>> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"SELECT id, source_id, status, started_at, finished_at,
                      events_found, pages_crawled, errors, metadata
               FROM runs
               WHERE status = 'running' AND last_heartbeat < $1"#,
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Run::try_from).collect()
    }

    async fn touch_run_heartbeat(&self, id: RunId) -> Result<()> {
        sqlx::query("UPDATE runs SET last_heartbeat = now() WHERE id = $1 AND status = 'running'")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_event_raw(&self, ev: &EventRaw) -> Result<(EventRawId, bool)> {
        let tags: Vec<String> = ev.tags.iter().cloned().collect();

        if let Some(source_event_id) = ev.source_event_id.as_deref().filter(|s| !s.is_empty()) {
            let existing: Option<EventRawId> = sqlx::query_scalar::<_, EventRawId>(
                "SELECT id FROM events_raw WHERE source_id = $1 AND source_event_id = $2",
            )
            .bind(ev.source_id)
            .bind(source_event_id)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(id) = existing {
                return Ok((id, false));
            }
        } else {
            let existing: Option<EventRawId> = sqlx::query_scalar::<_, EventRawId>(
                "SELECT id FROM events_raw WHERE source_id = $1 AND content_hash = $2 AND source_event_id IS NULL",
            )
            .bind(ev.source_id)
            .bind(&ev.content_hash)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(id) = existing {
                return Ok((id, false));
            }
        }

        let id: EventRawId = sqlx::query_scalar::<_, EventRawId>(
            r#"INSERT INTO events_raw
                 (source_id, run_id, source_event_id, title, description_html,
                  start_datetime, end_datetime, timezone, venue_name, venue_address,
                  city, region, country, lat, lon, organizer, category, price, tags,
                  url, image_url, scraped_at, raw, content_hash)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24)
               ON CONFLICT DO NOTHING
               RETURNING id"#,
        )
        .bind(ev.source_id)
        .bind(ev.run_id)
        .bind(ev.source_event_id.as_deref().filter(|s| !s.is_empty()))
        .bind(&ev.title)
        .bind(&ev.description_html)
        .bind(ev.start_datetime)
        .bind(ev.end_datetime)
        .bind(&ev.timezone)
        .bind(&ev.venue_name)
        .bind(&ev.venue_address)
        .bind(&ev.city)
        .bind(&ev.region)
        .bind(&ev.country)
        .bind(ev.lat)
        .bind(ev.lon)
        .bind(&ev.organizer)
        .bind(&ev.category)
        .bind(&ev.price)
        .bind(&tags)
        .bind(&ev.url)
        .bind(&ev.image_url)
        .bind(ev.scraped_at)
        .bind(&ev.raw)
        .bind(&ev.content_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok((id, true))
    }

    async fn list_events_for_matching(&self, filter: EventMatchFilter) -> Result<EventRawStream> {
        let source_ids: Option<Vec<SourceId>> =
            (!filter.source_ids.is_empty()).then_some(filter.source_ids);
        let rows = sqlx::query_as::<_, EventRawRow>(
            r#"SELECT id, source_id, run_id, source_event_id, title, description_html,
                      start_datetime, end_datetime, timezone, venue_name, venue_address,
                      city, region, country, lat, lon, organizer, category, price, tags,
                      url, image_url, scraped_at, raw, content_hash
               FROM events_raw
               WHERE ($1::uuid[] IS NULL OR source_id = ANY($1))
                 AND ($2::timestamptz IS NULL OR start_datetime >= $2)
                 AND ($3::timestamptz IS NULL OR start_datetime < $3)
               ORDER BY start_datetime ASC"#,
        )
        .bind(source_ids.map(|ids| ids.into_iter().map(|i| i.as_uuid()).collect::<Vec<_>>()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch(&self.pool)
        .map_ok(EventRaw::from)
        .map_err(PipelineError::from)
        .boxed();

        Ok(rows)
    }

    async fn replace_open_matches(&self, new_matches: Vec<NewMatch>) -> Result<Vec<MatchId>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM matches WHERE status = 'open'")
            .execute(&mut *tx)
            .await?;

        let mut ids = Vec::with_capacity(new_matches.len());
        for m in new_matches {
            let (a, b) = if m.raw_id_a < m.raw_id_b {
                (m.raw_id_a, m.raw_id_b)
            } else {
                (m.raw_id_b, m.raw_id_a)
            };
            // Phase 6 (Matcher) already deduplicated pairs by max score, so
            // this insert should never collide with `matches_open_pair_idx`
            // within the same batch — the table was just cleared above.
            let id: MatchId = sqlx::query_scalar::<_, MatchId>(
                r#"INSERT INTO matches (raw_id_a, raw_id_b, score, reason, status, created_by)
                   VALUES ($1, $2, $3, $4, 'open', 'system')
                   RETURNING id"#,
            )
            .bind(a)
            .bind(b)
            .bind(m.score.clamp(0.0, 1.0))
            .bind(&m.reason)
            .fetch_one(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn list_matches(&self, status: Option<MatchStatus>, page: Page) -> Result<Vec<Match>> {
        let rows = sqlx::query_as::<_, MatchRow>(
            r#"SELECT id, raw_id_a, raw_id_b, score, reason, status, created_by, created_at
               FROM matches
               WHERE ($1::text IS NULL OR status = $1)
               ORDER BY created_at DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(status.map(|s| s.to_string()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Match::try_from).collect()
    }

    async fn set_match_status(&self, id: MatchId, status: MatchStatus) -> Result<()> {
        sqlx::query("UPDATE matches SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn settings(&self) -> Result<Settings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT feature_flags, credentials, prompt_text FROM settings WHERE id = true",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_settings(&self, patch: Settings) -> Result<Settings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"UPDATE settings SET
                 feature_flags = $1,
                 credentials = $2,
                 prompt_text = $3
               WHERE id = true
               RETURNING feature_flags, credentials, prompt_text"#,
        )
        .bind(serde_json::Value::Object(patch.feature_flags))
        .bind(serde_json::Value::Object(patch.credentials))
        .bind(patch.prompt_text)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_default_is_reasonable() {
        let p = Page::default();
        assert_eq!(p.limit, 50);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn event_match_filter_defaults_to_no_bounds() {
        let f = EventMatchFilter::default();
        assert!(f.source_ids.is_empty());
        assert!(f.from.is_none());
        assert!(f.to.is_none());
    }
}
