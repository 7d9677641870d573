//! Per-run append-only log stream, backed by Postgres. Spec §4.3.
//!
//! Grounded on `rootsignal-events`'s `EventStore`: `RETURNING seq`,
//! best-effort `pg_notify` fan-out, and a `Stream` subscription API. Unlike
//! that store this one doesn't need causal chaining or gap-free reads (each
//! append is independent), so it is simpler; it does implement the live
//! tail with a real `PgListener` rather than the polling placeholder the
//! teacher left as a Phase 1 stopgap.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use muster_common::RunId;
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::{PgPool, Row};
use tracing::warn;

use crate::error::Result;
use crate::types::{AppendEntry, LogLevel, RetentionPolicy, StoredEntry};

const NOTIFY_CHANNEL: &str = "muster_run_log";

pub type LogEntryStream = Pin<Box<dyn Stream<Item = Result<StoredEntry>> + Send>>;

#[async_trait]
pub trait LogBus: Send + Sync {
    async fn append(&self, entry: AppendEntry) -> Result<i64>;

    /// Delivers historical entries from `from_sequence` (inclusive, default
    /// 0) then follows live ones. The caller stops tailing simply by
    /// dropping the stream.
    async fn tail(&self, run_id: RunId, from_sequence: Option<i64>) -> Result<LogEntryStream>;

    async fn history(&self, run_id: RunId, limit: i64) -> Result<Vec<StoredEntry>>;
}

#[derive(Clone)]
pub struct PgLogBus {
    pool: PgPool,
    retention: RetentionPolicy,
}

impl PgLogBus {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        Ok(Self { pool, retention: RetentionPolicy::default() })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool, retention: RetentionPolicy::default() }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            muster_common::PipelineError::Other(anyhow::anyhow!("migration failed: {e}"))
        })?;
        Ok(())
    }

    async fn prune(&self, run_id: RunId) -> Result<()> {
        // Drop anything past the max age.
        sqlx::query(
            r#"DELETE FROM run_log_entries
               WHERE run_id = $1 AND ts < now() - $2::interval"#,
        )
        .bind(run_id)
        .bind(format!("{} seconds", self.retention.max_age.num_seconds()))
        .execute(&self.pool)
        .await?;

        // Keep only the newest `max_entries` rows for this run.
        sqlx::query(
            r#"DELETE FROM run_log_entries
               WHERE run_id = $1
                 AND seq <= COALESCE(
                     (SELECT seq FROM run_log_entries
                      WHERE run_id = $1
                      ORDER BY seq DESC
                      OFFSET $2 LIMIT 1),
                     -1
                 )"#,
        )
        .bind(run_id)
        .bind(self.retention.max_entries)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_from(&self, run_id: RunId, from_sequence: i64) -> Result<Vec<StoredEntry>> {
        let rows = sqlx::query(
            r#"SELECT seq, run_id, ts, level, source, msg, fields
               FROM run_log_entries
               WHERE run_id = $1 AND seq >= $2
               ORDER BY seq ASC"#,
        )
        .bind(run_id)
        .bind(from_sequence)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: sqlx::postgres::PgRow) -> Result<StoredEntry> {
    let level_str: String = row.try_get("level")?;
    let level = level_str
        .parse::<LogLevel>()
        .map_err(|_| muster_common::PipelineError::Validation(format!("bad stored level {level_str}")))?;

    Ok(StoredEntry {
        seq: row.try_get("seq")?,
        run_id: row.try_get("run_id")?,
        ts: row.try_get("ts")?,
        level,
        source: row.try_get("source")?,
        msg: row.try_get("msg")?,
        fields: row.try_get("fields")?,
    })
}

async fn notify_new_entry(pool: &PgPool, run_id: RunId, seq: i64) {
    let payload = format!("{run_id}:{seq}");
    if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
        .bind(NOTIFY_CHANNEL)
        .bind(&payload)
        .execute(pool)
        .await
    {
        warn!(error = %e, run_id = %run_id, seq, "pg_notify failed for log entry (non-fatal)");
    }
}

#[async_trait]
impl LogBus for PgLogBus {
    async fn append(&self, entry: AppendEntry) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"INSERT INTO run_log_entries (run_id, level, source, msg, fields)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING seq"#,
        )
        .bind(entry.run_id)
        .bind(entry.level.as_str())
        .bind(&entry.source)
        .bind(&entry.msg)
        .bind(&entry.fields)
        .fetch_one(&self.pool)
        .await?;

        let seq = row.0;
        notify_new_entry(&self.pool, entry.run_id, seq).await;

        if let Err(e) = self.prune(entry.run_id).await {
            warn!(error = %e, run_id = %entry.run_id, "log retention sweep failed (non-fatal)");
        }

        Ok(seq)
    }

    async fn history(&self, run_id: RunId, limit: i64) -> Result<Vec<StoredEntry>> {
        let rows = sqlx::query(
            r#"SELECT seq, run_id, ts, level, source, msg, fields
               FROM run_log_entries
               WHERE run_id = $1
               ORDER BY seq DESC
               LIMIT $2"#,
        )
        .bind(run_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut entries: Vec<StoredEntry> = rows.into_iter().map(row_to_entry).collect::<Result<_>>()?;
        entries.reverse();
        Ok(entries)
    }

    async fn tail(&self, run_id: RunId, from_sequence: Option<i64>) -> Result<LogEntryStream> {
        let pool = self.pool.clone();
        let mut cursor = from_sequence.unwrap_or(0);

        let backlog = self.fetch_from(run_id, cursor).await?;
        if let Some(last) = backlog.last() {
            cursor = last.seq + 1;
        }

        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(NOTIFY_CHANNEL).await?;

        let stream = async_stream::try_stream! {
            for entry in backlog {
                yield entry;
            }

            let mut notifications = listener.into_stream();
            while let Some(notification) = notifications.next().await {
                let notification = notification?;
                let payload = notification.payload();
                let Some((notified_run, notified_seq)) = payload.split_once(':') else {
                    continue;
                };
                if notified_run != run_id.to_string() {
                    continue;
                }
                let Ok(notified_seq) = notified_seq.parse::<i64>() else {
                    continue;
                };
                if notified_seq < cursor {
                    continue;
                }

                // Catch up on anything between the last seen seq and this
                // notification (covers notifications coalesced or missed
                // while the listener was reconnecting).
                let caught_up = fetch_catch_up(&pool, run_id, cursor).await?;
                for entry in caught_up {
                    cursor = entry.seq + 1;
                    yield entry;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

async fn fetch_catch_up(pool: &PgPool, run_id: RunId, from_sequence: i64) -> Result<Vec<StoredEntry>> {
    let rows = sqlx::query(
        r#"SELECT seq, run_id, ts, level, source, msg, fields
           FROM run_log_entries
           WHERE run_id = $1 AND seq >= $2
           ORDER BY seq ASC"#,
    )
    .bind(run_id)
    .bind(from_sequence)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_default_is_10k_entries_or_72h() {
        let r = RetentionPolicy::default();
        assert_eq!(r.max_entries, 10_000);
        assert_eq!(r.max_age, chrono::Duration::hours(72));
    }
}
