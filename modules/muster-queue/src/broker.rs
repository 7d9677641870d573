//! Redis-backed multi-queue broker. Spec §4.2: durable delivery with
//! retries, dead-lettering and delayed jobs.
//!
//! Key scheme (per queue `q`):
//! - `muster:{q}:jobs`      ZSET member=jobId score=readyAt  (waiting+delayed)
//! - `muster:{q}:active`    ZSET member=jobId score=leaseExpiresAt
//! - `muster:{q}:completed` ZSET member=jobId score=completedAt
//! - `muster:{q}:failed`    ZSET member=jobId score=deadLetteredAt
//! - `muster:job:{id}`      HASH queue/payload/attempts/max_attempts/created_at

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use muster_common::ids::JobId;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::{QueueError, Result};
use crate::job::{Counts, EnqueueOptions, Job, JobState, Page, QueueName, BASE_BACKOFF_SECONDS, DEFAULT_MAX_ATTEMPTS};

const COMPLETED_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_LEASE_SECONDS: i64 = 600;
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

fn now_secs() -> i64 {
    Utc::now().timestamp()
}

fn jobs_key(q: QueueName) -> String {
    format!("muster:{q}:jobs")
}
fn active_key(q: QueueName) -> String {
    format!("muster:{q}:active")
}
fn completed_key(q: QueueName) -> String {
    format!("muster:{q}:completed")
}
fn failed_key(q: QueueName) -> String {
    format!("muster:{q}:failed")
}
fn job_key(id: &JobId) -> String {
    format!("muster:job:{id}")
}

/// Durable multi-queue job delivery. One trait so callers (Job API, worker
/// pool, Dispatcher) depend on an interface rather than a concrete Redis
/// connection.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    async fn enqueue(
        &self,
        queue: QueueName,
        payload: serde_json::Value,
        opts: EnqueueOptions,
    ) -> Result<JobId>;

    /// Blocks (polling, respecting `shutdown`) until a job is ready or the
    /// broker is told to shut down.
    async fn dequeue(
        &self,
        queue: QueueName,
        shutdown: &mut tokio::sync::watch::Receiver<bool>,
    ) -> Result<Option<Job>>;

    async fn ack(&self, job: &Job) -> Result<()>;
    async fn nack(&self, job: &Job, err: &str) -> Result<()>;

    async fn counts(&self, queue: QueueName) -> Result<Counts>;
    async fn list(&self, queue: QueueName, state: JobState, page: Page) -> Result<Vec<Job>>;
    async fn retry(&self, queue: QueueName, job_id: &JobId) -> Result<()>;
    async fn clean(&self, queue: QueueName, state: JobState, older_than: DateTime<Utc>) -> Result<u64>;

    /// Return leased jobs whose worker never acked/nacked within the lease
    /// window back to `waiting`, incrementing their attempt count. Spec
    /// §4.2: "if the worker crashes, a heartbeat-timeout returns the job to
    /// `waiting`."
    async fn reclaim_expired_leases(&self, queue: QueueName) -> Result<u64>;
}

#[derive(Clone)]
pub struct RedisQueueBroker {
    conn: ConnectionManager,
    lease_seconds: i64,
    poll_interval: std::time::Duration,
}

impl RedisQueueBroker {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            lease_seconds: DEFAULT_LEASE_SECONDS,
            poll_interval: std::time::Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        })
    }

    pub fn with_lease_seconds(mut self, seconds: i64) -> Self {
        self.lease_seconds = seconds;
        self
    }

    async fn load_job(&self, id: &JobId) -> Result<Option<Job>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(job_key(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let queue = fields
            .get("queue")
            .and_then(|s| QueueName::from_str(s).ok())
            .ok_or_else(|| QueueError::Other(anyhow::anyhow!("job {id} missing queue field")))?;
        let payload: serde_json::Value = fields
            .get("payload")
            .map(|p| serde_json::from_str(p))
            .transpose()
            .map_err(|e| QueueError::Other(e.into()))?
            .unwrap_or(serde_json::Value::Null);
        let attempts: u32 = fields.get("attempts").and_then(|s| s.parse().ok()).unwrap_or(0);
        let max_attempts: u32 = fields
            .get("max_attempts")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let created_at = fields
            .get("created_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Some(Job {
            id: id.clone(),
            queue,
            payload,
            attempts,
            max_attempts,
            created_at,
        }))
    }

    async fn try_claim(&self, queue: QueueName) -> Result<Option<Job>> {
        let mut conn = self.conn.clone();
        let now = now_secs();
        let candidates: Vec<String> = conn
            .zrangebyscore_limit(jobs_key(queue), "-inf", now, 0, 10)
            .await?;

        for id_str in candidates {
            let removed: i64 = conn.zrem(jobs_key(queue), &id_str).await?;
            if removed != 1 {
                // Another worker claimed it first.
                continue;
            }
            let id = JobId::from(id_str);
            match self.load_job(&id).await? {
                Some(job) => {
                    let lease_until = now_secs() + self.lease_seconds;
                    let _: () = conn.zadd(active_key(queue), id.to_string(), lease_until as f64).await?;
                    return Ok(Some(job));
                }
                None => {
                    warn!(job_id = %id, "claimed job id with no hash record, dropping");
                    continue;
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl QueueBroker for RedisQueueBroker {
    async fn enqueue(
        &self,
        queue: QueueName,
        payload: serde_json::Value,
        opts: EnqueueOptions,
    ) -> Result<JobId> {
        let job_id = opts.job_id.unwrap_or_else(JobId::new_random);
        let mut conn = self.conn.clone();

        let exists: bool = conn.exists(job_key(&job_id)).await?;
        if exists {
            return Ok(job_id);
        }

        let created_at = Utc::now();
        let max_attempts = opts.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let payload_str = serde_json::to_string(&payload).map_err(|e| QueueError::Other(e.into()))?;

        let _: () = conn
            .hset_multiple(
                job_key(&job_id),
                &[
                    ("queue", queue.as_str().to_string()),
                    ("payload", payload_str),
                    ("attempts", "0".to_string()),
                    ("max_attempts", max_attempts.to_string()),
                    ("created_at", created_at.to_rfc3339()),
                ],
            )
            .await?;

        let ready_at = created_at + opts.delay.unwrap_or_else(ChronoDuration::zero);
        let _: () = conn.zadd(jobs_key(queue), job_id.to_string(), ready_at.timestamp() as f64).await?;

        Ok(job_id)
    }

    async fn dequeue(
        &self,
        queue: QueueName,
        shutdown: &mut tokio::sync::watch::Receiver<bool>,
    ) -> Result<Option<Job>> {
        loop {
            if let Some(job) = self.try_claim(queue).await? {
                return Ok(Some(job));
            }
            tokio::select! {
                _ = shutdown.changed() => return Ok(None),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn ack(&self, job: &Job) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zrem(active_key(job.queue), job.id.to_string()).await?;
        let _: () = conn.zadd(completed_key(job.queue), job.id.to_string(), now_secs() as f64).await?;
        let _: () = conn.hset(job_key(&job.id), "completed_at", Utc::now().to_rfc3339()).await?;
        let _: () = conn.expire(job_key(&job.id), COMPLETED_TTL_SECONDS).await?;
        Ok(())
    }

    async fn nack(&self, job: &Job, err: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.zrem(active_key(job.queue), job.id.to_string()).await?;

        let attempts = job.attempts + 1;
        let _: () = conn.hset(job_key(&job.id), "attempts", attempts.to_string()).await?;
        let _: () = conn.hset(job_key(&job.id), "last_error", err).await?;

        if attempts >= job.max_attempts {
            let _: () = conn.zadd(failed_key(job.queue), job.id.to_string(), now_secs() as f64).await?;
        } else {
            let backoff = BASE_BACKOFF_SECONDS * 2i64.pow(attempts.saturating_sub(1));
            let ready_at = now_secs() + backoff;
            let _: () = conn.zadd(jobs_key(job.queue), job.id.to_string(), ready_at as f64).await?;
        }
        Ok(())
    }

    async fn counts(&self, queue: QueueName) -> Result<Counts> {
        let mut conn = self.conn.clone();
        let now = now_secs();
        let waiting: u64 = conn.zcount(jobs_key(queue), "-inf", now).await?;
        let delayed: u64 = conn.zcount(jobs_key(queue), now + 1, "+inf").await?;
        let active: u64 = conn.zcard(active_key(queue)).await?;
        let completed: u64 = conn.zcard(completed_key(queue)).await?;
        let failed: u64 = conn.zcard(failed_key(queue)).await?;
        Ok(Counts { waiting, active, completed, failed, delayed })
    }

    async fn list(&self, queue: QueueName, state: JobState, page: Page) -> Result<Vec<Job>> {
        let mut conn = self.conn.clone();
        let now = now_secs();

        let ids: Vec<String> = match state {
            JobState::Waiting => {
                conn.zrangebyscore_limit(jobs_key(queue), "-inf", now, page.offset, page.limit).await?
            }
            JobState::Delayed => {
                conn.zrangebyscore_limit(jobs_key(queue), now + 1, "+inf", page.offset, page.limit).await?
            }
            JobState::Active => conn.zrange(active_key(queue), page.offset, page.offset + page.limit - 1).await?,
            JobState::Completed => conn.zrevrange(completed_key(queue), page.offset, page.offset + page.limit - 1).await?,
            JobState::Failed => conn.zrevrange(failed_key(queue), page.offset, page.offset + page.limit - 1).await?,
        };

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = self.load_job(&JobId::from(id)).await? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    async fn retry(&self, queue: QueueName, job_id: &JobId) -> Result<()> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.zrem(failed_key(queue), job_id.to_string()).await?;
        if removed == 0 {
            return Err(QueueError::JobNotFound(job_id.to_string()));
        }
        let _: () = conn.hset(job_key(job_id), "attempts", "0").await?;
        let _: () = conn.zadd(jobs_key(queue), job_id.to_string(), now_secs() as f64).await?;
        Ok(())
    }

    async fn clean(&self, queue: QueueName, state: JobState, older_than: DateTime<Utc>) -> Result<u64> {
        let key = match state {
            JobState::Completed => completed_key(queue),
            JobState::Failed => failed_key(queue),
            other => {
                return Err(QueueError::Other(anyhow::anyhow!(
                    "clean only supports completed/failed states, got {}",
                    other.as_str()
                )))
            }
        };
        let mut conn = self.conn.clone();
        let cutoff = older_than.timestamp();
        let ids: Vec<String> = conn.zrangebyscore(&key, "-inf", cutoff).await?;
        for id in &ids {
            let _: () = conn.del(job_key(&JobId::from(id.clone()))).await?;
        }
        let removed: u64 = conn.zremrangebyscore(&key, "-inf", cutoff).await?;
        Ok(removed)
    }

    async fn reclaim_expired_leases(&self, queue: QueueName) -> Result<u64> {
        let mut conn = self.conn.clone();
        let now = now_secs();
        let expired: Vec<String> = conn.zrangebyscore(active_key(queue), "-inf", now).await?;
        let mut reclaimed = 0u64;
        for id_str in expired {
            let removed: i64 = conn.zrem(active_key(queue), &id_str).await?;
            if removed != 1 {
                continue;
            }
            let id = JobId::from(id_str);
            let attempts: u32 = conn
                .hget::<_, _, Option<String>>(job_key(&id), "attempts")
                .await?
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let _: () = conn.hset(job_key(&id), "attempts", (attempts + 1).to_string()).await?;
            let _: () = conn.zadd(jobs_key(queue), id.to_string(), now_secs() as f64).await?;
            reclaimed += 1;
        }
        Ok(reclaimed)
    }
}
