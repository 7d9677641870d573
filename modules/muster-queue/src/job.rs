use std::fmt;

use chrono::{DateTime, Utc};
use muster_common::ids::JobId;
use serde::{Deserialize, Serialize};

/// The three queues the worker pool drains, per spec §4.2 / §5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueName {
    Scrape,
    Match,
    Instagram,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [QueueName::Scrape, QueueName::Match, QueueName::Instagram];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Scrape => "scrape",
            QueueName::Match => "match",
            QueueName::Instagram => "instagram",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QueueName {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scrape" => Ok(QueueName::Scrape),
            "match" => Ok(QueueName::Match),
            "instagram" => Ok(QueueName::Instagram),
            other => Err(format!("unknown queue: {other}")),
        }
    }
}

/// The state a job is found in for `List`/`Counts`/`Clean`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Delayed => "delayed",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

/// Default max attempts before a job is dead-lettered (spec §4.2).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Starting backoff for `Nack` retries; doubles on every subsequent attempt.
pub const BASE_BACKOFF_SECONDS: i64 = 30;

#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub delay: Option<chrono::Duration>,
    pub job_id: Option<JobId>,
    pub max_attempts: Option<u32>,
}

/// A job as stored in Redis: queue, payload and retry bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(with = "queue_name_serde")]
    pub queue: QueueName,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
}

mod queue_name_serde {
    use super::QueueName;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(q: &QueueName, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(q.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<QueueName, D::Error> {
        let s = String::deserialize(d)?;
        QueueName::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Counts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: isize,
    pub offset: isize,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 50, offset: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn queue_name_round_trips() {
        for q in QueueName::ALL {
            assert_eq!(QueueName::from_str(q.as_str()).unwrap(), q);
        }
    }

    #[test]
    fn unknown_queue_name_is_rejected() {
        assert!(QueueName::from_str("bogus").is_err());
    }
}
