use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use muster_common::RunId;
use serde::{Deserialize, Serialize};

/// Severity of a log line, per spec §4.3 (`trace..fatal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }

    /// Numeric severity used on the log-stream wire format (spec §6):
    /// `10/20/30/40/50/60` for `trace/debug/info/warn/error/fatal`.
    pub fn wire_code(&self) -> u16 {
        match self {
            LogLevel::Trace => 10,
            LogLevel::Debug => 20,
            LogLevel::Info => 30,
            LogLevel::Warn => 40,
            LogLevel::Error => 50,
            LogLevel::Fatal => 60,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = muster_common::PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(muster_common::PipelineError::Validation(format!(
                "unknown log level: {other}"
            ))),
        }
    }
}

/// A log line as submitted by a caller (no `seq`/`ts` yet — the store
/// assigns those on append).
#[derive(Debug, Clone)]
pub struct AppendEntry {
    pub run_id: RunId,
    pub level: LogLevel,
    pub source: String,
    pub msg: String,
    pub fields: serde_json::Value,
}

/// A log line as it comes back out of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub seq: i64,
    pub run_id: RunId,
    pub ts: DateTime<Utc>,
    pub level: LogLevel,
    pub source: String,
    pub msg: String,
    pub fields: serde_json::Value,
}

/// How long a run's log entries stick around before being pruned. Spec
/// §4.3: "last N entries per run (default 10k) or M hours, whichever
/// smaller."
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub max_entries: i64,
    pub max_age: chrono::Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { max_entries: 10_000, max_age: chrono::Duration::hours(72) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_round_trips() {
        for lvl in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
            LogLevel::Fatal,
        ] {
            assert_eq!(LogLevel::from_str(lvl.as_str()).unwrap(), lvl);
        }
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        assert!(LogLevel::from_str("bogus").is_err());
    }

    #[test]
    fn wire_codes_match_spec() {
        assert_eq!(LogLevel::Trace.wire_code(), 10);
        assert_eq!(LogLevel::Debug.wire_code(), 20);
        assert_eq!(LogLevel::Info.wire_code(), 30);
        assert_eq!(LogLevel::Warn.wire_code(), 40);
        assert_eq!(LogLevel::Error.wire_code(), 50);
        assert_eq!(LogLevel::Fatal.wire_code(), 60);
    }
}
