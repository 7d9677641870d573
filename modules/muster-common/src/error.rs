use thiserror::Error;

/// The error taxonomy from spec §7, independent of which component raised
/// it. The Queue Broker consults [`PipelineError::retryable`] to decide
/// retry vs. dead-letter; the Job API never leaks these verbatim, it maps
/// them to `{error, details?}`.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Network timeout, DB deadlock, broker blip. Retried with backoff.
    #[error("transient error: {0}")]
    Transient(String),

    /// The scraper module itself threw. Not retried — a bug isn't fixed by
    /// re-running it.
    #[error("module failure: {0}")]
    ModuleFailure(String),

    #[error("source inactive or missing")]
    SourceInactive,

    #[error("module not found for key {0}")]
    ModuleMissing(String),

    #[error("validation error: {0}")]
    Validation(String),

    /// Some event upserts failed; logged per-event, not fatal to the run.
    #[error("partial persistence: {saved}/{attempted} events saved")]
    PartialPersistence { saved: usize, attempted: usize },

    #[error("cancelled")]
    Cancelled,

    #[error("heartbeat timeout")]
    HeartbeatTimeout,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether the Queue Broker should retry a job that failed with this
    /// error, per the taxonomy in spec §7.
    pub fn retryable(&self) -> bool {
        matches!(self, PipelineError::Transient(_) | PipelineError::Database(_))
    }

    /// A short machine-readable reason code, used as `Run.errors.reason`
    /// and as the `error:<reason>` run status suffix (e.g. `error:cancelled`).
    pub fn reason_code(&self) -> &'static str {
        match self {
            PipelineError::Transient(_) => "transient",
            PipelineError::ModuleFailure(_) => "module_failure",
            PipelineError::SourceInactive => "source_inactive",
            PipelineError::ModuleMissing(_) => "module_not_found",
            PipelineError::Validation(_) => "validation",
            PipelineError::PartialPersistence { .. } => "partial_persistence",
            PipelineError::Cancelled => "cancelled",
            PipelineError::HeartbeatTimeout => "heartbeat_timeout",
            PipelineError::Database(_) => "database",
            PipelineError::Other(_) => "internal",
        }
    }

    /// Render as the structured JSON blob stored in `Run.errors`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "reason": self.reason_code(),
            "message": self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable_module_failure_is_not() {
        assert!(PipelineError::Transient("timeout".into()).retryable());
        assert!(!PipelineError::ModuleFailure("boom".into()).retryable());
        assert!(!PipelineError::Cancelled.retryable());
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(PipelineError::Cancelled.reason_code(), "cancelled");
        assert_eq!(PipelineError::HeartbeatTimeout.reason_code(), "heartbeat_timeout");
        assert_eq!(
            PipelineError::PartialPersistence { saved: 0, attempted: 3 }.reason_code(),
            "partial_persistence"
        );
    }
}
