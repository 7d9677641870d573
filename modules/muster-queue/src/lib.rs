pub mod broker;
pub mod error;
pub mod job;

pub use broker::{QueueBroker, RedisQueueBroker};
pub use error::{QueueError, Result};
pub use job::{
    Counts, EnqueueOptions, Job, JobState, Page, QueueName, BASE_BACKOFF_SECONDS,
    DEFAULT_MAX_ATTEMPTS,
};
