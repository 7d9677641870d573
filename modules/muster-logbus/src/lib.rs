pub mod error;
pub mod store;
pub mod types;

pub use error::Result;
pub use store::{LogBus, LogEntryStream, PgLogBus};
pub use types::{AppendEntry, LogLevel, RetentionPolicy, StoredEntry};
