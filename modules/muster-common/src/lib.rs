pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod types;

pub use config::Config;
pub use error::PipelineError;
pub use ids::{EventRawId, JobId, MatchId, RunId, SourceId};
