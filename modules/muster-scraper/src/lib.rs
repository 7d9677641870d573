pub mod module;
pub mod normalizer;
pub mod registry;
pub mod runtime;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use module::{JobData, ModuleMetadata, RawEvent, RunContext, RunLogger, RunStats, ScraperModule, UploadedContent};
pub use normalizer::{normalize, Normalized};
pub use registry::ModuleRegistry;
pub use runtime::{RunOutcome, ScraperRuntime};
