pub mod dispatcher;
pub mod reconcile;
pub mod schedule;

pub use dispatcher::{Dispatcher, DispatcherConfig, TickStats};
