use std::sync::Arc;

use muster_common::Config;
use muster_logbus::LogBus;
use muster_queue::QueueBroker;
use muster_store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn QueueBroker>,
    pub log_bus: Arc<dyn LogBus>,
    pub config: Config,
}
