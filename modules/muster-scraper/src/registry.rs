//! Discovers scraper modules at startup and exposes lookup by `moduleKey`.
//! Spec §4.6.

use std::collections::HashMap;
use std::sync::Arc;

use muster_common::PipelineError;

use crate::module::ScraperModule;

#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn ScraperModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module. Panics on a duplicate key — two modules
    /// claiming the same `moduleKey` is a startup-time configuration bug,
    /// not a runtime condition to recover from.
    pub fn register(&mut self, module: Arc<dyn ScraperModule>) {
        let key = module.metadata().key.clone();
        if self.modules.insert(key.clone(), module).is_some() {
            panic!("duplicate scraper module key: {key}");
        }
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn ScraperModule>, PipelineError> {
        self.modules.get(key).cloned().ok_or_else(|| PipelineError::ModuleMissing(key.to_string()))
    }

    pub fn keys(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleMetadata, RawEvent, RunContext};
    use async_trait::async_trait;
    use muster_common::types::PaginationType;

    struct NoopModule(ModuleMetadata);

    #[async_trait]
    impl ScraperModule for NoopModule {
        fn metadata(&self) -> &ModuleMetadata {
            &self.0
        }

        async fn run(&self, _ctx: &mut RunContext) -> anyhow::Result<Vec<RawEvent>> {
            Ok(vec![])
        }
    }

    fn meta(key: &str) -> ModuleMetadata {
        ModuleMetadata {
            key: key.into(),
            label: key.into(),
            start_urls: vec![],
            pagination_type: PaginationType::None,
            integration_tags: vec![],
        }
    }

    #[test]
    fn lookup_by_key_succeeds_and_missing_key_errors() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(NoopModule(meta("generic_calendar"))));

        assert!(registry.get("generic_calendar").is_ok());
        assert!(matches!(registry.get("bogus"), Err(PipelineError::ModuleMissing(_))));
    }

    #[test]
    #[should_panic(expected = "duplicate scraper module key")]
    fn duplicate_key_panics() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(NoopModule(meta("dup"))));
        registry.register(Arc::new(NoopModule(meta("dup"))));
    }
}
