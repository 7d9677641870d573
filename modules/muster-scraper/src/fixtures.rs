//! A deterministic, network-free module used to exercise the Scraper
//! Runtime's protocol (step ordering, page release, run finalization). Not
//! a real per-source module — see `module.rs`'s doc comment for why this
//! crate doesn't ship real per-site scraping logic.

use async_trait::async_trait;
use muster_common::types::PaginationType;

use crate::module::{ModuleMetadata, RawEvent, RunContext, ScraperModule};

/// Returns a fixed, canned set of events (or throws, or stalls) depending
/// on `jobData.testMode` and the events it was constructed with — lets
/// runtime tests drive every row of the failure-semantics table without a
/// real browser or network.
pub struct FixtureModule {
    metadata: ModuleMetadata,
    events: Vec<RawEvent>,
    fail: bool,
}

impl FixtureModule {
    pub fn new(key: impl Into<String>, events: Vec<RawEvent>) -> Self {
        let key = key.into();
        Self {
            metadata: ModuleMetadata {
                label: key.clone(),
                key,
                start_urls: vec!["https://example.com/events".into()],
                pagination_type: PaginationType::None,
                integration_tags: vec!["fixture".into()],
            },
            events,
            fail: false,
        }
    }

    /// A module variant that always throws, for exercising the
    /// `module throws → error, no events persisted` row.
    pub fn failing(key: impl Into<String>) -> Self {
        let mut m = Self::new(key, vec![]);
        m.fail = true;
        m
    }
}

#[async_trait]
impl ScraperModule for FixtureModule {
    fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    async fn run(&self, ctx: &mut RunContext) -> anyhow::Result<Vec<RawEvent>> {
        ctx.record_page();
        if self.fail {
            anyhow::bail!("fixture module configured to fail");
        }
        Ok(self.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_key_matches_constructor() {
        let m = FixtureModule::new("fixture_a", vec![]);
        assert_eq!(m.metadata().key, "fixture_a");
    }
}
