//! Bounded pool of headless-browser contexts. Spec §4.5.
//!
//! `browserless-client` is a thin stateless HTTP wrapper around Browserless's
//! `/content` endpoint — there's no local browser process to hold open, so a
//! "context" here is a concurrency slot (an `OwnedSemaphorePermit`) rather
//! than a live page handle. Checkout/release still follows
//! `rootsignal-scout/src/pipeline/scraper.rs`'s `ChromeScraper`
//! (`tokio::sync::Semaphore`-bounded concurrency); a failed `content` call
//! simply drops the permit like any other checkout, which is this client's
//! analogue of "discard and lazily recreate" since there's no persistent
//! state to actually discard.

use std::sync::Arc;

use browserless_client::BrowserlessClient;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::info;

use crate::error::{BrowserPoolError, Result};

const DEFAULT_POOL_SIZE: usize = 3;

pub struct BrowserPool {
    client: Arc<BrowserlessClient>,
    semaphore: Arc<Semaphore>,
}

impl BrowserPool {
    pub fn new(client: BrowserlessClient) -> Self {
        Self::with_size(client, DEFAULT_POOL_SIZE)
    }

    pub fn with_size(client: BrowserlessClient, size: usize) -> Self {
        info!(size, "browser pool initialized");
        Self { client: Arc::new(client), semaphore: Arc::new(Semaphore::new(size.max(1))) }
    }

    /// Obtains a fresh page from an available context; blocks respecting
    /// `shutdown`.
    pub async fn checkout(
        &self,
        shutdown: &mut tokio::sync::watch::Receiver<bool>,
    ) -> Result<PooledPage> {
        let permit = tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| BrowserPoolError::Cancelled)?
            }
            _ = shutdown.changed() => return Err(BrowserPoolError::Cancelled),
        };

        Ok(PooledPage { _permit: permit, client: self.client.clone() })
    }
}

/// A checked-out page. Dropping it returns the context to the pool.
pub struct PooledPage {
    _permit: OwnedSemaphorePermit,
    client: Arc<BrowserlessClient>,
}

impl PooledPage {
    pub async fn content(&self, url: &str) -> Result<String> {
        Ok(self.client.content(url).await?)
    }

    /// Explicit release, for callers that want to free the slot before the
    /// page handle naturally goes out of scope.
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checkout_blocks_when_pool_is_exhausted_then_releases() {
        let client = BrowserlessClient::new("http://localhost:1", None);
        let pool = BrowserPool::with_size(client, 1);
        let (_tx, mut rx) = tokio::sync::watch::channel(false);

        let page = pool.checkout(&mut rx).await.unwrap();
        assert_eq!(pool.semaphore.available_permits(), 0);

        page.release();
        assert_eq!(pool.semaphore.available_permits(), 1);
    }
}
