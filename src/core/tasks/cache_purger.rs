// src/core/tasks/cache_purger.rs

use crate::core::language_cache::LanguageCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Proactively drops expired language-cache entries so memory is reclaimed
/// even for conversations that are never read again.
pub struct LanguageCachePurgerTask {
    cache: Arc<LanguageCache>,
    interval: Duration,
}

impl LanguageCachePurgerTask {
    pub fn new(cache: Arc<LanguageCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Language cache purger task started.");
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let purged = self.cache.clean_expired();
                    if purged > 0 {
                        debug!("Language cache purger dropped {} expired entries.", purged);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Language cache purger task shutting down.");
                    return;
                }
            }
        }
    }
}
