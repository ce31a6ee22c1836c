// src/core/tasks/presence_sweeper.rs

use crate::core::presence::PresenceTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Periodically evicts presence entries that have seen no update for longer
/// than the configured idle limit, bounding the tracker's memory.
pub struct PresenceSweeperTask {
    presence: Arc<PresenceTracker>,
    interval: Duration,
    max_idle: Duration,
}

impl PresenceSweeperTask {
    pub fn new(presence: Arc<PresenceTracker>, interval: Duration, max_idle: Duration) -> Self {
        Self {
            presence,
            interval,
            max_idle,
        }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Presence sweeper task started.");
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let evicted = self.presence.sweep(self.max_idle);
                    if evicted > 0 {
                        debug!("Presence sweeper evicted {} idle entries.", evicted);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Presence sweeper task shutting down.");
                    return;
                }
            }
        }
    }
}
