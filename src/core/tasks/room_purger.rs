// src/core/tasks/room_purger.rs

use crate::core::rooms::RoomBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Periodically removes rooms and personal channels that have lost all of
/// their subscribers.
pub struct RoomPurgerTask {
    rooms: Arc<RoomBus>,
    interval: Duration,
}

impl RoomPurgerTask {
    pub fn new(rooms: Arc<RoomBus>, interval: Duration) -> Self {
        Self { rooms, interval }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Room purger task started.");
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let purged = self.rooms.purge_empty();
                    if purged > 0 {
                        debug!("Room purger removed {} empty channels.", purged);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Room purger task shutting down.");
                    return;
                }
            }
        }
    }
}
