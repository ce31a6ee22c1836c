// src/server/spawner.rs

//! Spawns all of the gateway's long-running background tasks.

use super::metrics_server;
use crate::core::state::{GatewayInit, GatewayState};
use crate::core::tasks::{LanguageCachePurgerTask, PresenceSweeperTask, RoomPurgerTask};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Spawns every background task into the provided JoinSet.
pub async fn spawn_all(
    state: &Arc<GatewayState>,
    shutdown_tx: &broadcast::Sender<()>,
    background_tasks: &mut JoinSet<()>,
    init: GatewayInit,
) {
    let config = state.config.lock().await.clone();

    // --- Metrics Server ---
    if config.metrics.enabled {
        let metrics_state = state.clone();
        let shutdown_rx_metrics = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            metrics_server::run_metrics_server(metrics_state, shutdown_rx_metrics).await;
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    // --- Maintenance Tasks ---
    let sweeper = PresenceSweeperTask::new(
        state.presence.clone(),
        config.presence.sweep_interval,
        config.presence.max_idle,
    );
    let shutdown_rx_sweep = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        sweeper.run(shutdown_rx_sweep).await;
    });

    let cache_purger = LanguageCachePurgerTask::new(
        state.language_cache.clone(),
        config.language_cache.purge_interval,
    );
    let shutdown_rx_cache = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        cache_purger.run(shutdown_rx_cache).await;
    });

    let room_purger = RoomPurgerTask::new(state.rooms.clone(), config.rooms.purge_interval);
    let shutdown_rx_rooms = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        room_purger.run(shutdown_rx_rooms).await;
    });

    // --- Translation Fan-out Loop ---
    // Consumes the orchestrator's ready events and turns each one into a
    // room broadcast.
    let pipeline = state.pipeline.clone();
    let mut ready_rx = init.translation_ready_rx;
    let mut shutdown_rx_ready = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        loop {
            tokio::select! {
                maybe_ready = ready_rx.recv() => {
                    let Some(ready) = maybe_ready else {
                        info!("Translation ready stream ended.");
                        return;
                    };
                    if let Err(e) = pipeline
                        .broadcast_translation_ready(ready.message_id, &ready.target_language)
                        .await
                    {
                        warn!(message_id = %ready.message_id, "Translation fan-out failed: {e}");
                    }
                }
                _ = shutdown_rx_ready.recv() => {
                    info!("Translation fan-out loop shutting down.");
                    return;
                }
            }
        }
    });

    info!("All background tasks have been spawned.");
}
