// src/server/mod.rs

//! Gateway startup and shutdown orchestration.

use crate::config::{Config, WorkerMode};
use crate::core::state::GatewayState;
use crate::core::storage::{MemoryStore, MessageStore};
use crate::core::translation::worker::{LoopbackWorkerChannel, TcpWorkerChannel, WorkerChannel};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, reload};

mod metrics_server;
mod spawner;

/// The main gateway startup function: connects the worker channel, builds
/// the shared state, spawns background tasks, and runs until a shutdown
/// signal arrives.
pub async fn run(
    config: Config,
    log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
) -> Result<()> {
    let store: Arc<dyn MessageStore> = Arc::new(MemoryStore::new());

    let (worker_channel, worker_events_rx): (Arc<dyn WorkerChannel>, _) = match config.worker.mode
    {
        WorkerMode::Tcp => {
            let (channel, events_rx) =
                TcpWorkerChannel::connect(&config.worker.request_addr, &config.worker.events_addr)
                    .await?;
            (channel, events_rx)
        }
        WorkerMode::Echo => {
            warn!("Worker mode is 'echo'; translations will be mirrored source text.");
            let (channel, events_rx) = LoopbackWorkerChannel::new(true);
            (channel, events_rx)
        }
    };

    let init = GatewayState::initialize(
        config,
        store,
        worker_channel,
        worker_events_rx,
        log_reload_handle,
    )?;
    let state = init.state.clone();
    state.orchestrator.initialize().await;
    info!(run_id = %state.run_id, "Gateway state initialized.");

    let (shutdown_tx, _) = broadcast::channel(1);
    let mut background_tasks: JoinSet<()> = JoinSet::new();
    spawner::spawn_all(&state, &shutdown_tx, &mut background_tasks, init).await;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping gateway.");

    let _ = shutdown_tx.send(());
    state.orchestrator.close().await;
    while background_tasks.join_next().await.is_some() {}

    info!("Gateway shut down cleanly.");
    Ok(())
}
