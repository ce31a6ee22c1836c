// src/core/state/core.rs

//! Defines `GatewayState`, the central shared context of the gateway, and
//! its factory function.

use crate::config::Config;
use crate::connection::{ConnectionId, Disconnection, Session, SessionRegistry};
use crate::core::GatewayError;
use crate::core::language_cache::LanguageCache;
use crate::core::pipeline::BroadcastPipeline;
use crate::core::presence::PresenceTracker;
use crate::core::rooms::{RoomBus, RoomEvent};
use crate::core::state::stats::{StatsSnapshot, StatsState};
use crate::core::storage::MessageStore;
use crate::core::translation::orchestrator::{
    OrchestratorConfig, TranslationOrchestrator, TranslationReady,
};
use crate::core::translation::protocol::WorkerEvent;
use crate::core::translation::worker::WorkerChannel;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing_subscriber::{EnvFilter, reload};

/// The result of a successful state initialization: the shared state plus
/// the channel ends consumed by background tasks.
pub struct GatewayInit {
    pub state: Arc<GatewayState>,
    /// One event per persisted translation, consumed by the fan-out loop.
    pub translation_ready_rx: mpsc::Receiver<TranslationReady>,
}

/// The shared context every subsystem and background task operates on.
pub struct GatewayState {
    /// The live configuration, lockable for runtime inspection and the
    /// dynamic log level switch.
    pub config: Arc<Mutex<Config>>,
    pub registry: SessionRegistry,
    pub presence: Arc<PresenceTracker>,
    pub language_cache: Arc<LanguageCache>,
    pub rooms: Arc<RoomBus>,
    pub store: Arc<dyn MessageStore>,
    pub orchestrator: Arc<TranslationOrchestrator>,
    pub pipeline: Arc<BroadcastPipeline>,
    pub stats: Arc<StatsState>,
    /// A unique id for this gateway process, stamped into logs and the
    /// stats endpoint.
    pub run_id: String,
    /// A handle to the logging filter, allowing dynamic log level changes.
    pub log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
}

impl GatewayState {
    /// Assembles the full gateway context around an already-connected worker
    /// channel. The orchestrator is constructed but not started; the caller
    /// invokes `initialize` on it once background tasks are ready.
    pub fn initialize(
        config: Config,
        store: Arc<dyn MessageStore>,
        worker_channel: Arc<dyn WorkerChannel>,
        worker_events_rx: mpsc::Receiver<WorkerEvent>,
        log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
    ) -> Result<GatewayInit, GatewayError> {
        let mut run_id_bytes = [0u8; 20];
        getrandom::fill(&mut run_id_bytes).map_err(|e| GatewayError::Internal(e.to_string()))?;
        let run_id = hex::encode(run_id_bytes);

        let stats = Arc::new(StatsState::new());
        let language_cache = Arc::new(LanguageCache::new(
            config.language_cache.ttl,
            config.language_cache.max_entries,
        ));
        let presence = Arc::new(PresenceTracker::new(
            store.clone(),
            config.presence.activity_throttle,
            config.presence.connection_throttle,
        ));
        let rooms = Arc::new(RoomBus::new());

        let (orchestrator, translation_ready_rx) = TranslationOrchestrator::new(
            store.clone(),
            language_cache.clone(),
            worker_channel,
            worker_events_rx,
            stats.clone(),
            OrchestratorConfig {
                task_timeout: config.worker.task_timeout,
                direct_timeout: config.worker.direct_timeout,
                default_model: config.worker.default_model,
                max_translation_length: config.worker.max_translation_length,
            },
        );

        let pipeline = Arc::new(BroadcastPipeline::new(
            store.clone(),
            rooms.clone(),
            orchestrator.clone(),
            stats.clone(),
            config.limits.max_message_length,
        ));

        let state = Arc::new(Self {
            config: Arc::new(Mutex::new(config)),
            registry: SessionRegistry::new(),
            presence,
            language_cache,
            rooms,
            store,
            orchestrator,
            pipeline,
            stats,
            run_id,
            log_reload_handle,
        });

        Ok(GatewayInit {
            state,
            translation_ready_rx,
        })
    }

    /// Registers a live connection and records the presence write. When this
    /// is the identity's first session, watchers on its personal channel are
    /// told it came online.
    pub fn register_session(&self, session: Session) {
        let identity = session.identity.clone();
        self.registry.connect(session);
        self.presence.record_connection(&identity);

        if self.registry.sessions_for(&identity).len() == 1 {
            self.rooms.publish_to_user(
                &identity,
                RoomEvent::PresenceChanged {
                    identity: identity.clone(),
                    online: true,
                },
            );
        }
    }

    /// Removes a connection. On the identity's last session the presence
    /// timestamp is flushed unthrottled and the offline transition is
    /// published; otherwise the remaining sessions keep the identity online.
    pub fn unregister_session(&self, connection_id: ConnectionId) -> Option<Disconnection> {
        let disconnection = self.registry.disconnect(connection_id)?;

        if disconnection.last_session {
            self.presence.force_update(&disconnection.identity);
            self.rooms.publish_to_user(
                &disconnection.identity,
                RoomEvent::PresenceChanged {
                    identity: disconnection.identity.clone(),
                    online: false,
                },
            );
        } else {
            self.presence.record_activity(&disconnection.identity);
        }

        Some(disconnection)
    }

    /// The stats-endpoint payload: the counter snapshot stamped with this
    /// process's run id.
    pub fn stats_report(&self) -> StatsReport {
        StatsReport {
            run_id: self.run_id.clone(),
            counters: self.stats.snapshot(),
        }
    }
}

/// The JSON body served by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub run_id: String,
    #[serde(flatten)]
    pub counters: StatsSnapshot,
}
