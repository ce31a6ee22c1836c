// src/core/presence.rs

//! Write-behind presence tracking with two independently throttled policies.
//!
//! Activity updates (heartbeats, reads, typing) and connection updates
//! (login, socket connect) share the same write path but live in disjoint
//! key namespaces, so the two throttle windows never interfere. Persistence
//! is fire-and-forget: a failed write is logged and forgotten, never
//! surfaced to the caller.

use crate::core::message::ParticipantId;
use crate::core::metrics;
use crate::core::storage::MessageStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Which throttle policy a presence update falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceKind {
    Activity,
    Connection,
}

impl PresenceKind {
    fn label(self) -> &'static str {
        match self {
            PresenceKind::Activity => "activity",
            PresenceKind::Connection => "connection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PresenceKey {
    kind: PresenceKind,
    identity: ParticipantId,
}

#[derive(Debug, Clone)]
struct PresenceEntry {
    /// When the last unthrottled update was recorded. Drives both the
    /// throttle window and sweeper eviction.
    last_write: Instant,
    last_seen: DateTime<Utc>,
}

/// Dual-throttle presence tracker.
pub struct PresenceTracker {
    entries: DashMap<PresenceKey, PresenceEntry>,
    store: Arc<dyn MessageStore>,
    activity_window: Duration,
    connection_window: Duration,
    throttled: AtomicU64,
}

impl PresenceTracker {
    pub fn new(
        store: Arc<dyn MessageStore>,
        activity_window: Duration,
        connection_window: Duration,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            store,
            activity_window,
            connection_window,
            throttled: AtomicU64::new(0),
        }
    }

    /// Records detectable activity (heartbeat, API call, typing, read).
    /// Returns true if the update was recorded, false if throttled.
    pub fn record_activity(&self, identity: &ParticipantId) -> bool {
        self.record(identity, PresenceKind::Activity, false)
    }

    /// Records a significant connection event (login, socket connect).
    pub fn record_connection(&self, identity: &ParticipantId) -> bool {
        self.record(identity, PresenceKind::Connection, false)
    }

    /// Bypasses throttling for connect/disconnect transitions where the
    /// update must not be suppressed.
    pub fn force_update(&self, identity: &ParticipantId) {
        self.record(identity, PresenceKind::Connection, true);
    }

    fn record(&self, identity: &ParticipantId, kind: PresenceKind, force: bool) -> bool {
        let window = match kind {
            PresenceKind::Activity => self.activity_window,
            PresenceKind::Connection => self.connection_window,
        };
        let key = PresenceKey {
            kind,
            identity: identity.clone(),
        };

        // A first-ever update always passes the throttle.
        if let Some(entry) = self.entries.get(&key) {
            if !force && entry.last_write.elapsed() < window {
                drop(entry);
                self.throttled.fetch_add(1, Ordering::Relaxed);
                metrics::PRESENCE_THROTTLED_TOTAL
                    .with_label_values(&[kind.label()])
                    .inc();
                return false;
            }
        }

        let now = Utc::now();
        self.entries.insert(
            key,
            PresenceEntry {
                last_write: Instant::now(),
                last_seen: now,
            },
        );

        // Non-blocking write-behind persistence.
        let store = self.store.clone();
        let identity = identity.clone();
        tokio::spawn(async move {
            if let Err(e) = store.record_presence(&identity, kind, now).await {
                warn!(%identity, "Failed to persist presence update: {e}");
            }
        });
        true
    }

    /// The last recorded activity timestamp for an identity, if cached.
    pub fn last_seen(&self, identity: &ParticipantId) -> Option<DateTime<Utc>> {
        self.entries
            .get(&PresenceKey {
                kind: PresenceKind::Activity,
                identity: identity.clone(),
            })
            .map(|e| e.last_seen)
    }

    /// Evicts entries whose last update is older than `max_age`, returning
    /// the eviction count. Called periodically by the background sweeper to
    /// bound memory; independent of the throttle windows.
    pub fn sweep(&self, max_age: Duration) -> usize {
        // Counted inside the closure; concurrent inserts during the retain
        // would make a before/after length difference meaningless.
        let mut evicted = 0;
        self.entries.retain(|_, entry| {
            if entry.last_write.elapsed() > max_age {
                evicted += 1;
                false
            } else {
                true
            }
        });
        if evicted > 0 {
            metrics::PRESENCE_EVICTED_TOTAL.inc_by(evicted as f64);
            debug!("Presence sweep evicted {} stale entries.", evicted);
        }
        evicted
    }

    /// How many updates throttling has suppressed since startup.
    pub fn throttled_count(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }

    /// The number of cached presence entries across both namespaces.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}
