// src/connection/registry.rs

//! The in-memory registry mapping connections to identities and back.

use super::{ConnectionId, Session};
use crate::core::message::ParticipantId;
use crate::core::metrics;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The result of removing a connection from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnection {
    /// The identity the connection belonged to.
    pub identity: ParticipantId,
    /// True if this was the identity's last live session, i.e. the
    /// "all devices offline" transition.
    pub last_session: bool,
}

/// Both directions of the session mapping, guarded by a single lock so that
/// no caller can ever observe one map updated and the other not.
#[derive(Debug, Default)]
struct RegistryInner {
    /// identity -> set of live connections (multi-device).
    forward: HashMap<ParticipantId, HashSet<ConnectionId>>,
    /// connection -> full session state, including the owning identity.
    reverse: HashMap<ConnectionId, Session>,
}

/// Owns the bidirectional connection/identity mapping.
///
/// All mutation goes through `connect`/`disconnect`; nothing else in the
/// crate can touch the underlying maps, which is what keeps the dual-map
/// invariant enforceable in one place.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a session in both maps. Idempotent per connection id: a
    /// second `connect` for an already-known connection is a no-op.
    pub fn connect(&self, session: Session) {
        let mut inner = self.inner.write();
        if inner.reverse.contains_key(&session.connection_id) {
            debug!(
                connection_id = session.connection_id,
                "Duplicate connect ignored."
            );
            return;
        }
        inner
            .forward
            .entry(session.identity.clone())
            .or_default()
            .insert(session.connection_id);
        inner.reverse.insert(session.connection_id, session);
        metrics::CONNECTED_SESSIONS.set(inner.reverse.len() as f64);
    }

    /// Removes a session from both maps. Returns `None` for an unknown
    /// connection id, otherwise reports whether the identity just went
    /// fully offline.
    pub fn disconnect(&self, connection_id: ConnectionId) -> Option<Disconnection> {
        let mut inner = self.inner.write();
        let session = inner.reverse.remove(&connection_id)?;
        let identity = session.identity;

        let last_session = match inner.forward.get_mut(&identity) {
            Some(connections) => {
                connections.remove(&connection_id);
                if connections.is_empty() {
                    inner.forward.remove(&identity);
                    true
                } else {
                    false
                }
            }
            // Unreachable while the dual-map invariant holds.
            None => true,
        };

        metrics::CONNECTED_SESSIONS.set(inner.reverse.len() as f64);
        Some(Disconnection {
            identity,
            last_session,
        })
    }

    /// All live connection ids for an identity. Empty set if offline.
    pub fn sessions_for(&self, identity: &ParticipantId) -> HashSet<ConnectionId> {
        self.inner
            .read()
            .forward
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    /// The identity behind a connection, if it is registered.
    pub fn identity_of(&self, connection_id: ConnectionId) -> Option<ParticipantId> {
        self.inner
            .read()
            .reverse
            .get(&connection_id)
            .map(|s| s.identity.clone())
    }

    /// The device language reported at connect time, if any.
    pub fn device_language_of(&self, connection_id: ConnectionId) -> Option<String> {
        self.inner
            .read()
            .reverse
            .get(&connection_id)
            .and_then(|s| s.device_language.clone())
    }

    /// The number of live connections.
    pub fn session_count(&self) -> usize {
        self.inner.read().reverse.len()
    }

    /// The number of distinct identities with at least one live connection.
    pub fn identity_count(&self) -> usize {
        self.inner.read().forward.len()
    }

    /// Every identity with at least one live connection.
    pub fn connected_identities(&self) -> Vec<ParticipantId> {
        self.inner.read().forward.keys().cloned().collect()
    }
}
