// src/connection/session.rs

//! Defines the state associated with a single client session.

use super::ConnectionId;
use crate::core::message::ParticipantId;
use std::time::Instant;

/// One live transport connection, independent of the logical user.
///
/// A user may hold any number of sessions at once (one per device); the
/// registry keeps the mapping in both directions.
#[derive(Debug, Clone)]
pub struct Session {
    /// The transport-assigned connection identifier.
    pub connection_id: ConnectionId,
    /// The logical identity behind the connection (registered or anonymous).
    pub identity: ParticipantId,
    /// The language reported by the connecting device, if any.
    pub device_language: Option<String>,
    /// When the connection was established.
    pub connected_at: Instant,
}

impl Session {
    pub fn new(
        connection_id: ConnectionId,
        identity: ParticipantId,
        device_language: Option<String>,
    ) -> Self {
        Self {
            connection_id,
            identity,
            device_language,
            connected_at: Instant::now(),
        }
    }
}
