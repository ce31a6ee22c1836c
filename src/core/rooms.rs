// src/core/rooms.rs

//! The in-process room fan-out bus.
//!
//! A room is the group of sessions subscribed to one conversation's events;
//! each member additionally has a personal channel for targeted
//! notifications (unread counts, presence). If the gateway is ever scaled
//! horizontally this boundary is where a shared pub/sub layer plugs in.

use crate::core::message::{Message, ParticipantId, Translation};
use crate::core::metrics;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::debug;
use uuid::Uuid;

/// The capacity of each individual broadcast channel.
const ROOM_CHANNEL_CAPACITY: usize = 128;

/// A message hydrated with every translation already resolved for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HydratedMessage {
    #[serde(flatten)]
    pub message: Message,
    pub translations: Vec<Translation>,
}

/// An event fanned out to room or personal-channel subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RoomEvent {
    /// A freshly persisted message, with any translations known at publish
    /// time. Always precedes any `TranslationReady` for the same message.
    #[serde(rename_all = "camelCase")]
    MessageNew { message: HydratedMessage },
    /// A single translation delta, so clients can patch an already-rendered
    /// message instead of re-rendering it wholesale.
    #[serde(rename_all = "camelCase")]
    TranslationReady {
        message_id: Uuid,
        translation: Translation,
    },
    /// A per-member unread counter, sent on the member's personal channel.
    #[serde(rename_all = "camelCase")]
    UnreadCount {
        conversation_id: String,
        unread: u64,
    },
    /// An identity went fully online or offline.
    #[serde(rename_all = "camelCase")]
    PresenceChanged {
        identity: ParticipantId,
        online: bool,
    },
}

impl RoomEvent {
    fn kind(&self) -> &'static str {
        match self {
            RoomEvent::MessageNew { .. } => "message_new",
            RoomEvent::TranslationReady { .. } => "translation_ready",
            RoomEvent::UnreadCount { .. } => "unread_count",
            RoomEvent::PresenceChanged { .. } => "presence_changed",
        }
    }
}

/// `RoomBus` is the central hub for all fan-out. It uses `DashMap` for
/// thread-safe management of room and personal-channel subscriptions.
#[derive(Debug, Default)]
pub struct RoomBus {
    /// A map from a conversation id to its room's broadcast sender.
    rooms: DashMap<String, Arc<Sender<RoomEvent>>>,
    /// A map from an identity to its personal channel's broadcast sender.
    user_channels: DashMap<ParticipantId, Arc<Sender<RoomEvent>>>,
}

impl RoomBus {
    pub fn new() -> Self {
        Default::default()
    }

    /// Subscribes a connection to a conversation's room.
    ///
    /// If the room does not exist, it is created. It returns a `Receiver`
    /// that the connection's transport handler will listen on.
    pub fn join_room(&self, room_id: &str) -> Receiver<RoomEvent> {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(broadcast::channel(ROOM_CHANNEL_CAPACITY).0))
            .value()
            .subscribe()
    }

    /// Subscribes a connection to an identity's personal channel.
    pub fn subscribe_user(&self, identity: &ParticipantId) -> Receiver<RoomEvent> {
        self.user_channels
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(broadcast::channel(ROOM_CHANNEL_CAPACITY).0))
            .value()
            .subscribe()
    }

    /// Publishes an event to every session in a room.
    ///
    /// Returns the number of subscribers the event was delivered to.
    pub fn publish(&self, room_id: &str, event: RoomEvent) -> usize {
        metrics::ROOM_EVENTS_PUBLISHED_TOTAL
            .with_label_values(&[event.kind()])
            .inc();
        self.rooms
            .get(room_id)
            .map_or(0, |room| room.send(event).unwrap_or(0))
    }

    /// Publishes an event to one identity's personal channel.
    pub fn publish_to_user(&self, identity: &ParticipantId, event: RoomEvent) -> usize {
        metrics::ROOM_EVENTS_PUBLISHED_TOTAL
            .with_label_values(&[event.kind()])
            .inc();
        self.user_channels
            .get(identity)
            .map_or(0, |chan| chan.send(event).unwrap_or(0))
    }

    /// A maintenance pass that removes rooms and personal channels that no
    /// longer have any subscribers. This prevents memory leaks from empty,
    /// unused channels.
    pub fn purge_empty(&self) -> usize {
        let mut purged_count = 0;
        self.rooms.retain(|_room_id, sender| {
            if sender.receiver_count() == 0 {
                purged_count += 1;
                false // Remove the entry.
            } else {
                true // Keep the entry.
            }
        });

        self.user_channels.retain(|_identity, sender| {
            if sender.receiver_count() == 0 {
                purged_count += 1;
                false
            } else {
                true
            }
        });

        if purged_count > 0 {
            debug!("Purged {} empty rooms and personal channels.", purged_count);
        }
        purged_count
    }

    /// Returns the number of rooms with at least one live sender.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Returns the number of subscribers for a specific room.
    pub fn subscriber_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |s| s.receiver_count())
    }
}
