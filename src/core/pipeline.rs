// src/core/pipeline.rs

//! The message send/broadcast pipeline.
//!
//! `handle_send` is the ordered part: validate, persist, acknowledge. The
//! sender's ack depends only on persistence. Translation dispatch and room
//! fan-out happen after the ack, fire-and-forget, so a slow worker pool or a
//! crowded room can never delay the sender.

use crate::core::GatewayError;
use crate::core::message::{
    Message, MessageType, NewMessage, ParticipantId, SendAck, SendStatus,
};
use crate::core::metrics;
use crate::core::rooms::{HydratedMessage, RoomBus, RoomEvent};
use crate::core::state::StatsState;
use crate::core::storage::MessageStore;
use crate::core::translation::TranslationOrchestrator;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, warn};
use uuid::Uuid;

/// An inbound send request, as received from a connection handler.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub conversation_id: String,
    pub sender: ParticipantId,
    pub content: String,
    pub source_language: String,
    pub reply_to: Option<Uuid>,
    pub message_type: MessageType,
}

pub struct BroadcastPipeline {
    store: Arc<dyn MessageStore>,
    rooms: Arc<RoomBus>,
    orchestrator: Arc<TranslationOrchestrator>,
    stats: Arc<StatsState>,
    max_message_length: usize,
}

impl BroadcastPipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        rooms: Arc<RoomBus>,
        orchestrator: Arc<TranslationOrchestrator>,
        stats: Arc<StatsState>,
        max_message_length: usize,
    ) -> Self {
        Self {
            store,
            rooms,
            orchestrator,
            stats,
            max_message_length,
        }
    }

    /// Validates and persists a message, then acknowledges it. Translation
    /// dispatch and room broadcast are spawned off after the ack and can
    /// never fail it.
    pub async fn handle_send(&self, request: SendRequest) -> Result<SendAck, GatewayError> {
        self.validate(&request)?;

        // Materializes the conversation if this is its first message.
        self.store
            .find_or_create_conversation(&request.conversation_id)
            .await?;

        let message = self
            .store
            .create_message(NewMessage {
                conversation_id: request.conversation_id,
                sender: request.sender,
                content: request.content,
                original_language: request.source_language,
                reply_to: request.reply_to,
                message_type: request.message_type,
            })
            .await?;

        self.stats.messages_saved.fetch_add(1, Ordering::Relaxed);
        metrics::MESSAGES_SAVED_TOTAL.inc();

        let ack = SendAck {
            message_id: message.id,
            status: SendStatus::MessageSaved,
        };

        let store = self.store.clone();
        let rooms = self.rooms.clone();
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            // The room publish happens before any translation dispatch, so a
            // translation delta can never precede its message.
            fan_out_new(&store, &rooms, &message).await;
            if let Err(e) = orchestrator.translate_message(&message).await {
                warn!(message_id = %message.id, "Translation dispatch failed: {e}");
            }
        });

        Ok(ack)
    }

    /// Drops a message's stored translations and queues fresh ones. Used by
    /// the edit flow; fan-out of the new results rides the normal
    /// translation-ready path.
    pub async fn handle_retranslate(&self, message_id: Uuid) -> Result<SendAck, GatewayError> {
        self.orchestrator.retranslate(message_id).await
    }

    /// Fans a freshly persisted message out to its room and pushes updated
    /// unread counters to every other member's personal channel.
    pub async fn broadcast_new(&self, message: &Message) {
        fan_out_new(&self.store, &self.rooms, message).await;
    }

    /// Fans out a single translation delta once the orchestrator has
    /// persisted it.
    pub async fn broadcast_translation_ready(
        &self,
        message_id: Uuid,
        target_language: &str,
    ) -> Result<(), GatewayError> {
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or(GatewayError::MessageNotFound(message_id))?;
        let Some(translation) = self
            .store
            .find_translation(message_id, target_language)
            .await?
        else {
            debug!(%message_id, target_language, "Translation vanished before broadcast.");
            return Ok(());
        };

        self.rooms.publish(
            &message.conversation_id,
            RoomEvent::TranslationReady {
                message_id,
                translation,
            },
        );
        Ok(())
    }

    fn validate(&self, request: &SendRequest) -> Result<(), GatewayError> {
        if request.content.trim().is_empty() {
            return Err(GatewayError::Validation(
                "message content must not be empty".into(),
            ));
        }
        if request.content.chars().count() > self.max_message_length {
            return Err(GatewayError::Validation(format!(
                "message content exceeds the {} character limit",
                self.max_message_length
            )));
        }
        if request.source_language.trim().is_empty() {
            return Err(GatewayError::Validation(
                "source language must not be empty".into(),
            ));
        }
        Ok(())
    }
}

async fn fan_out_new(store: &Arc<dyn MessageStore>, rooms: &Arc<RoomBus>, message: &Message) {
    let translations = match store.translations_for(message.id).await {
        Ok(t) => t,
        Err(e) => {
            warn!(message_id = %message.id, "Could not load translations for broadcast: {e}");
            Vec::new()
        }
    };

    let delivered = rooms.publish(
        &message.conversation_id,
        RoomEvent::MessageNew {
            message: HydratedMessage {
                message: message.clone(),
                translations,
            },
        },
    );
    debug!(
        message_id = %message.id,
        conversation_id = %message.conversation_id,
        delivered,
        "Broadcast new message."
    );

    match store
        .increment_unread(&message.conversation_id, &message.sender)
        .await
    {
        Ok(counts) => {
            for (identity, unread) in counts {
                rooms.publish_to_user(
                    &identity,
                    RoomEvent::UnreadCount {
                        conversation_id: message.conversation_id.clone(),
                        unread,
                    },
                );
            }
        }
        Err(e) => {
            warn!(
                conversation_id = %message.conversation_id,
                "Failed to update unread counters: {e}"
            );
        }
    }
}
