// src/core/storage/memory.rs

//! A DashMap-backed `MessageStore` used by the binary's default mode and by
//! the test suite.

use super::MessageStore;
use crate::core::GatewayError;
use crate::core::message::{Conversation, Member, Message, NewMessage, ParticipantId, Translation};
use crate::core::presence::PresenceKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use uuid::Uuid;

/// Per-sender aggregate usage counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct SenderUsage {
    pub messages_sent: u64,
    pub translations_received: u64,
}

/// In-memory persistence. Every map is keyed the way the external store
/// would key its tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: DashMap<Uuid, Message>,
    /// message id -> target language -> translation.
    translations: DashMap<Uuid, HashMap<String, Translation>>,
    conversations: DashMap<String, Conversation>,
    unread: DashMap<(String, ParticipantId), u64>,
    sender_usage: DashMap<ParticipantId, SenderUsage>,
    /// Presence write counts per (identity, policy), kept so tests can
    /// observe the write-behind throttling.
    presence_writes: DashMap<(ParticipantId, PresenceKind), u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Seeds a conversation with members, for wiring up fixtures.
    pub fn seed_conversation(&self, id: &str, members: Vec<Member>) {
        self.conversations.insert(
            id.to_string(),
            Conversation {
                id: id.to_string(),
                members,
                created_at: Utc::now(),
            },
        );
    }

    /// How many presence writes reached the store for an identity/policy.
    pub fn presence_write_count(&self, identity: &ParticipantId, kind: PresenceKind) -> u64 {
        self.presence_writes
            .get(&(identity.clone(), kind))
            .map_or(0, |c| *c)
    }

    pub fn sender_usage(&self, sender: &ParticipantId) -> SenderUsage {
        self.sender_usage.get(sender).map_or_else(Default::default, |u| *u)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// The number of stored translation rows for a message.
    pub fn translation_count(&self, message_id: Uuid) -> usize {
        self.translations.get(&message_id).map_or(0, |m| m.len())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_message(&self, new: NewMessage) -> Result<Message, GatewayError> {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: new.conversation_id,
            sender: new.sender,
            content: new.content,
            original_language: new.original_language,
            reply_to: new.reply_to,
            message_type: new.message_type,
            created_at: Utc::now(),
        };
        self.sender_usage
            .entry(message.sender.clone())
            .or_default()
            .messages_sent += 1;
        self.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>, GatewayError> {
        Ok(self.messages.get(&id).map(|m| m.clone()))
    }

    async fn upsert_translation(&self, translation: Translation) -> Result<(), GatewayError> {
        self.translations
            .entry(translation.message_id)
            .or_default()
            .insert(translation.target_language.clone(), translation);
        Ok(())
    }

    async fn find_translation(
        &self,
        message_id: Uuid,
        target_language: &str,
    ) -> Result<Option<Translation>, GatewayError> {
        Ok(self
            .translations
            .get(&message_id)
            .and_then(|m| m.get(target_language).cloned()))
    }

    async fn translations_for(&self, message_id: Uuid) -> Result<Vec<Translation>, GatewayError> {
        Ok(self
            .translations
            .get(&message_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_translations_for(&self, message_id: Uuid) -> Result<usize, GatewayError> {
        Ok(self
            .translations
            .remove(&message_id)
            .map_or(0, |(_, m)| m.len()))
    }

    async fn find_or_create_conversation(&self, id: &str) -> Result<Conversation, GatewayError> {
        let conversation = self
            .conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation {
                id: id.to_string(),
                members: Vec::new(),
                created_at: Utc::now(),
            });
        Ok(conversation.clone())
    }

    async fn conversation_members(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Member>, GatewayError> {
        self.conversations
            .get(conversation_id)
            .map(|c| c.members.clone())
            .ok_or_else(|| GatewayError::ConversationNotFound(conversation_id.to_string()))
    }

    async fn member_languages(&self, conversation_id: &str) -> Result<Vec<String>, GatewayError> {
        let members = self.conversation_members(conversation_id).await?;
        let mut languages: Vec<String> = Vec::new();
        for member in members {
            if !languages.contains(&member.language) {
                languages.push(member.language);
            }
        }
        Ok(languages)
    }

    async fn increment_unread(
        &self,
        conversation_id: &str,
        except: &ParticipantId,
    ) -> Result<Vec<(ParticipantId, u64)>, GatewayError> {
        let members = self.conversation_members(conversation_id).await?;
        let mut counts = Vec::new();
        for member in members {
            if member.id == *except {
                continue;
            }
            let mut entry = self
                .unread
                .entry((conversation_id.to_string(), member.id.clone()))
                .or_insert(0);
            *entry += 1;
            counts.push((member.id, *entry));
        }
        Ok(counts)
    }

    async fn record_presence(
        &self,
        identity: &ParticipantId,
        kind: PresenceKind,
        _at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        *self
            .presence_writes
            .entry((identity.clone(), kind))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn bump_sender_usage(
        &self,
        sender: &ParticipantId,
        translations_received: u64,
    ) -> Result<(), GatewayError> {
        self.sender_usage
            .entry(sender.clone())
            .or_default()
            .translations_received += translations_received;
        Ok(())
    }
}
