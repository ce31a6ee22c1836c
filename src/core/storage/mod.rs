// src/core/storage/mod.rs

//! The persistence seam consumed by the gateway.
//!
//! The exact schema is owned by the CRUD layer; the gateway only depends on
//! the operations below. `memory::MemoryStore` backs the binary and the test
//! suite; a database-backed implementation plugs in behind the same trait.

pub mod memory;

pub use memory::MemoryStore;

use crate::core::GatewayError;
use crate::core::message::{Conversation, Member, Message, NewMessage, ParticipantId, Translation};
use crate::core::presence::PresenceKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Everything the gateway needs from the persistence store.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, new: NewMessage) -> Result<Message, GatewayError>;

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>, GatewayError>;

    /// Inserts or replaces the translation keyed by
    /// `(message_id, target_language)`.
    async fn upsert_translation(&self, translation: Translation) -> Result<(), GatewayError>;

    async fn find_translation(
        &self,
        message_id: Uuid,
        target_language: &str,
    ) -> Result<Option<Translation>, GatewayError>;

    async fn translations_for(&self, message_id: Uuid) -> Result<Vec<Translation>, GatewayError>;

    /// Removes every stored translation for a message, returning how many
    /// were deleted. Used by the retranslation flow so stale rows are never
    /// served alongside a fresh request.
    async fn delete_translations_for(&self, message_id: Uuid) -> Result<usize, GatewayError>;

    /// Returns the conversation, creating a minimal record if the id is new
    /// (first message in a freshly provisioned conversation).
    async fn find_or_create_conversation(&self, id: &str) -> Result<Conversation, GatewayError>;

    async fn conversation_members(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Member>, GatewayError>;

    /// The distinct languages of a conversation's members, in member order.
    async fn member_languages(&self, conversation_id: &str) -> Result<Vec<String>, GatewayError>;

    /// Increments the unread counter of every member except the sender and
    /// returns the new counts.
    async fn increment_unread(
        &self,
        conversation_id: &str,
        except: &ParticipantId,
    ) -> Result<Vec<(ParticipantId, u64)>, GatewayError>;

    /// Write-behind persistence of a presence timestamp. Callers treat this
    /// as fire-and-forget; failures are logged, never retried.
    async fn record_presence(
        &self,
        identity: &ParticipantId,
        kind: PresenceKind,
        at: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    /// Updates a sender's aggregate usage counters.
    async fn bump_sender_usage(
        &self,
        sender: &ParticipantId,
        translations_received: u64,
    ) -> Result<(), GatewayError>;
}
