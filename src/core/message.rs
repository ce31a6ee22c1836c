// src/core/message.rs

//! The persisted data model: participants, conversations, messages, and
//! translations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A logical participant identity. Registered users and anonymous visitors
/// live in distinct namespaces so their keys can never collide in caches or
/// presence tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ParticipantId {
    User(String),
    Anonymous(String),
}

impl ParticipantId {
    pub fn user(id: impl Into<String>) -> Self {
        ParticipantId::User(id.into())
    }

    pub fn anonymous(id: impl Into<String>) -> Self {
        ParticipantId::Anonymous(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            ParticipantId::User(id) | ParticipantId::Anonymous(id) => id,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, ParticipantId::Anonymous(_))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantId::User(id) => write!(f, "user:{id}"),
            ParticipantId::Anonymous(id) => write!(f, "anon:{id}"),
        }
    }
}

/// The kind of a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    System,
}

/// A persisted chat message. Immutable once stored, except for translation
/// attachment and the edit/retranslation flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: String,
    pub sender: ParticipantId,
    pub content: String,
    pub original_language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Uuid>,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

/// The fields needed to persist a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender: ParticipantId,
    pub content: String,
    pub original_language: String,
    pub reply_to: Option<Uuid>,
    pub message_type: MessageType,
}

/// A persisted translation result, keyed by `(message_id, target_language)`.
/// Always upserted, never duplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub message_id: Uuid,
    pub target_language: String,
    pub translated_content: String,
    /// Copied from the message's original language, never guessed by the
    /// worker.
    pub source_language: String,
    pub confidence: f32,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// A member of a conversation and the language they read it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: ParticipantId,
    pub language: String,
}

/// The minimal conversation record the gateway touches. The full CRUD schema
/// is owned elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub members: Vec<Member>,
    pub created_at: DateTime<Utc>,
}

/// The status a send/retranslate call resolves with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    MessageSaved,
    RetranslationQueued,
}

/// The acknowledgement returned to the sender once persistence succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAck {
    pub message_id: Uuid,
    pub status: SendStatus,
}
