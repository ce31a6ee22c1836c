// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// The main error enum, representing all possible failures within the gateway.
/// Using `thiserror` allows for clean error definitions and automatic `From`
/// trait implementations.
///
/// Taxonomy: validation and not-found errors are caller-fixable and surfaced
/// at the call site; persistence errors propagate from `handle_send` because
/// silently dropping a message would be a correctness violation; transport
/// and capacity errors stay inside the translation path and are converted to
/// counters or fallback results, never crashing the process.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Message '{0}' not found")]
    MessageNotFound(Uuid),

    #[error("Conversation '{0}' not found")]
    ConversationNotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Worker transport error: {0}")]
    Transport(String),

    #[error("Worker pool saturated")]
    PoolSaturated,

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PartialEq for GatewayError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (GatewayError::Io(e1), GatewayError::Io(e2)) => e1.to_string() == e2.to_string(),
            (GatewayError::Validation(s1), GatewayError::Validation(s2)) => s1 == s2,
            (GatewayError::MessageNotFound(a), GatewayError::MessageNotFound(b)) => a == b,
            (GatewayError::ConversationNotFound(a), GatewayError::ConversationNotFound(b)) => {
                a == b
            }
            (GatewayError::Persistence(s1), GatewayError::Persistence(s2)) => s1 == s2,
            (GatewayError::Transport(s1), GatewayError::Transport(s2)) => s1 == s2,
            (GatewayError::ChannelClosed(s1), GatewayError::ChannelClosed(s2)) => s1 == s2,
            (GatewayError::Internal(s1), GatewayError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Internal(format!("JSON serialization/deserialization error: {e}"))
    }
}

impl From<uuid::Error> for GatewayError {
    fn from(e: uuid::Error) -> Self {
        GatewayError::Internal(format!("Failed to parse UUID: {e}"))
    }
}
