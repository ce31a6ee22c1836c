// src/core/translation/protocol.rs

//! The request/response protocol spoken with the translation worker pool.
//!
//! Payloads are JSON with camelCase field names, matching what the worker
//! pool consumes and publishes. Correlation is purely by `taskId`.

use crate::core::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique per-request correlation id.
pub type TaskId = Uuid;

/// The model identifier stamped on fallback results.
pub const FALLBACK_MODEL_ID: &str = "fallback";
/// The confidence score of a fallback result. Well below anything a real
/// model reports.
pub const FALLBACK_CONFIDENCE: f32 = 0.1;
/// The pseudo conversation id used for direct (conversation-less)
/// translation requests; routed to the worker pool's unordered queue.
pub const DIRECT_CONVERSATION_ID: &str = "any";
/// The failure reason the worker reports when its queues are saturated.
pub const POOL_FULL_REASON: &str = "pool_full";

/// The model tier a translation is requested at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Basic,
    Premium,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Basic => f.write_str("basic"),
            ModelType::Premium => f.write_str("premium"),
        }
    }
}

/// One translation request, dispatched fire-and-forget to the worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub task_id: TaskId,
    pub message_id: Uuid,
    pub conversation_id: String,
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    pub model_type: ModelType,
}

/// A completed translation published by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerReply {
    pub task_id: TaskId,
    pub message_id: Uuid,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub confidence_score: f32,
    #[serde(default)]
    pub processing_time: f64,
    pub model_type: String,
    #[serde(default)]
    pub from_cache: bool,
}

/// Why a task failed on the worker side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerFailure {
    /// The worker pool rejected the task because its queues were full.
    /// Counted separately so operators can tell capacity problems from
    /// genuine translation failures.
    PoolFull,
    Other(String),
}

impl WorkerFailure {
    pub fn from_reason(reason: &str) -> Self {
        if reason == POOL_FULL_REASON {
            WorkerFailure::PoolFull
        } else {
            WorkerFailure::Other(reason.to_string())
        }
    }
}

impl From<WorkerFailure> for GatewayError {
    fn from(failure: WorkerFailure) -> Self {
        match failure {
            WorkerFailure::PoolFull => GatewayError::PoolSaturated,
            WorkerFailure::Other(reason) => GatewayError::Transport(reason),
        }
    }
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerFailure::PoolFull => f.write_str(POOL_FULL_REASON),
            WorkerFailure::Other(reason) => f.write_str(reason),
        }
    }
}

/// An event emitted by the worker channel's event stream.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Completed(WorkerReply),
    Failed {
        task_id: TaskId,
        reason: WorkerFailure,
    },
}

/// An error event as it appears on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireError {
    task_id: TaskId,
    error: String,
}

/// Parses one newline-delimited event published by the worker pool.
/// Error events carry an `error` field; everything else is a reply.
pub fn parse_event(line: &str) -> Result<WorkerEvent, serde_json::Error> {
    if let Ok(err) = serde_json::from_str::<WireError>(line) {
        return Ok(WorkerEvent::Failed {
            task_id: err.task_id,
            reason: WorkerFailure::from_reason(&err.error),
        });
    }
    serde_json::from_str::<WorkerReply>(line).map(WorkerEvent::Completed)
}

/// The result of the synchronous `translate_direct` path. Guaranteed to
/// resolve; never an unresolved future or an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub confidence_score: f32,
    pub model_type: String,
    pub from_cache: bool,
}

impl TranslationResult {
    /// The deterministic fallback: the original text passed through
    /// untranslated, tagged so callers can tell it apart from a real result.
    pub fn fallback(text: &str, source_language: &str, target_language: &str) -> Self {
        Self {
            translated_text: text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            confidence_score: FALLBACK_CONFIDENCE,
            model_type: FALLBACK_MODEL_ID.to_string(),
            from_cache: false,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.model_type == FALLBACK_MODEL_ID
    }
}

impl From<WorkerReply> for TranslationResult {
    fn from(reply: WorkerReply) -> Self {
        Self {
            translated_text: reply.translated_text,
            source_language: reply.source_language,
            target_language: reply.target_language,
            confidence_score: reply.confidence_score,
            model_type: reply.model_type,
            from_cache: reply.from_cache,
        }
    }
}
