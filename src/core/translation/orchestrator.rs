// src/core/translation/orchestrator.rs

//! The translation orchestrator: resolves target languages, dispatches
//! requests over the worker channel, and correlates asynchronous completions
//! back to their tasks.
//!
//! Dispatch never blocks the send path. Each dispatched task gets a waiter
//! that resolves exactly once with a completion, a failure, a supersession,
//! or a timeout; completed translations are persisted and announced on the
//! ready channel for fan-out.

use super::pending::{PendingTaskTable, TaskOutcome};
use super::protocol::{
    DIRECT_CONVERSATION_ID, ModelType, TranslationRequest, TranslationResult, WorkerEvent,
    WorkerFailure, WorkerReply,
};
use super::worker::WorkerChannel;
use crate::core::GatewayError;
use crate::core::language_cache::LanguageCache;
use crate::core::message::{Message, SendAck, SendStatus, Translation};
use crate::core::metrics;
use crate::core::state::StatsState;
use crate::core::storage::MessageStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The capacity of the translation-ready fan-out channel.
const READY_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long a dispatched conversation task may stay pending before it is
    /// abandoned.
    pub task_timeout: Duration,
    /// The (shorter) wait budget of the synchronous direct path.
    pub direct_timeout: Duration,
    pub default_model: ModelType,
    /// Messages longer than this are stored untranslated.
    pub max_translation_length: usize,
}

/// Announcement that a translation has been persisted and is ready to fan
/// out to connected clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationReady {
    pub message_id: Uuid,
    pub target_language: String,
}

pub struct TranslationOrchestrator {
    store: Arc<dyn MessageStore>,
    language_cache: Arc<LanguageCache>,
    channel: Arc<dyn WorkerChannel>,
    pending: Arc<PendingTaskTable>,
    stats: Arc<StatsState>,
    cfg: OrchestratorConfig,
    /// Consumed by `initialize`; present only before the correlation loop
    /// has been started.
    events_rx: tokio::sync::Mutex<Option<mpsc::Receiver<WorkerEvent>>>,
    ready_tx: mpsc::Sender<TranslationReady>,
    correlation_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl TranslationOrchestrator {
    /// Builds the orchestrator around an already-connected worker channel.
    /// The returned receiver yields one event per persisted translation;
    /// the caller wires it into the broadcast pipeline.
    pub fn new(
        store: Arc<dyn MessageStore>,
        language_cache: Arc<LanguageCache>,
        channel: Arc<dyn WorkerChannel>,
        events_rx: mpsc::Receiver<WorkerEvent>,
        stats: Arc<StatsState>,
        cfg: OrchestratorConfig,
    ) -> (Arc<Self>, mpsc::Receiver<TranslationReady>) {
        let (ready_tx, ready_rx) = mpsc::channel(READY_CHANNEL_CAPACITY);
        let orchestrator = Arc::new(Self {
            store,
            language_cache,
            channel,
            pending: Arc::new(PendingTaskTable::new()),
            stats,
            cfg,
            events_rx: tokio::sync::Mutex::new(Some(events_rx)),
            ready_tx,
            correlation_task: parking_lot::Mutex::new(None),
            closed: AtomicBool::new(false),
        });
        (orchestrator, ready_rx)
    }

    /// Starts the correlation loop. Safe to call more than once; only the
    /// first call has any effect.
    pub async fn initialize(self: &Arc<Self>) {
        let Some(mut events_rx) = self.events_rx.lock().await.take() else {
            debug!("Orchestrator already initialized.");
            return;
        };

        let pending = self.pending.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match event {
                    WorkerEvent::Completed(reply) => {
                        let task_id = reply.task_id;
                        if !pending.resolve(task_id, TaskOutcome::Completed(reply)) {
                            warn!(%task_id, "Dropping completion for unknown task.");
                        }
                    }
                    WorkerEvent::Failed { task_id, reason } => {
                        if !pending.resolve(task_id, TaskOutcome::Failed(reason)) {
                            warn!(%task_id, "Dropping failure for unknown task.");
                        }
                    }
                }
            }
            debug!("Worker event stream ended; correlation loop finished.");
        });
        *self.correlation_task.lock() = Some(task);
        info!("Translation orchestrator initialized.");
    }

    /// Shuts the orchestrator down: closes the worker channel, cancels every
    /// pending waiter, and stops the correlation loop. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.channel.close().await;
        let cancelled = self.pending.clear();
        if let Some(task) = self.correlation_task.lock().take() {
            task.abort();
        }
        info!(
            "Translation orchestrator closed ({} pending tasks cancelled).",
            cancelled
        );
    }

    /// Probes the worker channel. Always resolves to a boolean, never an
    /// error.
    pub async fn health_check(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.channel.health_check().await
    }

    /// Resolves a message's target languages and dispatches one request per
    /// language that does not already have a stored or in-flight
    /// translation. Returns how many requests went out.
    pub async fn translate_message(&self, message: &Message) -> Result<usize, GatewayError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GatewayError::ChannelClosed(
                "orchestrator is closed".into(),
            ));
        }
        if message.content.len() > self.cfg.max_translation_length {
            debug!(
                message_id = %message.id,
                "Message exceeds translation length limit, storing untranslated."
            );
            return Ok(0);
        }
        self.dispatch_targets(message, true).await
    }

    /// Drops every stored translation for a message and dispatches fresh
    /// requests for all targets. In-flight tasks for the same message are
    /// superseded rather than raced against.
    pub async fn retranslate(&self, message_id: Uuid) -> Result<SendAck, GatewayError> {
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or(GatewayError::MessageNotFound(message_id))?;

        let deleted = self.store.delete_translations_for(message_id).await?;
        debug!(%message_id, deleted, "Dropped stale translations for retranslation.");

        self.dispatch_targets(&message, false).await?;
        Ok(SendAck {
            message_id,
            status: SendStatus::RetranslationQueued,
        })
    }

    /// Synchronous conversation-less translation. Always resolves within the
    /// direct timeout; any failure, rejection, or timeout degrades to the
    /// deterministic fallback result instead of an error.
    pub async fn translate_direct(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
        model: Option<ModelType>,
    ) -> TranslationResult {
        if self.closed.load(Ordering::SeqCst)
            || text.len() > self.cfg.max_translation_length
            || source_language.eq_ignore_ascii_case(target_language)
        {
            return self.fallback(text, source_language, target_language);
        }

        let task_id = Uuid::new_v4();
        // A synthetic message id keeps direct tasks out of any real pair's
        // supersession scope.
        let message_id = Uuid::new_v4();
        let outcome_rx = self.pending.register(task_id, message_id, target_language);
        let request = TranslationRequest {
            task_id,
            message_id,
            conversation_id: DIRECT_CONVERSATION_ID.to_string(),
            text: text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            model_type: model.unwrap_or(self.cfg.default_model),
        };

        if let Err(e) = self.channel.dispatch(request).await {
            self.pending.take(task_id);
            warn!("Direct translation dispatch failed: {e}");
            return self.fallback(text, source_language, target_language);
        }
        self.count_request();

        match tokio::time::timeout(self.cfg.direct_timeout, outcome_rx).await {
            Ok(Ok(TaskOutcome::Completed(reply))) => {
                self.count_received();
                TranslationResult::from(reply)
            }
            Ok(Ok(TaskOutcome::Failed(WorkerFailure::PoolFull))) => {
                self.count_pool_full();
                self.fallback(text, source_language, target_language)
            }
            Ok(Ok(TaskOutcome::Failed(WorkerFailure::Other(reason)))) => {
                self.count_error();
                warn!("Direct translation failed: {reason}");
                self.fallback(text, source_language, target_language)
            }
            Ok(Ok(TaskOutcome::Superseded)) | Ok(Err(_)) => {
                self.fallback(text, source_language, target_language)
            }
            Err(_) => {
                self.pending.take(task_id);
                self.count_error();
                debug!("Direct translation timed out after {:?}.", self.cfg.direct_timeout);
                self.fallback(text, source_language, target_language)
            }
        }
    }

    /// Fetches a stored translation. Lookup problems degrade to `None`;
    /// callers fall back to the original content.
    pub async fn get_translation(
        &self,
        message_id: Uuid,
        target_language: &str,
    ) -> Option<Translation> {
        self.store
            .find_translation(message_id, target_language)
            .await
            .ok()
            .flatten()
    }

    /// The target languages of a conversation, from the cache when fresh and
    /// from the membership query (re-caching the answer) otherwise.
    pub async fn target_languages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<String>, GatewayError> {
        if let Some(languages) = self.language_cache.get(conversation_id) {
            return Ok(languages);
        }
        let languages = self.store.member_languages(conversation_id).await?;
        self.language_cache.set(conversation_id, languages.clone());
        Ok(languages)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    async fn dispatch_targets(
        &self,
        message: &Message,
        skip_covered: bool,
    ) -> Result<usize, GatewayError> {
        let targets = self.target_languages(&message.conversation_id).await?;
        let mut dispatched = 0;
        for target in targets {
            if target.eq_ignore_ascii_case(&message.original_language) {
                continue;
            }
            if skip_covered {
                if self.pending.is_open(message.id, &target) {
                    continue;
                }
                if self
                    .store
                    .find_translation(message.id, &target)
                    .await?
                    .is_some()
                {
                    continue;
                }
            }
            self.dispatch_for_message(message, &target).await?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// Registers a pending task, pushes the request, and spawns its waiter.
    async fn dispatch_for_message(
        &self,
        message: &Message,
        target_language: &str,
    ) -> Result<(), GatewayError> {
        let task_id = Uuid::new_v4();
        let outcome_rx = self.pending.register(task_id, message.id, target_language);
        let request = TranslationRequest {
            task_id,
            message_id: message.id,
            conversation_id: message.conversation_id.clone(),
            text: message.content.clone(),
            source_language: message.original_language.clone(),
            target_language: target_language.to_string(),
            model_type: self.cfg.default_model,
        };

        if let Err(e) = self.channel.dispatch(request).await {
            self.pending.take(task_id);
            self.count_error();
            return Err(e);
        }
        self.count_request();

        let store = self.store.clone();
        let stats = self.stats.clone();
        let pending = self.pending.clone();
        let ready_tx = self.ready_tx.clone();
        let message = message.clone();
        let target = target_language.to_string();
        let timeout = self.cfg.task_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, outcome_rx).await {
                Ok(Ok(TaskOutcome::Completed(reply))) => {
                    stats.translations_received.fetch_add(1, Ordering::Relaxed);
                    metrics::TRANSLATIONS_RECEIVED_TOTAL.inc();
                    persist_completion(store, ready_tx, &message, reply).await;
                }
                Ok(Ok(TaskOutcome::Failed(reason))) => {
                    let err = GatewayError::from(reason);
                    if matches!(err, GatewayError::PoolSaturated) {
                        stats.pool_full_rejections.fetch_add(1, Ordering::Relaxed);
                        metrics::POOL_FULL_REJECTIONS_TOTAL.inc();
                    } else {
                        stats.translation_errors.fetch_add(1, Ordering::Relaxed);
                        metrics::TRANSLATION_ERRORS_TOTAL.inc();
                    }
                    warn!(
                        message_id = %message.id,
                        target_language = %target,
                        "Translation task failed: {err}"
                    );
                }
                Ok(Ok(TaskOutcome::Superseded)) => {
                    debug!(%task_id, "Translation task superseded by a newer request.");
                }
                Ok(Err(_)) => {
                    // Table cleared at shutdown; nothing to record.
                }
                Err(_) => {
                    if pending.take(task_id).is_some() {
                        stats.translation_errors.fetch_add(1, Ordering::Relaxed);
                        metrics::TRANSLATION_ERRORS_TOTAL.inc();
                        warn!(
                            message_id = %message.id,
                            target_language = %target,
                            "Translation task timed out after {timeout:?}."
                        );
                    }
                }
            }
        });
        Ok(())
    }

    fn fallback(&self, text: &str, source: &str, target: &str) -> TranslationResult {
        self.stats
            .fallback_translations
            .fetch_add(1, Ordering::Relaxed);
        metrics::FALLBACK_TRANSLATIONS_TOTAL.inc();
        TranslationResult::fallback(text, source, target)
    }

    fn count_request(&self) {
        self.stats
            .translation_requests
            .fetch_add(1, Ordering::Relaxed);
        metrics::TRANSLATION_REQUESTS_TOTAL.inc();
    }

    fn count_received(&self) {
        self.stats
            .translations_received
            .fetch_add(1, Ordering::Relaxed);
        metrics::TRANSLATIONS_RECEIVED_TOTAL.inc();
    }

    fn count_error(&self) {
        self.stats
            .translation_errors
            .fetch_add(1, Ordering::Relaxed);
        metrics::TRANSLATION_ERRORS_TOTAL.inc();
    }

    fn count_pool_full(&self) {
        self.stats
            .pool_full_rejections
            .fetch_add(1, Ordering::Relaxed);
        metrics::POOL_FULL_REJECTIONS_TOTAL.inc();
    }
}

/// Persists a completed translation and announces it on the ready channel.
/// The translation's source language is copied from the message, not taken
/// from the worker's detection.
async fn persist_completion(
    store: Arc<dyn MessageStore>,
    ready_tx: mpsc::Sender<TranslationReady>,
    message: &Message,
    reply: WorkerReply,
) {
    let translation = Translation {
        message_id: message.id,
        target_language: reply.target_language.clone(),
        translated_content: reply.translated_text,
        source_language: message.original_language.clone(),
        confidence: reply.confidence_score,
        model: reply.model_type,
        created_at: chrono::Utc::now(),
    };
    if let Err(e) = store.upsert_translation(translation).await {
        warn!(message_id = %message.id, "Failed to persist translation: {e}");
        return;
    }
    if let Err(e) = store.bump_sender_usage(&message.sender, 1).await {
        warn!(sender = %message.sender, "Failed to update sender usage: {e}");
    }
    let ready = TranslationReady {
        message_id: message.id,
        target_language: reply.target_language,
    };
    if ready_tx.send(ready).await.is_err() {
        debug!("Ready channel closed; dropping translation announcement.");
    }
}
