// src/core/translation/worker.rs

//! Worker RPC channel implementations.
//!
//! The gateway talks to the out-of-process worker pool over two sockets: a
//! request socket it pushes JSON-lines onto, and an events socket the pool
//! publishes completion/error events back on. `TcpWorkerChannel` is the
//! production transport; `LoopbackWorkerChannel` keeps everything in-process
//! for development and tests.

use super::protocol::{self, TranslationRequest, WorkerEvent, WorkerFailure, WorkerReply};
use crate::core::GatewayError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info, warn};

/// The capacity of the worker event channel.
const WORKER_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The RPC boundary to the translation worker pool. `dispatch` is a
/// fire-and-forget send; completions and errors arrive on the event stream
/// returned at construction time.
#[async_trait]
pub trait WorkerChannel: Send + Sync {
    /// Pushes one request to the worker pool. An error here means the
    /// transport itself failed; the request will never produce an event.
    async fn dispatch(&self, request: TranslationRequest) -> Result<(), GatewayError>;

    /// Probes the channel. Any transport exception is converted into
    /// `false`, never propagated.
    async fn health_check(&self) -> bool;

    /// Releases the channel. Must not fail, even if the channel is already
    /// unusable.
    async fn close(&self);
}

/// JSON-lines over TCP: one socket pushing requests, one receiving events.
pub struct TcpWorkerChannel {
    writer: tokio::sync::Mutex<Option<FramedWrite<TcpStream, LinesCodec>>>,
    reader_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    healthy: Arc<AtomicBool>,
}

impl TcpWorkerChannel {
    /// Connects both sockets and starts the event reader. Returns the
    /// channel and the stream of worker events to correlate against.
    pub async fn connect(
        request_addr: &str,
        events_addr: &str,
    ) -> Result<(Arc<Self>, mpsc::Receiver<WorkerEvent>), GatewayError> {
        let request_stream = TcpStream::connect(request_addr).await?;
        let events_stream = TcpStream::connect(events_addr).await?;
        info!(
            "Worker channel connected: requests -> {}, events <- {}",
            request_addr, events_addr
        );

        let (events_tx, events_rx) = mpsc::channel(WORKER_EVENT_CHANNEL_CAPACITY);
        let healthy = Arc::new(AtomicBool::new(true));

        let reader_healthy = healthy.clone();
        let reader_task = tokio::spawn(async move {
            let mut framed = FramedRead::new(events_stream, LinesCodec::new());
            while let Some(item) = framed.next().await {
                match item {
                    Ok(line) => match protocol::parse_event(&line) {
                        Ok(event) => {
                            if events_tx.send(event).await.is_err() {
                                // The correlation loop is gone; nothing left
                                // to deliver to.
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Discarding malformed worker event: {e}");
                        }
                    },
                    Err(e) => {
                        warn!("Worker event stream failed: {e}");
                        break;
                    }
                }
            }
            reader_healthy.store(false, Ordering::Relaxed);
            debug!("Worker event reader finished.");
        });

        let channel = Arc::new(Self {
            writer: tokio::sync::Mutex::new(Some(FramedWrite::new(
                request_stream,
                LinesCodec::new(),
            ))),
            reader_task: parking_lot::Mutex::new(Some(reader_task)),
            healthy,
        });
        Ok((channel, events_rx))
    }
}

#[async_trait]
impl WorkerChannel for TcpWorkerChannel {
    async fn dispatch(&self, request: TranslationRequest) -> Result<(), GatewayError> {
        let line = serde_json::to_string(&request)?;
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| GatewayError::ChannelClosed("worker channel is closed".into()))?;
        if let Err(e) = writer.send(line).await {
            self.healthy.store(false, Ordering::Relaxed);
            return Err(GatewayError::Transport(e.to_string()));
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::Relaxed) && self.writer.lock().await.is_some()
    }

    async fn close(&self) {
        self.writer.lock().await.take();
        if let Some(task) = self.reader_task.lock().take() {
            task.abort();
        }
        self.healthy.store(false, Ordering::Relaxed);
    }
}

/// An in-process worker channel.
///
/// With `auto_reply` on (the binary's `echo` mode) every request is answered
/// immediately with the source text tagged by its target language. With it
/// off, tests drive completions and failures by hand.
pub struct LoopbackWorkerChannel {
    auto_reply: bool,
    requests: parking_lot::Mutex<Vec<TranslationRequest>>,
    events_tx: parking_lot::Mutex<Option<mpsc::Sender<WorkerEvent>>>,
    open: AtomicBool,
}

impl LoopbackWorkerChannel {
    pub fn new(auto_reply: bool) -> (Arc<Self>, mpsc::Receiver<WorkerEvent>) {
        let (events_tx, events_rx) = mpsc::channel(WORKER_EVENT_CHANNEL_CAPACITY);
        let channel = Arc::new(Self {
            auto_reply,
            requests: parking_lot::Mutex::new(Vec::new()),
            events_tx: parking_lot::Mutex::new(Some(events_tx)),
            open: AtomicBool::new(true),
        });
        (channel, events_rx)
    }

    /// Every request dispatched so far, in order.
    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().clone()
    }

    fn sender(&self) -> Option<mpsc::Sender<WorkerEvent>> {
        self.events_tx.lock().clone()
    }

    /// Emits a completion for a recorded request. Returns false if the task
    /// id was never dispatched or the channel is closed.
    pub async fn complete(&self, task_id: uuid::Uuid, translated_text: &str) -> bool {
        let request = self
            .requests
            .lock()
            .iter()
            .find(|r| r.task_id == task_id)
            .cloned();
        let Some(request) = request else {
            return false;
        };
        self.emit(WorkerEvent::Completed(WorkerReply {
            task_id: request.task_id,
            message_id: request.message_id,
            translated_text: translated_text.to_string(),
            source_language: request.source_language,
            target_language: request.target_language,
            confidence_score: 0.95,
            processing_time: 0.0,
            model_type: request.model_type.to_string(),
            from_cache: false,
        }))
        .await
    }

    /// Emits a raw completion event, bypassing the recorded requests.
    pub async fn complete_with(&self, reply: WorkerReply) -> bool {
        self.emit(WorkerEvent::Completed(reply)).await
    }

    /// Emits an error event for a task.
    pub async fn fail(&self, task_id: uuid::Uuid, reason: &str) -> bool {
        self.emit(WorkerEvent::Failed {
            task_id,
            reason: WorkerFailure::from_reason(reason),
        })
        .await
    }

    async fn emit(&self, event: WorkerEvent) -> bool {
        match self.sender() {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl WorkerChannel for LoopbackWorkerChannel {
    async fn dispatch(&self, request: TranslationRequest) -> Result<(), GatewayError> {
        if !self.open.load(Ordering::Relaxed) {
            return Err(GatewayError::ChannelClosed(
                "loopback worker channel is closed".into(),
            ));
        }
        self.requests.lock().push(request.clone());

        if self.auto_reply {
            let echoed = format!(
                "[{}] {}",
                request.target_language.to_uppercase(),
                request.text
            );
            self.emit(WorkerEvent::Completed(WorkerReply {
                task_id: request.task_id,
                message_id: request.message_id,
                translated_text: echoed,
                source_language: request.source_language,
                target_language: request.target_language,
                confidence_score: 0.95,
                processing_time: 0.0,
                model_type: request.model_type.to_string(),
                from_cache: false,
            }))
            .await;
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::Relaxed);
        // Dropping the sender ends the correlation loop's event stream.
        self.events_tx.lock().take();
    }
}
