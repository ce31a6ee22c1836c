// src/core/translation/mod.rs

//! The asynchronous translation-orchestration subsystem: the wire protocol
//! spoken with the worker pool, the pending-task correlation table, the
//! worker RPC channel implementations, and the orchestrator itself.

pub mod orchestrator;
pub mod pending;
pub mod protocol;
pub mod worker;

pub use orchestrator::{OrchestratorConfig, TranslationOrchestrator, TranslationReady};
pub use pending::{PendingTaskTable, TaskOutcome};
pub use protocol::{ModelType, TranslationRequest, TranslationResult, WorkerEvent, WorkerReply};
pub use worker::{LoopbackWorkerChannel, TcpWorkerChannel, WorkerChannel};
