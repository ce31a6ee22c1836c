// src/core/translation/pending.rs

//! The pending-task correlation table.
//!
//! Every dispatched request registers exactly one entry here, owning a
//! `oneshot` resolver that fires exactly once with whichever of
//! {completion, error, supersession} happens first; timeouts are handled by
//! the waiter dropping out and calling `take`. Removal is a single shared
//! step (`take`) used by every resolution path, so no path can leak an
//! entry.

use super::protocol::{TaskId, WorkerFailure, WorkerReply};
use crate::core::metrics;
use dashmap::DashMap;
use std::time::Instant;
use tokio::sync::oneshot;
use uuid::Uuid;

/// The terminal outcome delivered to a task's waiter.
#[derive(Debug)]
pub enum TaskOutcome {
    Completed(WorkerReply),
    Failed(WorkerFailure),
    /// A newer task for the same `(message, target language)` pair replaced
    /// this one (retranslation of a still-in-flight message).
    Superseded,
}

/// One in-flight translation request.
#[derive(Debug)]
pub struct PendingTask {
    pub task_id: TaskId,
    pub message_id: Uuid,
    pub target_language: String,
    pub dispatched_at: Instant,
    resolver: oneshot::Sender<TaskOutcome>,
}

impl PendingTask {
    /// Resolves the task's waiter. The waiter may already be gone (timed
    /// out or cancelled); that is not an error.
    pub fn resolve(self, outcome: TaskOutcome) -> bool {
        self.resolver.send(outcome).is_ok()
    }
}

/// Table of all in-flight translation tasks, indexed by task id and by the
/// `(message, target language)` pair so that at most one task per pair is
/// ever open.
#[derive(Debug, Default)]
pub struct PendingTaskTable {
    by_task: DashMap<TaskId, PendingTask>,
    by_pair: DashMap<(Uuid, String), TaskId>,
}

impl PendingTaskTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a new pending task and returns the receiver its waiter
    /// listens on. Any still-open task for the same pair is resolved as
    /// superseded first.
    pub fn register(
        &self,
        task_id: TaskId,
        message_id: Uuid,
        target_language: &str,
    ) -> oneshot::Receiver<TaskOutcome> {
        let pair = (message_id, target_language.to_string());
        if let Some((_, old_id)) = self.by_pair.remove(&pair) {
            if let Some((_, old_task)) = self.by_task.remove(&old_id) {
                old_task.resolve(TaskOutcome::Superseded);
            }
        }

        let (tx, rx) = oneshot::channel();
        self.by_task.insert(
            task_id,
            PendingTask {
                task_id,
                message_id,
                target_language: target_language.to_string(),
                dispatched_at: Instant::now(),
                resolver: tx,
            },
        );
        self.by_pair.insert(pair, task_id);
        metrics::PENDING_TRANSLATION_TASKS.set(self.by_task.len() as f64);
        rx
    }

    /// Removes a task from both indexes. The single removal step shared by
    /// the completion, error, and timeout paths.
    pub fn take(&self, task_id: TaskId) -> Option<PendingTask> {
        let (_, task) = self.by_task.remove(&task_id)?;
        let pair = (task.message_id, task.target_language.clone());
        // Only clear the pair index if it still points at this task; a
        // replacement may already have claimed it.
        self.by_pair.remove_if(&pair, |_, current| *current == task_id);
        metrics::PENDING_TRANSLATION_TASKS.set(self.by_task.len() as f64);
        Some(task)
    }

    /// Resolves and removes a task in one step. Returns false if the task
    /// id is unknown (already handled, expired, or never registered).
    pub fn resolve(&self, task_id: TaskId, outcome: TaskOutcome) -> bool {
        match self.take(task_id) {
            Some(task) => {
                task.resolve(outcome);
                true
            }
            None => false,
        }
    }

    /// Whether a task is open for the given pair.
    pub fn is_open(&self, message_id: Uuid, target_language: &str) -> bool {
        self.by_pair
            .contains_key(&(message_id, target_language.to_string()))
    }

    /// Drops every pending task, cancelling their waiters. Used at
    /// shutdown; in-flight worker replies arriving afterwards are dropped
    /// by the correlation loop as unknown task ids.
    pub fn clear(&self) -> usize {
        let count = self.by_task.len();
        self.by_task.clear();
        self.by_pair.clear();
        metrics::PENDING_TRANSLATION_TASKS.set(0.0);
        count
    }

    pub fn len(&self) -> usize {
        self.by_task.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_task.is_empty()
    }
}
