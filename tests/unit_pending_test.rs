// Unit tests for the pending-task correlation table.

use polyglot_gateway::core::translation::pending::{PendingTaskTable, TaskOutcome};
use polyglot_gateway::core::translation::protocol::{WorkerFailure, WorkerReply};
use uuid::Uuid;

fn reply(task_id: Uuid, message_id: Uuid, target: &str) -> WorkerReply {
    WorkerReply {
        task_id,
        message_id,
        translated_text: "bonjour".to_string(),
        source_language: "en".to_string(),
        target_language: target.to_string(),
        confidence_score: 0.95,
        processing_time: 0.01,
        model_type: "basic".to_string(),
        from_cache: false,
    }
}

#[tokio::test]
async fn test_resolve_delivers_outcome_to_waiter() {
    let table = PendingTaskTable::new();
    let task_id = Uuid::new_v4();
    let message_id = Uuid::new_v4();

    let rx = table.register(task_id, message_id, "fr");
    assert!(table.is_open(message_id, "fr"));
    assert_eq!(table.len(), 1);

    assert!(table.resolve(task_id, TaskOutcome::Completed(reply(task_id, message_id, "fr"))));

    match rx.await.unwrap() {
        TaskOutcome::Completed(r) => assert_eq!(r.task_id, task_id),
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(table.is_empty());
    assert!(!table.is_open(message_id, "fr"));
}

#[tokio::test]
async fn test_resolve_unknown_task_is_a_noop() {
    let table = PendingTaskTable::new();
    assert!(!table.resolve(
        Uuid::new_v4(),
        TaskOutcome::Failed(WorkerFailure::Other("boom".to_string()))
    ));
}

#[tokio::test]
async fn test_take_removes_exactly_once() {
    let table = PendingTaskTable::new();
    let task_id = Uuid::new_v4();
    let _rx = table.register(task_id, Uuid::new_v4(), "fr");

    assert!(table.take(task_id).is_some());
    assert!(table.take(task_id).is_none());
    assert!(!table.resolve(task_id, TaskOutcome::Superseded));
}

#[tokio::test]
async fn test_register_supersedes_open_task_for_same_pair() {
    let table = PendingTaskTable::new();
    let message_id = Uuid::new_v4();
    let first_id = Uuid::new_v4();
    let second_id = Uuid::new_v4();

    let first_rx = table.register(first_id, message_id, "fr");
    let _second_rx = table.register(second_id, message_id, "fr");

    // The old waiter is resolved as superseded, and only the new task is
    // left in the table.
    match first_rx.await.unwrap() {
        TaskOutcome::Superseded => {}
        other => panic!("expected supersession, got {other:?}"),
    }
    assert_eq!(table.len(), 1);
    assert!(table.take(first_id).is_none());
    assert!(table.take(second_id).is_some());
}

#[tokio::test]
async fn test_distinct_pairs_do_not_supersede() {
    let table = PendingTaskTable::new();
    let message_id = Uuid::new_v4();

    let _fr = table.register(Uuid::new_v4(), message_id, "fr");
    let _es = table.register(Uuid::new_v4(), message_id, "es");
    let _other = table.register(Uuid::new_v4(), Uuid::new_v4(), "fr");

    assert_eq!(table.len(), 3);
}

#[tokio::test]
async fn test_late_event_after_supersession_hits_nothing() {
    let table = PendingTaskTable::new();
    let message_id = Uuid::new_v4();
    let first_id = Uuid::new_v4();
    let second_id = Uuid::new_v4();

    let _first_rx = table.register(first_id, message_id, "fr");
    let _second_rx = table.register(second_id, message_id, "fr");

    // A worker event for the superseded task finds no entry; the pair index
    // still points at the replacement.
    assert!(!table.resolve(
        first_id,
        TaskOutcome::Completed(reply(first_id, message_id, "fr"))
    ));
    assert!(table.is_open(message_id, "fr"));
}

#[tokio::test]
async fn test_clear_cancels_all_waiters() {
    let table = PendingTaskTable::new();
    let rx1 = table.register(Uuid::new_v4(), Uuid::new_v4(), "fr");
    let rx2 = table.register(Uuid::new_v4(), Uuid::new_v4(), "es");

    assert_eq!(table.clear(), 2);
    assert!(table.is_empty());

    // Dropped resolvers surface as channel errors, which waiters treat as
    // shutdown.
    assert!(rx1.await.is_err());
    assert!(rx2.await.is_err());
}
