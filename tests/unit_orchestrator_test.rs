// Unit tests for the translation orchestrator: fan-out, correlation,
// retranslation, and the direct path's fallback guarantees.

use polyglot_gateway::core::GatewayError;
use polyglot_gateway::core::language_cache::LanguageCache;
use polyglot_gateway::core::message::{Member, Message, MessageType, NewMessage, SendStatus};
use polyglot_gateway::core::ParticipantId;
use polyglot_gateway::core::state::StatsState;
use polyglot_gateway::core::storage::{MemoryStore, MessageStore};
use polyglot_gateway::core::translation::orchestrator::{
    OrchestratorConfig, TranslationOrchestrator, TranslationReady,
};
use polyglot_gateway::core::translation::protocol::ModelType;
use polyglot_gateway::core::translation::worker::LoopbackWorkerChannel;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

struct Fixture {
    store: Arc<MemoryStore>,
    channel: Arc<LoopbackWorkerChannel>,
    orchestrator: Arc<TranslationOrchestrator>,
    ready_rx: mpsc::Receiver<TranslationReady>,
    stats: Arc<StatsState>,
}

async fn fixture_with(direct_timeout: Duration, max_translation_length: usize) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(LanguageCache::new(Duration::from_secs(60), 100));
    let (channel, events_rx) = LoopbackWorkerChannel::new(false);
    let stats = Arc::new(StatsState::new());
    let (orchestrator, ready_rx) = TranslationOrchestrator::new(
        store.clone(),
        cache,
        channel.clone(),
        events_rx,
        stats.clone(),
        OrchestratorConfig {
            task_timeout: Duration::from_secs(5),
            direct_timeout,
            default_model: ModelType::Basic,
            max_translation_length,
        },
    );
    orchestrator.initialize().await;
    Fixture {
        store,
        channel,
        orchestrator,
        ready_rx,
        stats,
    }
}

async fn fixture() -> Fixture {
    fixture_with(Duration::from_millis(300), 10_000).await
}

fn trio_members() -> Vec<Member> {
    vec![
        Member {
            id: ParticipantId::user("alice"),
            language: "en".to_string(),
        },
        Member {
            id: ParticipantId::user("bob"),
            language: "fr".to_string(),
        },
        Member {
            id: ParticipantId::user("carol"),
            language: "es".to_string(),
        },
    ]
}

async fn persisted_message(store: &MemoryStore, conversation_id: &str, content: &str) -> Message {
    store
        .create_message(NewMessage {
            conversation_id: conversation_id.to_string(),
            sender: ParticipantId::user("alice"),
            content: content.to_string(),
            original_language: "en".to_string(),
            reply_to: None,
            message_type: MessageType::Text,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_fan_out_to_every_member_language_except_source() {
    let mut fx = fixture().await;
    fx.store.seed_conversation("conv-1", trio_members());
    let message = persisted_message(&fx.store, "conv-1", "Hello everyone").await;

    let dispatched = fx.orchestrator.translate_message(&message).await.unwrap();
    assert_eq!(dispatched, 2);

    let requests = fx.channel.requests();
    let targets: Vec<&str> = requests.iter().map(|r| r.target_language.as_str()).collect();
    assert_eq!(targets, vec!["fr", "es"]);
    for request in &requests {
        assert_eq!(request.message_id, message.id);
        assert_eq!(request.conversation_id, "conv-1");
        assert_eq!(request.source_language, "en");
        assert_eq!(request.model_type, ModelType::Basic);
    }

    assert!(fx.channel.complete(requests[0].task_id, "Bonjour tout le monde").await);
    assert!(fx.channel.complete(requests[1].task_id, "Hola a todos").await);

    let mut ready_targets = vec![
        fx.ready_rx.recv().await.unwrap().target_language,
        fx.ready_rx.recv().await.unwrap().target_language,
    ];
    ready_targets.sort();
    assert_eq!(ready_targets, vec!["es", "fr"]);

    let fr = fx
        .orchestrator
        .get_translation(message.id, "fr")
        .await
        .unwrap();
    assert_eq!(fr.translated_content, "Bonjour tout le monde");
    assert_eq!(fr.source_language, "en");
    assert_eq!(fr.model, "basic");
    assert!((fr.confidence - 0.95).abs() < f32::EPSILON);

    assert_eq!(fx.stats.translation_requests.load(Ordering::Relaxed), 2);
    assert_eq!(fx.stats.translations_received.load(Ordering::Relaxed), 2);
    assert_eq!(fx.orchestrator.pending_count(), 0);
}

#[tokio::test]
async fn test_target_languages_are_cached_after_first_resolution() {
    let fx = fixture().await;
    fx.store.seed_conversation("conv-1", trio_members());
    let first = persisted_message(&fx.store, "conv-1", "first").await;
    fx.orchestrator.translate_message(&first).await.unwrap();

    // Membership changes are not visible until the cache entry expires or
    // is invalidated.
    fx.store.seed_conversation(
        "conv-1",
        vec![Member {
            id: ParticipantId::user("dave"),
            language: "de".to_string(),
        }],
    );
    let second = persisted_message(&fx.store, "conv-1", "second").await;
    let dispatched = fx.orchestrator.translate_message(&second).await.unwrap();

    assert_eq!(dispatched, 2);
    let last = fx.channel.requests().pop().unwrap();
    assert_ne!(last.target_language, "de");
}

#[tokio::test]
async fn test_completed_translation_bumps_sender_usage() {
    let mut fx = fixture().await;
    fx.store.seed_conversation(
        "conv-1",
        vec![
            Member {
                id: ParticipantId::user("alice"),
                language: "en".to_string(),
            },
            Member {
                id: ParticipantId::user("bob"),
                language: "fr".to_string(),
            },
        ],
    );
    let message = persisted_message(&fx.store, "conv-1", "hi").await;
    fx.orchestrator.translate_message(&message).await.unwrap();

    let task_id = fx.channel.requests()[0].task_id;
    fx.channel.complete(task_id, "salut").await;
    fx.ready_rx.recv().await.unwrap();

    let usage = fx.store.sender_usage(&ParticipantId::user("alice"));
    assert_eq!(usage.translations_received, 1);
}

#[tokio::test]
async fn test_retranslate_replaces_stored_translations() {
    let mut fx = fixture().await;
    fx.store.seed_conversation(
        "conv-1",
        vec![
            Member {
                id: ParticipantId::user("alice"),
                language: "en".to_string(),
            },
            Member {
                id: ParticipantId::user("bob"),
                language: "fr".to_string(),
            },
        ],
    );
    let message = persisted_message(&fx.store, "conv-1", "Hello").await;

    fx.orchestrator.translate_message(&message).await.unwrap();
    let first_task = fx.channel.requests()[0].task_id;
    fx.channel.complete(first_task, "Bonjour").await;
    fx.ready_rx.recv().await.unwrap();

    let ack = fx.orchestrator.retranslate(message.id).await.unwrap();
    assert_eq!(ack.message_id, message.id);
    assert_eq!(ack.status, SendStatus::RetranslationQueued);

    // The stale row is gone before the fresh result lands.
    assert_eq!(fx.store.translation_count(message.id), 0);

    let second_task = fx.channel.requests()[1].task_id;
    assert_ne!(second_task, first_task);
    fx.channel.complete(second_task, "Bonjour (edited)").await;
    fx.ready_rx.recv().await.unwrap();

    assert_eq!(fx.store.translation_count(message.id), 1);
    let stored = fx
        .orchestrator
        .get_translation(message.id, "fr")
        .await
        .unwrap();
    assert_eq!(stored.translated_content, "Bonjour (edited)");
}

#[tokio::test]
async fn test_retranslate_unknown_message() {
    let fx = fixture().await;
    let missing = Uuid::new_v4();
    let err = fx.orchestrator.retranslate(missing).await.unwrap_err();
    assert_eq!(err, GatewayError::MessageNotFound(missing));
}

#[tokio::test]
async fn test_retranslate_supersedes_in_flight_task() {
    let mut fx = fixture().await;
    fx.store.seed_conversation(
        "conv-1",
        vec![
            Member {
                id: ParticipantId::user("alice"),
                language: "en".to_string(),
            },
            Member {
                id: ParticipantId::user("bob"),
                language: "fr".to_string(),
            },
        ],
    );
    let message = persisted_message(&fx.store, "conv-1", "Hello").await;

    fx.orchestrator.translate_message(&message).await.unwrap();
    let first_task = fx.channel.requests()[0].task_id;

    // Retranslation while the first task is still in flight.
    fx.orchestrator.retranslate(message.id).await.unwrap();
    assert_eq!(fx.orchestrator.pending_count(), 1);

    // The superseded task's late completion is dropped as unknown.
    fx.channel.complete(first_task, "stale").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.store.translation_count(message.id), 0);

    let second_task = fx.channel.requests()[1].task_id;
    fx.channel.complete(second_task, "fresh").await;
    fx.ready_rx.recv().await.unwrap();
    let stored = fx
        .orchestrator
        .get_translation(message.id, "fr")
        .await
        .unwrap();
    assert_eq!(stored.translated_content, "fresh");
}

#[tokio::test]
async fn test_redundant_dispatch_is_skipped() {
    let mut fx = fixture().await;
    fx.store.seed_conversation(
        "conv-1",
        vec![
            Member {
                id: ParticipantId::user("alice"),
                language: "en".to_string(),
            },
            Member {
                id: ParticipantId::user("bob"),
                language: "fr".to_string(),
            },
        ],
    );
    let message = persisted_message(&fx.store, "conv-1", "Hello").await;

    assert_eq!(fx.orchestrator.translate_message(&message).await.unwrap(), 1);
    // Still in flight: nothing new goes out.
    assert_eq!(fx.orchestrator.translate_message(&message).await.unwrap(), 0);

    let task_id = fx.channel.requests()[0].task_id;
    fx.channel.complete(task_id, "Bonjour").await;
    fx.ready_rx.recv().await.unwrap();

    // Already stored: still nothing new.
    assert_eq!(fx.orchestrator.translate_message(&message).await.unwrap(), 0);
    assert_eq!(fx.channel.requests().len(), 1);
}

#[tokio::test]
async fn test_oversized_message_is_not_dispatched() {
    let fx = fixture_with(Duration::from_millis(300), 16).await;
    fx.store.seed_conversation("conv-1", trio_members());
    let message =
        persisted_message(&fx.store, "conv-1", "this content is longer than sixteen bytes").await;

    assert_eq!(fx.orchestrator.translate_message(&message).await.unwrap(), 0);
    assert!(fx.channel.requests().is_empty());
}

#[tokio::test]
async fn test_pool_full_rejection_counts_separately() {
    let fx = fixture().await;
    fx.store.seed_conversation(
        "conv-1",
        vec![
            Member {
                id: ParticipantId::user("alice"),
                language: "en".to_string(),
            },
            Member {
                id: ParticipantId::user("bob"),
                language: "fr".to_string(),
            },
        ],
    );
    let message = persisted_message(&fx.store, "conv-1", "Hello").await;
    fx.orchestrator.translate_message(&message).await.unwrap();

    let task_id = fx.channel.requests()[0].task_id;
    fx.channel.fail(task_id, "pool_full").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fx.stats.pool_full_rejections.load(Ordering::Relaxed), 1);
    assert_eq!(fx.stats.translation_errors.load(Ordering::Relaxed), 0);
    assert_eq!(fx.store.translation_count(message.id), 0);
    assert_eq!(fx.orchestrator.pending_count(), 0);
}

#[tokio::test]
async fn test_worker_failure_counts_as_error() {
    let fx = fixture().await;
    fx.store.seed_conversation(
        "conv-1",
        vec![
            Member {
                id: ParticipantId::user("alice"),
                language: "en".to_string(),
            },
            Member {
                id: ParticipantId::user("bob"),
                language: "fr".to_string(),
            },
        ],
    );
    let message = persisted_message(&fx.store, "conv-1", "Hello").await;
    fx.orchestrator.translate_message(&message).await.unwrap();

    let task_id = fx.channel.requests()[0].task_id;
    fx.channel.fail(task_id, "model_crashed").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fx.stats.translation_errors.load(Ordering::Relaxed), 1);
    assert_eq!(fx.stats.pool_full_rejections.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_unknown_task_event_is_dropped() {
    let fx = fixture().await;
    fx.channel.fail(Uuid::new_v4(), "model_crashed").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fx.stats.translation_errors.load(Ordering::Relaxed), 0);
    assert_eq!(fx.orchestrator.pending_count(), 0);
}

#[tokio::test]
async fn test_direct_translation_completes() {
    let fx = fixture().await;

    let channel = fx.channel.clone();
    tokio::spawn(async move {
        loop {
            if let Some(request) = channel.requests().first().cloned() {
                channel.complete(request.task_id, "Hola").await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let result = fx
        .orchestrator
        .translate_direct("Hello", "en", "es", None)
        .await;

    assert!(!result.is_fallback());
    assert_eq!(result.translated_text, "Hola");
    assert_eq!(result.target_language, "es");
    assert!((result.confidence_score - 0.95).abs() < f32::EPSILON);

    let request = fx.channel.requests().remove(0);
    assert_eq!(request.conversation_id, "any");
}

#[tokio::test]
async fn test_direct_translation_times_out_to_fallback() {
    let fx = fixture_with(Duration::from_millis(100), 10_000).await;

    let result = fx
        .orchestrator
        .translate_direct("Hello", "en", "es", Some(ModelType::Premium))
        .await;

    assert!(result.is_fallback());
    assert_eq!(result.translated_text, "Hello");
    assert_eq!(result.model_type, "fallback");
    assert!((result.confidence_score - 0.1).abs() < f32::EPSILON);
    assert!(fx.stats.fallback_translations.load(Ordering::Relaxed) >= 1);
    assert_eq!(fx.orchestrator.pending_count(), 0);
}

#[tokio::test]
async fn test_direct_same_language_short_circuits() {
    let fx = fixture().await;
    let result = fx
        .orchestrator
        .translate_direct("Hello", "en", "EN", None)
        .await;

    assert!(result.is_fallback());
    assert_eq!(result.translated_text, "Hello");
    assert!(fx.channel.requests().is_empty());
}

#[tokio::test]
async fn test_get_translation_absorbs_missing_rows() {
    let fx = fixture().await;
    assert!(fx
        .orchestrator
        .get_translation(Uuid::new_v4(), "fr")
        .await
        .is_none());
}

#[tokio::test]
async fn test_lifecycle_is_idempotent() {
    let fx = fixture().await;

    // A second initialize is a no-op.
    fx.orchestrator.initialize().await;
    assert!(fx.orchestrator.health_check().await);

    fx.orchestrator.close().await;
    fx.orchestrator.close().await;
    assert!(!fx.orchestrator.health_check().await);

    fx.store.seed_conversation("conv-1", trio_members());
    let message = persisted_message(&fx.store, "conv-1", "too late").await;
    let err = fx.orchestrator.translate_message(&message).await.unwrap_err();
    assert!(matches!(err, GatewayError::ChannelClosed(_)));
}

#[tokio::test]
async fn test_close_cancels_pending_tasks() {
    let fx = fixture().await;
    fx.store.seed_conversation("conv-1", trio_members());
    let message = persisted_message(&fx.store, "conv-1", "Hello").await;
    fx.orchestrator.translate_message(&message).await.unwrap();
    assert_eq!(fx.orchestrator.pending_count(), 2);

    fx.orchestrator.close().await;
    assert_eq!(fx.orchestrator.pending_count(), 0);
}
