// Unit tests for the session registry's dual-map behavior.

use polyglot_gateway::connection::{Session, SessionRegistry};
use polyglot_gateway::core::ParticipantId;

fn session(connection_id: u64, identity: ParticipantId) -> Session {
    Session::new(connection_id, identity, Some("en".to_string()))
}

#[test]
fn test_connect_and_lookup_both_directions() {
    let registry = SessionRegistry::new();
    let alice = ParticipantId::user("alice");

    registry.connect(session(1, alice.clone()));

    assert_eq!(registry.identity_of(1), Some(alice.clone()));
    assert!(registry.sessions_for(&alice).contains(&1));
    assert_eq!(registry.session_count(), 1);
    assert_eq!(registry.identity_count(), 1);
}

#[test]
fn test_multi_device_identity() {
    let registry = SessionRegistry::new();
    let alice = ParticipantId::user("alice");

    registry.connect(session(1, alice.clone()));
    registry.connect(session(2, alice.clone()));
    registry.connect(session(3, alice.clone()));

    assert_eq!(registry.sessions_for(&alice).len(), 3);
    assert_eq!(registry.session_count(), 3);
    assert_eq!(registry.identity_count(), 1);

    // Removing one device is not the offline transition.
    let d = registry.disconnect(2).unwrap();
    assert_eq!(d.identity, alice);
    assert!(!d.last_session);
    assert_eq!(registry.sessions_for(&alice).len(), 2);
}

#[test]
fn test_last_session_transition() {
    let registry = SessionRegistry::new();
    let bob = ParticipantId::user("bob");

    registry.connect(session(10, bob.clone()));
    registry.connect(session(11, bob.clone()));

    assert!(!registry.disconnect(10).unwrap().last_session);
    let last = registry.disconnect(11).unwrap();
    assert!(last.last_session);

    assert_eq!(registry.identity_count(), 0);
    assert!(registry.sessions_for(&bob).is_empty());
}

#[test]
fn test_duplicate_connect_is_idempotent() {
    let registry = SessionRegistry::new();
    let alice = ParticipantId::user("alice");

    registry.connect(session(1, alice.clone()));
    // Same connection id again, even with a different identity, is ignored.
    registry.connect(session(1, ParticipantId::user("mallory")));

    assert_eq!(registry.session_count(), 1);
    assert_eq!(registry.identity_of(1), Some(alice));
}

#[test]
fn test_disconnect_unknown_connection() {
    let registry = SessionRegistry::new();
    assert!(registry.disconnect(42).is_none());
}

#[test]
fn test_anonymous_and_user_namespaces_are_distinct() {
    let registry = SessionRegistry::new();
    let user = ParticipantId::user("visitor-1");
    let anon = ParticipantId::anonymous("visitor-1");

    registry.connect(session(1, user.clone()));
    registry.connect(session(2, anon.clone()));

    assert_eq!(registry.identity_count(), 2);
    assert_eq!(registry.sessions_for(&user).len(), 1);
    assert_eq!(registry.sessions_for(&anon).len(), 1);
    assert!(registry.sessions_for(&user).contains(&1));
    assert!(registry.sessions_for(&anon).contains(&2));
}

#[test]
fn test_device_language_lookup() {
    let registry = SessionRegistry::new();
    registry.connect(Session::new(1, ParticipantId::user("alice"), Some("fr".to_string())));
    registry.connect(Session::new(2, ParticipantId::user("bob"), None));

    assert_eq!(registry.device_language_of(1), Some("fr".to_string()));
    assert_eq!(registry.device_language_of(2), None);
    assert_eq!(registry.device_language_of(99), None);
}

#[test]
fn test_connected_identities() {
    let registry = SessionRegistry::new();
    registry.connect(session(1, ParticipantId::user("alice")));
    registry.connect(session(2, ParticipantId::user("bob")));
    registry.connect(session(3, ParticipantId::user("alice")));

    let mut identities = registry.connected_identities();
    identities.sort_by_key(|i| i.as_str().to_string());
    assert_eq!(
        identities,
        vec![ParticipantId::user("alice"), ParticipantId::user("bob")]
    );
}
