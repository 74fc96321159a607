//! Queue, match and teardown workflows across the matchmaking service

use crate::fixtures::{connect, create_test_service, text, video};
use stranger_match::transport::protocol::ServerEvent;
use stranger_match::types::{Gender, GenderPreference, LeaveReason, PoolKey, SessionKind};

#[tokio::test]
async fn test_two_wildcard_participants_are_matched() {
    let (service, publisher) = create_test_service();

    assert!(connect(&service, text("a").build()).await.is_none());
    let outcome = connect(&service, text("b").build()).await.unwrap();

    assert_eq!(outcome.pool, PoolKey::global(SessionKind::Text));
    assert_eq!(service.session_of("a").await, Some(outcome.session_id));
    assert_eq!(service.session_of("b").await, Some(outcome.session_id));
    assert_eq!(
        service.session_members(outcome.session_id).await,
        Some(("a".to_string(), "b".to_string()))
    );
    assert_eq!(publisher.events_for("a"), vec![ServerEvent::Matched(None)]);
    assert_eq!(publisher.events_for("b"), vec![ServerEvent::Matched(None)]);
    assert!(service
        .pool_members(&PoolKey::global(SessionKind::Text))
        .await
        .is_empty());

    service.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_incompatible_pair_waits_for_third_participant() {
    let (service, publisher) = create_test_service();
    let key = PoolKey::global(SessionKind::Text);

    connect(
        &service,
        text("a")
            .gender(Gender::Male)
            .wants(GenderPreference::Female)
            .build(),
    )
    .await;
    connect(
        &service,
        text("b")
            .gender(Gender::Male)
            .wants(GenderPreference::Any)
            .build(),
    )
    .await;

    assert_eq!(service.pool_members(&key).await, vec!["a", "b"]);
    assert!(publisher.get_published_events().is_empty());

    // Repeated attempts on an unmatched pool change nothing
    assert!(service.attempt_match(&key).await.unwrap().is_none());
    assert_eq!(service.pool_members(&key).await, vec!["a", "b"]);

    let outcome = connect(
        &service,
        text("c")
            .gender(Gender::Female)
            .wants(GenderPreference::Both)
            .build(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.first, "a");
    assert_eq!(outcome.second, "c");
    assert_eq!(service.pool_members(&key).await, vec!["b"]);
    service.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_missing_declaration_on_either_side_is_a_wildcard() {
    let (service, _publisher) = create_test_service();

    connect(&service, text("a").wants(GenderPreference::Female).build()).await;
    let outcome = connect(&service, text("b").gender(Gender::Male).build()).await;

    assert!(outcome.is_some());
}

#[tokio::test]
async fn test_next_tears_down_and_requeues_only_the_requester() {
    let (service, publisher) = create_test_service();
    let key = PoolKey::global(SessionKind::Text);

    connect(&service, text("a").build()).await;
    let outcome = connect(&service, text("b").build()).await.unwrap();
    publisher.clear_events();

    let rematch = service.next(&"a".to_string()).await.unwrap();

    // The abandoned peer is told and left out of every pool
    assert!(rematch.is_none());
    assert_eq!(
        publisher.events_for("b"),
        vec![ServerEvent::StrangerDisconnected]
    );
    assert!(publisher.events_for("a").is_empty());
    assert!(service.session_members(outcome.session_id).await.is_none());
    assert_eq!(service.session_of("a").await, None);
    assert_eq!(service.session_of("b").await, None);
    assert_eq!(service.pool_members(&key).await, vec!["a"]);
    assert_eq!(service.pool_of("b").await, None);
    assert!(service.is_registered("b").await);
    assert!(publisher.room_members(outcome.session_id).is_empty());

    service.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_next_rematches_with_a_waiting_participant() {
    let (service, publisher) = create_test_service();

    connect(&service, text("a").build()).await;
    connect(&service, text("b").build()).await;
    connect(&service, text("c").build()).await;
    publisher.clear_events();

    let outcome = service.next(&"b".to_string()).await.unwrap().unwrap();

    assert_eq!(outcome.first, "c");
    assert_eq!(outcome.second, "b");
    assert_eq!(
        publisher.events_for("a"),
        vec![ServerEvent::StrangerDisconnected]
    );
    assert_eq!(publisher.events_for("b"), vec![ServerEvent::Matched(None)]);
    assert_eq!(service.session_of("a").await, None);
    service.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_mid_session_notifies_peer_and_decrements_presence() {
    let (service, publisher) = create_test_service();

    connect(&service, text("a").build()).await;
    connect(&service, text("b").build()).await;
    publisher.clear_events();
    assert_eq!(service.presence().count(), 2);

    let online = service.disconnect(&"a".to_string()).await.unwrap();

    assert_eq!(online, 1);
    assert_eq!(
        publisher.events_for("b"),
        vec![ServerEvent::StrangerDisconnected]
    );
    assert!(!service.is_registered("a").await);
    assert_eq!(service.session_of("a").await, None);
    assert_eq!(service.pool_of("a").await, None);
    assert_eq!(service.session_of("b").await, None);
    service.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_while_queued_dequeues() {
    let (service, publisher) = create_test_service();

    connect(&service, text("a").same_country().country("DE").build()).await;
    assert_eq!(
        service.pool_of("a").await,
        Some(PoolKey::region("DE", SessionKind::Text))
    );

    service.disconnect(&"a".to_string()).await.unwrap();

    assert_eq!(service.pool_of("a").await, None);
    assert!(publisher.get_published_events().is_empty());
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.online, 0);
    assert_eq!(snapshot.queued_text, 0);
}

#[tokio::test]
async fn test_region_scope_isolates_pools() {
    let (service, _publisher) = create_test_service();

    connect(&service, text("de1").same_country().country("DE").build()).await;
    connect(&service, text("fr1").same_country().country("FR").build()).await;
    connect(&service, text("global").country("DE").build()).await;

    assert_eq!(service.session_of("de1").await, None);
    assert_eq!(service.session_of("global").await, None);

    let outcome = connect(&service, text("de2").same_country().country("DE").build())
        .await
        .unwrap();
    assert_eq!(outcome.pool, PoolKey::region("DE", SessionKind::Text));
    assert_eq!(outcome.first, "de1");
    assert_eq!(service.pool_of("fr1").await, Some(PoolKey::region("FR", SessionKind::Text)));
}

#[tokio::test]
async fn test_text_and_video_never_mix() {
    let (service, _publisher) = create_test_service();

    connect(&service, text("t").build()).await;
    assert!(connect(&service, video("v").build()).await.is_none());

    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.queued_text, 1);
    assert_eq!(snapshot.queued_video, 1);
    assert_eq!(snapshot.active_sessions, 0);
}

#[tokio::test]
async fn test_video_match_marks_older_member_as_initiator() {
    let (service, publisher) = create_test_service();

    connect(&service, video("first").build()).await;
    connect(&service, video("second").build()).await;

    assert_eq!(
        publisher.events_for("first"),
        vec![ServerEvent::Matched(Some(true))]
    );
    assert_eq!(
        publisher.events_for("second"),
        vec![ServerEvent::Matched(Some(false))]
    );
}

#[tokio::test]
async fn test_requeue_under_new_scope_leaves_old_pool() {
    let (service, _publisher) = create_test_service();

    let regional = text("a").same_country().country("IT").build();
    connect(&service, regional.clone()).await;

    let mut global = regional;
    global.preference = stranger_match::types::ScopePreference::AnyCountry;
    service.join(global).await.unwrap();

    assert!(service
        .pool_members(&PoolKey::region("IT", SessionKind::Text))
        .await
        .is_empty());
    assert_eq!(
        service.pool_members(&PoolKey::global(SessionKind::Text)).await,
        vec!["a"]
    );
    service.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_leave_session_is_idempotent() {
    let (service, publisher) = create_test_service();

    connect(&service, text("a").build()).await;
    let outcome = connect(&service, text("b").build()).await.unwrap();
    publisher.clear_events();

    let left = service
        .leave_session(&"b".to_string(), LeaveReason::Next)
        .await
        .unwrap();
    assert_eq!(left, Some(outcome.session_id));

    let again = service
        .leave_session(&"b".to_string(), LeaveReason::Next)
        .await
        .unwrap();
    assert_eq!(again, None);
    let from_peer = service
        .leave_session(&"a".to_string(), LeaveReason::Disconnect)
        .await
        .unwrap();
    assert_eq!(from_peer, None);

    assert_eq!(
        publisher.events_for("a"),
        vec![ServerEvent::StrangerDisconnected]
    );
    assert!(publisher.events_for("b").is_empty());
}
