//! Frame routing and relay through real connection channels

use crate::fixtures::{text, video, HubHarness};
use std::sync::Arc;
use stranger_match::config::AppConfig;
use stranger_match::geo::StaticGeoLocator;
use stranger_match::transport::protocol::ServerEvent;
use stranger_match::types::SessionKind;

#[tokio::test]
async fn test_chat_and_typing_reach_only_the_peer() {
    let mut harness = HubHarness::new();
    harness.connect(text("a").build()).await;
    harness.connect(text("b").build()).await;
    harness.connect(text("c").build()).await;

    assert_eq!(harness.drain("a"), vec![ServerEvent::Matched(None)]);
    assert_eq!(harness.drain("b"), vec![ServerEvent::Matched(None)]);
    assert!(harness.drain("c").is_empty());

    harness
        .send_frame("a", SessionKind::Text, r#"{"event":"typing"}"#)
        .await;
    harness
        .send_frame(
            "a",
            SessionKind::Text,
            r#"{"event":"message","data":{"content":"hello there"}}"#,
        )
        .await;

    let received = harness.drain("b");
    assert_eq!(received.len(), 2);
    assert_eq!(received[0], ServerEvent::Typing);
    match &received[1] {
        ServerEvent::Message(message) => {
            assert_eq!(message.content, "hello there");
            assert_eq!(message.sender, "stranger");
        }
        other => panic!("unexpected event {:?}", other),
    }

    assert!(harness.drain("a").is_empty());
    assert!(harness.drain("c").is_empty());
}

#[tokio::test]
async fn test_signal_is_relayed_verbatim_on_video() {
    let mut harness = HubHarness::new();
    harness.connect(video("caller").build()).await;
    harness.connect(video("callee").build()).await;
    harness.drain_all();

    harness
        .send_frame(
            "caller",
            SessionKind::Video,
            r#"{"event":"signal","data":{"type":"offer","sdp":"v=0 o=- 1 2 IN IP4 0.0.0.0"}}"#,
        )
        .await;
    harness
        .send_frame(
            "callee",
            SessionKind::Video,
            r#"{"event":"signal","data":{"type":"candidate","candidate":{"candidate":"candidate:1 1 udp 1 10.0.0.1 9 typ host","sdpMid":"0","sdpMLineIndex":0}}}"#,
        )
        .await;

    let to_callee = harness.drain("callee");
    assert_eq!(to_callee.len(), 1);
    let ServerEvent::Signal(offer) = &to_callee[0] else {
        panic!("expected signal, got {:?}", to_callee[0]);
    };
    assert_eq!(offer.signal_type(), Some("offer"));
    assert_eq!(
        offer.field("sdp").and_then(|sdp| sdp.as_str()),
        Some("v=0 o=- 1 2 IN IP4 0.0.0.0")
    );

    let to_caller = harness.drain("caller");
    assert_eq!(to_caller.len(), 1);
    let ServerEvent::Signal(candidate) = &to_caller[0] else {
        panic!("expected signal, got {:?}", to_caller[0]);
    };
    assert_eq!(candidate.signal_type(), Some("candidate"));
    let json = serde_json::to_value(candidate).unwrap();
    assert_eq!(json["candidate"]["sdpMLineIndex"], 0);
}

#[tokio::test]
async fn test_signal_fields_reach_the_peer_untouched() {
    let mut harness = HubHarness::new();
    harness.connect(video("caller").build()).await;
    harness.connect(video("callee").build()).await;
    harness.drain_all();

    let body = r#"{"type":"offer","sdp":{"type":"offer","sdp":"v=0"},"renegotiate":true}"#;
    harness
        .send_frame(
            "caller",
            SessionKind::Video,
            &format!(r#"{{"event":"signal","data":{}}}"#, body),
        )
        .await;

    let to_callee = harness.drain("callee");
    assert_eq!(to_callee.len(), 1);
    let ServerEvent::Signal(signal) = &to_callee[0] else {
        panic!("expected signal, got {:?}", to_callee[0]);
    };
    let expected: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(signal.0, expected);
    assert_eq!(signal.field("renegotiate"), Some(&serde_json::Value::Bool(true)));
}

#[tokio::test]
async fn test_payloads_of_the_wrong_kind_are_ignored() {
    let mut harness = HubHarness::new();
    harness.connect(text("a").build()).await;
    harness.connect(text("b").build()).await;
    harness.connect(video("v1").build()).await;
    harness.connect(video("v2").build()).await;
    harness.drain_all();

    harness
        .send_frame(
            "a",
            SessionKind::Text,
            r#"{"event":"signal","data":{"type":"offer","sdp":"x"}}"#,
        )
        .await;
    harness
        .send_frame(
            "v1",
            SessionKind::Video,
            r#"{"event":"message","data":{"content":"hi"}}"#,
        )
        .await;

    assert!(harness.drain("b").is_empty());
    assert!(harness.drain("v2").is_empty());
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let mut harness = HubHarness::new();
    harness.connect(text("a").build()).await;
    harness.connect(text("b").build()).await;
    harness.drain_all();

    harness.send_frame("a", SessionKind::Text, "not json").await;
    harness
        .send_frame("a", SessionKind::Text, r#"{"event":"unknown"}"#)
        .await;
    harness
        .send_frame("a", SessionKind::Text, r#"{"event":"message"}"#)
        .await;

    assert!(harness.drain("b").is_empty());
    let service = harness.state.service();
    assert!(service.session_of("a").await.is_some());
    service.check_invariants().await.unwrap();
}

#[tokio::test]
async fn test_relay_after_peer_left_is_silently_dropped() {
    let mut harness = HubHarness::new();
    harness.connect(text("a").build()).await;
    harness.connect(text("b").build()).await;
    harness.drain_all();

    harness.disconnect("b").await;
    assert_eq!(harness.drain("a"), vec![ServerEvent::StrangerDisconnected]);

    harness
        .send_frame(
            "a",
            SessionKind::Text,
            r#"{"event":"message","data":{"content":"anyone?"}}"#,
        )
        .await;
    assert!(harness.drain("a").is_empty());

    let dropped = harness
        .state
        .metrics_collector()
        .relay()
        .frames_dropped_total
        .get();
    assert_eq!(dropped, 1);
}

#[tokio::test]
async fn test_next_frame_moves_sender_back_into_pool() {
    let mut harness = HubHarness::new();
    harness.connect(text("a").build()).await;
    harness.connect(text("b").build()).await;
    harness.drain_all();

    harness
        .send_frame("b", SessionKind::Text, r#"{"event":"next"}"#)
        .await;

    assert_eq!(harness.drain("a"), vec![ServerEvent::StrangerDisconnected]);
    assert!(harness.drain("b").is_empty());

    let service = harness.state.service();
    assert!(service.pool_of("b").await.is_some());
    assert!(service.pool_of("a").await.is_none());

    // The abandoned member can re-queue on its own and meets the requester again
    harness
        .send_frame("a", SessionKind::Text, r#"{"event":"next"}"#)
        .await;
    assert_eq!(harness.drain("a"), vec![ServerEvent::Matched(None)]);
    assert_eq!(harness.drain("b"), vec![ServerEvent::Matched(None)]);
}

#[tokio::test]
async fn test_slow_reader_still_learns_its_stranger_left() {
    let mut config = AppConfig::default();
    config.service.outbound_buffer = 4;
    let mut harness =
        HubHarness::with_config(config, Arc::new(StaticGeoLocator::with_country_code("US")));
    harness.connect(text("a").build()).await;
    harness.connect(text("b").build()).await;
    harness.drain("a");

    // b reads nothing while a floods it
    for _ in 0..10 {
        harness
            .send_frame("a", SessionKind::Text, r#"{"event":"typing"}"#)
            .await;
    }
    harness.disconnect("a").await;

    let received = harness.drain("b");
    assert_eq!(received.first(), Some(&ServerEvent::Matched(None)));
    assert_eq!(received.last(), Some(&ServerEvent::StrangerDisconnected));
    let typing = received
        .iter()
        .filter(|event| **event == ServerEvent::Typing)
        .count();
    assert_eq!(typing, 4);
    assert_eq!(received.len(), 6);
}
