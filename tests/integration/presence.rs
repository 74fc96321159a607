//! Presence counting and broadcast

use crate::fixtures::{connect, create_test_service, text, video};
use futures::StreamExt;
use std::time::Duration;
use stranger_match::transport::protocol::ServerEvent;
use stranger_match::types::SessionKind;
use tokio_stream::wrappers::WatchStream;

#[tokio::test]
async fn test_new_observer_sees_current_count_immediately() {
    let (service, _publisher) = create_test_service();
    connect(&service, text("a").build()).await;
    connect(&service, video("b").build()).await;
    connect(&service, video("c").build()).await;

    let mut updates = WatchStream::new(service.presence().subscribe());
    let first = tokio::time::timeout(Duration::from_millis(100), updates.next())
        .await
        .unwrap();

    assert_eq!(first, Some(3));
    assert_eq!(
        ServerEvent::online_users(3).to_json().unwrap(),
        r#"{"event":"onlineUsers","data":{"count":3}}"#
    );
}

#[tokio::test]
async fn test_connect_and_disconnect_are_broadcast() {
    let (service, _publisher) = create_test_service();
    let mut rx = service.presence().subscribe();

    service.open_connection(SessionKind::Text);
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), 1);

    service.open_connection(SessionKind::Video);
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), 2);

    service.disconnect(&"unknown".to_string()).await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), 1);
}

#[tokio::test]
async fn test_count_never_goes_negative() {
    let (service, _publisher) = create_test_service();
    connect(&service, text("a").build()).await;

    service.disconnect(&"a".to_string()).await.unwrap();
    service.disconnect(&"a".to_string()).await.unwrap();
    service.disconnect(&"ghost".to_string()).await.unwrap();

    assert_eq!(service.presence().count(), 0);
    assert_eq!(service.snapshot().await.online, 0);
}
