//! High concurrency tests for connection handling
//!
//! Many participants connect, chat and leave from separate tasks; the pool
//! and session invariants must hold throughout.

use crate::fixtures::{create_test_service, text, video};
use std::time::{Duration, Instant};
use stranger_match::transport::protocol::RelayPayload;
use stranger_match::types::{PoolKey, SessionKind};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_200_concurrent_connections_pair_everyone() {
    let (service, publisher) = create_test_service();
    let participants = 200;
    let start_time = Instant::now();

    let handles: Vec<_> = (0..participants)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let participant = text(&format!("load_{}", i)).build();
                service.open_connection(participant.kind);
                service.join(participant).await.unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    let elapsed = start_time.elapsed();
    assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);

    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.online, participants as u64);
    assert_eq!(snapshot.active_sessions, participants / 2);
    assert_eq!(snapshot.queued_text, 0);
    assert_eq!(publisher.get_published_events().len(), participants);
    service.check_invariants().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_next_relay_and_disconnect_keep_invariants() {
    let (service, _publisher) = create_test_service();
    let participants = 100;

    for i in 0..participants {
        let participant = video(&format!("v_{}", i)).build();
        service.open_connection(participant.kind);
        service.join(participant).await.unwrap();
    }

    let handles: Vec<_> = (0..participants)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let id = format!("v_{}", i);
                match i % 3 {
                    0 => {
                        service.next(&id).await.unwrap();
                    }
                    1 => {
                        service.relay(&id, RelayPayload::Typing).await.unwrap();
                    }
                    _ => {
                        service.disconnect(&id).await.unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    service.check_invariants().await.unwrap();

    let disconnected = (0..participants).filter(|i| i % 3 == 2).count();
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.online, (participants - disconnected) as u64);
    assert_eq!(snapshot.registered, participants - disconnected);
    assert!(snapshot.queued_video <= participants - disconnected);

    // Everyone still waiting is in the one global video pool
    let waiting = service
        .pool_members(&PoolKey::global(SessionKind::Video))
        .await;
    assert_eq!(waiting.len(), snapshot.queued_video);
}
