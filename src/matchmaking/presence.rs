//! Live count of connected participants across every session kind
//!
//! The count lives in a watch channel: mutations are serialized by the
//! channel and a fresh subscriber always observes the current value.

use tokio::sync::watch;

#[derive(Debug)]
pub struct PresenceCounter {
    tx: watch::Sender<u64>,
}

impl PresenceCounter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Count one more connection, without notifying subscribers
    pub fn increment(&self) -> u64 {
        let mut current = 0;
        self.tx.send_if_modified(|count| {
            *count += 1;
            current = *count;
            false
        });
        current
    }

    /// Count one fewer connection, floored at zero, without notifying subscribers
    pub fn decrement(&self) -> u64 {
        let mut current = 0;
        self.tx.send_if_modified(|count| {
            *count = count.saturating_sub(1);
            current = *count;
            false
        });
        current
    }

    /// Push the current count to every subscriber
    pub fn broadcast(&self) {
        self.tx.send_modify(|_| {});
    }

    pub fn count(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Subscribe to count updates; the receiver starts at the current value
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for PresenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
