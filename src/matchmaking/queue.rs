//! Waiting pools keyed by matching scope and session kind
//!
//! Pools are created lazily on first write and persist, possibly empty, for
//! the lifetime of the process. A participant sits in at most one pool.

use crate::types::{Participant, PoolKey, SessionKind};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct QueueManager {
    pools: HashMap<PoolKey, Vec<Participant>>,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a participant to a pool, first removing it from every pool it is in
    pub fn enqueue(&mut self, key: &PoolKey, participant: Participant) {
        self.dequeue_everywhere(&participant.id);

        let pool = self.pools.entry(key.clone()).or_default();
        debug!("Added participant '{}' to {} pool", participant.id, key);
        pool.push(participant);
        debug!("Pool {} size: {}", key, pool.len());
    }

    /// Remove a participant from one pool. Absent participants are a no-op.
    pub fn dequeue(&mut self, key: &PoolKey, participant_id: &str) -> Option<Participant> {
        let pool = self.pools.get_mut(key)?;
        let index = pool.iter().position(|p| p.id == participant_id)?;
        let removed = pool.remove(index);
        debug!(
            "Removed participant '{}' from {} pool, size: {}",
            participant_id,
            key,
            pool.len()
        );
        Some(removed)
    }

    /// Remove a participant from every pool, returning the keys it was found in
    pub fn dequeue_everywhere(&mut self, participant_id: &str) -> Vec<PoolKey> {
        let keys: Vec<PoolKey> = self
            .pools
            .iter()
            .filter(|(_, pool)| pool.iter().any(|p| p.id == participant_id))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            self.dequeue(key, participant_id);
        }
        keys
    }

    /// Members of a pool in insertion order
    pub fn scan(&self, key: &PoolKey) -> &[Participant] {
        self.pools.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Empty a pool, keeping the key around
    pub fn clear(&mut self, key: &PoolKey) {
        self.pools.insert(key.clone(), Vec::new());
        debug!("Cleared {} pool", key);
    }

    /// The pool a participant is currently waiting in
    pub fn pool_of(&self, participant_id: &str) -> Option<PoolKey> {
        self.pools
            .iter()
            .find(|(_, pool)| pool.iter().any(|p| p.id == participant_id))
            .map(|(key, _)| key.clone())
    }

    pub fn is_queued(&self, participant_id: &str) -> bool {
        self.pool_of(participant_id).is_some()
    }

    pub fn pool_len(&self, key: &PoolKey) -> usize {
        self.scan(key).len()
    }

    pub fn total_queued(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    pub fn queued_for_kind(&self, kind: SessionKind) -> usize {
        self.pools
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .map(|(_, pool)| pool.len())
            .sum()
    }

    /// Every known pool with its current size
    pub fn pool_sizes(&self) -> Vec<(PoolKey, usize)> {
        self.pools
            .iter()
            .map(|(key, pool)| (key.clone(), pool.len()))
            .collect()
    }

    pub(crate) fn pools(&self) -> impl Iterator<Item = (&PoolKey, &Vec<Participant>)> {
        self.pools.iter()
    }
}
