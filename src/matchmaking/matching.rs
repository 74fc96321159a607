//! Pair matching for waiting pools
//!
//! This module decides whether two participants may be paired and finds the
//! first compatible pair in a pool. The scan is first-fit over insertion
//! order: the outer loop walks from the oldest entry and the inner loop walks
//! forward from it, so the earliest-waiting compatible pair always wins.

use crate::error::Result;
use crate::matchmaking::queue::QueueManager;
use crate::matchmaking::session::SessionManager;
use crate::types::{Gender, GenderPreference, Participant, ParticipantId, PoolKey, SessionId};
use tracing::debug;

/// Whether `filter` accepts a participant that declared `declared`
pub fn accepts(filter: GenderPreference, declared: Gender) -> bool {
    match filter {
        GenderPreference::Any => true,
        GenderPreference::Both => declared.is_binary(),
        GenderPreference::Male => declared == Gender::Male,
        GenderPreference::Female => declared == Gender::Female,
    }
}

/// Reciprocal category compatibility.
///
/// A missing declaration or filter on either side makes the pair a wildcard
/// match; otherwise each side's filter must accept the other's category.
pub fn is_compatible(a: &Participant, b: &Participant) -> bool {
    match (a.gender, a.gender_preference, b.gender, b.gender_preference) {
        (Some(a_gender), Some(a_filter), Some(b_gender), Some(b_filter)) => {
            accepts(a_filter, b_gender) && accepts(b_filter, a_gender)
        }
        _ => true,
    }
}

/// Positions of a compatible pair within a pool, `first < second`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairIndices {
    pub first: usize,
    pub second: usize,
}

/// Trait for pool pairing strategies
pub trait PairMatcher: Send + Sync {
    /// Find a pair to match in `pool`, which is ordered oldest first
    fn find_pair(&self, pool: &[Participant]) -> Option<PairIndices>;
}

/// First-fit pairwise scan
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstFitMatcher;

impl PairMatcher for FirstFitMatcher {
    fn find_pair(&self, pool: &[Participant]) -> Option<PairIndices> {
        if pool.len() < 2 {
            return None;
        }

        for first in 0..pool.len() {
            for second in (first + 1)..pool.len() {
                if is_compatible(&pool[first], &pool[second]) {
                    return Some(PairIndices { first, second });
                }
            }
        }
        None
    }
}

/// A pair pulled out of a pool and placed into a new session
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub session_id: SessionId,
    pub pool: PoolKey,
    /// Older member of the pair
    pub first: ParticipantId,
    pub second: ParticipantId,
}

/// Runs one match attempt against a pool
pub struct MatchingEngine<'a> {
    matcher: &'a dyn PairMatcher,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(matcher: &'a dyn PairMatcher) -> Self {
        Self { matcher }
    }

    /// Create at most one session from `key`'s pool.
    ///
    /// Both members leave the pool and the session is created in one step;
    /// an unmatched pool is left exactly as it was.
    pub fn attempt_match(
        &self,
        queues: &mut QueueManager,
        sessions: &mut SessionManager,
        key: &PoolKey,
    ) -> Result<Option<MatchOutcome>> {
        let pool = queues.scan(key);
        let Some(pair) = self.matcher.find_pair(pool) else {
            debug!("No compatible pair in {} pool ({} waiting)", key, pool.len());
            return Ok(None);
        };

        let first = pool[pair.first].id.clone();
        let second = pool[pair.second].id.clone();

        let session_id = sessions.create_session(&first, &second, key.kind)?;
        queues.dequeue(key, &first);
        queues.dequeue(key, &second);

        Ok(Some(MatchOutcome {
            session_id,
            pool: key.clone(),
            first,
            second,
        }))
    }
}
