//! Matchmaking service tying the registry, pools, sessions and relay together
//!
//! Every handler takes the single state lock and runs to completion before the
//! next one starts, so pool, session and registry updates never interleave.

use crate::error::{MatchmakingError, Result};
use crate::matchmaking::matching::{FirstFitMatcher, MatchOutcome, MatchingEngine, PairMatcher};
use crate::matchmaking::presence::PresenceCounter;
use crate::matchmaking::queue::QueueManager;
use crate::matchmaking::registry::ParticipantRegistry;
use crate::matchmaking::session::SessionManager;
use crate::metrics::MetricsCollector;
use crate::transport::protocol::{RelayPayload, RelayedMessage, ServerEvent, STRANGER_SENDER};
use crate::transport::publisher::EventPublisher;
use crate::types::{LeaveReason, Participant, ParticipantId, PoolKey, SessionId, SessionKind};
use crate::utils::timestamp_millis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Everything guarded by the service lock
#[derive(Debug, Default)]
struct MatchState {
    registry: ParticipantRegistry,
    queues: QueueManager,
    sessions: SessionManager,
}

/// Point-in-time view of the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingSnapshot {
    pub online: u64,
    pub registered: usize,
    pub queued_text: usize,
    pub queued_video: usize,
    pub active_sessions: usize,
    pub pools: Vec<PoolSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub key: String,
    pub size: usize,
}

pub struct MatchmakingService {
    state: Mutex<MatchState>,
    publisher: Arc<dyn EventPublisher>,
    presence: Arc<PresenceCounter>,
    matcher: Arc<dyn PairMatcher>,
    metrics_collector: Arc<MetricsCollector>,
}

impl MatchmakingService {
    /// Create a service using first-fit matching
    pub fn new(publisher: Arc<dyn EventPublisher>, metrics_collector: Arc<MetricsCollector>) -> Self {
        Self::with_matcher(publisher, Arc::new(FirstFitMatcher), metrics_collector)
    }

    /// Create with a custom pairing strategy
    pub fn with_matcher(
        publisher: Arc<dyn EventPublisher>,
        matcher: Arc<dyn PairMatcher>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            state: Mutex::new(MatchState::default()),
            publisher,
            presence: Arc::new(PresenceCounter::new()),
            matcher,
            metrics_collector,
        }
    }

    pub fn presence(&self) -> Arc<PresenceCounter> {
        self.presence.clone()
    }

    /// Count a new connection and push the count to presence subscribers
    pub fn open_connection(&self, kind: SessionKind) -> u64 {
        let online = self.presence.increment();
        self.presence.broadcast();
        self.metrics_collector.record_connection(kind, online);
        info!("New {} connection, online participants: {}", kind, online);
        online
    }

    /// Register a participant whose location is resolved, queue it and try to match
    pub async fn join(&self, participant: Participant) -> Result<Option<MatchOutcome>> {
        let mut state = self.state.lock().await;
        let key = participant.pool_key();

        info!(
            "Queueing participant '{}' - pool: {}, gender: {:?}, filter: {:?}",
            participant.id, key, participant.gender, participant.gender_preference
        );

        state.registry.register(participant.clone());
        state.queues.enqueue(&key, participant);

        self.attempt_match_locked(&mut state, &key).await
    }

    /// Try to create one session from a pool
    pub async fn attempt_match(&self, key: &PoolKey) -> Result<Option<MatchOutcome>> {
        let mut state = self.state.lock().await;
        self.attempt_match_locked(&mut state, key).await
    }

    async fn attempt_match_locked(
        &self,
        state: &mut MatchState,
        key: &PoolKey,
    ) -> Result<Option<MatchOutcome>> {
        let start_time = Instant::now();
        let engine = MatchingEngine::new(self.matcher.as_ref());
        let outcome = engine.attempt_match(&mut state.queues, &mut state.sessions, key)?;

        self.metrics_collector
            .record_match_attempt(key.kind, outcome.is_some(), start_time.elapsed());

        if let Some(outcome) = &outcome {
            info!(
                "Matched participants '{}' and '{}' in session {} from {} pool",
                outcome.first, outcome.second, outcome.session_id, key
            );
            self.activate_session(outcome, key.kind).await?;
        }

        self.update_queue_gauges(state);
        Ok(outcome)
    }

    /// Group both members under the session and tell them they are matched
    async fn activate_session(&self, outcome: &MatchOutcome, kind: SessionKind) -> Result<()> {
        self.publisher
            .join_room(outcome.session_id, &outcome.first)
            .await?;
        self.publisher
            .join_room(outcome.session_id, &outcome.second)
            .await?;

        let (first_event, second_event) = match kind {
            SessionKind::Text => (ServerEvent::Matched(None), ServerEvent::Matched(None)),
            // The longer-waiting member starts the connection negotiation
            SessionKind::Video => (
                ServerEvent::Matched(Some(true)),
                ServerEvent::Matched(Some(false)),
            ),
        };

        self.publisher.publish(&outcome.first, first_event).await?;
        self.publisher.publish(&outcome.second, second_event).await?;
        Ok(())
    }

    /// Leave the current session (if any) and go back into the caller's pool.
    ///
    /// The abandoned peer is notified but not re-queued.
    pub async fn next(&self, participant_id: &ParticipantId) -> Result<Option<MatchOutcome>> {
        let mut state = self.state.lock().await;

        self.leave_session_locked(&mut state, participant_id, LeaveReason::Next)
            .await?;

        let Some(participant) = state.registry.get(participant_id).cloned() else {
            return Err(MatchmakingError::ParticipantNotFound {
                participant_id: participant_id.clone(),
            }
            .into());
        };

        let key = participant.pool_key();
        info!("Participant '{}' requested next, re-queueing into {}", participant_id, key);
        state.queues.enqueue(&key, participant);

        self.attempt_match_locked(&mut state, &key).await
    }

    /// Leave the caller's session, notifying the other member.
    ///
    /// Returns the torn-down session, or `None` when the caller had none.
    pub async fn leave_session(
        &self,
        participant_id: &ParticipantId,
        reason: LeaveReason,
    ) -> Result<Option<SessionId>> {
        let mut state = self.state.lock().await;
        self.leave_session_locked(&mut state, participant_id, reason)
            .await
    }

    async fn leave_session_locked(
        &self,
        state: &mut MatchState,
        participant_id: &ParticipantId,
        reason: LeaveReason,
    ) -> Result<Option<SessionId>> {
        let Some(session_id) = state.sessions.session_of(participant_id) else {
            return Ok(None);
        };
        let Some(session) = state.sessions.get(session_id).cloned() else {
            return Ok(None);
        };

        if let Some(peer) = session.peer_of(participant_id) {
            if let Err(e) = self
                .publisher
                .publish(peer, ServerEvent::StrangerDisconnected)
                .await
            {
                warn!("Failed to notify '{}' that its peer left: {}", peer, e);
            }
            info!(
                "Participant '{}' left session {} ({}), notified '{}'",
                participant_id,
                session_id,
                reason.as_str(),
                peer
            );
        }

        if let Err(e) = self.publisher.leave_room(session_id).await {
            warn!("Failed to detach members of session {}: {}", session_id, e);
        }

        state.sessions.teardown(session_id);
        self.metrics_collector.record_session_ended(reason);
        Ok(Some(session_id))
    }

    /// Forward a payload to the other member of the sender's session.
    ///
    /// Returns `false` when the sender has no session and the payload was dropped.
    pub async fn relay(&self, sender: &ParticipantId, payload: RelayPayload) -> Result<bool> {
        let state = self.state.lock().await;

        let Some(session_id) = state.sessions.session_of(sender) else {
            debug!(
                "Dropping {} from '{}': no active session",
                payload.label(),
                sender
            );
            self.metrics_collector.record_dropped_frame();
            return Ok(false);
        };

        let label = payload.label();
        let event = match payload {
            RelayPayload::Chat(content) => ServerEvent::Message(RelayedMessage {
                content,
                sender: STRANGER_SENDER.to_string(),
                timestamp: timestamp_millis(),
            }),
            RelayPayload::Typing => ServerEvent::Typing,
            RelayPayload::Signal(signal) => ServerEvent::Signal(signal),
        };

        self.publisher
            .publish_to_room(session_id, sender, event)
            .await?;
        self.metrics_collector.record_relay(label);
        Ok(true)
    }

    /// Transport-loss hook: dequeue, leave any session, forget the participant
    /// and count one fewer connection.
    pub async fn disconnect(&self, participant_id: &ParticipantId) -> Result<u64> {
        let mut state = self.state.lock().await;

        let pools = state.queues.dequeue_everywhere(participant_id);
        if !pools.is_empty() {
            debug!("Dequeued '{}' from {} pool(s)", participant_id, pools.len());
        }

        self.leave_session_locked(&mut state, participant_id, LeaveReason::Disconnect)
            .await?;
        state.registry.remove(participant_id);
        self.update_queue_gauges(&state);

        let online = self.presence.decrement();
        self.presence.broadcast();
        self.metrics_collector.set_online(online);

        info!(
            "Participant '{}' disconnected, online participants: {}",
            participant_id, online
        );
        Ok(online)
    }

    pub async fn session_of(&self, participant_id: &str) -> Option<SessionId> {
        self.state.lock().await.sessions.session_of(participant_id)
    }

    pub async fn session_members(
        &self,
        session_id: SessionId,
    ) -> Option<(ParticipantId, ParticipantId)> {
        self.state.lock().await.sessions.members(session_id)
    }

    pub async fn pool_of(&self, participant_id: &str) -> Option<PoolKey> {
        self.state.lock().await.queues.pool_of(participant_id)
    }

    pub async fn pool_members(&self, key: &PoolKey) -> Vec<ParticipantId> {
        self.state
            .lock()
            .await
            .queues
            .scan(key)
            .iter()
            .map(|p| p.id.clone())
            .collect()
    }

    pub async fn is_registered(&self, participant_id: &str) -> bool {
        self.state.lock().await.registry.contains(participant_id)
    }

    pub async fn snapshot(&self) -> MatchmakingSnapshot {
        let state = self.state.lock().await;

        let mut pools: Vec<PoolSnapshot> = state
            .queues
            .pool_sizes()
            .into_iter()
            .map(|(key, size)| PoolSnapshot {
                key: key.to_string(),
                size,
            })
            .collect();
        pools.sort_by(|a, b| a.key.cmp(&b.key));

        MatchmakingSnapshot {
            online: self.presence.count(),
            registered: state.registry.len(),
            queued_text: state.queues.queued_for_kind(SessionKind::Text),
            queued_video: state.queues.queued_for_kind(SessionKind::Video),
            active_sessions: state.sessions.len(),
            pools,
        }
    }

    /// Verify the pool and session invariants, listing every violation found
    pub async fn check_invariants(&self) -> Result<()> {
        let state = self.state.lock().await;
        let mut violations = Vec::new();

        let mut pool_counts: HashMap<&str, usize> = HashMap::new();
        for (key, pool) in state.queues.pools() {
            for participant in pool {
                *pool_counts.entry(participant.id.as_str()).or_default() += 1;
                if !state.registry.contains(&participant.id) {
                    violations.push(format!(
                        "'{}' queued in {} but not registered",
                        participant.id, key
                    ));
                }
                if state.sessions.session_of(&participant.id).is_some() {
                    violations.push(format!(
                        "'{}' is both queued in {} and in a session",
                        participant.id, key
                    ));
                }
            }
        }
        for (id, count) in pool_counts {
            if count > 1 {
                violations.push(format!("'{}' appears {} times across pools", id, count));
            }
        }

        for session in state.sessions.sessions() {
            if session.first == session.second {
                violations.push(format!("session {} pairs '{}' with itself", session.id, session.first));
            }
            for member in [&session.first, &session.second] {
                if !state.registry.contains(member) {
                    violations.push(format!(
                        "session {} member '{}' is not connected",
                        session.id, member
                    ));
                }
                if state.sessions.session_of(member) != Some(session.id) {
                    violations.push(format!(
                        "session {} member '{}' is not mapped to it",
                        session.id, member
                    ));
                }
            }
        }
        for (participant_id, session_id) in state.sessions.mappings() {
            let is_member = state
                .sessions
                .get(*session_id)
                .map(|s| s.peer_of(participant_id).is_some())
                .unwrap_or(false);
            if !is_member {
                violations.push(format!(
                    "'{}' is mapped to session {} it does not belong to",
                    participant_id, session_id
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(MatchmakingError::InternalError {
                message: format!("Invariant violations: {}", violations.join("; ")),
            }
            .into())
        }
    }

    fn update_queue_gauges(&self, state: &MatchState) {
        for kind in [SessionKind::Text, SessionKind::Video] {
            self.metrics_collector
                .set_queued(kind, state.queues.queued_for_kind(kind));
        }
    }
}
