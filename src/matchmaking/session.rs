//! Two-party session records and the participant → session mapping
//!
//! `teardown` is the only way a session disappears.

use crate::error::{MatchmakingError, Result};
use crate::types::{ParticipantId, SessionId, SessionKind};
use crate::utils::{current_timestamp, generate_session_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// An active pairing of two distinct participants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub kind: SessionKind,
    /// The member that was waiting longer; it initiates video negotiation
    pub first: ParticipantId,
    pub second: ParticipantId,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn members(&self) -> (ParticipantId, ParticipantId) {
        (self.first.clone(), self.second.clone())
    }

    /// The other member, or `None` when `participant_id` is not a member
    pub fn peer_of(&self, participant_id: &str) -> Option<&ParticipantId> {
        if self.first == participant_id {
            Some(&self.second)
        } else if self.second == participant_id {
            Some(&self.first)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<SessionId, Session>,
    by_participant: HashMap<ParticipantId, SessionId>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session between two participants that are not already paired
    pub fn create_session(
        &mut self,
        first: &ParticipantId,
        second: &ParticipantId,
        kind: SessionKind,
    ) -> Result<SessionId> {
        if first == second {
            return Err(MatchmakingError::InvalidSession {
                reason: format!("participant '{}' cannot be paired with itself", first),
            }
            .into());
        }
        for member in [first, second] {
            if let Some(existing) = self.by_participant.get(member) {
                return Err(MatchmakingError::InvalidSession {
                    reason: format!("participant '{}' is already in session {}", member, existing),
                }
                .into());
            }
        }

        let session = Session {
            id: generate_session_id(),
            kind,
            first: first.clone(),
            second: second.clone(),
            created_at: current_timestamp(),
        };
        let session_id = session.id;

        self.by_participant.insert(first.clone(), session_id);
        self.by_participant.insert(second.clone(), session_id);
        self.sessions.insert(session_id, session);

        info!(
            "Created {} session {} with participants '{}' and '{}'",
            kind, session_id, first, second
        );
        Ok(session_id)
    }

    pub fn session_of(&self, participant_id: &str) -> Option<SessionId> {
        self.by_participant.get(participant_id).copied()
    }

    pub fn get(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    pub fn members(&self, session_id: SessionId) -> Option<(ParticipantId, ParticipantId)> {
        self.sessions.get(&session_id).map(Session::members)
    }

    /// Remove a session and both member mappings. Unknown ids are a no-op.
    pub fn teardown(&mut self, session_id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&session_id)?;
        self.by_participant.remove(&session.first);
        self.by_participant.remove(&session.second);
        info!("Removed session {}", session_id);
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn count_for_kind(&self, kind: SessionKind) -> usize {
        self.sessions.values().filter(|s| s.kind == kind).count()
    }

    pub(crate) fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub(crate) fn mappings(&self) -> impl Iterator<Item = (&ParticipantId, &SessionId)> {
        self.by_participant.iter()
    }
}
