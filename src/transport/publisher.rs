//! Outbound event delivery to connected participants

use crate::error::Result;
use crate::transport::protocol::ServerEvent;
use crate::types::{ParticipantId, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Trait for delivering events to participants and managing session groupings
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Deliver an event to a single participant
    async fn publish(&self, to: &ParticipantId, event: ServerEvent) -> Result<()>;

    /// Attach a participant to a session's grouping
    async fn join_room(&self, session_id: SessionId, member: &ParticipantId) -> Result<()>;

    /// Deliver an event to every member of a session's grouping except `sender`
    async fn publish_to_room(
        &self,
        session_id: SessionId,
        sender: &ParticipantId,
        event: ServerEvent,
    ) -> Result<()>;

    /// Detach every member from a session's grouping
    async fn leave_room(&self, session_id: SessionId) -> Result<()>;
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: Mutex<Vec<(ParticipantId, ServerEvent)>>,
    rooms: Mutex<HashMap<SessionId, Vec<ParticipantId>>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All delivered events in order (for testing)
    pub fn get_published_events(&self) -> Vec<(ParticipantId, ServerEvent)> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events delivered to one participant (for testing)
    pub fn events_for(&self, participant_id: &str) -> Vec<ServerEvent> {
        self.get_published_events()
            .into_iter()
            .filter(|(to, _)| to == participant_id)
            .map(|(_, event)| event)
            .collect()
    }

    /// Members currently grouped under a session (for testing)
    pub fn room_members(&self, session_id: SessionId) -> Vec<ParticipantId> {
        self.rooms
            .lock()
            .ok()
            .and_then(|rooms| rooms.get(&session_id).cloned())
            .unwrap_or_default()
    }

    /// Clear delivered events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }

    fn record(&self, to: &ParticipantId, event: ServerEvent) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push((to.clone(), event));
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish(&self, to: &ParticipantId, event: ServerEvent) -> Result<()> {
        self.record(to, event);
        Ok(())
    }

    async fn join_room(&self, session_id: SessionId, member: &ParticipantId) -> Result<()> {
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.entry(session_id).or_default().push(member.clone());
        }
        Ok(())
    }

    async fn publish_to_room(
        &self,
        session_id: SessionId,
        sender: &ParticipantId,
        event: ServerEvent,
    ) -> Result<()> {
        for member in self.room_members(session_id) {
            if &member != sender {
                self.record(&member, event.clone());
            }
        }
        Ok(())
    }

    async fn leave_room(&self, session_id: SessionId) -> Result<()> {
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.remove(&session_id);
        }
        Ok(())
    }
}
