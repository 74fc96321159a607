//! Registry of connected participants and their resolved preferences

use crate::types::{Participant, ParticipantId};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: HashMap<ParticipantId, Participant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a participant, returning the previous record
    pub fn register(&mut self, participant: Participant) -> Option<Participant> {
        debug!(
            "Registering participant '{}' ({}, {:?})",
            participant.id, participant.kind, participant.preference
        );
        self.participants.insert(participant.id.clone(), participant)
    }

    pub fn get(&self, participant_id: &str) -> Option<&Participant> {
        self.participants.get(participant_id)
    }

    pub fn contains(&self, participant_id: &str) -> bool {
        self.participants.contains_key(participant_id)
    }

    pub fn remove(&mut self, participant_id: &str) -> Option<Participant> {
        self.participants.remove(participant_id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
