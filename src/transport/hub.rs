//! Connection hub holding the outbound channel of every live socket
//!
//! The hub is the production [`EventPublisher`]: each WebSocket task registers
//! here and drains its [`Outbound`] onto the wire. Relayed peer payloads are
//! capped per connection and dropped past the cap; control events such as
//! `matched` and `strangerDisconnected` are always queued, in order.

use crate::error::{MatchmakingError, Result};
use crate::transport::protocol::ServerEvent;
use crate::transport::publisher::EventPublisher;
use crate::types::{ParticipantId, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, warn};

#[derive(Clone)]
struct Connection {
    tx: mpsc::UnboundedSender<ServerEvent>,
    pending_relayed: Arc<AtomicUsize>,
}

/// Receiving end of one connection's event queue
pub struct Outbound {
    rx: mpsc::UnboundedReceiver<ServerEvent>,
    pending_relayed: Arc<AtomicUsize>,
}

impl Outbound {
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        let event = self.rx.recv().await?;
        self.taken(&event);
        Some(event)
    }

    pub fn try_recv(&mut self) -> std::result::Result<ServerEvent, TryRecvError> {
        let event = self.rx.try_recv()?;
        self.taken(&event);
        Ok(event)
    }

    fn taken(&self, event: &ServerEvent) {
        if event.is_relayed() {
            self.pending_relayed.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

pub struct ConnectionHub {
    connections: RwLock<HashMap<ParticipantId, Connection>>,
    rooms: RwLock<HashMap<SessionId, Vec<ParticipantId>>>,
    relay_buffer: usize,
}

impl ConnectionHub {
    pub fn new(relay_buffer: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
            relay_buffer: relay_buffer.max(1),
        }
    }

    /// Register a connection and hand back the queue its socket task drains
    pub fn register(&self, participant_id: &ParticipantId) -> Result<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending_relayed = Arc::new(AtomicUsize::new(0));
        let mut connections =
            self.connections
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire connections lock".to_string(),
                })?;
        connections.insert(
            participant_id.clone(),
            Connection {
                tx,
                pending_relayed: pending_relayed.clone(),
            },
        );
        Ok(Outbound {
            rx,
            pending_relayed,
        })
    }

    /// Drop a connection's outbound channel
    pub fn unregister(&self, participant_id: &ParticipantId) -> Result<()> {
        let mut connections =
            self.connections
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire connections lock".to_string(),
                })?;
        connections.remove(participant_id);
        Ok(())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().map(|r| r.len()).unwrap_or(0)
    }

    fn deliver(&self, to: &ParticipantId, event: ServerEvent) -> Result<()> {
        let connection = {
            let connections =
                self.connections
                    .read()
                    .map_err(|_| MatchmakingError::InternalError {
                        message: "Failed to acquire connections lock".to_string(),
                    })?;
            connections.get(to).cloned()
        };

        // Delivery is best effort: a peer that already went away is not an error.
        let Some(connection) = connection else {
            debug!("No live connection for '{}', dropping event", to);
            return Ok(());
        };

        let relayed = event.is_relayed();
        if relayed {
            let pending = connection.pending_relayed.fetch_add(1, Ordering::AcqRel);
            if pending >= self.relay_buffer {
                connection.pending_relayed.fetch_sub(1, Ordering::AcqRel);
                warn!("Outbound buffer full for '{}', dropping relayed frame", to);
                return Ok(());
            }
        }

        if connection.tx.send(event).is_err() {
            if relayed {
                connection.pending_relayed.fetch_sub(1, Ordering::AcqRel);
            }
            debug!("Connection '{}' closed, dropping event", to);
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for ConnectionHub {
    async fn publish(&self, to: &ParticipantId, event: ServerEvent) -> Result<()> {
        self.deliver(to, event)
    }

    async fn join_room(&self, session_id: SessionId, member: &ParticipantId) -> Result<()> {
        let mut rooms = self
            .rooms
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire rooms lock".to_string(),
            })?;
        let members = rooms.entry(session_id).or_default();
        if !members.contains(member) {
            members.push(member.clone());
        }
        Ok(())
    }

    async fn publish_to_room(
        &self,
        session_id: SessionId,
        sender: &ParticipantId,
        event: ServerEvent,
    ) -> Result<()> {
        let members = {
            let rooms = self
                .rooms
                .read()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire rooms lock".to_string(),
                })?;
            rooms.get(&session_id).cloned().unwrap_or_default()
        };

        for member in members.iter().filter(|m| *m != sender) {
            self.deliver(member, event.clone())?;
        }
        Ok(())
    }

    async fn leave_room(&self, session_id: SessionId) -> Result<()> {
        let mut rooms = self
            .rooms
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire rooms lock".to_string(),
            })?;
        rooms.remove(&session_id);
        Ok(())
    }
}
