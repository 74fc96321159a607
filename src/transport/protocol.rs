//! JSON frame definitions exchanged over the WebSocket endpoints
//!
//! Every frame is an object tagged by `event`, with an optional `data` body.

use crate::error::{MatchmakingError, Result};
use crate::types::{Gender, GenderPreference, ScopePreference, SessionKind};
use serde::{Deserialize, Serialize};

/// Sender label stamped on relayed chat messages
pub const STRANGER_SENDER: &str = "stranger";

/// Connection negotiation frame (offer, answer or network candidate).
///
/// The body is kept as raw JSON and forwarded exactly as received; only
/// `type` is ever read, for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalPayload(pub serde_json::Value);

impl SignalPayload {
    pub fn signal_type(&self) -> Option<&str> {
        self.0.get("type").and_then(|t| t.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatContent {
    pub content: String,
}

/// Frames sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    Next,
    Message(ChatContent),
    Typing,
    Signal(SignalPayload),
}

/// Payloads forwarded between the two members of a session
#[derive(Debug, Clone, PartialEq)]
pub enum RelayPayload {
    Chat(String),
    Typing,
    Signal(SignalPayload),
}

impl RelayPayload {
    /// Whether this payload shape belongs to the given session kind
    pub fn allowed_for(&self, kind: SessionKind) -> bool {
        match self {
            RelayPayload::Chat(_) | RelayPayload::Typing => kind == SessionKind::Text,
            RelayPayload::Signal(_) => kind == SessionKind::Video,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RelayPayload::Chat(_) => "message",
            RelayPayload::Typing => "typing",
            RelayPayload::Signal(_) => "signal",
        }
    }
}

impl ClientEvent {
    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Malformed client frame: {}", e),
            }
            .into()
        })
    }

    /// Split out the relayable part of the event, `None` for control events
    pub fn into_relay(self) -> Option<RelayPayload> {
        match self {
            ClientEvent::Next => None,
            ClientEvent::Message(chat) => Some(RelayPayload::Chat(chat.content)),
            ClientEvent::Typing => Some(RelayPayload::Typing),
            ClientEvent::Signal(signal) => Some(RelayPayload::Signal(signal)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedMessage {
    pub content: String,
    pub sender: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineUsers {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

/// Frames sent to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Text sessions carry no body, video sessions say whether this side initiates
    Matched(Option<bool>),
    StrangerDisconnected,
    Message(RelayedMessage),
    Typing,
    Signal(SignalPayload),
    OnlineUsers(OnlineUsers),
    Error(ErrorMessage),
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorMessage {
            message: message.into(),
        })
    }

    pub fn online_users(count: u64) -> Self {
        ServerEvent::OnlineUsers(OnlineUsers { count })
    }

    /// Peer payloads, as opposed to control events produced by the server
    pub fn is_relayed(&self) -> bool {
        matches!(
            self,
            ServerEvent::Message(_) | ServerEvent::Typing | ServerEvent::Signal(_)
        )
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize server event: {}", e),
            }
            .into()
        })
    }
}

/// Query parameters carried by every participant connection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionQuery {
    pub preference: Option<String>,
    pub gender: Option<String>,
    pub gender_preference: Option<String>,
}

/// Preferences resolved from the connection query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionPreferences {
    pub preference: ScopePreference,
    pub gender: Option<Gender>,
    pub gender_preference: Option<GenderPreference>,
}

impl ConnectionQuery {
    pub fn resolve(&self) -> ConnectionPreferences {
        ConnectionPreferences {
            preference: ScopePreference::from_query(self.preference.as_deref()),
            gender: Gender::from_query(self.gender.as_deref()),
            gender_preference: GenderPreference::from_query(self.gender_preference.as_deref()),
        }
    }
}
