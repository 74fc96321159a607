//! Transport layer for the matchmaking service
//!
//! This module holds the JSON wire protocol, the event publisher abstraction
//! used by the matchmaking core, the connection hub backing it, and the
//! WebSocket handlers that drive participant and stats connections.

pub mod hub;
pub mod protocol;
pub mod publisher;
pub mod ws;

pub use hub::{ConnectionHub, Outbound};
pub use protocol::{ClientEvent, ConnectionQuery, RelayPayload, ServerEvent, SignalPayload};
pub use publisher::{EventPublisher, MockEventPublisher};
