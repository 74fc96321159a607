//! Stranger Match - matchmaking and relay for anonymous one-to-one chat
//!
//! This crate pairs strangers waiting for a text or video session, scoped
//! globally or to their own country, and relays chat, typing and call
//! negotiation frames between the two members of each session.

pub mod config;
pub mod error;
pub mod geo;
pub mod matchmaking;
pub mod metrics;
pub mod service;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use geo::{GeoInfo, GeoLocator};
pub use matchmaking::{MatchmakingService, MatchmakingSnapshot};
pub use transport::{ConnectionHub, EventPublisher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
