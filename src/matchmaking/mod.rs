//! Matchmaking core for the stranger-match service
//!
//! This module holds the participant registry, the waiting pools, the pair
//! matcher, session bookkeeping and the presence counter, plus the service
//! that drives them from connection events.

pub mod manager;
pub mod matching;
pub mod presence;
pub mod queue;
pub mod registry;
pub mod session;

// Re-export commonly used types
pub use manager::{MatchmakingService, MatchmakingSnapshot, PoolSnapshot};
pub use matching::{
    accepts, is_compatible, FirstFitMatcher, MatchOutcome, MatchingEngine, PairIndices,
    PairMatcher,
};
pub use presence::PresenceCounter;
pub use queue::QueueManager;
pub use registry::ParticipantRegistry;
pub use session::{Session, SessionManager};
