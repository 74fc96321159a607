//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Location lookup failed for {address}: {reason}")]
    GeoResolutionFailed { address: String, reason: String },

    #[error("Participant not found: {participant_id}")]
    ParticipantNotFound { participant_id: String },

    #[error("Invalid preference '{value}' for {field}")]
    InvalidPreference { field: String, value: String },

    #[error("Invalid session: {reason}")]
    InvalidSession { reason: String },

    #[error("Transport closed for participant {participant_id}")]
    TransportClosed { participant_id: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
