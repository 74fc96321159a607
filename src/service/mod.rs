//! Service layer for the stranger-match service
//!
//! This module contains the main application state, health reporting and the
//! HTTP/WebSocket server.

pub mod app;
pub mod health;
pub mod server;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use server::{create_router, HttpServer};
