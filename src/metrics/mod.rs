//! Metrics and monitoring for the stranger-match service
//!
//! This module provides Prometheus metrics collection for connections,
//! queues, sessions and relay traffic.

pub mod collector;

pub use collector::{ConnectionMetrics, MetricsCollector, RelayMetrics, SessionMetrics};
