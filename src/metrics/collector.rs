//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the stranger-match service
//! using Prometheus metrics.

use crate::types::{LeaveReason, SessionKind};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Connection and presence metrics
    connection_metrics: ConnectionMetrics,

    /// Queue and session metrics
    session_metrics: SessionMetrics,

    /// Relay metrics
    relay_metrics: RelayMetrics,
}

/// Connection-level metrics
#[derive(Clone)]
pub struct ConnectionMetrics {
    /// Participants currently connected
    pub online_participants: IntGauge,

    /// Connections accepted per session kind
    pub connections_total: IntCounterVec,

    /// Location lookup outcomes
    pub geo_lookups_total: IntCounterVec,
}

/// Queue and session metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Participants waiting per session kind
    pub participants_queued: IntGaugeVec,

    /// Sessions currently active
    pub active_sessions: IntGauge,

    /// Sessions created per session kind
    pub sessions_created_total: IntCounterVec,

    /// Sessions torn down per reason
    pub sessions_ended_total: IntCounterVec,

    /// Time spent scanning a pool for a pair
    pub match_attempt_duration: Histogram,
}

/// Relay metrics
#[derive(Clone)]
pub struct RelayMetrics {
    /// Frames forwarded to a peer per payload kind
    pub frames_relayed_total: IntCounterVec,

    /// Frames dropped because the sender had no session
    pub frames_dropped_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let connection_metrics = ConnectionMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let relay_metrics = RelayMetrics::new(&registry)?;

        Ok(Self {
            registry,
            connection_metrics,
            session_metrics,
            relay_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn connection(&self) -> &ConnectionMetrics {
        &self.connection_metrics
    }

    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    pub fn relay(&self) -> &RelayMetrics {
        &self.relay_metrics
    }

    /// Record a new participant connection
    pub fn record_connection(&self, kind: SessionKind, online: u64) {
        self.connection_metrics
            .connections_total
            .with_label_values(&[kind.as_str()])
            .inc();
        self.set_online(online);
    }

    pub fn set_online(&self, online: u64) {
        self.connection_metrics
            .online_participants
            .set(online as i64);
    }

    /// Record the outcome of a location lookup
    pub fn record_geo_lookup(&self, success: bool) {
        let status = if success { "success" } else { "failed" };
        self.connection_metrics
            .geo_lookups_total
            .with_label_values(&[status])
            .inc();
    }

    pub fn set_queued(&self, kind: SessionKind, queued: usize) {
        self.session_metrics
            .participants_queued
            .with_label_values(&[kind.as_str()])
            .set(queued as i64);
    }

    /// Record a match attempt and, when it produced one, the new session
    pub fn record_match_attempt(&self, kind: SessionKind, matched: bool, duration: Duration) {
        self.session_metrics
            .match_attempt_duration
            .observe(duration.as_secs_f64());

        if matched {
            self.session_metrics
                .sessions_created_total
                .with_label_values(&[kind.as_str()])
                .inc();
            self.session_metrics.active_sessions.inc();
        }
    }

    pub fn record_session_ended(&self, reason: LeaveReason) {
        self.session_metrics
            .sessions_ended_total
            .with_label_values(&[reason.as_str()])
            .inc();
        self.session_metrics.active_sessions.dec();
    }

    pub fn record_relay(&self, payload: &str) {
        self.relay_metrics
            .frames_relayed_total
            .with_label_values(&[payload])
            .inc();
    }

    pub fn record_dropped_frame(&self) {
        self.relay_metrics.frames_dropped_total.inc();
    }
}

impl ConnectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let online_participants = IntGauge::new(
            "stranger_match_online_participants",
            "Participants currently connected",
        )?;
        registry.register(Box::new(online_participants.clone()))?;

        let connections_total = IntCounterVec::new(
            Opts::new(
                "stranger_match_connections_total",
                "Participant connections accepted",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let geo_lookups_total = IntCounterVec::new(
            Opts::new("stranger_match_geo_lookups_total", "Location lookups"),
            &["status"],
        )?;
        registry.register(Box::new(geo_lookups_total.clone()))?;

        Ok(Self {
            online_participants,
            connections_total,
            geo_lookups_total,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let participants_queued = IntGaugeVec::new(
            Opts::new(
                "stranger_match_participants_queued",
                "Participants waiting for a match",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(participants_queued.clone()))?;

        let active_sessions =
            IntGauge::new("stranger_match_active_sessions", "Sessions currently active")?;
        registry.register(Box::new(active_sessions.clone()))?;

        let sessions_created_total = IntCounterVec::new(
            Opts::new("stranger_match_sessions_created_total", "Sessions created"),
            &["kind"],
        )?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        let sessions_ended_total = IntCounterVec::new(
            Opts::new("stranger_match_sessions_ended_total", "Sessions torn down"),
            &["reason"],
        )?;
        registry.register(Box::new(sessions_ended_total.clone()))?;

        let match_attempt_duration = Histogram::with_opts(
            HistogramOpts::new(
                "stranger_match_match_attempt_duration_seconds",
                "Time spent scanning a pool for a pair",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1, 1.0]),
        )?;
        registry.register(Box::new(match_attempt_duration.clone()))?;

        Ok(Self {
            participants_queued,
            active_sessions,
            sessions_created_total,
            sessions_ended_total,
            match_attempt_duration,
        })
    }
}

impl RelayMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let frames_relayed_total = IntCounterVec::new(
            Opts::new(
                "stranger_match_frames_relayed_total",
                "Frames forwarded between session members",
            ),
            &["payload"],
        )?;
        registry.register(Box::new(frames_relayed_total.clone()))?;

        let frames_dropped_total = IntCounter::new(
            "stranger_match_frames_dropped_total",
            "Frames dropped because the sender had no active session",
        )?;
        registry.register(Box::new(frames_dropped_total.clone()))?;

        Ok(Self {
            frames_relayed_total,
            frames_dropped_total,
        })
    }
}
