//! Test fixtures shared by the integration suites

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use stranger_match::config::AppConfig;
use stranger_match::geo::{GeoLocator, StaticGeoLocator};
use stranger_match::matchmaking::{MatchOutcome, MatchmakingService};
use stranger_match::metrics::MetricsCollector;
use stranger_match::service::AppState;
use stranger_match::transport::hub::Outbound;
use stranger_match::transport::protocol::ServerEvent;
use stranger_match::transport::publisher::MockEventPublisher;
use stranger_match::transport::ws::handle_frame;
use stranger_match::types::{
    Gender, GenderPreference, Participant, ParticipantId, ScopePreference, SessionKind,
};
use stranger_match::utils::current_timestamp;

/// Builder for queue entries with wildcard preferences by default
#[derive(Debug, Clone)]
pub struct ParticipantBuilder {
    participant: Participant,
}

impl ParticipantBuilder {
    pub fn new(id: &str, kind: SessionKind) -> Self {
        Self {
            participant: Participant {
                id: id.to_string(),
                country_code: "US".to_string(),
                preference: ScopePreference::AnyCountry,
                kind,
                gender: None,
                gender_preference: None,
                joined_at: current_timestamp(),
            },
        }
    }

    pub fn country(mut self, code: &str) -> Self {
        self.participant.country_code = code.to_string();
        self
    }

    pub fn same_country(mut self) -> Self {
        self.participant.preference = ScopePreference::SameCountry;
        self
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.participant.gender = Some(gender);
        self
    }

    pub fn wants(mut self, filter: GenderPreference) -> Self {
        self.participant.gender_preference = Some(filter);
        self
    }

    pub fn build(self) -> Participant {
        self.participant
    }
}

pub fn text(id: &str) -> ParticipantBuilder {
    ParticipantBuilder::new(id, SessionKind::Text)
}

pub fn video(id: &str) -> ParticipantBuilder {
    ParticipantBuilder::new(id, SessionKind::Video)
}

/// Service wired to a capturing publisher
pub fn create_test_service() -> (Arc<MatchmakingService>, Arc<MockEventPublisher>) {
    let publisher = Arc::new(MockEventPublisher::new());
    let metrics_collector = Arc::new(MetricsCollector::new().unwrap());
    let service = Arc::new(MatchmakingService::new(
        publisher.clone(),
        metrics_collector,
    ));
    (service, publisher)
}

/// Count the connection and queue the participant, as a socket would
pub async fn connect(service: &MatchmakingService, participant: Participant) -> Option<MatchOutcome> {
    service.open_connection(participant.kind);
    service.join(participant).await.unwrap()
}

/// Full application state with real connection channels
pub struct HubHarness {
    pub state: Arc<AppState>,
    receivers: HashMap<ParticipantId, Outbound>,
}

impl HubHarness {
    pub fn new() -> Self {
        Self::with_geo(Arc::new(StaticGeoLocator::with_country_code("US")))
    }

    pub fn with_geo(geo: Arc<dyn GeoLocator>) -> Self {
        Self::with_config(AppConfig::default(), geo)
    }

    pub fn with_config(config: AppConfig, geo: Arc<dyn GeoLocator>) -> Self {
        let state = AppState::with_geo_locator(config, geo).unwrap();
        Self {
            state: Arc::new(state),
            receivers: HashMap::new(),
        }
    }

    pub async fn connect(&mut self, participant: Participant) -> Option<MatchOutcome> {
        let rx = self.state.hub().register(&participant.id).unwrap();
        self.receivers.insert(participant.id.clone(), rx);
        connect(&self.state.service(), participant).await
    }

    /// Feed a raw client frame through the socket routing
    pub async fn send_frame(&self, participant_id: &str, kind: SessionKind, frame: &str) {
        handle_frame(&self.state, &participant_id.to_string(), kind, frame).await;
    }

    pub async fn disconnect(&mut self, participant_id: &str) -> u64 {
        let id = participant_id.to_string();
        let online = self.state.service().disconnect(&id).await.unwrap();
        self.state.hub().unregister(&id).unwrap();
        self.receivers.remove(participant_id);
        online
    }

    /// Everything delivered to a participant since the last drain
    pub fn drain(&mut self, participant_id: &str) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        if let Some(rx) = self.receivers.get_mut(participant_id) {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        events
    }

    pub fn drain_all(&mut self) {
        for rx in self.receivers.values_mut() {
            while rx.try_recv().is_ok() {}
        }
    }
}
