//! WebSocket entrypoints for participant and presence connections
//!
//! A participant connection is registered with the hub, located, queued and
//! then split into a send task draining its outbound channel and a receive
//! task routing client frames into the matchmaking service.

use crate::error::MatchmakingError;
use crate::service::app::AppState;
use crate::transport::protocol::{ClientEvent, ConnectionPreferences, ConnectionQuery, ServerEvent};
use crate::types::{Participant, ParticipantId, SessionKind};
use crate::utils::{current_timestamp, generate_participant_id};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures::{
    sink::{Sink, SinkExt},
    stream::StreamExt,
};
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

/// Message sent to a participant whose location cannot be determined
pub const GEO_FAILURE_MESSAGE: &str = "Failed to determine your location";

pub async fn text_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectionQuery>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let address = client_address(&headers, Some(peer)).unwrap_or_else(|| peer.ip());
    let preferences = query.resolve();
    ws.on_upgrade(move |socket| {
        handle_participant(socket, state, SessionKind::Text, preferences, address)
    })
}

pub async fn video_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectionQuery>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let address = client_address(&headers, Some(peer)).unwrap_or_else(|| peer.ip());
    let preferences = query.resolve();
    ws.on_upgrade(move |socket| {
        handle_participant(socket, state, SessionKind::Video, preferences, address)
    })
}

pub async fn stats_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stats(socket, state))
}

/// First `X-Forwarded-For` hop, otherwise the socket peer
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .and_then(|hop| {
            hop.parse::<IpAddr>()
                .ok()
                .or_else(|| hop.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
        })
        .or_else(|| peer.map(|addr| addr.ip()))
}

async fn handle_participant(
    socket: WebSocket,
    state: Arc<AppState>,
    kind: SessionKind,
    preferences: ConnectionPreferences,
    address: IpAddr,
) {
    let participant_id = generate_participant_id();
    let (mut sender, mut receiver) = socket.split();

    let mut outbound = match state.hub().register(&participant_id) {
        Ok(rx) => rx,
        Err(e) => {
            error!("Failed to register connection '{}': {}", participant_id, e);
            return;
        }
    };
    state.service().open_connection(kind);

    let Some(participant) = admit_participant(
        &mut sender,
        &state,
        &participant_id,
        kind,
        preferences,
        address,
    )
    .await
    else {
        return;
    };

    let send_id = participant_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let frame = match event.to_json() {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Dropping event for '{}': {}", send_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    if let Err(e) = state.service().join(participant).await {
        error!("Failed to queue participant '{}': {}", participant_id, e);
    }

    let recv_state = state.clone();
    let recv_id = participant_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    handle_frame(&recv_state, &recv_id, kind, text.as_str()).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // If either task exits, abort the other.
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    close_participant(&state, &participant_id).await;
}

/// Locate a new connection, or reject it.
///
/// A rejected connection gets one `error` frame followed by a close, and its
/// presence and hub registration are released before returning `None`.
pub async fn admit_participant<S>(
    sender: &mut S,
    state: &AppState,
    participant_id: &ParticipantId,
    kind: SessionKind,
    preferences: ConnectionPreferences,
    address: IpAddr,
) -> Option<Participant>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let e = match resolve_participant(state, participant_id, kind, preferences, address).await {
        Ok(participant) => return Some(participant),
        Err(e) => e,
    };

    warn!("Rejecting {} connection '{}': {}", kind, participant_id, e);
    match ServerEvent::error(GEO_FAILURE_MESSAGE).to_json() {
        Ok(frame) => {
            if let Err(e) = sender.send(Message::Text(frame.into())).await {
                debug!("Failed to send rejection to '{}': {}", participant_id, e);
            }
        }
        Err(e) => error!("Failed to encode rejection for '{}': {}", participant_id, e),
    }
    if let Err(e) = sender.send(Message::Close(None)).await {
        debug!("Failed to close rejected connection '{}': {}", participant_id, e);
    }
    close_participant(state, participant_id).await;
    None
}

/// Locate a connecting participant and build its queue entry.
///
/// Lookup failure rejects the connection; it is never mapped to a default region.
pub async fn resolve_participant(
    state: &AppState,
    participant_id: &ParticipantId,
    kind: SessionKind,
    preferences: ConnectionPreferences,
    address: IpAddr,
) -> Result<Participant, MatchmakingError> {
    let location = match state.geo().locate(address).await {
        Ok(location) => {
            state.metrics_collector().record_geo_lookup(true);
            location
        }
        Err(e) => {
            state.metrics_collector().record_geo_lookup(false);
            return Err(MatchmakingError::GeoResolutionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            });
        }
    };

    debug!(
        "Located '{}' at {} in {}",
        participant_id, address, location.country_code
    );

    Ok(Participant {
        id: participant_id.clone(),
        country_code: location.country_code,
        preference: preferences.preference,
        kind,
        gender: preferences.gender,
        gender_preference: preferences.gender_preference,
        joined_at: current_timestamp(),
    })
}

/// Route one client frame
pub async fn handle_frame(
    state: &AppState,
    participant_id: &ParticipantId,
    kind: SessionKind,
    text: &str,
) {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Dropping frame from '{}': {}", participant_id, e);
            return;
        }
    };

    let result = match event {
        ClientEvent::Next => state.service().next(participant_id).await.map(|_| ()),
        other => match other.into_relay() {
            Some(payload) if payload.allowed_for(kind) => state
                .service()
                .relay(participant_id, payload)
                .await
                .map(|_| ()),
            Some(payload) => {
                debug!(
                    "Ignoring {} from '{}' on a {} connection",
                    payload.label(),
                    participant_id,
                    kind
                );
                Ok(())
            }
            None => Ok(()),
        },
    };

    if let Err(e) = result {
        error!("Failed to handle frame from '{}': {}", participant_id, e);
    }
}

async fn close_participant(state: &AppState, participant_id: &ParticipantId) {
    if let Err(e) = state.service().disconnect(participant_id).await {
        error!("Failed to clean up participant '{}': {}", participant_id, e);
    }
    if let Err(e) = state.hub().unregister(participant_id) {
        warn!("Failed to unregister connection '{}': {}", participant_id, e);
    }
}

async fn handle_stats(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    // Yields the current count first, then every broadcast
    let mut updates = WatchStream::new(state.service().presence().subscribe());
    debug!("Presence subscriber connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(count) = updates.next().await {
            let frame = match ServerEvent::online_users(count).to_json() {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Failed to encode presence update: {}", e);
                    break;
                }
            };
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    info!("Presence subscriber disconnected");
}
