//! # Broadcast
//!
//! Server-push channel to the admin console and the projector screen.
//!
//! ## Audiences
//! - `admin`: round started (token count), every received vote with the live tally, final results
//! - `projector`: round started (topic, presenter, deadline), final results
//!
//! Voters never subscribe. They only see the HTML ballot page.
//!
//! ## Delivery
//! Each audience is a `tokio::sync::broadcast` channel carrying pre-serialized JSON. A socket that
//! fails a send or falls behind the channel capacity is dropped, the rest keep receiving. Inbound
//! client frames are read and ignored. Pings go out on the heartbeat interval so idle proxies keep
//! the connection open.
use std::{fmt, sync::Arc};

use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{
    sync::broadcast::{self, Receiver, Sender, error::RecvError},
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    models::{Tally, VotingRound},
    state::AppState,
};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    Admin,
    Projector,
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::Admin => f.write_str("admin"),
            Audience::Projector => f.write_str("projector"),
        }
    }
}

pub struct Hub {
    admin: Sender<String>,
    projector: Sender<String>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        let (admin, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (projector, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self { admin, projector }
    }

    fn sender(&self, audience: Audience) -> &Sender<String> {
        match audience {
            Audience::Admin => &self.admin,
            Audience::Projector => &self.projector,
        }
    }

    pub fn publish(&self, audience: Audience, message: &Value) {
        // Err only means nobody is listening right now.
        if self.sender(audience).send(message.to_string()).is_err() {
            debug!("No {audience} listeners for {}", message["type"]);
        }
    }

    pub fn subscribe(&self, audience: Audience) -> Receiver<String> {
        self.sender(audience).subscribe()
    }

    pub fn listeners(&self, audience: Audience) -> usize {
        self.sender(audience).receiver_count()
    }
}

pub fn voting_started_for_projector(session_id: &str, round: &VotingRound) -> Value {
    json!({
        "type": "voting_started",
        "session_id": session_id,
        "presenter_name": round.presenter_name,
        "topic_title": round.topic_title,
        "topic_description": round.topic_description,
        "end_time": round.end_time.timestamp(),
        "duration_minutes": round.duration_minutes,
    })
}

pub fn voting_started_for_admin(session_id: &str, tokens_generated: usize) -> Value {
    json!({
        "type": "voting_started",
        "session_id": session_id,
        "tokens_generated": tokens_generated,
    })
}

pub fn vote_received(session_id: &str, current_votes: &Tally, total_members: usize) -> Value {
    json!({
        "type": "vote_received",
        "session_id": session_id,
        "current_votes": current_votes,
        "total_members": total_members,
    })
}

pub fn voting_ended(session_id: &str, results: &Tally) -> Value {
    json!({
        "type": "voting_ended",
        "session_id": session_id,
        "results": results,
        "total_votes": results.total(),
    })
}

pub fn announce_results(hub: &Hub, session_id: &str, results: &Tally) {
    let message = voting_ended(session_id, results);

    hub.publish(Audience::Projector, &message);
    hub.publish(Audience::Admin, &message);
}

pub async fn admin_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state, Audience::Admin))
}

pub async fn projector_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state, Audience::Projector))
}

async fn serve_socket(socket: WebSocket, state: Arc<AppState>, audience: Audience) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.hub.subscribe(audience);

    let mut heartbeat = interval(state.config.websocket_heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    heartbeat.tick().await;

    info!("{audience} socket connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{audience} socket fell behind by {skipped} events, dropping");
                    break;
                }
                Err(RecvError::Closed) => break,
            },
            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("{audience} socket disconnected");
}
