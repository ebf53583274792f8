use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        RawQuery, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use super::SharedState;
use crate::pages::pusher_query;
use crate::pusher::{Aggregator, AggregatorState, PusherView, Snapshot};
use crate::router::navigation::parse_query;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    AggregatorState {
        state: AggregatorState,
    },
    PusherSnapshot {
        generation: u64,
        applied_at: DateTime<Utc>,
        view: PusherView,
    },
}

impl WsMessage {
    fn snapshot(aggregator: &Aggregator, snapshot: &Snapshot) -> Self {
        WsMessage::PusherSnapshot {
            generation: snapshot.generation,
            applied_at: snapshot.applied_at,
            view: aggregator.render_snapshot(snapshot),
        }
    }

    fn to_text(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize socket message");
                None
            }
        }
    }
}

/// One aggregator per connection, configured from the socket's query string
/// the same way the pusher page reads its location.
pub fn aggregator_for(state: &SharedState, raw_query: Option<&str>) -> Aggregator {
    let params = parse_query(raw_query.unwrap_or_default());
    Aggregator::new(
        Arc::clone(&state.api),
        pusher_query(&params, &state.settings),
        state.aggregator.clone(),
    )
}

pub async fn pusher_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let aggregator = aggregator_for(&state, query.as_deref());
    ws.on_upgrade(move |socket| handle_socket(socket, aggregator))
}

async fn handle_socket(socket: WebSocket, aggregator: Aggregator) {
    let (sender, receiver) = socket.split();
    let snapshots = aggregator.subscribe();
    aggregator.start();
    tracing::debug!(slugs = ?aggregator.query().slugs, "pusher socket connected");

    run_socket_loop(&aggregator, sender, receiver, snapshots).await;

    aggregator.stop();
    tracing::debug!("pusher socket closed");
}

/// Forwards every applied round to the client, with ping/pong keepalive.
/// If no Pong arrives within [`PONG_TIMEOUT`] of a Ping the connection is
/// treated as dead.
async fn run_socket_loop(
    aggregator: &Aggregator,
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut snapshots: watch::Receiver<Option<Arc<Snapshot>>>,
) {
    let greeting = WsMessage::AggregatorState {
        state: aggregator.state(),
    };
    if let Some(text) = greeting.to_text() {
        if sender.send(Message::Text(text.into())).await.is_err() {
            return;
        }
    }

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // First tick is immediate.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::debug!("pusher socket missed pong; closing");
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = snapshots.borrow_and_update().clone();
                let Some(snapshot) = latest else { continue };
                let Some(text) = WsMessage::snapshot(aggregator, &snapshot).to_text() else {
                    continue;
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}
