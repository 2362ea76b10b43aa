// =============================================================================
// WebSocket Endpoint — /ws
// =============================================================================
//
// On open: sends `{type:"init", watching:[...], contract_count:N}`.
// Thereafter: forwards every `stats`/`alert` event published to the
// Broadcast hub (spec §4.7) as `{type:"stats",key,data}` /
// `{type:"alert",key,data}`, and sends `{type:"heartbeat"}` whenever the
// connection has been idle (no client frame) for 30s (spec §6.3/§5).
//
// Accepts from the client: `{action:"watch"|"unwatch", venue, symbol}` to
// drive the Watcher Registry from the dashboard, or the literal `"ping"`
// text frame as a keepalive (resets the idle clock; no reply required since
// the hub's own heartbeat already covers idle detection).
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::registry::{UnwatchOutcome, WatchOutcome};
use crate::types::Venue;

const IDLE_HEARTBEAT: Duration = Duration::from_secs(30);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Deserialize)]
struct ClientCommand {
    action: String,
    venue: String,
    symbol: String,
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let init = serde_json::json!({
        "type": "init",
        "watching": state.registry.list(),
        "contract_count": state.catalog.len(),
    });
    if socket.send(Message::Text(init.to_string().into())).await.is_err() {
        return;
    }

    let mut rx = state.hub.subscribe();
    let mut last_activity = Instant::now();

    loop {
        let deadline = last_activity + IDLE_HEARTBEAT;

        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    break; // hub dropped — process shutting down
                };
                let payload = match serde_json::to_string(&event) {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        handle_client_text(&text, &state).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        last_activity = Instant::now();
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "ws read error, closing");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                last_activity = Instant::now();
                let heartbeat = serde_json::json!({ "type": "heartbeat" });
                if socket.send(Message::Text(heartbeat.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("ws client disconnected");
}

async fn handle_client_text(text: &str, state: &Arc<AppState>) {
    if text.trim() == "ping" {
        return;
    }

    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(c) => c,
        Err(_) => {
            debug!(text, "ignoring unrecognized ws client frame");
            return;
        }
    };

    let venue = match Venue::parse(&command.venue) {
        Some(v) => v,
        None => return,
    };

    match command.action.as_str() {
        "watch" => {
            let thresholds = state.config.read().alert_thresholds.clone();
            match state.registry.watch(
                venue,
                &command.symbol,
                &state.catalog,
                thresholds,
                state.hub.clone(),
                state.alert_log.clone(),
            ) {
                Ok(WatchOutcome::Watching) => info!(%venue, symbol = %command.symbol, "watch requested via ws"),
                Ok(WatchOutcome::AlreadyWatching) => {}
                Err(e) => warn!(%venue, symbol = %command.symbol, error = %e, "ws watch rejected"),
            }
        }
        "unwatch" => {
            if state.registry.unwatch(venue, &command.symbol) == UnwatchOutcome::Stopped {
                info!(%venue, symbol = %command.symbol, "unwatch requested via ws");
            }
        }
        _ => debug!(action = %command.action, "unknown ws action"),
    }
}
