// =============================================================================
// BloFin Adapter — plain-text JSON, client-initiated ping/pong every 25s
// =============================================================================

use std::collections::VecDeque;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{sleep_until, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::adapters::{now, Adapter, NormalizedEvent};
use crate::market_data::book::{BookSnapshot, PriceLevel};
use crate::market_data::trade::Trade;
use crate::types::{Side, Venue};

const BLOFIN_WS_URL: &str = "wss://openapi.blofin.com/ws/public";
const PING_INTERVAL: Duration = Duration::from_secs(25);

pub struct BlofinAdapter {
    symbol: String,
    socket: Option<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>,
    next_ping: Instant,
    /// Trades parsed out of a batched `trades` frame beyond the first are
    /// queued here and drained on subsequent `next_event` calls, since each
    /// call yields exactly one event but the payload can carry a list.
    pending: VecDeque<NormalizedEvent>,
}

impl BlofinAdapter {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            socket: None,
            next_ping: Instant::now() + PING_INTERVAL,
            pending: VecDeque::new(),
        }
    }

    fn socket_mut(&mut self) -> Result<&mut WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>> {
        self.socket
            .as_mut()
            .context("BloFin adapter used before connect()")
    }

    /// Parses one wire frame into zero or more normalized events. A `trades`
    /// frame can carry several fills at once; every one of them is returned.
    fn parse_message(&self, value: &serde_json::Value) -> Vec<NormalizedEvent> {
        if let Some(event) = value.get("event").and_then(|v| v.as_str()) {
            if event == "error" {
                warn!(symbol = %self.symbol, error = ?value.get("msg"), "BloFin WS error");
            }
            return Vec::new();
        }

        let Some(arg) = value.get("arg") else {
            return Vec::new();
        };
        let Some(channel) = arg.get("channel").and_then(|v| v.as_str()) else {
            return Vec::new();
        };
        let inst_id = arg
            .get("instId")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.symbol)
            .to_string();
        let Some(data) = value.get("data") else {
            return Vec::new();
        };

        match channel {
            "trades" => {
                let Some(entries) = data.as_array() else {
                    return Vec::new();
                };
                entries
                    .iter()
                    .filter_map(|entry| parse_trade(entry, &inst_id).map(NormalizedEvent::Trade))
                    .collect()
            }
            "books5" => {
                // books5 is a top-level snapshot, occasionally wrapped in a
                // one-element array — degrades naturally to 5 levels per
                // side, which the signal engine's `top_bids`/`top_asks`
                // already treat as "however many the venue actually sends".
                let payload = if data.is_array() {
                    match data.as_array().and_then(|arr| arr.first()) {
                        Some(p) => p,
                        None => return Vec::new(),
                    }
                } else {
                    data
                };
                let bids = parse_levels(payload.get("bids"));
                let asks = parse_levels(payload.get("asks"));
                vec![NormalizedEvent::Book(BookSnapshot {
                    instrument: inst_id,
                    venue: Venue::Blofin,
                    bids,
                    asks,
                    received_at: now(),
                })]
            }
            _ => Vec::new(),
        }
    }
}

fn parse_levels(raw: Option<&serde_json::Value>) -> Vec<PriceLevel> {
    raw.and_then(|v| v.as_array())
        .map(|levels| {
            levels
                .iter()
                .filter_map(|level| {
                    let level = level.as_array()?;
                    let price: f64 = level.first()?.as_str()?.parse().ok()?;
                    let quantity: f64 = level.get(1)?.as_str()?.parse().ok()?;
                    Some(PriceLevel::new(price, quantity))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_trade(entry: &serde_json::Value, symbol: &str) -> Option<Trade> {
    let price: f64 = entry.get("price")?.as_str()?.parse().ok()?;
    let quantity: f64 = entry.get("size")?.as_str()?.parse().ok()?;
    let side = match entry.get("side").and_then(|v| v.as_str()).unwrap_or("buy") {
        "sell" => Side::Sell,
        _ => Side::Buy,
    };

    Some(Trade {
        instrument: symbol.to_string(),
        venue: Venue::Blofin,
        price,
        quantity,
        side,
        occurred_at: now(),
    })
}

#[async_trait::async_trait]
impl Adapter for BlofinAdapter {
    async fn connect(&mut self) -> Result<()> {
        let (socket, _response) = connect_async(BLOFIN_WS_URL)
            .await
            .context("failed to connect to BloFin WebSocket")?;
        self.socket = Some(socket);
        self.next_ping = Instant::now() + PING_INTERVAL;
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<()> {
        let inst_id = self.symbol.clone();
        let socket = self.socket_mut()?;
        let sub = serde_json::json!({
            "op": "subscribe",
            "args": [
                { "channel": "trades", "instId": inst_id },
                { "channel": "books5", "instId": inst_id },
            ],
        });
        socket.send(Message::Text(sub.to_string().into())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<NormalizedEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        loop {
            let next_ping = self.next_ping;
            let socket = self.socket_mut()?;

            tokio::select! {
                msg = socket.next() => {
                    let msg = match msg {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(None),
                    };

                    let text = match msg {
                        Message::Text(t) => t.to_string(),
                        Message::Close(_) => return Ok(None),
                        _ => continue,
                    };

                    if text.trim() == "pong" {
                        debug!(symbol = %self.symbol, "BloFin pong received");
                        continue;
                    }

                    let value: serde_json::Value = match serde_json::from_str(&text) {
                        Ok(v) => v,
                        Err(_) => {
                            return Ok(Some(NormalizedEvent::Unparseable {
                                reason: "invalid BloFin JSON frame".to_string(),
                            }))
                        }
                    };

                    let mut events = self.parse_message(&value).into_iter();
                    match events.next() {
                        Some(first) => {
                            self.pending.extend(events);
                            return Ok(Some(first));
                        }
                        None => continue,
                    }
                }
                _ = sleep_until(next_ping) => {
                    let socket = self.socket_mut()?;
                    socket.send(Message::Text("ping".into())).await.ok();
                    self.next_ping = Instant::now() + PING_INTERVAL;
                    continue;
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                warn!(symbol = %self.symbol, error = %e, "error closing BloFin socket");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> BlofinAdapter {
        BlofinAdapter::new("WIF-USDT")
    }

    #[test]
    fn parse_message_extracts_books5_snapshot() {
        let value = serde_json::json!({
            "arg": { "channel": "books5", "instId": "WIF-USDT" },
            "data": [{
                "bids": [["2.0", "100.0"]],
                "asks": [["2.1", "80.0"]],
            }]
        });
        let mut events = adapter().parse_message(&value);
        assert_eq!(events.len(), 1);
        match events.remove(0) {
            NormalizedEvent::Book(book) => {
                assert_eq!(book.bids.len(), 1);
                assert_eq!(book.venue, Venue::Blofin);
            }
            _ => panic!("expected Book event"),
        }
    }

    #[test]
    fn parse_message_extracts_trade() {
        let value = serde_json::json!({
            "arg": { "channel": "trades", "instId": "WIF-USDT" },
            "data": [{ "price": "2.0", "size": "15.0", "side": "sell", "ts": "1700000000000" }]
        });
        let mut events = adapter().parse_message(&value);
        assert_eq!(events.len(), 1);
        match events.remove(0) {
            NormalizedEvent::Trade(trade) => assert_eq!(trade.side, Side::Sell),
            _ => panic!("expected Trade event"),
        }
    }

    #[test]
    fn parse_message_emits_every_trade_in_a_batched_frame() {
        let value = serde_json::json!({
            "arg": { "channel": "trades", "instId": "WIF-USDT" },
            "data": [
                { "price": "2.0", "size": "15.0", "side": "sell", "ts": "1700000000000" },
                { "price": "2.1", "size": "4.0", "side": "buy", "ts": "1700000000001" },
                { "price": "2.2", "size": "1.0", "side": "sell", "ts": "1700000000002" },
            ]
        });
        let events = adapter().parse_message(&value);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| matches!(e, NormalizedEvent::Trade(_))));
    }

    #[test]
    fn parse_message_ignores_subscribe_ack() {
        let value = serde_json::json!({ "event": "subscribe", "arg": { "channel": "trades" } });
        assert!(adapter().parse_message(&value).is_empty());
    }

    #[tokio::test]
    async fn next_event_drains_pending_queue_before_reading_socket() {
        let mut adapter = adapter();
        adapter.pending.push_back(NormalizedEvent::Unparseable { reason: "queued".to_string() });
        let event = adapter.next_event().await;
        assert!(matches!(event, Ok(Some(NormalizedEvent::Unparseable { .. }))));
    }
}
