// =============================================================================
// Hyperliquid Adapter — plain JSON, one subscribe message per (type, coin)
// =============================================================================

use std::collections::VecDeque;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::warn;

use crate::adapters::{now, Adapter, NormalizedEvent};
use crate::market_data::book::{BookSnapshot, PriceLevel};
use crate::market_data::trade::Trade;
use crate::types::{Side, Venue};

const HYPERLIQUID_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";

pub struct HyperliquidAdapter {
    coin: String,
    socket: Option<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>,
    /// Trades parsed out of a batched `trades` frame beyond the first are
    /// queued here and drained on subsequent `next_event` calls, since each
    /// call yields exactly one event but Hyperliquid routinely delivers
    /// several fills per frame.
    pending: VecDeque<NormalizedEvent>,
}

impl HyperliquidAdapter {
    pub fn new(coin: impl Into<String>) -> Self {
        Self {
            coin: coin.into(),
            socket: None,
            pending: VecDeque::new(),
        }
    }

    fn socket_mut(&mut self) -> Result<&mut WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>> {
        self.socket
            .as_mut()
            .context("Hyperliquid adapter used before connect()")
    }

    /// Parses one wire frame into zero or more normalized events. A `trades`
    /// frame can carry several fills at once; every one of them is returned.
    fn parse_message(&self, value: &serde_json::Value) -> Vec<NormalizedEvent> {
        let Some(channel) = value.get("channel").and_then(|v| v.as_str()) else {
            return Vec::new();
        };
        let Some(data) = value.get("data") else {
            return Vec::new();
        };

        match channel {
            "l2Book" => {
                let coin = data
                    .get("coin")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&self.coin)
                    .to_string();
                let Some(levels) = data.get("levels").and_then(|v| v.as_array()) else {
                    return Vec::new();
                };
                let bids = parse_levels(levels.first());
                let asks = parse_levels(levels.get(1));
                vec![NormalizedEvent::Book(BookSnapshot {
                    instrument: coin,
                    venue: Venue::Hyperliquid,
                    bids,
                    asks,
                    received_at: now(),
                })]
            }
            "trades" => {
                let entries: Vec<&serde_json::Value> = match data.as_array() {
                    Some(arr) => arr.iter().collect(),
                    None => vec![data],
                };
                entries
                    .into_iter()
                    .filter_map(|entry| {
                        let coin = entry
                            .get("coin")
                            .and_then(|v| v.as_str())
                            .unwrap_or(&self.coin)
                            .to_string();
                        parse_trade(entry, &coin).map(NormalizedEvent::Trade)
                    })
                    .collect()
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
                    let price: f64 = level.get("px")?.as_str()?.parse().ok()?;
                    let quantity: f64 = level.get("sz")?.as_str()?.parse().ok()?;
                    Some(PriceLevel::new(price, quantity))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_trade(entry: &serde_json::Value, coin: &str) -> Option<Trade> {
    let price: f64 = entry.get("px")?.as_str()?.parse().ok()?;
    let quantity: f64 = entry.get("sz")?.as_str()?.parse().ok()?;
    let side = match entry.get("side").and_then(|v| v.as_str()).unwrap_or("B") {
        "A" => Side::Sell,
        _ => Side::Buy,
    };

    Some(Trade {
        instrument: coin.to_string(),
        venue: Venue::Hyperliquid,
        price,
        quantity,
        side,
        occurred_at: now(),
    })
}

#[async_trait::async_trait]
impl Adapter for HyperliquidAdapter {
    async fn connect(&mut self) -> Result<()> {
        let (socket, _response) = connect_async(HYPERLIQUID_WS_URL)
            .await
            .context("failed to connect to Hyperliquid WebSocket")?;
        self.socket = Some(socket);
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<()> {
        let coin = self.coin.clone();
        let socket = self.socket_mut()?;

        let book_sub = serde_json::json!({
            "method": "subscribe",
            "subscription": { "type": "l2Book", "coin": coin },
        });
        socket.send(Message::Text(book_sub.to_string().into())).await?;

        let trade_sub = serde_json::json!({
            "method": "subscribe",
            "subscription": { "type": "trades", "coin": coin },
        });
        socket.send(Message::Text(trade_sub.to_string().into())).await?;

        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<NormalizedEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        loop {
            let socket = self.socket_mut()?;
            let msg = match socket.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            };

            let text = match msg {
                Message::Text(t) => t.to_string(),
                Message::Close(_) => return Ok(None),
                _ => continue,
            };

            let value: serde_json::Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(_) => {
                    return Ok(Some(NormalizedEvent::Unparseable {
                        reason: "invalid Hyperliquid JSON frame".to_string(),
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
    }

    async fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                warn!(coin = %self.coin, error = %e, "error closing Hyperliquid socket");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> HyperliquidAdapter {
        HyperliquidAdapter::new("WIF")
    }

    #[test]
    fn parse_message_extracts_l2book_levels() {
        let value = serde_json::json!({
            "channel": "l2Book",
            "data": {
                "coin": "WIF",
                "levels": [
                    [{ "px": "2.0", "sz": "100.0" }],
                    [{ "px": "2.1", "sz": "80.0" }],
                ]
            }
        });
        let mut events = adapter().parse_message(&value);
        assert_eq!(events.len(), 1);
        match events.remove(0) {
            NormalizedEvent::Book(book) => {
                assert_eq!(book.bids.len(), 1);
                assert_eq!(book.asks.len(), 1);
            }
            _ => panic!("expected Book event"),
        }
    }

    #[test]
    fn parse_message_maps_ask_side_letter_to_sell() {
        let value = serde_json::json!({
            "channel": "trades",
            "data": [{ "coin": "WIF", "px": "2.0", "sz": "5.0", "side": "A" }]
        });
        let mut events = adapter().parse_message(&value);
        assert_eq!(events.len(), 1);
        match events.remove(0) {
            NormalizedEvent::Trade(trade) => assert_eq!(trade.side, Side::Sell),
            _ => panic!("expected Trade event"),
        }
    }

    #[test]
    fn parse_message_defaults_buy_side_letter() {
        let value = serde_json::json!({
            "channel": "trades",
            "data": [{ "coin": "WIF", "px": "2.0", "sz": "5.0", "side": "B" }]
        });
        let mut events = adapter().parse_message(&value);
        assert_eq!(events.len(), 1);
        match events.remove(0) {
            NormalizedEvent::Trade(trade) => assert_eq!(trade.side, Side::Buy),
            _ => panic!("expected Trade event"),
        }
    }

    #[test]
    fn parse_message_emits_every_trade_in_a_batched_frame() {
        let value = serde_json::json!({
            "channel": "trades",
            "data": [
                { "coin": "WIF", "px": "2.0", "sz": "5.0", "side": "B" },
                { "coin": "WIF", "px": "2.1", "sz": "3.0", "side": "A" },
                { "coin": "WIF", "px": "2.2", "sz": "1.0", "side": "B" },
            ]
        });
        let events = adapter().parse_message(&value);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| matches!(e, NormalizedEvent::Trade(_))));
    }

    #[tokio::test]
    async fn next_event_drains_pending_queue_before_reading_socket() {
        let mut adapter = adapter();
        adapter.pending.push_back(NormalizedEvent::Unparseable { reason: "queued".to_string() });
        // Without a live socket, draining `pending` must not touch `socket_mut()`.
        let event = adapter.next_event().await;
        assert!(matches!(event, Ok(Some(NormalizedEvent::Unparseable { .. }))));
    }
}
