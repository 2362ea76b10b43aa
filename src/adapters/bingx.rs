// =============================================================================
// BingX Adapter — gzip-framed JSON, ping/pong token echo
// =============================================================================

use std::collections::VecDeque;
use std::io::Read;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::adapters::{now, Adapter, NormalizedEvent};
use crate::market_data::book::{BookSnapshot, PriceLevel};
use crate::market_data::trade::Trade;
use crate::types::{Side, Venue};

const BINGX_WS_URL: &str = "wss://open-api-swap.bingx.com/swap-market";

pub struct BingxAdapter {
    symbol: String,
    socket: Option<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>,
    /// Trades parsed out of a batched `@trade` frame beyond the first are
    /// queued here and drained on subsequent `next_event` calls, since each
    /// call yields exactly one event but the payload can carry a list.
    pending: VecDeque<NormalizedEvent>,
}

impl BingxAdapter {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            socket: None,
            pending: VecDeque::new(),
        }
    }

    fn socket_mut(&mut self) -> Result<&mut WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>> {
        self.socket
            .as_mut()
            .context("BingX adapter used before connect()")
    }

    /// BingX frames are gzip most of the time; fall back to raw JSON if the
    /// gzip magic bytes aren't there, matching `original_source`'s
    /// try-gzip-then-raw fallback.
    fn decompress(bytes: &[u8]) -> Option<serde_json::Value> {
        let mut decoder = GzDecoder::new(bytes);
        let mut text = String::new();
        if decoder.read_to_string(&mut text).is_ok() {
            if let Ok(value) = serde_json::from_str(&text) {
                return Some(value);
            }
        }
        serde_json::from_slice(bytes).ok()
    }

    /// Parses one wire frame into zero or more normalized events. BingX sends
    /// either a single trade object or a list of them on `@trade`; every
    /// entry in a batch is returned.
    fn parse_message(&self, value: &serde_json::Value) -> Vec<NormalizedEvent> {
        let data_type = value.get("dataType").and_then(|v| v.as_str()).unwrap_or("");
        let symbol = data_type.split('@').next().unwrap_or(&self.symbol).to_string();
        let Some(data) = value.get("data") else {
            return Vec::new();
        };

        if data_type.contains("@depth") {
            let bids = parse_levels(data.get("bids"));
            let asks = parse_levels(data.get("asks"));
            return vec![NormalizedEvent::Book(BookSnapshot {
                instrument: symbol,
                venue: Venue::Bingx,
                bids,
                asks,
                received_at: now(),
            })];
        }

        if data_type.contains("@trade") {
            let entries: Vec<&serde_json::Value> = match data.as_array() {
                Some(arr) => arr.iter().collect(),
                None => vec![data],
            };
            return entries
                .into_iter()
                .filter_map(|entry| parse_trade(entry, &symbol).map(NormalizedEvent::Trade))
                .collect();
        }

        Vec::new()
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
    let price: f64 = entry.get("p")?.as_str()?.parse().ok()?;
    let quantity: f64 = entry.get("q")?.as_str()?.parse().ok()?;
    // `m: true` means the taker was the maker's counterparty on a sell
    // (aggressor sold into the bid).
    let side = if entry.get("m").and_then(|v| v.as_bool()).unwrap_or(false) {
        Side::Sell
    } else {
        Side::Buy
    };

    Some(Trade {
        instrument: symbol.to_string(),
        venue: Venue::Bingx,
        price,
        quantity,
        side,
        occurred_at: now(),
    })
}

#[async_trait::async_trait]
impl Adapter for BingxAdapter {
    async fn connect(&mut self) -> Result<()> {
        let (socket, _response) = connect_async(BINGX_WS_URL)
            .await
            .context("failed to connect to BingX WebSocket")?;
        self.socket = Some(socket);
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<()> {
        let symbol = self.symbol.clone();
        let socket = self.socket_mut()?;

        let depth_sub = serde_json::json!({
            "id": format!("depth_{symbol}"),
            "reqType": "sub",
            "dataType": format!("{symbol}@depth20@500ms"),
        });
        socket.send(Message::Text(depth_sub.to_string().into())).await?;

        let trade_sub = serde_json::json!({
            "id": format!("trade_{symbol}"),
            "reqType": "sub",
            "dataType": format!("{symbol}@trade"),
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

            let bytes = match &msg {
                Message::Binary(b) => b.to_vec(),
                Message::Text(t) => t.as_bytes().to_vec(),
                Message::Close(_) => return Ok(None),
                _ => continue,
            };

            let value = match Self::decompress(&bytes) {
                Some(v) => v,
                None => {
                    return Ok(Some(NormalizedEvent::Unparseable {
                        reason: "failed to decompress/parse BingX frame".to_string(),
                    }))
                }
            };

            // Ping/pong keepalive — answered inline, never surfaced upward.
            if let Some(ping) = value.get("ping") {
                let pong = serde_json::json!({ "pong": ping });
                let socket = self.socket_mut()?;
                socket.send(Message::Text(pong.to_string().into())).await.ok();
                continue;
            }
            if value.get("code").and_then(|v| v.as_i64()) == Some(0)
                && value.get("msg").and_then(|v| v.as_str()) == Some("Ping")
            {
                let pong = serde_json::json!({
                    "pong": value.get("pingTime").cloned().unwrap_or(serde_json::Value::Null),
                });
                let socket = self.socket_mut()?;
                socket.send(Message::Text(pong.to_string().into())).await.ok();
                continue;
            }

            // Subscription ack, no dataType: nothing to report.
            if value.get("id").is_some() && value.get("dataType").is_none() {
                debug!(symbol = %self.symbol, "BingX subscription acked");
                continue;
            }

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
                warn!(symbol = %self.symbol, error = %e, "error closing BingX socket");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> BingxAdapter {
        BingxAdapter::new("WIF-USDT")
    }

    #[test]
    fn parse_message_extracts_depth_snapshot() {
        let value = serde_json::json!({
            "dataType": "WIF-USDT@depth20@500ms",
            "data": {
                "bids": [["2.0", "100.0"], ["1.9", "50.0"]],
                "asks": [["2.1", "80.0"]],
            }
        });
        let mut events = adapter().parse_message(&value);
        assert_eq!(events.len(), 1);
        match events.remove(0) {
            NormalizedEvent::Book(book) => {
                assert_eq!(book.bids.len(), 2);
                assert_eq!(book.asks.len(), 1);
                assert_eq!(book.instrument, "WIF-USDT");
            }
            _ => panic!("expected Book event"),
        }
    }

    #[test]
    fn parse_message_maps_maker_flag_to_sell_side() {
        let value = serde_json::json!({
            "dataType": "WIF-USDT@trade",
            "data": { "p": "2.0", "q": "10.0", "m": true, "T": 1700000000000i64 }
        });
        let mut events = adapter().parse_message(&value);
        assert_eq!(events.len(), 1);
        match events.remove(0) {
            NormalizedEvent::Trade(trade) => assert_eq!(trade.side, Side::Sell),
            _ => panic!("expected Trade event"),
        }
    }

    #[test]
    fn parse_message_defaults_to_buy_when_maker_flag_absent() {
        let value = serde_json::json!({
            "dataType": "WIF-USDT@trade",
            "data": { "p": "2.0", "q": "10.0" }
        });
        let mut events = adapter().parse_message(&value);
        assert_eq!(events.len(), 1);
        match events.remove(0) {
            NormalizedEvent::Trade(trade) => assert_eq!(trade.side, Side::Buy),
            _ => panic!("expected Trade event"),
        }
    }

    #[test]
    fn parse_message_ignores_unknown_data_type() {
        let value = serde_json::json!({ "dataType": "WIF-USDT@kline", "data": {} });
        assert!(adapter().parse_message(&value).is_empty());
    }

    #[test]
    fn parse_message_emits_every_trade_in_a_batched_frame() {
        let value = serde_json::json!({
            "dataType": "WIF-USDT@trade",
            "data": [
                { "p": "2.0", "q": "10.0", "m": false },
                { "p": "2.1", "q": "5.0", "m": true },
                { "p": "2.2", "q": "1.0", "m": false },
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
        let event = adapter.next_event().await;
        assert!(matches!(event, Ok(Some(NormalizedEvent::Unparseable { .. }))));
    }
}
