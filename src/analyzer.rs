// =============================================================================
// Order-Flow Analyzer — whale/wall/imbalance alert detection
// =============================================================================
//
// Pure detection functions plus the bounded alert log they feed. A Watcher
// calls `classify_trade` / `detect_walls` / `detect_imbalance` on every
// update it processes and pushes whatever comes back through `AlertLog`,
// which applies the 5-second same-(kind, side) dedup against the
// instrument's own last fingerprint before admitting a new entry.
// =============================================================================

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AlertThresholds;
use crate::market_data::book::PriceLevel;
use crate::types::{Side, Venue};

/// Cap on the shared alert log exposed over the API (spec §4.3).
pub const ALERT_LOG_CAPACITY: usize = 500;
/// Same-(instrument, kind, side) alerts within this window are suppressed.
pub const DEDUP_WINDOW_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    WhaleTrade,
    LargeTrade,
    WallDetected,
    Imbalance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleAlert {
    pub instrument: String,
    pub venue: Venue,
    pub kind: AlertKind,
    pub side: Side,
    pub value_quote: f64,
    pub price: f64,
    pub occurred_at: DateTime<Utc>,
    pub details: String,
}

/// The (kind, side, timestamp) of the last alert emitted for one instrument,
/// kept on `InstrumentState` so dedup survives across updates without
/// scanning the shared log.
#[derive(Debug, Clone, Copy)]
pub struct AlertFingerprint {
    pub kind: AlertKind,
    pub side: Side,
    pub occurred_at: DateTime<Utc>,
}

/// `true` if an alert of this (kind, side) should be emitted given what was
/// last emitted for the same instrument.
pub fn should_emit(last: Option<&AlertFingerprint>, kind: AlertKind, side: Side, now: DateTime<Utc>) -> bool {
    match last {
        Some(fp) if fp.kind == kind && fp.side == side => {
            (now - fp.occurred_at).num_seconds() >= DEDUP_WINDOW_SECS
        }
        _ => true,
    }
}

/// Classifies a single trade as whale, large, or neither.
pub fn classify_trade(
    instrument: &str,
    venue: Venue,
    side: Side,
    price: f64,
    value_quote: f64,
    occurred_at: DateTime<Utc>,
    thresholds: &AlertThresholds,
) -> Option<WhaleAlert> {
    if value_quote >= thresholds.whale_order_quote {
        Some(WhaleAlert {
            instrument: instrument.to_string(),
            venue,
            kind: AlertKind::WhaleTrade,
            side,
            value_quote,
            price,
            occurred_at,
            details: format!("whale {side}: {value_quote:.0}"),
        })
    } else if value_quote >= thresholds.large_order_quote {
        Some(WhaleAlert {
            instrument: instrument.to_string(),
            venue,
            kind: AlertKind::LargeTrade,
            side,
            value_quote,
            price,
            occurred_at,
            details: format!("large {side}: {value_quote:.0}"),
        })
    } else {
        None
    }
}

/// Detects a dominant single-level wall on either side of the book. Returns
/// up to two alerts (one per side) — the caller runs each through its own
/// dedup check since a bid wall and an ask wall never share a fingerprint.
pub fn detect_walls(
    instrument: &str,
    venue: Venue,
    largest_bid: Option<PriceLevel>,
    largest_ask: Option<PriceLevel>,
    occurred_at: DateTime<Utc>,
    thresholds: &AlertThresholds,
) -> Vec<WhaleAlert> {
    let mut alerts = Vec::new();

    if let Some(level) = largest_bid {
        let value_quote = level.value_quote();
        if value_quote >= thresholds.whale_order_quote {
            alerts.push(WhaleAlert {
                instrument: instrument.to_string(),
                venue,
                kind: AlertKind::WallDetected,
                side: Side::Buy,
                value_quote,
                price: level.price,
                occurred_at,
                details: format!("buy wall: {value_quote:.0} @ {}", level.price),
            });
        }
    }

    if let Some(level) = largest_ask {
        let value_quote = level.value_quote();
        if value_quote >= thresholds.whale_order_quote {
            alerts.push(WhaleAlert {
                instrument: instrument.to_string(),
                venue,
                kind: AlertKind::WallDetected,
                side: Side::Sell,
                value_quote,
                price: level.price,
                occurred_at,
                details: format!("sell wall: {value_quote:.0} @ {}", level.price),
            });
        }
    }

    alerts
}

/// Detects a lopsided book favouring one side strongly enough to cross the
/// configured ratio threshold.
pub fn detect_imbalance(
    instrument: &str,
    venue: Venue,
    imbalance_ratio: f64,
    bid_volume_quote: f64,
    ask_volume_quote: f64,
    last_price: f64,
    occurred_at: DateTime<Utc>,
    thresholds: &AlertThresholds,
) -> Option<WhaleAlert> {
    if imbalance_ratio >= thresholds.imbalance_ratio {
        Some(WhaleAlert {
            instrument: instrument.to_string(),
            venue,
            kind: AlertKind::Imbalance,
            side: Side::Buy,
            value_quote: bid_volume_quote,
            price: last_price,
            occurred_at,
            details: format!("buy pressure: {imbalance_ratio:.1}x more bids than asks"),
        })
    } else if imbalance_ratio <= 1.0 / thresholds.imbalance_ratio {
        Some(WhaleAlert {
            instrument: instrument.to_string(),
            venue,
            kind: AlertKind::Imbalance,
            side: Side::Sell,
            value_quote: ask_volume_quote,
            price: last_price,
            occurred_at,
            details: format!(
                "sell pressure: {:.1}x more asks than bids",
                1.0 / imbalance_ratio
            ),
        })
    } else {
        None
    }
}

/// Bounded FIFO log of every alert admitted past dedup, exposed read-only to
/// the API layer. Wrapped in a `parking_lot::RwLock` by whoever owns it
/// (the shared app state) since many watchers push concurrently.
#[derive(Debug, Default)]
pub struct AlertLog {
    entries: VecDeque<WhaleAlert>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(ALERT_LOG_CAPACITY),
        }
    }

    pub fn push(&mut self, alert: WhaleAlert) {
        if self.entries.len() == ALERT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(alert);
    }

    /// Most recent `limit` alerts, newest first.
    pub fn recent(&self, limit: usize) -> Vec<WhaleAlert> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> AlertThresholds {
        AlertThresholds {
            large_order_quote: 10_000.0,
            whale_order_quote: 50_000.0,
            imbalance_ratio: 1.5,
        }
    }

    #[test]
    fn classify_trade_picks_whale_over_large() {
        let alert = classify_trade(
            "WIF-USDT",
            Venue::Bingx,
            Side::Buy,
            1.0,
            60_000.0,
            Utc::now(),
            &thresholds(),
        )
        .unwrap();
        assert_eq!(alert.kind, AlertKind::WhaleTrade);
    }

    #[test]
    fn classify_trade_below_large_threshold_yields_none() {
        let alert = classify_trade(
            "WIF-USDT",
            Venue::Bingx,
            Side::Buy,
            1.0,
            500.0,
            Utc::now(),
            &thresholds(),
        );
        assert!(alert.is_none());
    }

    #[test]
    fn detect_walls_only_fires_above_whale_threshold() {
        let alerts = detect_walls(
            "WIF-USDT",
            Venue::Bingx,
            Some(PriceLevel::new(1.0, 40_000.0)),
            Some(PriceLevel::new(1.1, 60_000.0)),
            Utc::now(),
            &thresholds(),
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].side, Side::Sell);
    }

    #[test]
    fn detect_imbalance_sell_side_uses_inverse_ratio() {
        let alert = detect_imbalance(
            "WIF-USDT",
            Venue::Bingx,
            0.5,
            1000.0,
            2000.0,
            1.0,
            Utc::now(),
            &thresholds(),
        )
        .unwrap();
        assert_eq!(alert.side, Side::Sell);
        assert_eq!(alert.kind, AlertKind::Imbalance);
    }

    #[test]
    fn dedup_suppresses_same_kind_side_within_window() {
        let now = Utc::now();
        let fp = AlertFingerprint {
            kind: AlertKind::WhaleTrade,
            side: Side::Buy,
            occurred_at: now,
        };
        assert!(!should_emit(Some(&fp), AlertKind::WhaleTrade, Side::Buy, now + chrono::Duration::seconds(2)));
        assert!(should_emit(Some(&fp), AlertKind::WhaleTrade, Side::Buy, now + chrono::Duration::seconds(6)));
        assert!(should_emit(Some(&fp), AlertKind::WhaleTrade, Side::Sell, now));
    }

    #[test]
    fn alert_log_evicts_oldest_past_capacity() {
        let mut log = AlertLog::new();
        for i in 0..(ALERT_LOG_CAPACITY + 10) {
            log.push(WhaleAlert {
                instrument: "WIF-USDT".into(),
                venue: Venue::Bingx,
                kind: AlertKind::LargeTrade,
                side: Side::Buy,
                value_quote: i as f64,
                price: 1.0,
                occurred_at: Utc::now(),
                details: String::new(),
            });
        }
        assert_eq!(log.entries.len(), ALERT_LOG_CAPACITY);
        assert_eq!(log.entries.front().unwrap().value_quote, 10.0);
    }
}
