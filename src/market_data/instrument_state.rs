// =============================================================================
// InstrumentState — per-instrument scalar stats, bounded history, dedup state
// =============================================================================
//
// Owned exclusively by a single Watcher (spec §3 Ownership). Nothing else
// reads or writes it directly; snapshots handed to the Broadcast hub are
// serialized copies, never shared references.
// =============================================================================

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzer::AlertFingerprint;
use crate::market_data::book::PriceLevel;
use crate::market_data::trade::RecentTrade;
use crate::signals::engine::SignalResult;

/// Capacity of `imbalance_history` — roughly 30 seconds of updates at the
/// venues' fastest book cadence (spec §3).
pub const IMBALANCE_HISTORY_CAPACITY: usize = 60;
/// Capacity of `recent_trades`.
pub const RECENT_TRADES_CAPACITY: usize = 100;
/// Sliding window within which a trade counts toward flow analysis.
pub const RECENT_TRADES_WINDOW: Duration = Duration::from_secs(60);

/// Scalar metrics derived from the most recently processed book snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BookMetrics {
    pub bid_depth_quote: f64,
    pub ask_depth_quote: f64,
    pub imbalance_ratio: f64,
    pub spread_bps: f64,
    pub mid_price: f64,
}

/// The largest level on each side of the book, kept for wall reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargestLevels {
    pub largest_bid: Option<PriceLevel>,
    pub largest_ask: Option<PriceLevel>,
}

/// All mutable state a Watcher threads through snapshot-to-snapshot.
pub struct InstrumentState {
    pub instrument: String,
    pub metrics: BookMetrics,
    pub largest: LargestLevels,
    pub last_update_ts: Option<DateTime<Utc>>,

    /// Bounded ring of the most recent imbalance ratios, one per book
    /// update. Preserved across adapter reconnects.
    pub imbalance_history: VecDeque<f64>,

    /// Bounded, age-pruned ring of recent trades within the 60s window.
    pub recent_trades: VecDeque<RecentTrade>,

    /// Running sum of (buy_quote - sell_quote) since the watcher started.
    /// Preserved across reconnects since it is a single additive scalar.
    pub cumulative_delta: f64,

    pub last_signal: Option<SignalResult>,
    pub last_alert_fingerprint: Option<AlertFingerprint>,
}

impl InstrumentState {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            metrics: BookMetrics::default(),
            largest: LargestLevels::default(),
            last_update_ts: None,
            imbalance_history: VecDeque::with_capacity(IMBALANCE_HISTORY_CAPACITY),
            recent_trades: VecDeque::with_capacity(RECENT_TRADES_CAPACITY),
            cumulative_delta: 0.0,
            last_signal: None,
            last_alert_fingerprint: None,
        }
    }

    /// Append a fresh imbalance ratio sample, evicting the oldest entry once
    /// the buffer is at capacity.
    pub fn push_imbalance_sample(&mut self, ratio: f64) {
        if self.imbalance_history.len() == IMBALANCE_HISTORY_CAPACITY {
            self.imbalance_history.pop_front();
        }
        self.imbalance_history.push_back(ratio);
    }

    /// Record a trade and evict anything older than the sliding window or
    /// beyond capacity. `now` is the timestamp of the trade just processed
    /// (spec invariant 4: no trade older than 60s relative to the most
    /// recent trade processed, not wall-clock `Utc::now()`).
    pub fn push_trade(&mut self, trade: RecentTrade, now: DateTime<Utc>) {
        self.recent_trades.push_back(trade);
        self.evict_stale_trades(now);
        while self.recent_trades.len() > RECENT_TRADES_CAPACITY {
            self.recent_trades.pop_front();
        }
    }

    fn evict_stale_trades(&mut self, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::from_std(RECENT_TRADES_WINDOW).unwrap();
        while let Some(front) = self.recent_trades.front() {
            if front.occurred_at < cutoff {
                self.recent_trades.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    #[test]
    fn imbalance_history_evicts_oldest_past_capacity() {
        let mut state = InstrumentState::new("WIF-USDT");
        for i in 0..70 {
            state.push_imbalance_sample(i as f64);
        }
        assert_eq!(state.imbalance_history.len(), IMBALANCE_HISTORY_CAPACITY);
        assert_eq!(*state.imbalance_history.front().unwrap(), 10.0);
        assert_eq!(*state.imbalance_history.back().unwrap(), 69.0);
    }

    #[test]
    fn recent_trades_never_older_than_60s_relative_to_latest() {
        let mut state = InstrumentState::new("WIF-USDT");
        let base = Utc::now();
        let old = RecentTrade {
            value_quote: 100.0,
            side: Side::Buy,
            occurred_at: base,
        };
        state.push_trade(old, base);

        let later = base + chrono::Duration::seconds(61);
        let fresh = RecentTrade {
            value_quote: 200.0,
            side: Side::Sell,
            occurred_at: later,
        };
        state.push_trade(fresh, later);

        assert_eq!(state.recent_trades.len(), 1);
        assert!((state.recent_trades[0].value_quote - 200.0).abs() < 1e-9);
    }

    #[test]
    fn recent_trades_capped_at_capacity() {
        let mut state = InstrumentState::new("WIF-USDT");
        let base = Utc::now();
        for i in 0..150 {
            let t = RecentTrade {
                value_quote: i as f64,
                side: Side::Buy,
                occurred_at: base,
            };
            state.push_trade(t, base);
        }
        assert_eq!(state.recent_trades.len(), RECENT_TRADES_CAPACITY);
    }
}
