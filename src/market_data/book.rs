// =============================================================================
// Order Book Data Model — PriceLevel / BookSnapshot
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Venue;

/// A single resting order-book level. `value_quote` is derived, not stored,
/// since a level is immutable once constructed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

impl PriceLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    /// Notional value of this level in quote currency.
    pub fn value_quote(&self) -> f64 {
        self.price * self.quantity
    }
}

/// A full top-of-book replacement for one instrument on one venue.
///
/// The system never applies deltas — every push from an adapter is a
/// complete snapshot of the levels it carries. Bids are sorted descending by
/// price, asks ascending, so `bids[0]`/`asks[0]` are always best-of-book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub instrument: String,
    pub venue: Venue,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub received_at: DateTime<Utc>,
}

impl BookSnapshot {
    /// `None` if either side is empty — callers must treat this as
    /// insufficient data rather than panicking on `bids[0]`.
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b.price + a.price) / 2.0),
            _ => None,
        }
    }

    /// Top-20 levels by depth, as the signal engine considers at most 20
    /// (degrading to however many a venue actually sends, e.g. BloFin's
    /// 5-level `books5`).
    pub fn top_bids(&self, n: usize) -> &[PriceLevel] {
        let n = n.min(self.bids.len());
        &self.bids[..n]
    }

    pub fn top_asks(&self, n: usize) -> &[PriceLevel] {
        let n = n.min(self.asks.len());
        &self.asks[..n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> BookSnapshot {
        BookSnapshot {
            instrument: "WIF-USDT".into(),
            venue: Venue::Bingx,
            bids: vec![PriceLevel::new(100.0, 500.0), PriceLevel::new(99.9, 300.0)],
            asks: vec![PriceLevel::new(100.1, 200.0), PriceLevel::new(100.2, 150.0)],
            received_at: Utc::now(),
        }
    }

    #[test]
    fn mid_price_is_average_of_best_levels() {
        let snap = snapshot();
        assert!((snap.mid_price().unwrap() - 100.05).abs() < 1e-9);
    }

    #[test]
    fn empty_side_yields_no_mid_price() {
        let mut snap = snapshot();
        snap.asks.clear();
        assert_eq!(snap.mid_price(), None);
    }

    #[test]
    fn top_n_never_panics_on_short_books() {
        let snap = snapshot();
        assert_eq!(snap.top_bids(20).len(), 2);
        assert_eq!(snap.top_asks(1).len(), 1);
    }

    #[test]
    fn value_quote_is_price_times_quantity() {
        let level = PriceLevel::new(50.0, 2.0);
        assert!((level.value_quote() - 100.0).abs() < 1e-9);
    }
}
