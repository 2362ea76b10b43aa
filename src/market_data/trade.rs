// =============================================================================
// Trade Data Model
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Side, Venue};

/// A single executed trade, normalized from venue-specific wire shapes.
/// `side` is the taker-aggressor side: `Buy` lifted an ask, `Sell` hit a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub instrument: String,
    pub venue: Venue,
    pub price: f64,
    pub quantity: f64,
    pub side: Side,
    pub occurred_at: DateTime<Utc>,
}

impl Trade {
    pub fn value_quote(&self) -> f64 {
        self.price * self.quantity
    }
}

/// The record shape used uniformly by both the `InstrumentState` writer
/// (`Watcher::on_trade`) and the signal engine's flow-score reader. A single
/// shared shape avoids the tuple-arity drift bug in the original
/// implementation, where the writer and reader paths disagreed on whether a
/// recent trade carried a timestamp, occasionally zeroing the flow score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecentTrade {
    pub value_quote: f64,
    pub side: Side,
    pub occurred_at: DateTime<Utc>,
}

impl From<&Trade> for RecentTrade {
    fn from(trade: &Trade) -> Self {
        Self {
            value_quote: trade.value_quote(),
            side: trade.side,
            occurred_at: trade.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_quote_is_price_times_quantity() {
        let trade = Trade {
            instrument: "WIF-USDT".into(),
            venue: Venue::Bingx,
            price: 2.0,
            quantity: 1500.0,
            side: Side::Buy,
            occurred_at: Utc::now(),
        };
        assert!((trade.value_quote() - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn recent_trade_carries_side_and_value() {
        let trade = Trade {
            instrument: "WIF-USDT".into(),
            venue: Venue::Bingx,
            price: 2.0,
            quantity: 10.0,
            side: Side::Sell,
            occurred_at: Utc::now(),
        };
        let recent: RecentTrade = (&trade).into();
        assert_eq!(recent.side, Side::Sell);
        assert!((recent.value_quote - 20.0).abs() < 1e-9);
    }
}
