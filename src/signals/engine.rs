// =============================================================================
// Order-Flow Signal Engine — imbalance, pressure, walls, spread, flow, momentum
// =============================================================================
//
// Six component scores, each on a -100..+100 scale, combined into one weighted
// score that drives the `Signal` classification. Every component is a pure
// function of the book/trade data handed in — the engine carries no state of
// its own beyond the instrument's imbalance history, which lives on
// `InstrumentState` and is passed in by reference.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::market_data::book::PriceLevel;
use crate::market_data::trade::RecentTrade;
use crate::types::Side;

const IMBALANCE_WEIGHT: f64 = 0.25;
const WEIGHTED_PRESSURE_WEIGHT: f64 = 0.20;
const WALL_WEIGHT: f64 = 0.15;
const SPREAD_WEIGHT: f64 = 0.10;
const FLOW_WEIGHT: f64 = 0.20;
const MOMENTUM_WEIGHT: f64 = 0.10;

const DEPTH_FOR_IMBALANCE: usize = 20;
const DEPTH_FOR_PRESSURE: usize = 30;
const DEPTH_FOR_WALL: usize = 20;
const PRESSURE_DECAY_RATE: f64 = 0.1;

const WALL_DOMINANCE_PCT: f64 = 15.0;
const WALL_ABSOLUTE_QUOTE: f64 = 100_000.0;
const LARGE_WALL_REASON_QUOTE: f64 = 50_000.0;

const ZONE_MAX_DISTANCE_PCT: f64 = 50.0;
const ZONE_CLUSTER_PCT: f64 = 0.15;
const ZONE_MAJOR_SHARE: f64 = 0.2;
const ZONE_MAJOR_ABSOLUTE_QUOTE: f64 = 100_000.0;

/// Directional classification derived from the final weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl Signal {
    fn from_score(score: f64) -> Self {
        if score >= 40.0 {
            Signal::StrongBuy
        } else if score >= 20.0 {
            Signal::Buy
        } else if score <= -40.0 {
            Signal::StrongSell
        } else if score <= -20.0 {
            Signal::Sell
        } else {
            Signal::Neutral
        }
    }
}

/// A cluster of same-side order-book volume, used to surface support /
/// resistance zones further out than the top-of-book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneSide {
    Support,
    Resistance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityZone {
    pub price: f64,
    pub total_volume_quote: f64,
    pub side: ZoneSide,
    pub distance_pct: f64,
    pub order_count: usize,
    pub is_major: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeMode {
    Scalp,
    Reversal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSuggestion {
    pub action: TradeAction,
    pub mode: TradeMode,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_price: f64,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalResult {
    pub signal: Signal,
    pub confidence: f64,
    pub score: f64,

    pub imbalance_score: f64,
    pub weighted_pressure_score: f64,
    pub wall_score: f64,
    pub spread_score: f64,
    pub flow_score: f64,
    pub momentum_score: f64,
    /// `buy_volume - sell_volume` over the recent-trades window passed to
    /// this call. Not part of the weighted score — the caller folds this
    /// into its own running `cumulative_delta` (spec §4.2, §3).
    pub flow_delta: f64,

    pub bid_volume_quote: f64,
    pub ask_volume_quote: f64,
    pub imbalance_ratio: f64,
    pub spread_bps: f64,
    pub largest_bid_quote: f64,
    pub largest_ask_quote: f64,
    pub mid_price: f64,

    pub support_zones: Vec<LiquidityZone>,
    pub resistance_zones: Vec<LiquidityZone>,

    pub scalp_suggestion: Option<TradeSuggestion>,
    pub reversal_suggestion: Option<TradeSuggestion>,

    pub reasons: Vec<String>,
}

/// Produces a `SignalResult` from a single book snapshot plus the
/// instrument's rolling imbalance history and recent trade window. Stateless
/// beyond its inputs — callers own the history buffers.
pub struct SignalEngine;

impl SignalEngine {
    pub fn analyze(
        bids: &[PriceLevel],
        asks: &[PriceLevel],
        imbalance_history: &[f64],
        recent_trades: &[RecentTrade],
    ) -> SignalResult {
        if bids.is_empty() || asks.is_empty() {
            return SignalResult {
                signal: Signal::Neutral,
                confidence: 0.0,
                score: 0.0,
                imbalance_score: 0.0,
                weighted_pressure_score: 0.0,
                wall_score: 0.0,
                spread_score: 0.0,
                flow_score: 0.0,
                momentum_score: 0.0,
                flow_delta: 0.0,
                bid_volume_quote: 0.0,
                ask_volume_quote: 0.0,
                imbalance_ratio: 1.0,
                spread_bps: 0.0,
                largest_bid_quote: 0.0,
                largest_ask_quote: 0.0,
                mid_price: 0.0,
                support_zones: Vec::new(),
                resistance_zones: Vec::new(),
                scalp_suggestion: None,
                reversal_suggestion: None,
                reasons: vec!["insufficient data".to_string()],
            };
        }

        let mid_price = (bids[0].price + asks[0].price) / 2.0;

        let (imbalance_score, bid_volume_quote, ask_volume_quote, imbalance_ratio) =
            Self::calc_imbalance(bids, asks);
        let weighted_pressure_score = Self::calc_weighted_pressure(bids, asks, mid_price);
        let (wall_score, largest_bid_quote, largest_ask_quote) =
            Self::calc_wall_score(bids, asks, bid_volume_quote, ask_volume_quote);
        let (spread_score, spread_bps) = Self::calc_spread_score(bids, asks);
        let (flow_score, flow_delta) = Self::calc_flow_score(recent_trades);
        let momentum_score = Self::calc_momentum(imbalance_history);

        let score = imbalance_score * IMBALANCE_WEIGHT
            + weighted_pressure_score * WEIGHTED_PRESSURE_WEIGHT
            + wall_score * WALL_WEIGHT
            + spread_score * SPREAD_WEIGHT
            + flow_score * FLOW_WEIGHT
            + momentum_score * MOMENTUM_WEIGHT;

        let signal = Signal::from_score(score);
        let confidence = (score.abs() * 2.0).min(100.0);

        let (support_zones, resistance_zones) = Self::find_liquidity_zones(bids, asks, mid_price);

        let mut result = SignalResult {
            signal,
            confidence,
            score,
            imbalance_score,
            weighted_pressure_score,
            wall_score,
            spread_score,
            flow_score,
            momentum_score,
            flow_delta,
            bid_volume_quote,
            ask_volume_quote,
            imbalance_ratio,
            spread_bps,
            largest_bid_quote,
            largest_ask_quote,
            mid_price,
            support_zones,
            resistance_zones,
            scalp_suggestion: None,
            reversal_suggestion: None,
            reasons: Vec::new(),
        };

        let (scalp, reversal) = Self::generate_suggestions(&result);
        result.scalp_suggestion = scalp;
        result.reversal_suggestion = reversal;
        result.reasons = Self::generate_reasons(&result);

        if let Some(z) = result.support_zones.first().filter(|z| z.is_major) {
            result.reasons.push(format!(
                "major support at {:.6} ({:.1}% below)",
                z.price, z.distance_pct
            ));
        }
        if let Some(z) = result.resistance_zones.first().filter(|z| z.is_major) {
            result.reasons.push(format!(
                "major resistance at {:.6} ({:.1}% above)",
                z.price, z.distance_pct
            ));
        }

        result
    }

    fn calc_imbalance(bids: &[PriceLevel], asks: &[PriceLevel]) -> (f64, f64, f64, f64) {
        let bid_volume: f64 = bids
            .iter()
            .take(DEPTH_FOR_IMBALANCE)
            .map(PriceLevel::value_quote)
            .sum();
        let ask_volume: f64 = asks
            .iter()
            .take(DEPTH_FOR_IMBALANCE)
            .map(PriceLevel::value_quote)
            .sum();

        let ratio = if ask_volume == 0.0 {
            2.0
        } else if bid_volume == 0.0 {
            0.5
        } else {
            bid_volume / ask_volume
        };

        let score = if ratio >= 1.0 {
            ((ratio - 1.0) * 50.0).min(100.0)
        } else {
            ((ratio - 1.0) * 100.0).max(-100.0)
        };

        (score, bid_volume, ask_volume, ratio)
    }

    fn calc_weighted_pressure(bids: &[PriceLevel], asks: &[PriceLevel], mid_price: f64) -> f64 {
        let mut bid_pressure = 0.0;
        let mut ask_pressure = 0.0;

        for bid in bids.iter().take(DEPTH_FOR_PRESSURE) {
            let distance_pct = (mid_price - bid.price) / mid_price;
            let weight = (-PRESSURE_DECAY_RATE * distance_pct * 100.0).exp();
            bid_pressure += bid.value_quote() * weight;
        }
        for ask in asks.iter().take(DEPTH_FOR_PRESSURE) {
            let distance_pct = (ask.price - mid_price) / mid_price;
            let weight = (-PRESSURE_DECAY_RATE * distance_pct * 100.0).exp();
            ask_pressure += ask.value_quote() * weight;
        }

        let total = bid_pressure + ask_pressure;
        if total == 0.0 {
            return 0.0;
        }
        ((bid_pressure - ask_pressure) / total) * 100.0
    }

    fn calc_wall_score(
        bids: &[PriceLevel],
        asks: &[PriceLevel],
        total_bid: f64,
        total_ask: f64,
    ) -> (f64, f64, f64) {
        let largest_bid_quote = bids
            .iter()
            .take(DEPTH_FOR_WALL)
            .map(PriceLevel::value_quote)
            .fold(0.0, f64::max);
        let largest_ask_quote = asks
            .iter()
            .take(DEPTH_FOR_WALL)
            .map(PriceLevel::value_quote)
            .fold(0.0, f64::max);

        let bid_wall_pct = if total_bid > 0.0 {
            largest_bid_quote / total_bid * 100.0
        } else {
            0.0
        };
        let ask_wall_pct = if total_ask > 0.0 {
            largest_ask_quote / total_ask * 100.0
        } else {
            0.0
        };

        let mut score = 0.0;
        if bid_wall_pct > WALL_DOMINANCE_PCT {
            score += bid_wall_pct.min(50.0);
        }
        if ask_wall_pct > WALL_DOMINANCE_PCT {
            score -= ask_wall_pct.min(50.0);
        }
        if largest_bid_quote > WALL_ABSOLUTE_QUOTE {
            score += 20.0;
        }
        if largest_ask_quote > WALL_ABSOLUTE_QUOTE {
            score -= 20.0;
        }

        (score.clamp(-100.0, 100.0), largest_bid_quote, largest_ask_quote)
    }

    fn calc_spread_score(bids: &[PriceLevel], asks: &[PriceLevel]) -> (f64, f64) {
        let spread = asks[0].price - bids[0].price;
        let mid = (asks[0].price + bids[0].price) / 2.0;
        let spread_bps = (spread / mid) * 10_000.0;

        let score = if spread_bps < 5.0 {
            10.0
        } else if spread_bps > 50.0 {
            -10.0
        } else {
            0.0
        };

        (score, spread_bps)
    }

    /// Returns `(score, delta)` where `delta = buy_volume - sell_volume` over
    /// the window handed in. The caller is expected to fold `delta` into its
    /// own running `cumulative_delta` on every call — the accumulation is
    /// advisory only (the score itself stays memoryless) but must still
    /// happen, per spec §4.2's "also: `cumulative_delta += delta`".
    fn calc_flow_score(recent_trades: &[RecentTrade]) -> (f64, f64) {
        let buy_volume: f64 = recent_trades
            .iter()
            .filter(|t| t.side == Side::Buy)
            .map(|t| t.value_quote)
            .sum();
        let sell_volume: f64 = recent_trades
            .iter()
            .filter(|t| t.side == Side::Sell)
            .map(|t| t.value_quote)
            .sum();

        let delta = buy_volume - sell_volume;
        let total = buy_volume + sell_volume;
        if total == 0.0 {
            return (0.0, delta);
        }
        ((delta / total) * 100.0, delta)
    }

    /// Compares the average of the most recent 10 imbalance samples against
    /// the average of the oldest 10 to derive a rate-of-change score. Needs
    /// at least 10 samples; with fewer than 20 the "older" window collapses
    /// onto the same samples as "recent", yielding a momentum of 0.
    fn calc_momentum(imbalance_history: &[f64]) -> f64 {
        if imbalance_history.len() < 10 {
            return 0.0;
        }

        let recent_slice = &imbalance_history[imbalance_history.len() - 10..];
        let recent: f64 = recent_slice.iter().sum::<f64>() / 10.0;

        let older = if imbalance_history.len() >= 20 {
            imbalance_history[..10].iter().sum::<f64>() / 10.0
        } else {
            recent
        };

        if older == 0.0 {
            return 0.0;
        }

        let roc = (recent - older) / older;
        (roc * 300.0).clamp(-100.0, 100.0)
    }

    fn find_liquidity_zones(
        bids: &[PriceLevel],
        asks: &[PriceLevel],
        mid_price: f64,
    ) -> (Vec<LiquidityZone>, Vec<LiquidityZone>) {
        if mid_price == 0.0 {
            return (Vec::new(), Vec::new());
        }

        let bucket_width = mid_price * ZONE_CLUSTER_PCT / 100.0;
        let support_zones = Self::cluster_side(bids, mid_price, bucket_width, ZoneSide::Support);
        let resistance_zones =
            Self::cluster_side(asks, mid_price, bucket_width, ZoneSide::Resistance);

        (support_zones, resistance_zones)
    }

    fn cluster_side(
        levels: &[PriceLevel],
        mid_price: f64,
        bucket_width: f64,
        side: ZoneSide,
    ) -> Vec<LiquidityZone> {
        struct Bucket {
            volume: f64,
            count: usize,
            price_sum: f64,
        }

        let mut buckets: std::collections::BTreeMap<i64, Bucket> = std::collections::BTreeMap::new();

        for level in levels {
            let distance_pct = match side {
                ZoneSide::Support => (mid_price - level.price) / mid_price * 100.0,
                ZoneSide::Resistance => (level.price - mid_price) / mid_price * 100.0,
            };
            if !(0.0..=ZONE_MAX_DISTANCE_PCT).contains(&distance_pct) {
                continue;
            }
            let bucket_key = (level.price / bucket_width).round() as i64;
            let bucket = buckets.entry(bucket_key).or_insert(Bucket {
                volume: 0.0,
                count: 0,
                price_sum: 0.0,
            });
            bucket.volume += level.value_quote();
            bucket.count += 1;
            bucket.price_sum += level.price;
        }

        let total_volume: f64 = buckets.values().map(|b| b.volume).sum();
        let total_volume = if total_volume == 0.0 { 1.0 } else { total_volume };

        let mut zones: Vec<LiquidityZone> = buckets
            .into_values()
            .map(|b| {
                let avg_price = b.price_sum / b.count as f64;
                let distance_pct = match side {
                    ZoneSide::Support => (mid_price - avg_price) / mid_price * 100.0,
                    ZoneSide::Resistance => (avg_price - mid_price) / mid_price * 100.0,
                };
                let is_major =
                    b.volume > total_volume * ZONE_MAJOR_SHARE || b.volume > ZONE_MAJOR_ABSOLUTE_QUOTE;
                LiquidityZone {
                    price: avg_price,
                    total_volume_quote: b.volume,
                    side,
                    distance_pct,
                    order_count: b.count,
                    is_major,
                }
            })
            .collect();

        zones.sort_by(|a, b| b.total_volume_quote.partial_cmp(&a.total_volume_quote).unwrap());
        zones
    }

    fn generate_suggestions(
        result: &SignalResult,
    ) -> (Option<TradeSuggestion>, Option<TradeSuggestion>) {
        if result.mid_price == 0.0 {
            return (None, None);
        }

        let scalp = if result.score >= 20.0 {
            let stop_distance = (result.spread_bps * 3.0 / 10_000.0).max(0.005);
            let target_distance = stop_distance * 2.0;
            Some(TradeSuggestion {
                action: TradeAction::Long,
                mode: TradeMode::Scalp,
                entry_price: result.mid_price,
                target_price: result.mid_price * (1.0 + target_distance),
                stop_price: result.mid_price * (1.0 - stop_distance),
                confidence: result.confidence.min(80.0),
                reason: format!(
                    "near-price buying pressure ({:.2}x bid imbalance)",
                    result.imbalance_ratio
                ),
            })
        } else if result.score <= -20.0 {
            let stop_distance = (result.spread_bps * 3.0 / 10_000.0).max(0.005);
            let target_distance = stop_distance * 2.0;
            Some(TradeSuggestion {
                action: TradeAction::Short,
                mode: TradeMode::Scalp,
                entry_price: result.mid_price,
                target_price: result.mid_price * (1.0 - target_distance),
                stop_price: result.mid_price * (1.0 + stop_distance),
                confidence: result.confidence.min(80.0),
                reason: format!(
                    "near-price selling pressure ({:.2}x ask imbalance)",
                    1.0 / result.imbalance_ratio
                ),
            })
        } else {
            None
        };

        let major_supports: Vec<&LiquidityZone> =
            result.support_zones.iter().filter(|z| z.is_major).collect();
        let major_resistances: Vec<&LiquidityZone> = result
            .resistance_zones
            .iter()
            .filter(|z| z.is_major)
            .collect();

        let mut reversal = None;
        if let Some(best_support) = major_supports.first() {
            if best_support.distance_pct < 10.0 {
                let mut target_price = result.mid_price * (1.0 + best_support.distance_pct / 100.0);
                if let Some(best_resistance) = major_resistances.first() {
                    target_price = best_resistance.price;
                }
                reversal = Some(TradeSuggestion {
                    action: TradeAction::Long,
                    mode: TradeMode::Reversal,
                    entry_price: best_support.price,
                    target_price,
                    stop_price: best_support.price * 0.97,
                    confidence: (best_support.total_volume_quote / 10_000.0).min(70.0),
                    reason: format!(
                        "major support zone at {:.6} ({:.0} quote in bids)",
                        best_support.price, best_support.total_volume_quote
                    ),
                });
            }
        }

        if reversal.is_none() {
            if let Some(best_resistance) = major_resistances.first() {
                if best_resistance.distance_pct < 10.0 {
                    let mut target_price =
                        result.mid_price * (1.0 - best_resistance.distance_pct / 100.0);
                    if let Some(best_support) = major_supports.first() {
                        target_price = best_support.price;
                    }
                    reversal = Some(TradeSuggestion {
                        action: TradeAction::Short,
                        mode: TradeMode::Reversal,
                        entry_price: best_resistance.price,
                        target_price,
                        stop_price: best_resistance.price * 1.03,
                        confidence: (best_resistance.total_volume_quote / 10_000.0).min(70.0),
                        reason: format!(
                            "major resistance zone at {:.6} ({:.0} quote in asks)",
                            best_resistance.price, best_resistance.total_volume_quote
                        ),
                    });
                }
            }
        }

        (scalp, reversal)
    }

    fn generate_reasons(result: &SignalResult) -> Vec<String> {
        let mut reasons = Vec::new();

        if result.imbalance_ratio > 1.3 {
            reasons.push(format!(
                "strong bid imbalance ({:.2}x more bids)",
                result.imbalance_ratio
            ));
        } else if result.imbalance_ratio < 0.7 {
            reasons.push(format!(
                "strong ask imbalance ({:.2}x more asks)",
                1.0 / result.imbalance_ratio
            ));
        }

        if result.largest_bid_quote > LARGE_WALL_REASON_QUOTE {
            reasons.push(format!("large bid wall: {:.0}", result.largest_bid_quote));
        }
        if result.largest_ask_quote > LARGE_WALL_REASON_QUOTE {
            reasons.push(format!("large ask wall: {:.0}", result.largest_ask_quote));
        }

        if result.momentum_score > 30.0 {
            reasons.push("bullish momentum building".to_string());
        } else if result.momentum_score < -30.0 {
            reasons.push("bearish momentum building".to_string());
        }

        if result.spread_bps > 30.0 {
            reasons.push(format!(
                "wide spread ({:.0} bps) - low liquidity",
                result.spread_bps
            ));
        }

        if result.flow_score > 40.0 {
            reasons.push("heavy buy flow detected".to_string());
        } else if result.flow_score < -40.0 {
            reasons.push("heavy sell flow detected".to_string());
        }

        if reasons.is_empty() {
            reasons.push("no strong signals detected".to_string());
        }

        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bullish_book() -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        let bids = vec![
            PriceLevel::new(100.0, 500.0),
            PriceLevel::new(99.9, 300.0),
            PriceLevel::new(99.8, 1000.0),
            PriceLevel::new(99.7, 200.0),
        ];
        let asks = vec![
            PriceLevel::new(100.1, 200.0),
            PriceLevel::new(100.2, 150.0),
            PriceLevel::new(100.3, 100.0),
        ];
        (bids, asks)
    }

    #[test]
    fn bullish_book_produces_positive_score_and_buy_signal() {
        let (bids, asks) = bullish_book();
        let result = SignalEngine::analyze(&bids, &asks, &[], &[]);
        assert!(result.score > 0.0, "expected positive score, got {}", result.score);
        assert!(matches!(result.signal, Signal::Buy | Signal::StrongBuy));
    }

    #[test]
    fn empty_side_yields_neutral_with_zero_confidence() {
        let result = SignalEngine::analyze(&[], &[PriceLevel::new(1.0, 1.0)], &[], &[]);
        assert_eq!(result.signal, Signal::Neutral);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.reasons, vec!["insufficient data".to_string()]);
    }

    #[test]
    fn imbalance_ratio_caps_when_one_side_is_empty_of_volume() {
        let bids = vec![PriceLevel::new(100.0, 0.0)];
        let asks = vec![PriceLevel::new(100.1, 50.0)];
        let result = SignalEngine::analyze(&bids, &asks, &[], &[]);
        assert!((result.imbalance_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn flow_score_reflects_buy_heavy_recent_trades() {
        let (bids, asks) = bullish_book();
        let trades = vec![
            RecentTrade { value_quote: 1000.0, side: Side::Buy, occurred_at: Utc::now() },
            RecentTrade { value_quote: 1000.0, side: Side::Buy, occurred_at: Utc::now() },
            RecentTrade { value_quote: 200.0, side: Side::Sell, occurred_at: Utc::now() },
        ];
        let result = SignalEngine::analyze(&bids, &asks, &[], &trades);
        assert!(result.flow_score > 0.0);
    }

    #[test]
    fn flow_delta_is_buy_minus_sell_volume() {
        let (bids, asks) = bullish_book();
        let trades = vec![
            RecentTrade { value_quote: 1000.0, side: Side::Buy, occurred_at: Utc::now() },
            RecentTrade { value_quote: 300.0, side: Side::Sell, occurred_at: Utc::now() },
        ];
        let result = SignalEngine::analyze(&bids, &asks, &[], &trades);
        assert!((result.flow_delta - 700.0).abs() < 1e-9);
    }

    #[test]
    fn momentum_is_zero_below_minimum_history() {
        let (bids, asks) = bullish_book();
        let short_history = vec![1.0; 5];
        let result = SignalEngine::analyze(&bids, &asks, &short_history, &[]);
        assert_eq!(result.momentum_score, 0.0);
    }

    #[test]
    fn rising_imbalance_history_gives_positive_momentum() {
        let (bids, asks) = bullish_book();
        let mut history: Vec<f64> = (1..=10).map(|i| i as f64 * 0.1).collect();
        history.extend((11..=20).map(|i| i as f64 * 1.0));
        let result = SignalEngine::analyze(&bids, &asks, &history, &[]);
        assert!(result.momentum_score > 0.0);
    }

    #[test]
    fn major_support_zone_detected_for_dominant_cluster() {
        let bids = vec![
            PriceLevel::new(99.0, 2000.0),
            PriceLevel::new(98.99, 50.0),
        ];
        let asks = vec![PriceLevel::new(101.0, 50.0)];
        let result = SignalEngine::analyze(&bids, &asks, &[], &[]);
        assert!(!result.support_zones.is_empty());
    }

    #[test]
    fn scalp_suggestion_present_when_score_crosses_threshold() {
        let (bids, asks) = bullish_book();
        let result = SignalEngine::analyze(&bids, &asks, &[], &[]);
        if result.score >= 20.0 {
            assert!(result.scalp_suggestion.is_some());
            assert_eq!(
                result.scalp_suggestion.as_ref().unwrap().action,
                TradeAction::Long
            );
        }
    }
}
