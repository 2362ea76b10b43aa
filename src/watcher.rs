// =============================================================================
// Per-Instrument Watcher — owns one adapter connection end-to-end
// =============================================================================
//
// Runs on its own task. The adapter-read loop is the task's producer; the
// signal/analyzer pipeline runs inline on the same task so that, for a given
// instrument, snapshot -> stats -> signal -> broadcast-publish is strictly
// serial and monotonic in receive order (spec §5). `InstrumentState` lives
// entirely inside this task — nothing else can reach it; everything exported
// is a serialized `WatcherSnapshot` copy published through an `Arc<RwLock<_>>`
// the registry and API layer may read.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::{bingx::BingxAdapter, blofin::BlofinAdapter, hyperliquid::HyperliquidAdapter};
use crate::adapters::{Adapter, NormalizedEvent};
use crate::analyzer::{self, AlertFingerprint, AlertKind};
use crate::broadcast::BroadcastHub;
use crate::config::AlertThresholds;
use crate::market_data::book::BookSnapshot;
use crate::market_data::instrument_state::InstrumentState;
use crate::market_data::trade::{RecentTrade, Trade};
use crate::signals::engine::SignalResult;
use crate::types::{instrument_key, Venue};

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Serializable snapshot of an `InstrumentState` for API/dashboard consumers.
/// Published after every book update; cheap to clone since it carries no
/// unbounded collections.
#[derive(Debug, Clone, Serialize)]
pub struct WatcherSnapshot {
    pub instrument: String,
    pub venue: Venue,
    pub key: String,
    pub connected: bool,
    pub bid_depth_quote: f64,
    pub ask_depth_quote: f64,
    pub imbalance_ratio: f64,
    pub spread_bps: f64,
    pub mid_price: f64,
    pub cumulative_delta: f64,
    pub last_update_ts: Option<DateTime<Utc>>,
    pub last_signal: Option<SignalResult>,
}

impl WatcherSnapshot {
    fn initial(venue: Venue, symbol: &str) -> Self {
        Self {
            instrument: symbol.to_string(),
            venue,
            key: instrument_key(venue, symbol),
            connected: false,
            bid_depth_quote: 0.0,
            ask_depth_quote: 0.0,
            imbalance_ratio: 1.0,
            spread_bps: 0.0,
            mid_price: 0.0,
            cumulative_delta: 0.0,
            last_update_ts: None,
            last_signal: None,
        }
    }

    fn from_state(venue: Venue, symbol: &str, connected: bool, state: &InstrumentState) -> Self {
        Self {
            instrument: symbol.to_string(),
            venue,
            key: instrument_key(venue, symbol),
            connected,
            bid_depth_quote: state.metrics.bid_depth_quote,
            ask_depth_quote: state.metrics.ask_depth_quote,
            imbalance_ratio: state.metrics.imbalance_ratio,
            spread_bps: state.metrics.spread_bps,
            mid_price: state.metrics.mid_price,
            cumulative_delta: state.cumulative_delta,
            last_update_ts: state.last_update_ts,
            last_signal: state.last_signal.clone(),
        }
    }
}

/// A running Watcher task plus everything a registry needs to manage it.
pub struct WatcherHandle {
    pub venue: Venue,
    pub symbol: String,
    pub snapshot: Arc<RwLock<WatcherSnapshot>>,
    task: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    /// Cancels the Watcher task. The adapter's `close()` is idempotent so an
    /// abrupt cancellation mid-read is safe (spec §5).
    pub fn stop(self) {
        self.task.abort();
    }
}

fn build_adapter(venue: Venue, symbol: &str) -> Box<dyn Adapter> {
    match venue {
        Venue::Bingx => Box::new(BingxAdapter::new(symbol)),
        Venue::Blofin => Box::new(BlofinAdapter::new(symbol)),
        Venue::Hyperliquid => Box::new(HyperliquidAdapter::new(symbol)),
    }
}

/// Exponential backoff with a 30s cap and +/-20% jitter (spec §5).
fn next_backoff(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE.saturating_mul(1u32.checked_shl(attempt.min(5)).unwrap_or(32));
    let capped = exp.min(BACKOFF_CAP);
    let jitter_frac = rand::thread_rng().gen_range(-0.2..=0.2);
    let millis = (capped.as_millis() as f64) * (1.0 + jitter_frac);
    Duration::from_millis(millis.max(0.0) as u64)
}

pub fn spawn(
    venue: Venue,
    symbol: String,
    thresholds: AlertThresholds,
    hub: Arc<BroadcastHub>,
    alert_log: Arc<RwLock<analyzer::AlertLog>>,
) -> WatcherHandle {
    let snapshot = Arc::new(RwLock::new(WatcherSnapshot::initial(venue, &symbol)));
    let task_snapshot = snapshot.clone();
    let task_symbol = symbol.clone();

    let task = tokio::spawn(async move {
        run(venue, task_symbol, thresholds, hub, alert_log, task_snapshot).await;
    });

    WatcherHandle { venue, symbol, snapshot, task }
}

async fn run(
    venue: Venue,
    symbol: String,
    thresholds: AlertThresholds,
    hub: Arc<BroadcastHub>,
    alert_log: Arc<RwLock<analyzer::AlertLog>>,
    snapshot: Arc<RwLock<WatcherSnapshot>>,
) {
    let key = instrument_key(venue, &symbol);
    let mut state = InstrumentState::new(symbol.clone());
    let mut attempt: u32 = 0;

    loop {
        let mut adapter = build_adapter(venue, &symbol);

        if let Err(e) = adapter.connect().await {
            warn!(%key, error = %e, attempt, "adapter connect failed");
            sleep_backoff(&mut attempt).await;
            continue;
        }
        if let Err(e) = adapter.subscribe().await {
            warn!(%key, error = %e, "adapter subscribe rejected");
            adapter.close().await;
            sleep_backoff(&mut attempt).await;
            continue;
        }

        info!(%key, "watcher connected");
        attempt = 0;
        snapshot.write().connected = true;

        loop {
            match adapter.next_event().await {
                Ok(Some(NormalizedEvent::Book(book))) => {
                    on_book(&key, &mut state, book, &thresholds, &hub, &alert_log, &snapshot);
                }
                Ok(Some(NormalizedEvent::Trade(trade))) => {
                    on_trade(&key, &mut state, trade, &thresholds, &hub, &alert_log);
                }
                Ok(Some(NormalizedEvent::Unparseable { reason })) => {
                    tracing::debug!(%key, reason, "dropped unparseable message");
                }
                Ok(None) => {
                    warn!(%key, "connection closed cleanly, reconnecting");
                    break;
                }
                Err(e) => {
                    warn!(%key, error = %e, "connection lost, reconnecting");
                    break;
                }
            }
        }

        adapter.close().await;
        snapshot.write().connected = false;
        sleep_backoff(&mut attempt).await;
    }
}

async fn sleep_backoff(attempt: &mut u32) {
    let delay = next_backoff(*attempt);
    *attempt = attempt.saturating_add(1);
    tokio::time::sleep(delay).await;
}

#[allow(clippy::too_many_arguments)]
fn on_book(
    key: &str,
    state: &mut InstrumentState,
    book: BookSnapshot,
    thresholds: &AlertThresholds,
    hub: &Arc<BroadcastHub>,
    alert_log: &Arc<RwLock<analyzer::AlertLog>>,
    snapshot: &Arc<RwLock<WatcherSnapshot>>,
) {
    use crate::market_data::book::PriceLevel;
    use crate::signals::engine::SignalEngine;

    let bids = book.top_bids(20);
    let asks = book.top_asks(20);

    let bid_depth_quote: f64 = bids.iter().map(PriceLevel::value_quote).sum();
    let ask_depth_quote: f64 = asks.iter().map(PriceLevel::value_quote).sum();
    let imbalance_ratio = if ask_depth_quote == 0.0 {
        2.0
    } else if bid_depth_quote == 0.0 {
        0.5
    } else {
        bid_depth_quote / ask_depth_quote
    };

    state.largest.largest_bid = bids.iter().copied().max_by(|a, b| {
        a.value_quote().partial_cmp(&b.value_quote()).unwrap_or(std::cmp::Ordering::Equal)
    });
    state.largest.largest_ask = asks.iter().copied().max_by(|a, b| {
        a.value_quote().partial_cmp(&b.value_quote()).unwrap_or(std::cmp::Ordering::Equal)
    });

    if let Some(mid) = book.mid_price() {
        state.metrics.mid_price = mid;
        if let (Some(bid0), Some(ask0)) = (book.best_bid(), book.best_ask()) {
            state.metrics.spread_bps = (ask0.price - bid0.price) / mid * 10_000.0;
        }
    }
    state.metrics.bid_depth_quote = bid_depth_quote;
    state.metrics.ask_depth_quote = ask_depth_quote;
    state.metrics.imbalance_ratio = imbalance_ratio;
    state.last_update_ts = Some(book.received_at);
    state.push_imbalance_sample(imbalance_ratio);

    let recent_trades: Vec<RecentTrade> = state.recent_trades.iter().copied().collect();
    let result = SignalEngine::analyze(bids, asks, state.imbalance_history.make_contiguous(), &recent_trades);
    // Flow score's side-effect: fold this update's buy-sell delta into the
    // watcher's running cumulative delta (spec §3, §4.2).
    state.cumulative_delta += result.flow_delta;
    state.last_signal = Some(result);

    // Wall + imbalance alert rules run on every book update (spec §4.4).
    let wall_alerts = analyzer::detect_walls(
        &state.instrument,
        book.venue,
        state.largest.largest_bid,
        state.largest.largest_ask,
        book.received_at,
        thresholds,
    );
    for alert in wall_alerts {
        emit_alert(key, state, alert, hub, alert_log);
    }
    if let Some(alert) = analyzer::detect_imbalance(
        &state.instrument,
        book.venue,
        imbalance_ratio,
        bid_depth_quote,
        ask_depth_quote,
        state.metrics.mid_price,
        book.received_at,
        thresholds,
    ) {
        emit_alert(key, state, alert, hub, alert_log);
    }

    *snapshot.write() = WatcherSnapshot::from_state(book.venue, &state.instrument, true, state);
    hub.publish_stats(key.to_string(), serde_json::to_value(&*snapshot.read()).unwrap_or_default());
}

fn on_trade(
    key: &str,
    state: &mut InstrumentState,
    trade: Trade,
    thresholds: &AlertThresholds,
    hub: &Arc<BroadcastHub>,
    alert_log: &Arc<RwLock<analyzer::AlertLog>>,
) {
    let recent: RecentTrade = (&trade).into();
    state.push_trade(recent, trade.occurred_at);

    if let Some(alert) = analyzer::classify_trade(
        &state.instrument,
        trade.venue,
        trade.side,
        trade.price,
        trade.value_quote(),
        trade.occurred_at,
        thresholds,
    ) {
        emit_alert(key, state, alert, hub, alert_log);
    }
}

fn emit_alert(
    key: &str,
    state: &mut InstrumentState,
    alert: analyzer::WhaleAlert,
    hub: &Arc<BroadcastHub>,
    alert_log: &Arc<RwLock<analyzer::AlertLog>>,
) {
    let should_emit = analyzer::should_emit(
        state.last_alert_fingerprint.as_ref(),
        alert.kind,
        alert.side,
        alert.occurred_at,
    );
    if !should_emit {
        return;
    }

    state.last_alert_fingerprint = Some(AlertFingerprint {
        kind: alert.kind,
        side: alert.side,
        occurred_at: alert.occurred_at,
    });

    let payload = serde_json::to_value(&alert).unwrap_or_default();
    alert_log.write().push(alert);
    hub.publish_alert(key.to_string(), payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_never_exceeds_cap_plus_jitter() {
        for attempt in 0..10 {
            let d = next_backoff(attempt);
            assert!(d <= BACKOFF_CAP + BACKOFF_CAP / 5);
        }
    }

    #[test]
    fn backoff_grows_with_attempt_count_before_capping() {
        let early = next_backoff(0);
        let later = next_backoff(3);
        assert!(later >= early);
    }

    #[test]
    fn watcher_snapshot_key_matches_instrument_key_format() {
        let snap = WatcherSnapshot::initial(Venue::Bingx, "WIF-USDT");
        assert_eq!(snap.key, "bingx:WIF-USDT");
    }

    #[test]
    fn on_book_integrates_flow_delta_into_cumulative_delta() {
        use crate::market_data::book::{BookSnapshot, PriceLevel};

        let mut state = InstrumentState::new("WIF-USDT");
        state.push_trade(
            RecentTrade { value_quote: 1000.0, side: crate::types::Side::Buy, occurred_at: Utc::now() },
            Utc::now(),
        );
        state.push_trade(
            RecentTrade { value_quote: 400.0, side: crate::types::Side::Sell, occurred_at: Utc::now() },
            Utc::now(),
        );

        let book = BookSnapshot {
            instrument: "WIF-USDT".to_string(),
            venue: Venue::Bingx,
            bids: vec![PriceLevel::new(100.0, 10.0)],
            asks: vec![PriceLevel::new(100.1, 10.0)],
            received_at: Utc::now(),
        };

        let thresholds = crate::config::AlertThresholds::default();
        let hub = Arc::new(BroadcastHub::new());
        let alert_log = Arc::new(RwLock::new(analyzer::AlertLog::new()));
        let snapshot = Arc::new(RwLock::new(WatcherSnapshot::initial(Venue::Bingx, "WIF-USDT")));

        assert_eq!(state.cumulative_delta, 0.0);
        on_book("bingx:WIF-USDT", &mut state, book, &thresholds, &hub, &alert_log, &snapshot);

        assert!((state.cumulative_delta - 600.0).abs() < 1e-9);
        assert!((snapshot.read().cumulative_delta - 600.0).abs() < 1e-9);
    }
}
