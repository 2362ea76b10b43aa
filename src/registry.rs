// =============================================================================
// Watcher Registry — starts/stops per-instrument Watchers on operator command
// =============================================================================
//
// A single mutex around a `HashMap` keyed `"venue:symbol"`. Critical sections
// only ever insert/remove/clone, so the lock is never held across an await
// point (spec §5: "operations are short").
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::analyzer::AlertLog;
use crate::broadcast::BroadcastHub;
use crate::catalog::ContractCatalog;
use crate::config::AlertThresholds;
use crate::error::{EngineError, EngineResult};
use crate::types::{instrument_key, Venue};
use crate::watcher::{self, WatcherHandle, WatcherSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Watching,
    AlreadyWatching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwatchOutcome {
    Stopped,
    NotWatching,
}

#[derive(Default)]
pub struct WatcherRegistry {
    watchers: Mutex<HashMap<String, WatcherHandle>>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: returns `AlreadyWatching` if a Watcher for this instrument
    /// is already running. Rejected if the instrument isn't in the catalog
    /// (spec §4.5).
    pub fn watch(
        &self,
        venue: Venue,
        symbol: &str,
        catalog: &ContractCatalog,
        thresholds: AlertThresholds,
        hub: Arc<BroadcastHub>,
        alert_log: Arc<RwLock<AlertLog>>,
    ) -> EngineResult<WatchOutcome> {
        let key = instrument_key(venue, symbol);

        let mut watchers = self.watchers.lock();
        if watchers.contains_key(&key) {
            return Ok(WatchOutcome::AlreadyWatching);
        }

        if !catalog.contains(venue, symbol) {
            return Err(EngineError::WatchUnknownInstrument {
                venue: venue.to_string(),
                symbol: symbol.to_string(),
            });
        }

        let handle = watcher::spawn(venue, symbol.to_string(), thresholds, hub, alert_log);
        watchers.insert(key, handle);
        Ok(WatchOutcome::Watching)
    }

    /// Stops the adapter and drops the `InstrumentState` entirely — a
    /// subsequent `Watch` for the same instrument gets a fresh history
    /// (spec invariant 7).
    pub fn unwatch(&self, venue: Venue, symbol: &str) -> UnwatchOutcome {
        let key = instrument_key(venue, symbol);
        match self.watchers.lock().remove(&key) {
            Some(handle) => {
                handle.stop();
                UnwatchOutcome::Stopped
            }
            None => UnwatchOutcome::NotWatching,
        }
    }

    pub fn list(&self) -> Vec<WatcherSnapshot> {
        self.watchers.lock().values().map(|h| h.snapshot.read().clone()).collect()
    }

    pub fn is_watching(&self, venue: Venue, symbol: &str) -> bool {
        self.watchers.lock().contains_key(&instrument_key(venue, symbol))
    }

    pub fn count(&self) -> usize {
        self.watchers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_rejects_instrument_not_in_catalog() {
        let registry = WatcherRegistry::new();
        let catalog = ContractCatalog::new();
        let hub = Arc::new(BroadcastHub::new());
        let alerts = Arc::new(RwLock::new(AlertLog::new()));

        let result = registry.watch(
            Venue::Bingx,
            "NOPE-USDT",
            &catalog,
            AlertThresholds::default(),
            hub,
            alerts,
        );
        assert!(matches!(result, Err(EngineError::WatchUnknownInstrument { .. })));
    }

    #[test]
    fn unwatch_unknown_instrument_reports_not_watching() {
        let registry = WatcherRegistry::new();
        assert_eq!(registry.unwatch(Venue::Bingx, "WIF-USDT"), UnwatchOutcome::NotWatching);
    }
}
