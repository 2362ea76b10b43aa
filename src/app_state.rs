// =============================================================================
// Shared Application State
// =============================================================================
//
// The single set of long-lived, cross-task handles the edge layer and the
// bootstrap sequence in `main.rs` both need: the contract catalog, the
// watcher registry, the broadcast hub, the shared alert log and the runtime
// config. Everything else (per-instrument state, adapter connections) lives
// inside its own Watcher task and is never reachable from here (spec §3
// Ownership).
// =============================================================================

use std::sync::Arc;

use parking_lot::RwLock;

use crate::analyzer::AlertLog;
use crate::broadcast::BroadcastHub;
use crate::catalog::ContractCatalog;
use crate::config::RuntimeConfig;
use crate::registry::WatcherRegistry;

pub struct AppState {
    pub catalog: Arc<ContractCatalog>,
    pub registry: Arc<WatcherRegistry>,
    pub hub: Arc<BroadcastHub>,
    pub alert_log: Arc<RwLock<AlertLog>>,
    pub config: RwLock<RuntimeConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            catalog: Arc::new(ContractCatalog::new()),
            registry: Arc::new(WatcherRegistry::new()),
            hub: Arc::new(BroadcastHub::new()),
            alert_log: Arc::new(RwLock::new(AlertLog::new())),
            config: RwLock::new(config),
            http: reqwest::Client::new(),
        }
    }
}
