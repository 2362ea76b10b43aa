// =============================================================================
// Runtime Configuration — hot-reloadable engine settings with atomic save
// =============================================================================
//
// Every tunable lives here so the process can be reconfigured without a
// rebuild. Persistence uses an atomic tmp + rename write, matching the
// teacher's pattern. All fields carry `#[serde(default)]` so that adding a
// field later never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_catalog_refresh_secs() -> u64 {
    300
}

fn default_whale_usd() -> f64 {
    50_000.0
}

fn default_large_usd() -> f64 {
    10_000.0
}

fn default_imbalance_ratio() -> f64 {
    1.5
}

fn default_symbols() -> Vec<String> {
    vec![
        "WIF-USDT".to_string(),
        "1000PEPE-USDT".to_string(),
        "DOGE-USDT".to_string(),
    ]
}

/// Whale/large/imbalance detection thresholds used by the order-flow
/// analyzer (spec §4.3). Kept as a nested struct so they can be tuned
/// independently of the rest of `RuntimeConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    #[serde(default = "default_large_usd")]
    pub large_order_quote: f64,
    #[serde(default = "default_whale_usd")]
    pub whale_order_quote: f64,
    #[serde(default = "default_imbalance_ratio")]
    pub imbalance_ratio: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            large_order_quote: default_large_usd(),
            whale_order_quote: default_whale_usd(),
            imbalance_ratio: default_imbalance_ratio(),
        }
    }
}

/// Top-level runtime configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Instruments to watch at startup, as bare symbols; each is watched on
    /// every configured venue where it resolves against the catalog.
    #[serde(default = "default_symbols")]
    pub seed_symbols: Vec<String>,

    /// Address the HTTP/WS edge server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Interval between contract-catalog refreshes.
    #[serde(default = "default_catalog_refresh_secs")]
    pub catalog_refresh_secs: u64,

    /// Order-flow alert thresholds.
    #[serde(default)]
    pub alert_thresholds: AlertThresholds,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            seed_symbols: default_symbols(),
            bind_addr: default_bind_addr(),
            catalog_refresh_secs: default_catalog_refresh_secs(),
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;
        info!(path = %path.display(), symbols = ?config.seed_symbols, "runtime config loaded");
        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename) so a crash mid-write can't corrupt it.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;
        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert_eq!(cfg.catalog_refresh_secs, 300);
        assert!((cfg.alert_thresholds.whale_order_quote - 50_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.catalog_refresh_secs, 300);
        assert_eq!(cfg.alert_thresholds.imbalance_ratio, 1.5);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "bind_addr": "127.0.0.1:9000" }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.catalog_refresh_secs, 300);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = RuntimeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.seed_symbols, cfg2.seed_symbols);
        assert_eq!(cfg.bind_addr, cfg2.bind_addr);
    }
}
