// =============================================================================
// Contract Discovery — polls each venue's catalog REST endpoint in parallel
// =============================================================================
//
// `ContractCatalog` is mutated only by the periodic refresh task, read by
// anyone. The writer builds a whole new map per refresh and swaps it in under
// a single write-lock acquisition (spec §5: "the writer swaps the map
// atomically"). Per-venue partial failure is isolated — a venue whose fetch
// errors keeps its previous entries, venues that succeed fully replace their
// own (spec §9 Open Question, resolved toward the more robust alternative).
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::Venue;

const BINGX_CONTRACTS_URL: &str = "https://open-api.bingx.com/openApi/swap/v2/quote/contracts";
const BLOFIN_CONTRACTS_URL: &str = "https://openapi.blofin.com/api/v1/market/instruments?instType=SWAP";
const HYPERLIQUID_INFO_URL: &str = "https://api.hyperliquid.xyz/info";

/// One tradable perpetual contract as reported by a venue's catalog endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractMeta {
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub venue: Venue,
    /// Milliseconds since epoch. Venues that don't expose a listing time get
    /// a synthetic `now - 3 days - i*1s` so a stable ordering still exists
    /// (spec §6.2).
    pub listing_ts: i64,
    pub max_leverage: u32,
    pub min_size: f64,
    pub enabled: bool,
}

fn instrument_key(venue: Venue, symbol: &str) -> String {
    format!("{}:{}", venue.as_str(), symbol)
}

/// Shared, read-mostly mapping `"venue:symbol" -> ContractMeta`.
#[derive(Default)]
pub struct ContractCatalog {
    contracts: RwLock<HashMap<String, ContractMeta>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSort {
    ListTime,
    Symbol,
    Leverage,
}

impl CatalogSort {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "symbol" => Self::Symbol,
            "leverage" => Self::Leverage,
            _ => Self::ListTime,
        }
    }
}

impl ContractCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_all(&self, sort: CatalogSort, venue_filter: Option<Venue>) -> Vec<ContractMeta> {
        let mut contracts: Vec<ContractMeta> = self
            .contracts
            .read()
            .values()
            .filter(|c| match venue_filter {
                Some(v) => c.venue == v,
                None => true,
            })
            .cloned()
            .collect();

        match sort {
            CatalogSort::ListTime => contracts.sort_by(|a, b| b.listing_ts.cmp(&a.listing_ts)),
            CatalogSort::Symbol => contracts.sort_by(|a, b| a.symbol.cmp(&b.symbol)),
            CatalogSort::Leverage => contracts.sort_by(|a, b| b.max_leverage.cmp(&a.max_leverage)),
        }

        contracts
    }

    pub fn get_new_listings(&self, days: i64) -> Vec<ContractMeta> {
        let cutoff_ms = Utc::now().timestamp_millis() - days * 24 * 60 * 60 * 1000;
        let mut contracts: Vec<ContractMeta> = self
            .contracts
            .read()
            .values()
            .filter(|c| c.listing_ts > cutoff_ms)
            .cloned()
            .collect();
        contracts.sort_by(|a, b| b.listing_ts.cmp(&a.listing_ts));
        contracts
    }

    pub fn search(&self, query: &str) -> Vec<ContractMeta> {
        let query = query.to_uppercase();
        let mut contracts: Vec<ContractMeta> = self
            .contracts
            .read()
            .values()
            .filter(|c| {
                c.symbol.to_uppercase().contains(&query) || c.base.to_uppercase().contains(&query)
            })
            .cloned()
            .collect();
        contracts.sort_by(|a, b| b.listing_ts.cmp(&a.listing_ts));
        contracts
    }

    pub fn get(&self, venue: Venue, symbol: &str) -> Option<ContractMeta> {
        self.contracts.read().get(&instrument_key(venue, symbol)).cloned()
    }

    pub fn contains(&self, venue: Venue, symbol: &str) -> bool {
        self.contracts.read().contains_key(&instrument_key(venue, symbol))
    }

    pub fn len(&self) -> usize {
        self.contracts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetches a single venue's contract list and reports success/failure
/// without letting one venue's error affect another's.
async fn fetch_bingx(client: &reqwest::Client) -> anyhow::Result<Vec<ContractMeta>> {
    let body: serde_json::Value = client.get(BINGX_CONTRACTS_URL).send().await?.json().await?;
    let mut out = Vec::new();
    for c in body.get("data").and_then(|v| v.as_array()).into_iter().flatten() {
        let enabled = c.get("apiStateOpen").and_then(|v| v.as_str()) == Some("true");
        if !enabled {
            continue;
        }
        let symbol = match c.get("symbol").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => continue,
        };
        let base = c
            .get("asset")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| symbol.split('-').next().unwrap_or(&symbol).to_string());
        let quote = c
            .get("currency")
            .and_then(|v| v.as_str())
            .unwrap_or("USDT")
            .to_string();
        let listing_ts = c
            .get("launchTime")
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_i64()))
            .unwrap_or(0);
        let min_size = c
            .get("tradeMinQuantity")
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_f64()))
            .unwrap_or(0.0);

        out.push(ContractMeta {
            symbol,
            base,
            quote,
            venue: Venue::Bingx,
            listing_ts,
            max_leverage: 100,
            min_size,
            enabled: true,
        });
    }
    Ok(out)
}

async fn fetch_blofin(client: &reqwest::Client) -> anyhow::Result<Vec<ContractMeta>> {
    let body: serde_json::Value = client.get(BLOFIN_CONTRACTS_URL).send().await?.json().await?;
    let mut out = Vec::new();
    for c in body.get("data").and_then(|v| v.as_array()).into_iter().flatten() {
        if c.get("state").and_then(|v| v.as_str()) != Some("live") {
            continue;
        }
        let symbol = match c.get("instId").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => continue,
        };
        let base = c
            .get("baseCurrency")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| symbol.split('-').next().unwrap_or(&symbol).to_string());
        let quote = c
            .get("quoteCurrency")
            .and_then(|v| v.as_str())
            .unwrap_or("USDT")
            .to_string();
        let listing_ts = c
            .get("listTime")
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_i64()))
            .unwrap_or(0);
        let max_leverage = c
            .get("maxLeverage")
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_u64()))
            .unwrap_or(0);
        let min_size = c
            .get("minSize")
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_f64()))
            .unwrap_or(0.0);

        out.push(ContractMeta {
            symbol,
            base,
            quote,
            venue: Venue::Blofin,
            listing_ts,
            max_leverage: max_leverage as u32,
            min_size,
            enabled: true,
        });
    }
    Ok(out)
}

async fn fetch_hyperliquid(client: &reqwest::Client) -> anyhow::Result<Vec<ContractMeta>> {
    let body: serde_json::Value = client
        .post(HYPERLIQUID_INFO_URL)
        .json(&serde_json::json!({ "type": "meta" }))
        .send()
        .await?
        .json()
        .await?;

    let universe = body.get("universe").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    // Hyperliquid exposes no listing timestamp; synthesize a stable ordering
    // by staggering from "3 days ago" (spec §6.2).
    let base_time = Utc::now().timestamp_millis() - 3 * 24 * 60 * 60 * 1000;

    let mut out = Vec::with_capacity(universe.len());
    for (i, m) in universe.iter().enumerate() {
        let name = match m.get("name").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => continue,
        };
        let max_leverage = m.get("maxLeverage").and_then(|v| v.as_u64()).unwrap_or(50);
        let min_size = m.get("szDecimals").and_then(|v| v.as_f64()).unwrap_or(0.0);

        out.push(ContractMeta {
            symbol: name.clone(),
            base: name,
            quote: "USD".to_string(),
            venue: Venue::Hyperliquid,
            listing_ts: base_time - (i as i64) * 1000,
            max_leverage: max_leverage as u32,
            min_size,
            enabled: true,
        });
    }
    Ok(out)
}

/// Polls all three venues in parallel and merges results into `catalog`.
/// A venue that errors keeps its previous entries; venues that succeed
/// fully replace their own.
pub async fn refresh(catalog: &Arc<ContractCatalog>, client: &reqwest::Client) {
    let (bingx, blofin, hyperliquid) =
        tokio::join!(fetch_bingx(client), fetch_blofin(client), fetch_hyperliquid(client));

    let mut next: HashMap<String, ContractMeta> = {
        let current = catalog.contracts.read();
        current.clone()
    };

    for (venue, result) in [
        (Venue::Bingx, bingx),
        (Venue::Blofin, blofin),
        (Venue::Hyperliquid, hyperliquid),
    ] {
        match result {
            Ok(contracts) => {
                next.retain(|_, c| c.venue != venue);
                let count = contracts.len();
                for c in contracts {
                    next.insert(instrument_key(venue, &c.symbol), c);
                }
                info!(venue = %venue, count, "catalog refreshed");
            }
            Err(e) => {
                warn!(venue = %venue, error = %e, "catalog fetch failed, retaining previous snapshot");
            }
        }
    }

    let total = next.len();
    *catalog.contracts.write() = next;
    info!(total, "catalog refresh complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(venue: Venue, symbol: &str, listing_ts: i64) -> ContractMeta {
        ContractMeta {
            symbol: symbol.to_string(),
            base: symbol.split('-').next().unwrap_or(symbol).to_string(),
            quote: "USDT".to_string(),
            venue,
            listing_ts,
            max_leverage: 50,
            min_size: 1.0,
            enabled: true,
        }
    }

    #[test]
    fn get_all_filters_by_venue() {
        let catalog = ContractCatalog::new();
        {
            let mut map = catalog.contracts.write();
            map.insert(instrument_key(Venue::Bingx, "WIF-USDT"), sample(Venue::Bingx, "WIF-USDT", 100));
            map.insert(instrument_key(Venue::Blofin, "WIF-USDT"), sample(Venue::Blofin, "WIF-USDT", 200));
        }
        let bingx_only = catalog.get_all(CatalogSort::ListTime, Some(Venue::Bingx));
        assert_eq!(bingx_only.len(), 1);
        assert_eq!(bingx_only[0].venue, Venue::Bingx);
    }

    #[test]
    fn get_all_sorts_by_list_time_descending() {
        let catalog = ContractCatalog::new();
        {
            let mut map = catalog.contracts.write();
            map.insert(instrument_key(Venue::Bingx, "OLD-USDT"), sample(Venue::Bingx, "OLD-USDT", 100));
            map.insert(instrument_key(Venue::Bingx, "NEW-USDT"), sample(Venue::Bingx, "NEW-USDT", 500));
        }
        let all = catalog.get_all(CatalogSort::ListTime, None);
        assert_eq!(all[0].symbol, "NEW-USDT");
    }

    #[test]
    fn search_matches_symbol_or_base_case_insensitively() {
        let catalog = ContractCatalog::new();
        {
            let mut map = catalog.contracts.write();
            map.insert(instrument_key(Venue::Bingx, "WIF-USDT"), sample(Venue::Bingx, "WIF-USDT", 100));
        }
        assert_eq!(catalog.search("wif").len(), 1);
        assert_eq!(catalog.search("nope").len(), 0);
    }

    #[test]
    fn get_new_listings_respects_window() {
        let catalog = ContractCatalog::new();
        let now = Utc::now().timestamp_millis();
        {
            let mut map = catalog.contracts.write();
            map.insert(
                instrument_key(Venue::Bingx, "FRESH-USDT"),
                sample(Venue::Bingx, "FRESH-USDT", now - 60_000),
            );
            map.insert(
                instrument_key(Venue::Bingx, "STALE-USDT"),
                sample(Venue::Bingx, "STALE-USDT", now - 30 * 24 * 60 * 60 * 1000),
            );
        }
        let recent = catalog.get_new_listings(7);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].symbol, "FRESH-USDT");
    }

    #[test]
    fn contains_reflects_inserted_contract() {
        let catalog = ContractCatalog::new();
        assert!(!catalog.contains(Venue::Bingx, "WIF-USDT"));
        catalog
            .contracts
            .write()
            .insert(instrument_key(Venue::Bingx, "WIF-USDT"), sample(Venue::Bingx, "WIF-USDT", 1));
        assert!(catalog.contains(Venue::Bingx, "WIF-USDT"));
    }
}
