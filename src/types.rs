// =============================================================================
// Shared types used across the market-data and signal pipeline
// =============================================================================

use serde::{Deserialize, Serialize};

/// Taker-aggressor side of a trade: the side that removed resting liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// The three supported upstream venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Bingx,
    Blofin,
    Hyperliquid,
}

impl Venue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bingx => "bingx",
            Self::Blofin => "blofin",
            Self::Hyperliquid => "hyperliquid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bingx" => Some(Self::Bingx),
            "blofin" => Some(Self::Blofin),
            "hyperliquid" => Some(Self::Hyperliquid),
            _ => None,
        }
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Composite key identifying a watched instrument: `"venue:symbol"`.
pub fn instrument_key(venue: Venue, symbol: &str) -> String {
    format!("{}:{}", venue.as_str(), symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_parse_roundtrip() {
        assert_eq!(Venue::parse("bingx"), Some(Venue::Bingx));
        assert_eq!(Venue::parse("BloFin"), Some(Venue::Blofin));
        assert_eq!(Venue::parse("hyperliquid"), Some(Venue::Hyperliquid));
        assert_eq!(Venue::parse("unknown"), None);
    }

    #[test]
    fn instrument_key_format() {
        assert_eq!(instrument_key(Venue::Bingx, "WIF-USDT"), "bingx:WIF-USDT");
    }
}
