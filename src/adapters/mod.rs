// =============================================================================
// Exchange Adapters — one WebSocket client per venue, one normalized event enum
// =============================================================================
//
// Each venue module owns its wire format entirely; nothing outside an adapter
// ever sees a BingX/BloFin/Hyperliquid-shaped message. A `Watcher` drives an
// adapter through `connect` → `subscribe` → repeated `next_event` → `close`,
// treating a `None`/`Err` from `next_event` as "the task ended" and handling
// reconnection itself (spec.md §4.4/§5).
// =============================================================================

pub mod bingx;
pub mod blofin;
pub mod hyperliquid;

use chrono::{DateTime, Utc};

use crate::market_data::book::BookSnapshot;
use crate::market_data::trade::Trade;

/// A single update normalized from any venue's wire format.
#[derive(Debug, Clone)]
pub enum NormalizedEvent {
    Book(BookSnapshot),
    Trade(Trade),
    /// A message that didn't parse as book or trade data. Counted by the
    /// watcher, never surfaced as a fatal error (spec.md §7).
    Unparseable { reason: String },
}

/// Shared per-connection lifecycle every venue adapter implements. Adapters
/// borrow `&mut self` across calls since each owns exactly one live socket.
#[async_trait::async_trait]
pub trait Adapter: Send {
    /// Open the socket and complete any venue-specific handshake.
    async fn connect(&mut self) -> anyhow::Result<()>;

    /// Send the subscription request(s) for this adapter's single instrument.
    async fn subscribe(&mut self) -> anyhow::Result<()>;

    /// Block until the next normalized event, or `Ok(None)` when the
    /// connection ended cleanly (watcher reconnects), or `Err` on a
    /// transport-level failure.
    async fn next_event(&mut self) -> anyhow::Result<Option<NormalizedEvent>>;

    async fn close(&mut self);
}

/// Common helper: the current time, used by adapters when a venue doesn't
/// stamp a message with its own timestamp (e.g. BloFin trade ids lacking a
/// send time) so every `Trade`/`BookSnapshot` still carries one.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}
