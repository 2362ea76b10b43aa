// =============================================================================
// Error Taxonomy
// =============================================================================
//
// Maps the fault categories an adapter or watcher can hit onto a single
// typed enum. `TransientNetwork` and `ProtocolParse` are recoverable and
// never propagate past the task boundary that detects them — they are
// logged and handled locally (retry, or drop-and-continue). The remaining
// variants are surfaced to callers (registry, REST handlers) as structured
// errors.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("connection to {venue} lost: {reason}")]
    ConnectionLost { venue: String, reason: String },

    /// A single malformed message. Never propagated — adapters count these
    /// and keep reading; kept here only so call sites that want to log or
    /// test the classification have a concrete type to match on.
    #[error("failed to parse {venue} message: {reason}")]
    ProtocolParse { venue: String, reason: String },

    #[error("{venue} rejected subscription: {reason}")]
    SubscribeRejected { venue: String, reason: String },

    #[error("failed to refresh catalog for {venue}: {reason}")]
    CatalogFetchFailed { venue: String, reason: String },

    #[error("unknown instrument {venue}:{symbol}")]
    WatchUnknownInstrument { venue: String, symbol: String },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
