// =============================================================================
// Signals Module — order-flow signal engine
// =============================================================================

pub mod engine;

pub use engine::{Signal, SignalEngine, SignalResult};
