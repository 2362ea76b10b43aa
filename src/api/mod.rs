// =============================================================================
// HTTP/WS Edge — ambient surface described in SPEC_FULL.md §6.3
// =============================================================================
//
// Public (no authentication — spec.md's Non-goals explicitly exclude it).
// `rest` carries the catalog/watch-control routes; `ws` carries the single
// `/ws` streaming endpoint mounted from within `rest::router`.
// =============================================================================

pub mod rest;
pub mod ws;
