// =============================================================================
// HTTP API
// =============================================================================
//
// - `rest` — orchestration trigger and read-only engine projections

pub mod rest;
