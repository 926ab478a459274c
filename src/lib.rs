// =============================================================================
// Divergence Scanner — library root
// =============================================================================

pub mod api;
pub mod app_state;
pub mod bybit;
pub mod config;
pub mod indicators;
pub mod market_data;
pub mod signals;
pub mod types;
pub mod worker;
