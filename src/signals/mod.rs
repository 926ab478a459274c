// =============================================================================
// Signals Module
// =============================================================================
//
// Divergence pipeline on top of the indicator series:
// - Swing detection (local extrema with a half-window)
// - Price / indicator divergence matching
// - Per-interval presets and the combined snapshot

pub mod divergence;
pub mod preset;
pub mod snapshot;
pub mod swing;

pub use divergence::{detect, Divergence, DivergenceParams, DivergenceVerdict};
pub use preset::{DivergencePreset, IndicatorDeltas, IndicatorKind, PresetOverrides, PresetTable};
pub use snapshot::{analyze, DivergenceSnapshot};
pub use swing::{find_swings, SwingSet};
