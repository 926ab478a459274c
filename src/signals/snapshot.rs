// =============================================================================
// Divergence Snapshot — every indicator family against one candle window
// =============================================================================

use serde::Serialize;

use super::divergence::{detect, DivergenceVerdict};
use super::preset::{DivergencePreset, IndicatorKind};
use crate::indicators::{macd, normalize_volume, rsi_wilder, PriceSeries, RsiLevel};
use crate::market_data::Candle;

/// Divergence verdicts for all four families plus the current RSI state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceSnapshot {
    pub rsi: DivergenceVerdict,
    pub macd_line: DivergenceVerdict,
    pub histogram: DivergenceVerdict,
    pub volume: DivergenceVerdict,
    pub latest_rsi: Option<f64>,
    pub rsi_level: RsiLevel,
    /// Number of candles the snapshot was computed from.
    pub candles: usize,
    pub last_start_ms: Option<i64>,
}

impl DivergenceSnapshot {
    /// True when no family reported a divergence on either side.
    pub fn is_quiet(&self) -> bool {
        [&self.rsi, &self.macd_line, &self.histogram, &self.volume]
            .iter()
            .all(|v| v.is_empty())
    }
}

/// Compute a snapshot from an oldest-first candle slice.
///
/// Pure: the same candles and preset always give the same snapshot.  Price
/// swings come from the close series.
pub fn analyze(candles: &[Candle], preset: &DivergencePreset) -> DivergenceSnapshot {
    let series = PriceSeries::from_candles(candles);
    let price = &series.close;

    let rsi = rsi_wilder(price, preset.rsi_period);
    let m = macd(price, preset.macd_fast, preset.macd_slow, preset.macd_signal);
    let volume = if preset.normalize_volume {
        normalize_volume(&series.volume, preset.volume_ema_period)
    } else {
        series.volume.clone()
    };

    let latest = rsi.last().copied().flatten();

    DivergenceSnapshot {
        rsi: detect(price, &rsi, &preset.params_for(IndicatorKind::Rsi)),
        macd_line: detect(price, &m.line, &preset.params_for(IndicatorKind::MacdLine)),
        histogram: detect(price, &m.histogram, &preset.params_for(IndicatorKind::Histogram)),
        volume: detect(price, &volume, &preset.params_for(IndicatorKind::Volume)),
        latest_rsi: latest,
        rsi_level: latest.map_or(RsiLevel::Neutral, RsiLevel::classify),
        candles: candles.len(),
        last_start_ms: candles.last().map(|c| c.start_time_ms),
    }
}
