// =============================================================================
// EMA-normalised volume
// =============================================================================
//
//   ratio_t = volume_t / EMA(volume, period)_t
//
// During warm-up the EMA is missing, and a zero EMA would blow up the ratio.
// Both cases are defined as a ratio of exactly 1.0 so that the warm-up region
// cannot produce spurious extreme swings.

use super::ema::ema;
use super::series::{present, PriceSeries, Series};
use crate::market_data::Candle;

/// Default EMA period used to normalise volume.
pub const DEFAULT_VOLUME_EMA_PERIOD: usize = 20;

/// Normalise an already-projected volume series.
///
/// A missing volume stays missing; a missing or zero EMA yields `Some(1.0)`.
pub fn normalize_volume(volume: &[Option<f64>], period: usize) -> Series {
    let baseline = ema(volume, period);
    volume
        .iter()
        .zip(baseline)
        .map(|(&v, e)| {
            let v = present(v)?;
            match e {
                Some(e) if e != 0.0 => present(Some(v / e)),
                _ => Some(1.0),
            }
        })
        .collect()
}

/// `volume / EMA(volume, period)` for a candle window.
pub fn normalize_volume_by_ema(candles: &[Candle], period: usize) -> Series {
    normalize_volume(&PriceSeries::from_candles(candles).volume, period)
}
