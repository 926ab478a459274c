// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1: Price changes (deltas) from consecutive closes.
// Step 2: Seed average gain / average loss with the mean of the first
//          `period` gains / losses (losses stored as positive magnitudes).
// Step 3: Wilder's smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4: RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS), and RSI = 100 whenever avg_loss == 0.
//
// Levels:  RSI >= 75 => OVERBOUGHT,  RSI <= 25 => OVERSOLD.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::series::{present, Series};

pub const RSI_OVERBOUGHT: f64 = 75.0;
pub const RSI_OVERSOLD: f64 = 25.0;

/// Coarse classification of the latest RSI reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsiLevel {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiLevel {
    pub fn classify(rsi: f64) -> Self {
        if rsi >= RSI_OVERBOUGHT {
            Self::Overbought
        } else if rsi <= RSI_OVERSOLD {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }
}

/// Compute the full Wilder RSI series for `close` and `period`.
///
/// The output is index-aligned with `close`; the first value sits at index
/// `period`, so exactly `period` leading entries are `None`.
///
/// # Edge cases
/// - `period == 0` or `close.len() <= period` => all `None`
/// - a delta touching a missing close counts as neither gain nor loss
pub fn rsi_wilder(close: &[Option<f64>], period: usize) -> Series {
    let n = close.len();
    let mut out = vec![None; n];
    if period == 0 || period >= n {
        return out;
    }

    let delta = |i: usize| match (present(close[i - 1]), present(close[i])) {
        (Some(prev), Some(cur)) => cur - prev,
        _ => 0.0,
    };

    // --- Seed averages with the mean of the first `period` deltas -----------
    let (sum_gain, sum_loss) = (1..=period).fold((0.0_f64, 0.0_f64), |(g, l), i| {
        let d = delta(i);
        if d >= 0.0 {
            (g + d, l)
        } else {
            (g, l - d)
        }
    });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    // --- Wilder's smoothing for subsequent values ----------------------------
    for (i, slot) in out.iter_mut().enumerate().skip(period + 1) {
        let d = delta(i);
        let gain = if d > 0.0 { d } else { 0.0 };
        let loss = if d < 0.0 { -d } else { 0.0 };

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
        *slot = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

/// Most recent RSI value together with its level.
///
/// Returns `None` when there is not enough history yet.
pub fn latest_rsi(close: &[Option<f64>], period: usize) -> Option<(f64, RsiLevel)> {
    let value = rsi_wilder(close, period).last().copied().flatten()?;
    Some((value, RsiLevel::classify(value)))
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
