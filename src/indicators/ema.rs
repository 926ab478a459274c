// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first EMA value is seeded with the simple average of the first `period`
// present values.  The output is index-aligned with the input: positions
// before the seed are `None`, and a missing input carries the previous output
// forward instead of being dropped.
// =============================================================================

use super::series::{present, Series};

/// Compute the EMA series for `series` and look-back `period`.
///
/// The output always has the input's length.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - missing / non-finite input at `i` => `out[i] = out[i - 1]` and the value
///   is not counted towards the seed
/// - with no missing inputs exactly `period - 1` leading values are `None`
pub fn ema(series: &[Option<f64>], period: usize) -> Series {
    let mut out = Vec::with_capacity(series.len());
    if period == 0 {
        out.resize(series.len(), None);
        return out;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut prev: Option<f64> = None;
    let mut seed_sum = 0.0;
    let mut seen = 0usize;

    for &raw in series {
        let Some(value) = present(raw) else {
            out.push(prev);
            continue;
        };

        if seen < period {
            seed_sum += value;
            seen += 1;
            if seen == period {
                prev = Some(seed_sum / period as f64);
            }
        } else if let Some(p) = prev {
            prev = Some(value * multiplier + p * (1.0 - multiplier));
        }
        out.push(prev);
    }

    out
}
