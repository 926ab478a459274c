// =============================================================================
// Divergence Detector
// =============================================================================
//
// Compares the two most recent qualifying swings of the price series with the
// two most recent qualifying swings of an indicator series.
//
//   bearish  = price higher high  AND indicator lower high
//   bullish  = price lower low    AND indicator higher low
//
// Both additionally require
//   |p_new - p_old| / ((p_new + p_old) / 2) >= min_price_move_pct
//   |i_new - i_old|                          >= min_indicator_delta
//
// The detector knows nothing about which indicator it is looking at; RSI,
// MACD line, histogram and normalised volume all go through `detect` with
// their own thresholds.

use serde::{Deserialize, Serialize};

use super::swing::find_swings;
use crate::indicators::series::present;

/// Thresholds for one `detect` call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergenceParams {
    /// Swing half-window `L`.
    pub swing_window: usize,
    /// Minimum index gap between the two swings of a pair.
    pub min_sep: usize,
    /// Minimum relative price move between the two price swings (0.001 = 0.1 %).
    pub min_price_move_pct: f64,
    /// Minimum absolute indicator change between the two indicator swings.
    pub min_indicator_delta: f64,
}

/// A matched pair of price swings and indicator swings, `(older, newer)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub price_pair: (usize, usize),
    pub indicator_pair: (usize, usize),
}

/// Outcome for one indicator.  Both sides are evaluated independently and
/// may both be present since they use different swing pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DivergenceVerdict {
    pub bullish: Option<Divergence>,
    pub bearish: Option<Divergence>,
}

impl DivergenceVerdict {
    pub fn is_empty(&self) -> bool {
        self.bullish.is_none() && self.bearish.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Bullish,
    Bearish,
}

/// Run divergence detection of `indicator` against `price`.
pub fn detect(
    price: &[Option<f64>],
    indicator: &[Option<f64>],
    params: &DivergenceParams,
) -> DivergenceVerdict {
    let price_swings = find_swings(price, params.swing_window);
    let indicator_swings = find_swings(indicator, params.swing_window);

    DivergenceVerdict {
        bearish: match_pairs(
            Side::Bearish,
            price,
            indicator,
            &price_swings.highs,
            &indicator_swings.highs,
            params,
        ),
        bullish: match_pairs(
            Side::Bullish,
            price,
            indicator,
            &price_swings.lows,
            &indicator_swings.lows,
            params,
        ),
    }
}

/// The last two swing indices, or `None` when there are fewer than two or
/// they are closer than `min_sep`.  Older pairs are never considered.
pub fn last_two_with_sep(indices: &[usize], min_sep: usize) -> Option<(usize, usize)> {
    let [.., older, newer] = indices else {
        return None;
    };
    (newer - older >= min_sep).then_some((*older, *newer))
}

/// Relative move between two prices, measured against their midpoint.
pub fn relative_move(a: f64, b: f64) -> f64 {
    (a - b).abs() / ((a + b) / 2.0)
}

fn match_pairs(
    side: Side,
    price: &[Option<f64>],
    indicator: &[Option<f64>],
    price_idx: &[usize],
    indicator_idx: &[usize],
    params: &DivergenceParams,
) -> Option<Divergence> {
    let (p_old, p_new) = last_two_with_sep(price_idx, params.min_sep)?;
    let (i_old, i_new) = last_two_with_sep(indicator_idx, params.min_sep)?;

    let (pa, pb) = (present(price[p_old])?, present(price[p_new])?);
    let (ia, ib) = (present(indicator[i_old])?, present(indicator[i_new])?);

    let shape = match side {
        Side::Bearish => pb > pa && ib < ia,
        Side::Bullish => pb < pa && ib > ia,
    };
    let moved = relative_move(pa, pb);

    let qualifies = shape
        && moved.is_finite()
        && moved >= params.min_price_move_pct
        && (ia - ib).abs() >= params.min_indicator_delta;

    qualifies.then_some(Divergence {
        price_pair: (p_old, p_new),
        indicator_pair: (i_old, i_new),
    })
}
