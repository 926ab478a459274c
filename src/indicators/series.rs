// =============================================================================
// Series Builder
// =============================================================================
//
// Projects a candle window into parallel numeric arrays.  Every array has the
// same length as the window and index 0 is the oldest candle.  Non-finite
// fields become `None` so that no NaN ever reaches a comparison downstream.

use crate::market_data::Candle;

/// Index-aligned numeric series; `None` marks a missing value (not zero).
pub type Series = Vec<Option<f64>>;

/// `Some(v)` when `v` is finite, `None` otherwise.
#[inline]
pub fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Same as [`finite`] for an already-optional value.
#[inline]
pub fn present(v: Option<f64>) -> Option<f64> {
    v.and_then(finite)
}

/// Close / high / low / volume projections of one window snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub close: Series,
    pub high: Series,
    pub low: Series,
    pub volume: Series,
}

impl PriceSeries {
    /// Single pass over `candles`.
    pub fn from_candles(candles: &[Candle]) -> Self {
        let n = candles.len();
        let mut out = Self {
            close: Vec::with_capacity(n),
            high: Vec::with_capacity(n),
            low: Vec::with_capacity(n),
            volume: Vec::with_capacity(n),
        };
        for c in candles {
            out.close.push(finite(c.close));
            out.high.push(finite(c.high));
            out.low.push(finite(c.low));
            out.volume.push(finite(c.volume));
        }
        out
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}
