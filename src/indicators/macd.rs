// =============================================================================
// Moving Average Convergence / Divergence (MACD)
// =============================================================================
//
//   line      = EMA(close, fast) - EMA(close, slow)
//   signal    = EMA(line, signal_period)
//   histogram = line - signal
//
// Each output is missing wherever one of its operands is missing.

use super::ema::ema;
use super::series::Series;

/// The three MACD series, index-aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: Series,
    pub signal: Series,
    pub histogram: Series,
}

pub fn macd(close: &[Option<f64>], fast: usize, slow: usize, signal_period: usize) -> Macd {
    let ema_fast = ema(close, fast);
    let ema_slow = ema(close, slow);
    let line = difference(&ema_fast, &ema_slow);
    let signal = ema(&line, signal_period);
    let histogram = difference(&line, &signal);

    Macd {
        line,
        signal,
        histogram,
    }
}

fn difference(a: &[Option<f64>], b: &[Option<f64>]) -> Series {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(x - y),
            _ => None,
        })
        .collect()
}
