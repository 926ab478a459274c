// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator functions.  Every series is index-aligned
// with the candle window it was derived from and uses `None` for values that
// are not defined yet (warm-up) or were not finite in the input.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod series;
pub mod volume;

pub use ema::ema;
pub use macd::{macd, Macd};
pub use rsi::{latest_rsi, rsi_wilder, RsiLevel};
pub use series::{PriceSeries, Series};
pub use volume::{normalize_volume, normalize_volume_by_ema};
