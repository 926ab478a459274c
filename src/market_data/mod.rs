pub mod backfill;
pub mod candle;
pub mod candle_window;
pub mod kline_stream;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Candle`).
pub use backfill::{seed, Backfill, BackfillOptions, KlineSource};
pub use candle::{Candle, LiveCandle};
pub use candle_window::{CandleWindow, LiveUpdate, DEFAULT_CAPACITY};
pub use kline_stream::{kline_topic, run_kline_feed};

#[cfg(test)]
pub(crate) mod fake;
