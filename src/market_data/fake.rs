//! In-memory `KlineSource` for async tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use super::backfill::KlineSource;
use super::candle::Candle;

pub const MINUTE: i64 = 60_000;

pub fn candle(i: i64, close: f64) -> Candle {
    Candle {
        start_time_ms: i * MINUTE,
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 10.0,
        turnover: 10.0 * close,
    }
}

/// Serves minute candles `0..n`; fails the first `failures` requests.
pub struct HistorySource {
    candles: Vec<Candle>,
    failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl HistorySource {
    pub fn new(n: i64) -> Self {
        Self::failing(n, 0)
    }

    pub fn failing(n: i64, failures: usize) -> Self {
        Self {
            candles: (0..n).map(|i| candle(i, 100.0 + i as f64)).collect(),
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }
}

impl KlineSource for HistorySource {
    async fn fetch_page(&self, _symbol: &str, end_ms: Option<i64>, limit: usize) -> Result<Vec<Candle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| f.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("source unavailable");
        }

        let eligible: Vec<Candle> = self
            .candles
            .iter()
            .filter(|c| end_ms.map_or(true, |e| c.start_time_ms <= e))
            .copied()
            .collect();
        let skip = eligible.len().saturating_sub(limit);
        Ok(eligible[skip..].to_vec())
    }
}
