// =============================================================================
// Paged backfill — seeds a CandleWindow by walking backwards in time
// =============================================================================
//
//   page 1: newest `limit` candles (no cursor)
//   page k: candles ending at cursor = earliest start of page k-1 minus 1 ms
//
// The walk stops once `capacity` candles were collected, a page comes back
// empty, or a page fails to move the cursor backwards.  Cancellation at any
// await point discards everything collected so far.
// =============================================================================

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::candle::Candle;
use super::candle_window::{CandleWindow, DEFAULT_CAPACITY};

/// Historical kline provider.
pub trait KlineSource {
    /// Up to `limit` candles with start time `<= end_ms` (or the most recent
    /// ones when `end_ms` is `None`), in ascending order.  The newest candle
    /// may still be open.
    fn fetch_page(
        &self,
        symbol: &str,
        end_ms: Option<i64>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;
}

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    /// Number of candles to collect, and the capacity of the seeded window.
    pub capacity: usize,
    pub page_size: usize,
    /// Pause between two page requests.
    pub page_delay: Duration,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            page_size: 200,
            page_delay: Duration::from_millis(80),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Backfill {
    Complete(CandleWindow),
    Cancelled,
}

/// Seed a window for `symbol` from `source`.
///
/// `cancel` flipping to `true`, or its sender being dropped, aborts the walk
/// with [`Backfill::Cancelled`].  Source errors are returned with context.
pub async fn seed<S>(
    source: &S,
    symbol: &str,
    opts: &BackfillOptions,
    cancel: &mut watch::Receiver<bool>,
) -> Result<Backfill>
where
    S: KlineSource + ?Sized,
{
    let target = opts.capacity.max(1);
    let page_size = opts.page_size.max(1);

    let mut collected: Vec<Candle> = Vec::with_capacity(target);
    let mut cursor: Option<i64> = None;
    let mut pages = 0usize;

    while collected.len() < target {
        if is_cancelled(cancel) {
            return Ok(Backfill::Cancelled);
        }

        if pages > 0 && !opts.page_delay.is_zero() {
            tokio::select! {
                biased;
                _ = wait_cancelled(cancel) => return Ok(Backfill::Cancelled),
                _ = tokio::time::sleep(opts.page_delay) => {}
            }
        }

        let limit = page_size.min(target - collected.len());
        let page = tokio::select! {
            biased;
            _ = wait_cancelled(cancel) => return Ok(Backfill::Cancelled),
            page = source.fetch_page(symbol, cursor, limit) => page
                .with_context(|| format!("backfill page {} for {symbol} failed", pages + 1))?,
        };
        pages += 1;

        let Some(earliest) = page.iter().map(|c| c.start_time_ms).min() else {
            debug!(symbol = %symbol, pages, "history exhausted");
            break;
        };
        debug!(symbol = %symbol, page = pages, count = page.len(), earliest, "backfill page");
        collected.extend(page);

        let next = earliest - 1;
        if cursor.is_some_and(|prev| next >= prev) {
            warn!(
                symbol = %symbol,
                cursor = next,
                "backfill cursor did not move backwards -- stopping"
            );
            break;
        }
        cursor = Some(next);
    }

    let window = CandleWindow::from_candles(collected, target);
    info!(symbol = %symbol, pages, candles = window.len(), "backfill complete");
    Ok(Backfill::Complete(window))
}

/// Resolves once `rx` reads `true` or its sender is gone.
pub(crate) async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}

pub(crate) fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow() || rx.has_changed().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    const MINUTE: i64 = 60_000;

    fn candle(i: i64) -> Candle {
        Candle {
            start_time_ms: i * MINUTE,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: i as f64,
            volume: 1.0,
            turnover: 1.0,
        }
    }

    #[derive(Default)]
    struct FakeSource {
        candles: Vec<Candle>,
        ignore_cursor: bool,
        fail: bool,
        /// Flip this sender to `true` on the given call and never resolve.
        cancel_on_call: Option<(usize, watch::Sender<bool>)>,
        calls: Mutex<Vec<(Option<i64>, usize)>>,
    }

    impl FakeSource {
        fn with_history(n: i64) -> Self {
            Self {
                candles: (0..n).map(candle).collect(),
                ..Default::default()
            }
        }

        fn limits(&self) -> Vec<usize> {
            self.calls.lock().iter().map(|&(_, l)| l).collect()
        }
    }

    impl KlineSource for FakeSource {
        async fn fetch_page(&self, _symbol: &str, end_ms: Option<i64>, limit: usize) -> Result<Vec<Candle>> {
            let call = {
                let mut calls = self.calls.lock();
                calls.push((end_ms, limit));
                calls.len()
            };

            if self.fail {
                anyhow::bail!("boom");
            }
            if let Some((on, tx)) = &self.cancel_on_call {
                if *on == call {
                    let _ = tx.send(true);
                    std::future::pending::<()>().await;
                }
            }

            let end = if self.ignore_cursor { None } else { end_ms };
            let eligible: Vec<Candle> = self
                .candles
                .iter()
                .filter(|c| end.map_or(true, |e| c.start_time_ms <= e))
                .copied()
                .collect();
            let skip = eligible.len().saturating_sub(limit);
            Ok(eligible[skip..].to_vec())
        }
    }

    fn opts() -> BackfillOptions {
        BackfillOptions {
            capacity: 500,
            page_size: 200,
            page_delay: Duration::ZERO,
        }
    }

    fn complete(b: Backfill) -> CandleWindow {
        match b {
            Backfill::Complete(w) => w,
            Backfill::Cancelled => panic!("expected a completed backfill"),
        }
    }

    #[tokio::test]
    async fn pages_until_capacity() {
        let source = FakeSource::with_history(1000);
        let (_tx, mut rx) = watch::channel(false);
        let w = complete(seed(&source, "BTCUSDT", &opts(), &mut rx).await.unwrap());

        assert_eq!(source.limits(), vec![200, 200, 100]);
        assert_eq!(w.len(), 500);
        assert_eq!(w.iter().next().map(|c| c.start_time_ms), Some(500 * MINUTE));
        assert_eq!(w.last().map(|c| c.start_time_ms), Some(999 * MINUTE));

        let cursors: Vec<Option<i64>> = source.calls.lock().iter().map(|&(c, _)| c).collect();
        assert_eq!(cursors, vec![None, Some(800 * MINUTE - 1), Some(600 * MINUTE - 1)]);
    }

    #[tokio::test]
    async fn stops_when_history_is_exhausted() {
        let source = FakeSource::with_history(120);
        let (_tx, mut rx) = watch::channel(false);
        let w = complete(seed(&source, "BTCUSDT", &opts(), &mut rx).await.unwrap());
        assert_eq!(w.len(), 120);
        assert_eq!(source.limits(), vec![200, 200]);
    }

    #[tokio::test]
    async fn stops_when_cursor_is_ignored() {
        let source = FakeSource {
            ignore_cursor: true,
            ..FakeSource::with_history(50)
        };
        let (_tx, mut rx) = watch::channel(false);
        let w = complete(seed(&source, "BTCUSDT", &opts(), &mut rx).await.unwrap());
        assert_eq!(w.len(), 50);
        assert_eq!(source.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_before_first_page() {
        let source = FakeSource::with_history(1000);
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        let out = seed(&source, "BTCUSDT", &opts(), &mut rx).await.unwrap();
        assert_eq!(out, Backfill::Cancelled);
        assert!(source.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn cancelled_during_fetch() {
        let (tx, mut rx) = watch::channel(false);
        let source = FakeSource {
            cancel_on_call: Some((2, tx)),
            ..FakeSource::with_history(1000)
        };
        let out = seed(&source, "BTCUSDT", &opts(), &mut rx).await.unwrap();
        assert_eq!(out, Backfill::Cancelled);
        assert_eq!(source.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn dropped_sender_cancels() {
        let source = FakeSource::with_history(1000);
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let out = seed(&source, "BTCUSDT", &opts(), &mut rx).await.unwrap();
        assert_eq!(out, Backfill::Cancelled);
    }

    #[tokio::test]
    async fn source_error_propagates() {
        let source = FakeSource {
            fail: true,
            ..FakeSource::with_history(10)
        };
        let (_tx, mut rx) = watch::channel(false);
        let err = seed(&source, "BTCUSDT", &opts(), &mut rx).await.unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
    }
}
