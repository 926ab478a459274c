// =============================================================================
// Symbol Worker — sole owner of one symbol's CandleWindow
// =============================================================================
//
//   seed (retry with back-off) -> publish -> { live event -> apply -> publish }
//
// Readers never touch the window itself: every mutation is published as a
// fresh `Arc<CandleWindow>` over a watch channel, so a reader sees either the
// state before or after an update.  Once shutdown is observed nothing else is
// published.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::market_data::backfill::{is_cancelled, wait_cancelled};
use crate::market_data::{seed, Backfill, BackfillOptions, CandleWindow, KlineSource, LiveCandle, LiveUpdate};
use crate::types::Interval;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub backfill: BackfillOptions,
    /// Back-off between failed backfills and websocket reconnects.
    pub retry_delay: Duration,
    pub live_buffer: usize,
    pub interval: Interval,
    /// `None` disables the websocket feed; live events then only come from
    /// the registry's `push_live`.
    pub ws_url: Option<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            backfill: BackfillOptions::default(),
            retry_delay: Duration::from_secs(5),
            live_buffer: 256,
            interval: Interval::default(),
            ws_url: None,
        }
    }
}

/// Run the worker for `symbol` until shutdown or until the live channel
/// closes.
pub async fn run_symbol_worker<S>(
    source: Arc<S>,
    symbol: String,
    settings: WorkerSettings,
    mut live_rx: mpsc::Receiver<LiveCandle>,
    publish: watch::Sender<Arc<CandleWindow>>,
    mut shutdown: watch::Receiver<bool>,
) where
    S: KlineSource + Send + Sync + 'static,
{
    let mut attempt = 0u32;
    let mut window = loop {
        attempt += 1;
        match seed(source.as_ref(), &symbol, &settings.backfill, &mut shutdown).await {
            Ok(Backfill::Complete(window)) => break window,
            Ok(Backfill::Cancelled) => {
                info!(symbol = %symbol, "backfill cancelled");
                return;
            }
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    attempt,
                    error = %format!("{e:#}"),
                    retry_in_ms = settings.retry_delay.as_millis() as u64,
                    "backfill failed"
                );
                tokio::select! {
                    biased;
                    _ = wait_cancelled(&mut shutdown) => return,
                    _ = tokio::time::sleep(settings.retry_delay) => {}
                }
            }
        }
    };

    if is_cancelled(&shutdown) {
        return;
    }
    info!(symbol = %symbol, candles = window.len(), "window seeded");
    publish.send_replace(Arc::new(window.clone()));

    loop {
        let event = tokio::select! {
            biased;
            _ = wait_cancelled(&mut shutdown) => break,
            event = live_rx.recv() => event,
        };
        let Some(live) = event else {
            debug!(symbol = %symbol, "live channel closed");
            break;
        };

        let update = window.apply_live(live.candle, live.confirmed);
        match update {
            LiveUpdate::Stale => debug!(
                symbol = %symbol,
                start = live.candle.start_time_ms,
                "stale candle dropped"
            ),
            LiveUpdate::Appended { evicted } => debug!(
                symbol = %symbol,
                start = live.candle.start_time_ms,
                evicted,
                "candle appended"
            ),
            _ => {}
        }

        if update.mutated() {
            if is_cancelled(&shutdown) {
                break;
            }
            publish.send_replace(Arc::new(window.clone()));
        }
    }

    info!(symbol = %symbol, "symbol worker stopped");
}
