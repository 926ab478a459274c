// =============================================================================
// Central Application State — symbol registry of the divergence scanner
// =============================================================================
//
// One entry per watched symbol.  Each entry owns the channels of a dedicated
// worker task (and, when a websocket URL is configured, a live feed task).
// Readers only ever clone the latest published `Arc<CandleWindow>`; symbols
// share nothing with each other.
//
// Thread safety:
//   - parking_lot::RwLock for the registry map; never held across `.await`.
//   - tokio watch / mpsc channels between the registry and the workers.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::bybit::RateLimitTracker;
use crate::market_data::{run_kline_feed, CandleWindow, KlineSource, LiveCandle};
use crate::signals::{analyze, DivergencePreset, DivergenceSnapshot, PresetOverrides, PresetTable};
use crate::types::Interval;
use crate::worker::{run_symbol_worker, WorkerSettings};

// =============================================================================
// Symbol Handle
// =============================================================================

struct SymbolHandle {
    window_rx: watch::Receiver<Arc<CandleWindow>>,
    live_tx: mpsc::Sender<LiveCandle>,
    shutdown_tx: watch::Sender<bool>,
}

impl Drop for SymbolHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Registry listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub candles: usize,
    pub last_start_ms: Option<i64>,
}

// =============================================================================
// AppState
// =============================================================================

/// Shared across all HTTP handlers via `Arc<AppState<S>>`.
pub struct AppState<S> {
    source: Arc<S>,
    settings: WorkerSettings,
    presets: PresetTable,
    rate_limits: Option<Arc<RateLimitTracker>>,
    symbols: RwLock<HashMap<String, SymbolHandle>>,
    /// Instant when the scanner was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl<S> AppState<S>
where
    S: KlineSource + Send + Sync + 'static,
{
    pub fn new(source: Arc<S>, settings: WorkerSettings, presets: PresetTable) -> Self {
        Self {
            source,
            settings,
            presets,
            rate_limits: None,
            symbols: RwLock::new(HashMap::new()),
            start_time: std::time::Instant::now(),
        }
    }

    /// Expose a transport rate-limit tracker through the health endpoint.
    pub fn with_rate_limits(mut self, tracker: Arc<RateLimitTracker>) -> Self {
        self.rate_limits = Some(tracker);
        self
    }

    pub fn interval(&self) -> Interval {
        self.settings.interval
    }

    pub fn rate_limits(&self) -> Option<&Arc<RateLimitTracker>> {
        self.rate_limits.as_ref()
    }

    // ── Registry ────────────────────────────────────────────────────────

    /// Start watching `symbol`.  Returns `false` when it is already watched.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch(&self, symbol: &str) -> bool {
        let symbol = normalize(symbol);
        let mut symbols = self.symbols.write();
        if symbols.contains_key(&symbol) {
            return false;
        }

        let capacity = self.settings.backfill.capacity;
        let (publish, window_rx) = watch::channel(Arc::new(CandleWindow::new(capacity)));
        let (live_tx, live_rx) = mpsc::channel(self.settings.live_buffer.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(run_symbol_worker(
            Arc::clone(&self.source),
            symbol.clone(),
            self.settings.clone(),
            live_rx,
            publish,
            shutdown_rx.clone(),
        ));

        if let Some(ws_url) = &self.settings.ws_url {
            tokio::spawn(run_kline_feed(
                ws_url.clone(),
                symbol.clone(),
                self.settings.interval,
                live_tx.clone(),
                self.settings.retry_delay,
                shutdown_rx,
            ));
        }

        info!(symbol = %symbol, interval = %self.settings.interval, "watching symbol");
        symbols.insert(
            symbol,
            SymbolHandle {
                window_rx,
                live_tx,
                shutdown_tx,
            },
        );
        true
    }

    /// Stop watching `symbol`; its tasks observe the shutdown signal.
    pub fn unwatch(&self, symbol: &str) -> bool {
        let symbol = normalize(symbol);
        let removed = self.symbols.write().remove(&symbol).is_some();
        if removed {
            info!(symbol = %symbol, "stopped watching symbol");
        }
        removed
    }

    pub fn symbols(&self) -> Vec<SymbolSummary> {
        let symbols = self.symbols.read();
        let mut out: Vec<SymbolSummary> = symbols
            .iter()
            .map(|(symbol, handle)| {
                let window = handle.window_rx.borrow();
                SymbolSummary {
                    symbol: symbol.clone(),
                    candles: window.len(),
                    last_start_ms: window.last().map(|c| c.start_time_ms),
                }
            })
            .collect();
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        out
    }

    // ── Readers ─────────────────────────────────────────────────────────

    /// Latest published window, or `None` for an unwatched symbol.
    pub fn window(&self, symbol: &str) -> Option<Arc<CandleWindow>> {
        let symbols = self.symbols.read();
        let handle = symbols.get(&normalize(symbol))?;
        let window = Arc::clone(&handle.window_rx.borrow());
        Some(window)
    }

    /// Change notifications for `symbol`'s window.
    pub fn subscribe(&self, symbol: &str) -> Option<watch::Receiver<Arc<CandleWindow>>> {
        self.symbols
            .read()
            .get(&normalize(symbol))
            .map(|h| h.window_rx.clone())
    }

    /// Feed a live candle to `symbol`'s worker.
    pub async fn push_live(&self, symbol: &str, live: LiveCandle) -> Result<()> {
        let symbol = normalize(symbol);
        let tx = self
            .symbols
            .read()
            .get(&symbol)
            .map(|h| h.live_tx.clone())
            .with_context(|| format!("symbol {symbol} is not watched"))?;

        tx.send(live)
            .await
            .with_context(|| format!("worker for {symbol} has stopped"))
    }

    // ── Divergence ──────────────────────────────────────────────────────

    /// Preset for `interval` with `overrides` applied on top.
    pub fn preset_for(&self, interval: Interval, overrides: &PresetOverrides) -> DivergencePreset {
        overrides.apply(self.presets.get(interval))
    }

    /// Divergence snapshot of `symbol`'s current window.
    pub fn divergence_snapshot(&self, symbol: &str, preset: &DivergencePreset) -> Option<DivergenceSnapshot> {
        let window = self.window(symbol)?;
        Some(analyze(&window.to_vec(), preset))
    }
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
