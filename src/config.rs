// =============================================================================
// Scanner Configuration
// =============================================================================
//
// Loaded once at startup from `scanner_config.json` (when present) and then
// patched from the environment:
//
//   SCANNER_SYMBOLS    comma-separated symbol list
//   SCANNER_INTERVAL   1m | 5m | 15m | 1h
//   SCANNER_BIND_ADDR  HTTP listen address
//
// All fields carry `#[serde(default)]` so a partial file is always valid.
// The file is never written back.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::market_data::{BackfillOptions, DEFAULT_CAPACITY};
use crate::signals::PresetTable;
use crate::types::Interval;
use crate::worker::WorkerSettings;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

fn default_category() -> String {
    "spot".to_string()
}

fn default_rest_base() -> String {
    "https://api.bybit.com".to_string()
}

fn default_ws_url() -> String {
    "wss://stream.bybit.com/v5/public/spot".to_string()
}

fn default_window_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_page_size() -> usize {
    200
}

fn default_page_delay_ms() -> u64 {
    80
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_live_buffer() -> usize {
    256
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// ScannerConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Symbols watched from startup.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Kline interval for every window.
    #[serde(default)]
    pub interval: Interval,

    /// Bybit market category ("spot", "linear", "inverse").
    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default = "default_rest_base")]
    pub rest_base: String,

    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    /// Candles requested per backfill page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Back-off before retrying a failed backfill or a dropped websocket.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Bounded queue between a symbol's websocket and its worker.
    #[serde(default = "default_live_buffer")]
    pub live_buffer: usize,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub presets: PresetTable,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            interval: Interval::default(),
            category: default_category(),
            rest_base: default_rest_base(),
            ws_url: default_ws_url(),
            window_capacity: default_window_capacity(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            retry_delay_secs: default_retry_delay_secs(),
            live_buffer: default_live_buffer(),
            bind_addr: default_bind_addr(),
            presets: PresetTable::default(),
        }
    }
}

impl ScannerConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error; the caller decides whether to fall back
    /// to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scanner config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scanner config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            interval = %config.interval,
            "scanner config loaded"
        );

        Ok(config)
    }

    /// Apply `SCANNER_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup("SCANNER_SYMBOLS") {
            let symbols: Vec<String> = raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !symbols.is_empty() {
                self.symbols = symbols;
            }
        }

        if let Some(raw) = lookup("SCANNER_INTERVAL") {
            self.interval = raw
                .parse()
                .with_context(|| format!("invalid SCANNER_INTERVAL {raw:?}"))?;
        }

        if let Some(addr) = lookup("SCANNER_BIND_ADDR") {
            self.bind_addr = addr.trim().to_string();
        }

        Ok(())
    }

    pub fn backfill_options(&self) -> BackfillOptions {
        BackfillOptions {
            capacity: self.window_capacity,
            page_size: self.page_size,
            page_delay: Duration::from_millis(self.page_delay_ms),
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            backfill: self.backfill_options(),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            live_buffer: self.live_buffer.max(1),
            interval: self.interval,
            ws_url: Some(self.ws_url.clone()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = ScannerConfig::default();
        assert_eq!(cfg.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(cfg.interval, Interval::M1);
        assert_eq!(cfg.window_capacity, 500);
        assert_eq!(cfg.page_size, 200);
        assert_eq!(cfg.page_delay_ms, 80);
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: ScannerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ScannerConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "interval": "15m",
            "symbols": ["SOLUSDT"],
            "presets": { "15m": { "swing_window": 5 } }
        }"#;
        let cfg: ScannerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.interval, Interval::M15);
        assert_eq!(cfg.symbols, vec!["SOLUSDT"]);
        assert_eq!(cfg.presets.get(Interval::M15).swing_window, 5);
        assert_eq!(cfg.presets.get(Interval::H1).swing_window, 2);
        assert_eq!(cfg.retry_delay_secs, 5);
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SCANNER_SYMBOLS", " btcusdt, ,xrpusdt "),
            ("SCANNER_INTERVAL", "1h"),
            ("SCANNER_BIND_ADDR", "127.0.0.1:8080"),
        ]
        .into_iter()
        .collect();

        let mut cfg = ScannerConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.symbols, vec!["BTCUSDT", "XRPUSDT"]);
        assert_eq!(cfg.interval, Interval::H1);
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn bad_interval_override_is_an_error() {
        let mut cfg = ScannerConfig::default();
        let res = cfg.apply_overrides(|k| (k == "SCANNER_INTERVAL").then(|| "3m".to_string()));
        assert!(res.is_err());
        assert_eq!(cfg.interval, Interval::M1);
    }

    #[test]
    fn worker_settings_follow_config() {
        let cfg = ScannerConfig {
            page_delay_ms: 0,
            live_buffer: 0,
            ..ScannerConfig::default()
        };
        let s = cfg.worker_settings();
        assert_eq!(s.backfill.capacity, 500);
        assert!(s.backfill.page_delay.is_zero());
        assert_eq!(s.live_buffer, 1);
        assert_eq!(s.ws_url.as_deref(), Some("wss://stream.bybit.com/v5/public/spot"));
    }
}
