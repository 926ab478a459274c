// =============================================================================
// Divergence presets — one parameter bundle per analysis interval
// =============================================================================
//
//   interval | RSI | MACD fast/slow/signal | L | min_sep | min price move
//   ---------+-----+-----------------------+---+---------+---------------
//   1m       | 14  | 24 / 52 / 9           | 3 | 3       | 0.15 %
//   5m       | 14  | 12 / 26 / 9           | 3 | 3       | 0.20 %
//   15m      | 14  | 12 / 26 / 9           | 3 | 3       | 0.25 %
//   1h       | 14  | 12 / 26 / 9           | 2 | 2       | 0.30 %
//
// Longer intervals are stable with a narrower swing window.
//
// Presets are plain data: they can be replaced from the config file and every
// field can be overridden for a single query with `PresetOverrides`.
// =============================================================================

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use super::divergence::DivergenceParams;
use crate::indicators::volume::DEFAULT_VOLUME_EMA_PERIOD;
use crate::types::Interval;

/// The four indicator families checked for divergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Rsi,
    MacdLine,
    Histogram,
    Volume,
}

/// Minimum indicator change per family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorDeltas {
    pub rsi: f64,
    pub macd_line: f64,
    pub histogram: f64,
    pub volume: f64,
}

impl Default for IndicatorDeltas {
    fn default() -> Self {
        Self {
            rsi: 1.0,
            macd_line: 0.05,
            histogram: 0.03,
            volume: 0.05,
        }
    }
}

impl IndicatorDeltas {
    pub fn for_kind(&self, kind: IndicatorKind) -> f64 {
        match kind {
            IndicatorKind::Rsi => self.rsi,
            IndicatorKind::MacdLine => self.macd_line,
            IndicatorKind::Histogram => self.histogram,
            IndicatorKind::Volume => self.volume,
        }
    }
}

/// Full parameter bundle for one divergence snapshot.
///
/// Missing fields in a JSON document fall back to the 1m preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergencePreset {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Swing half-window `L`.
    pub swing_window: usize,
    pub min_sep: usize,
    /// Minimum relative price move between swings (0.0015 = 0.15 %).
    pub min_price_move_pct: f64,
    pub volume_ema_period: usize,
    /// Compare price against `volume / EMA(volume)` instead of raw volume.
    pub normalize_volume: bool,
    pub min_delta: IndicatorDeltas,
}

impl DivergencePreset {
    /// Built-in preset for `interval`.
    pub fn for_interval(interval: Interval) -> Self {
        let base = Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            swing_window: 3,
            min_sep: 3,
            min_price_move_pct: 0.0015,
            volume_ema_period: DEFAULT_VOLUME_EMA_PERIOD,
            normalize_volume: true,
            min_delta: IndicatorDeltas::default(),
        };

        match interval {
            Interval::M1 => Self {
                macd_fast: 24,
                macd_slow: 52,
                ..base
            },
            Interval::M5 => Self {
                min_price_move_pct: 0.002,
                ..base
            },
            Interval::M15 => Self {
                min_price_move_pct: 0.0025,
                ..base
            },
            Interval::H1 => Self {
                swing_window: 2,
                min_sep: 2,
                min_price_move_pct: 0.003,
                ..base
            },
        }
    }

    /// Detector thresholds for one indicator family.
    pub fn params_for(&self, kind: IndicatorKind) -> DivergenceParams {
        DivergenceParams {
            swing_window: self.swing_window,
            min_sep: self.min_sep,
            min_price_move_pct: self.min_price_move_pct,
            min_indicator_delta: self.min_delta.for_kind(kind),
        }
    }
}

impl Default for DivergencePreset {
    fn default() -> Self {
        Self::for_interval(Interval::M1)
    }
}

/// Presets keyed by interval.
///
/// When read from JSON each entry is merged onto the built-in preset of its
/// own interval, so `{ "5m": { "swing_window": 4 } }` keeps every other 5m
/// value.  Intervals absent from the table use the built-in preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PresetTable(BTreeMap<Interval, DivergencePreset>);

impl PresetTable {
    pub fn get(&self, interval: Interval) -> DivergencePreset {
        self.0
            .get(&interval)
            .cloned()
            .unwrap_or_else(|| DivergencePreset::for_interval(interval))
    }
}

impl<'de> Deserialize<'de> for PresetTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<Interval, serde_json::Value>::deserialize(deserializer)?;
        let mut table = Self::default();
        for (interval, patch) in raw {
            let mut base = serde_json::to_value(DivergencePreset::for_interval(interval)).map_err(D::Error::custom)?;
            merge_json(&mut base, patch);
            let preset = serde_json::from_value(base).map_err(D::Error::custom)?;
            table.0.insert(interval, preset);
        }
        Ok(table)
    }
}

fn merge_json(base: &mut serde_json::Value, patch: serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base), serde_json::Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        Self(
            Interval::ALL
                .into_iter()
                .map(|iv| (iv, DivergencePreset::for_interval(iv)))
                .collect(),
        )
    }
}

/// Per-call overrides; every `Some` field replaces the preset value.
///
/// Flat so that it can be read straight from a query string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetOverrides {
    pub rsi_period: Option<usize>,
    pub macd_fast: Option<usize>,
    pub macd_slow: Option<usize>,
    pub macd_signal: Option<usize>,
    pub swing_window: Option<usize>,
    pub min_sep: Option<usize>,
    pub min_price_move_pct: Option<f64>,
    pub volume_ema_period: Option<usize>,
    pub normalize_volume: Option<bool>,
    pub rsi_delta: Option<f64>,
    pub macd_line_delta: Option<f64>,
    pub histogram_delta: Option<f64>,
    pub volume_delta: Option<f64>,
}

impl PresetOverrides {
    pub fn apply(&self, mut preset: DivergencePreset) -> DivergencePreset {
        macro_rules! take {
            ($src:ident => $($dst:ident).+) => {
                if let Some(v) = self.$src {
                    preset.$($dst).+ = v;
                }
            };
        }

        take!(rsi_period => rsi_period);
        take!(macd_fast => macd_fast);
        take!(macd_slow => macd_slow);
        take!(macd_signal => macd_signal);
        take!(swing_window => swing_window);
        take!(min_sep => min_sep);
        take!(min_price_move_pct => min_price_move_pct);
        take!(volume_ema_period => volume_ema_period);
        take!(normalize_volume => normalize_volume);
        take!(rsi_delta => min_delta.rsi);
        take!(macd_line_delta => min_delta.macd_line);
        take!(histogram_delta => min_delta.histogram);
        take!(volume_delta => min_delta.volume);
        preset
    }
}
