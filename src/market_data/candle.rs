use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

/// A single OHLCV candle, identified by the start of its time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub start_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
}

/// A candle pushed by the live feed together with its confirmation flag.
/// `confirmed == false` means the bucket is still open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveCandle {
    pub candle: Candle,
    pub confirmed: bool,
}

impl Candle {
    /// Parse a REST kline row.
    ///
    /// Bybit returns rows as string arrays:
    ///   [0] startTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] turnover
    pub fn from_rest_row(row: &serde_json::Value) -> Result<Self> {
        let arr = row.as_array().context("kline row is not an array")?;
        if arr.len() < 7 {
            anyhow::bail!("kline row has {} elements, expected 7", arr.len());
        }

        Ok(Self {
            start_time_ms: parse_i64(&arr[0], "start")?,
            open: parse_string_f64(&arr[1], "open")?,
            high: parse_string_f64(&arr[2], "high")?,
            low: parse_string_f64(&arr[3], "low")?,
            close: parse_string_f64(&arr[4], "close")?,
            volume: parse_string_f64(&arr[5], "volume")?,
            turnover: parse_string_f64(&arr[6], "turnover")?,
        })
    }

    /// Parse one entry of a websocket `kline.*` push.
    ///
    /// Expected shape:
    /// ```json
    /// { "start": 1700000000000, "open": "37000", "close": "37020", "high": "37050",
    ///   "low": "36990", "volume": "12.3", "turnover": "455000.1", "confirm": true }
    /// ```
    pub fn from_ws_entry(entry: &serde_json::Value) -> Result<LiveCandle> {
        let candle = Self {
            start_time_ms: parse_i64(&entry["start"], "start")?,
            open: parse_string_f64(&entry["open"], "open")?,
            high: parse_string_f64(&entry["high"], "high")?,
            low: parse_string_f64(&entry["low"], "low")?,
            close: parse_string_f64(&entry["close"], "close")?,
            volume: parse_string_f64(&entry["volume"], "volume")?,
            turnover: parse_string_f64(&entry["turnover"], "turnover")?,
        };
        let confirmed = entry["confirm"].as_bool().context("missing field confirm")?;

        Ok(LiveCandle { candle, confirmed })
    }
}

/// Bybit sends numeric values as JSON strings; accept plain numbers as well.
fn parse_string_f64(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

fn parse_i64(val: &serde_json::Value, name: &str) -> Result<i64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<i64>()
            .with_context(|| format!("failed to parse {name} as i64: {s}")),
        serde_json::Value::Number(n) => n
            .as_i64()
            .with_context(|| format!("field {name} is not a valid i64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_rest_row_ok() {
        let row = json!(["1700000000000", "37000.5", "37050", "36990", "37020", "12.5", "462750"]);
        let c = Candle::from_rest_row(&row).expect("should parse");
        assert_eq!(c.start_time_ms, 1_700_000_000_000);
        assert!((c.open - 37000.5).abs() < f64::EPSILON);
        assert!((c.turnover - 462750.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_rest_row_rejects_short_row() {
        let row = json!(["1700000000000", "1", "2"]);
        assert!(Candle::from_rest_row(&row).is_err());
    }

    #[test]
    fn parse_rest_row_rejects_garbage_number() {
        let row = json!(["1700000000000", "abc", "2", "1", "1", "1", "1"]);
        assert!(Candle::from_rest_row(&row).is_err());
    }

    #[test]
    fn parse_ws_entry_ok() {
        let entry = json!({
            "start": 1700000000000_i64,
            "end": 1700000059999_i64,
            "interval": "1",
            "open": "37000.00",
            "close": "37020.00",
            "high": "37050.00",
            "low": "36990.00",
            "volume": "123.456",
            "turnover": "4567890.12",
            "confirm": true,
            "timestamp": 1700000060000_i64
        });
        let live = Candle::from_ws_entry(&entry).expect("should parse");
        assert!(live.confirmed);
        assert_eq!(live.candle.start_time_ms, 1_700_000_000_000);
        assert!((live.candle.close - 37020.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_ws_entry_requires_confirm_flag() {
        let entry = json!({
            "start": 1, "open": "1", "close": "1", "high": "1",
            "low": "1", "volume": "1", "turnover": "1"
        });
        assert!(Candle::from_ws_entry(&entry).is_err());
    }
}
