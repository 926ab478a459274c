// =============================================================================
// Live kline feed — Bybit v5 public websocket
// =============================================================================
//
// One connection per (symbol, interval).  After connecting we subscribe to
// `kline.{token}.{symbol}` and keep the session alive with an application
// level `{"op":"ping"}` every 20 s.  Every entry of every push is forwarded as
// a `LiveCandle`; confirmed or not is decided later by the window.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::backfill::wait_cancelled;
use super::candle::{Candle, LiveCandle};
use crate::types::Interval;

const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Websocket topic for `symbol` on `interval`.
pub fn kline_topic(symbol: &str, interval: Interval) -> String {
    format!("kline.{}.{}", interval.bybit_token(), symbol.to_uppercase())
}

/// Parse one websocket text frame.
///
/// Acks, pongs and pushes for other topics yield an empty vector; a push
/// for `topic` with a malformed entry is an error.
///
/// Expected shape:
/// ```json
/// { "topic": "kline.1.BTCUSDT", "type": "snapshot", "ts": 1700000000000,
///   "data": [ { "start": 1700000000000, "open": "37000", ..., "confirm": false } ] }
/// ```
pub fn parse_kline_message(text: &str, topic: &str) -> Result<Vec<LiveCandle>> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse kline JSON")?;

    if root.get("op").is_some() {
        return Ok(Vec::new());
    }
    if root["topic"].as_str() != Some(topic) {
        return Ok(Vec::new());
    }

    root["data"]
        .as_array()
        .context("kline push without data array")?
        .iter()
        .map(Candle::from_ws_entry)
        .collect()
}

/// Connect once and forward live candles into `tx` until the connection
/// drops.  Returns `Ok(())` when the stream ends or the receiver is gone.
pub async fn run_kline_stream(
    ws_url: &str,
    symbol: &str,
    interval: Interval,
    tx: &mpsc::Sender<LiveCandle>,
) -> Result<()> {
    let topic = kline_topic(symbol, interval);
    info!(url = %ws_url, topic = %topic, "connecting to kline WebSocket");

    let (ws_stream, _response) = connect_async(ws_url)
        .await
        .context("failed to connect to kline WebSocket")?;
    let (mut write, mut read) = ws_stream.split();

    let subscribe = serde_json::json!({ "op": "subscribe", "args": [topic] });
    write
        .send(Message::Text(subscribe.to_string()))
        .await
        .context("failed to send subscribe request")?;
    info!(topic = %topic, "kline WebSocket subscribed");

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;

    loop {
        tokio::select! {
            _ = ping.tick() => {
                let frame = serde_json::json!({ "op": "ping" }).to_string();
                write
                    .send(Message::Text(frame))
                    .await
                    .context("failed to send ping")?;
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => match parse_kline_message(&text, &topic) {
                    Ok(updates) => {
                        for update in updates {
                            debug!(
                                topic = %topic,
                                start = update.candle.start_time_ms,
                                close = update.candle.close,
                                confirmed = update.confirmed,
                                "candle update"
                            );
                            if tx.send(update).await.is_err() {
                                debug!(topic = %topic, "live receiver closed");
                                return Ok(());
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to parse kline message"),
                },
                // Ping / Pong / Binary / Close frames are handled by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(error = %e, "kline WebSocket read error");
                    return Err(e.into());
                }
                None => {
                    warn!(topic = %topic, "kline WebSocket stream ended");
                    return Ok(());
                }
            },
        }
    }
}

/// Keep a live feed running: reconnect after `retry_delay` whenever the
/// connection ends, until `shutdown` fires or the receiver is dropped.
pub async fn run_kline_feed(
    ws_url: String,
    symbol: String,
    interval: Interval,
    tx: mpsc::Sender<LiveCandle>,
    retry_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = wait_cancelled(&mut shutdown) => break,
            res = run_kline_stream(&ws_url, &symbol, interval, &tx) => {
                if let Err(e) = res {
                    error!(symbol = %symbol, error = %e, "kline stream failed");
                }
            }
        }

        if tx.is_closed() {
            break;
        }

        tokio::select! {
            biased;
            _ = wait_cancelled(&mut shutdown) => break,
            _ = tokio::time::sleep(retry_delay) => {
                info!(symbol = %symbol, "reconnecting kline WebSocket");
            }
        }
    }

    debug!(symbol = %symbol, "kline feed stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUSH: &str = r#"{
        "topic": "kline.5.BTCUSDT",
        "type": "snapshot",
        "ts": 1700000030000,
        "data": [
            {
                "start": 1700000000000,
                "end": 1700000299999,
                "interval": "5",
                "open": "37000.00",
                "close": "37020.00",
                "high": "37050.00",
                "low": "36990.00",
                "volume": "123.456",
                "turnover": "4567890.12",
                "confirm": false,
                "timestamp": 1700000030000
            }
        ]
    }"#;

    #[test]
    fn topic_uses_bybit_token() {
        assert_eq!(kline_topic("btcusdt", Interval::M5), "kline.5.BTCUSDT");
        assert_eq!(kline_topic("ETHUSDT", Interval::H1), "kline.60.ETHUSDT");
    }

    #[test]
    fn parse_push() {
        let out = parse_kline_message(PUSH, "kline.5.BTCUSDT").expect("should parse");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].candle.start_time_ms, 1_700_000_000_000);
        assert!((out[0].candle.close - 37020.0).abs() < f64::EPSILON);
        assert!(!out[0].confirmed);
    }

    #[test]
    fn other_topic_is_ignored() {
        assert!(parse_kline_message(PUSH, "kline.1.BTCUSDT").unwrap().is_empty());
    }

    #[test]
    fn acks_and_pongs_are_ignored() {
        let ack = r#"{"success":true,"ret_msg":"","conn_id":"abc","op":"subscribe"}"#;
        let pong = r#"{"success":true,"ret_msg":"pong","conn_id":"abc","op":"ping"}"#;
        assert!(parse_kline_message(ack, "kline.5.BTCUSDT").unwrap().is_empty());
        assert!(parse_kline_message(pong, "kline.5.BTCUSDT").unwrap().is_empty());
    }

    #[test]
    fn malformed_entry_is_rejected() {
        let bad = PUSH.replace(r#""close": "37020.00""#, r#""close": "abc""#);
        assert!(parse_kline_message(&bad, "kline.5.BTCUSDT").is_err());
        assert!(parse_kline_message("not json", "kline.5.BTCUSDT").is_err());
    }

    #[tokio::test]
    async fn feed_stops_on_shutdown() {
        let (tx, _rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = watch::channel(true);
        // Unroutable URL; shutdown wins the biased select before any connect.
        run_kline_feed(
            "ws://127.0.0.1:9".to_string(),
            "BTCUSDT".to_string(),
            Interval::M1,
            tx,
            Duration::from_secs(60),
            stop_rx,
        )
        .await;
        drop(stop_tx);
    }
}
