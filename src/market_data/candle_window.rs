use std::collections::VecDeque;

use serde::Serialize;

use super::candle::Candle;

/// Default number of candles retained per symbol.
pub const DEFAULT_CAPACITY: usize = 500;

// ---------------------------------------------------------------------------
// CandleWindow -- capacity-bounded, time-ordered ring per symbol
// ---------------------------------------------------------------------------

/// Ordered ring of confirmed candles for one symbol.
///
/// Invariants: `start_time_ms` is strictly increasing front to back and
/// `len() <= capacity()`.  The oldest candle is evicted first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleWindow {
    candles: VecDeque<Candle>,
    capacity: usize,
}

/// What [`CandleWindow::apply_live`] did with an incoming candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveUpdate {
    /// Bucket still open; the window was not touched.
    Unconfirmed,
    /// The window was empty and the candle became its only entry.
    Inserted,
    /// Same bucket as the last entry; replaced in place.
    Replaced,
    /// Newer bucket appended; `evicted` is true if the oldest entry was dropped.
    Appended { evicted: bool },
    /// Older than the last entry; dropped.
    Stale,
}

impl LiveUpdate {
    /// True when the window content changed.
    pub fn mutated(self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced | Self::Appended { .. })
    }
}

impl CandleWindow {
    /// Create an empty window.  A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            candles: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Build a window from an unordered batch: sort ascending, keep the last
    /// occurrence of each start time, then keep only the newest `capacity`.
    pub fn from_candles(mut candles: Vec<Candle>, capacity: usize) -> Self {
        let mut window = Self::new(capacity);

        // Stable sort keeps later duplicates after earlier ones.
        candles.sort_by_key(|c| c.start_time_ms);
        for candle in candles {
            match window.candles.back() {
                Some(last) if last.start_time_ms == candle.start_time_ms => {
                    window.candles.pop_back();
                }
                _ => {}
            }
            window.candles.push_back(candle);
        }

        while window.candles.len() > window.capacity {
            window.candles.pop_front();
        }
        window
    }

    /// Apply a live candle.
    ///
    /// * unconfirmed candles never enter the window;
    /// * equal start time to the last entry replaces it (same-bar update);
    /// * a later start time is appended, evicting the oldest beyond capacity;
    /// * an earlier start time is stale and dropped.
    pub fn apply_live(&mut self, candle: Candle, confirmed: bool) -> LiveUpdate {
        if !confirmed {
            return LiveUpdate::Unconfirmed;
        }

        let last_start = match self.candles.back() {
            Some(last) => last.start_time_ms,
            None => {
                self.candles.push_back(candle);
                return LiveUpdate::Inserted;
            }
        };

        if candle.start_time_ms == last_start {
            if let Some(last) = self.candles.back_mut() {
                *last = candle;
            }
            LiveUpdate::Replaced
        } else if candle.start_time_ms > last_start {
            self.candles.push_back(candle);
            let evicted = self.candles.len() > self.capacity;
            if evicted {
                self.candles.pop_front();
            }
            LiveUpdate::Appended { evicted }
        } else {
            LiveUpdate::Stale
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> + '_ {
        self.candles.iter()
    }

    /// Contiguous oldest-first copy of the window, for the series builder.
    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }
}

impl Default for CandleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candle(start: i64, close: f64) -> Candle {
        Candle {
            start_time_ms: start,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100.0,
            turnover: 100.0 * close,
        }
    }

    fn closes(w: &CandleWindow) -> Vec<f64> {
        w.iter().map(|c| c.close).collect()
    }

    #[test]
    fn unconfirmed_is_ignored() {
        let mut w = CandleWindow::new(3);
        assert_eq!(w.apply_live(sample_candle(0, 1.0), false), LiveUpdate::Unconfirmed);
        assert!(w.is_empty());
    }

    #[test]
    fn first_candle_is_inserted() {
        let mut w = CandleWindow::new(3);
        assert_eq!(w.apply_live(sample_candle(0, 1.0), true), LiveUpdate::Inserted);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn same_start_replaces_in_place() {
        let mut w = CandleWindow::from_candles(
            vec![sample_candle(0, 1.0), sample_candle(60_000, 2.0)],
            3,
        );
        let update = w.apply_live(sample_candle(60_000, 5.0), true);
        assert_eq!(update, LiveUpdate::Replaced);
        assert_eq!(w.len(), 2);
        assert_eq!(closes(&w), vec![1.0, 5.0]);
    }

    #[test]
    fn append_beyond_capacity_evicts_exactly_oldest() {
        let mut w = CandleWindow::from_candles(
            (0..3).map(|i| sample_candle(i * 60_000, i as f64)).collect(),
            3,
        );
        let update = w.apply_live(sample_candle(3 * 60_000, 3.0), true);
        assert_eq!(update, LiveUpdate::Appended { evicted: true });
        assert_eq!(w.len(), 3);
        assert_eq!(closes(&w), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn stale_candle_is_dropped() {
        let mut w = CandleWindow::from_candles(
            vec![sample_candle(60_000, 1.0), sample_candle(120_000, 2.0)],
            5,
        );
        let before = w.clone();
        assert_eq!(w.apply_live(sample_candle(60_000, 9.0), true), LiveUpdate::Stale);
        assert_eq!(w, before);
    }

    #[test]
    fn from_candles_sorts_dedups_and_trims() {
        let batch = vec![
            sample_candle(180_000, 4.0),
            sample_candle(0, 1.0),
            sample_candle(60_000, 2.0),
            sample_candle(120_000, 3.0),
            sample_candle(60_000, 2.5),
        ];
        let w = CandleWindow::from_candles(batch, 3);
        assert_eq!(closes(&w), vec![2.5, 3.0, 4.0]);
        let starts: Vec<i64> = w.iter().map(|c| c.start_time_ms).collect();
        assert!(starts.windows(2).all(|p| p[0] < p[1]));
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut w = CandleWindow::new(0);
        w.apply_live(sample_candle(0, 1.0), true);
        w.apply_live(sample_candle(60_000, 2.0), true);
        assert_eq!(closes(&w), vec![2.0]);
    }
}
