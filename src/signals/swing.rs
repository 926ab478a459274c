// =============================================================================
// Swing Detector
// =============================================================================
//
// An index `i` is a swing high when its value is strictly greater than each of
// its `window` left and `window` right neighbours, and a swing low when it is
// strictly smaller.  Every neighbour must be present.  Indices closer than
// `window` to either end of the series are never swings, and a flat plateau
// produces no swing anywhere on it.
//
// Always recompute from the full series: a newly appended value can change
// the status of points near the old right boundary.

use serde::Serialize;

use crate::indicators::series::present;

/// Swing indices of one series, both ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwingSet {
    pub highs: Vec<usize>,
    pub lows: Vec<usize>,
}

/// Find swing highs and lows with half-window `window`.  O(n * window).
pub fn find_swings(series: &[Option<f64>], window: usize) -> SwingSet {
    let mut set = SwingSet::default();
    let n = series.len();
    match window.checked_mul(2) {
        Some(span) if n > span => {}
        _ => return set,
    }

    for i in window..n - window {
        let Some(v) = present(series[i]) else {
            continue;
        };

        let mut is_high = true;
        let mut is_low = true;
        for j in 1..=window {
            let (Some(left), Some(right)) = (present(series[i - j]), present(series[i + j])) else {
                is_high = false;
                is_low = false;
                break;
            };
            if v <= left || v <= right {
                is_high = false;
            }
            if v >= left || v >= right {
                is_low = false;
            }
            if !is_high && !is_low {
                break;
            }
        }

        if is_high {
            set.highs.push(i);
        }
        if is_low {
            set.lows.push(i);
        }
    }

    set
}
