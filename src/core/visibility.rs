//! Local note density: how many note-starts are on screen at once.

use crate::core::record::Column;
use crate::core::subsequence::Subsequence;
use crate::scorepoint::Scorepoint;

/// Count, for every note-start, the note-starts with `t[i] <= t[j] <= t[i] + window_ms`.
///
/// `times` must be non-decreasing. Both bounds are inclusive, so notes
/// stacked at the same time all see each other. Runs in O(n) with two
/// monotone pointers; a negative window behaves like a zero window.
pub fn compute_visibility(times: &[f64], window_ms: f64) -> Column {
    let window = window_ms.max(0.0);
    let n = times.len();
    let mut counts = Vec::with_capacity(n);

    let mut lo = 0;
    let mut hi = 0;
    for &t in times {
        while lo < n && times[lo] < t {
            lo += 1;
        }
        if hi < lo {
            hi = lo;
        }
        while hi < n && times[hi] <= t + window {
            hi += 1;
        }
        counts.push(Some((hi - lo) as f64));
    }

    counts
}

/// Extract visible counts aligned to the full scorepoint sequence.
pub fn extract_visibility(points: &[Scorepoint], window_ms: f64) -> Column {
    let note_starts = Subsequence::note_starts(points);
    let times = note_starts.gather(points, |p| p.map_time);
    note_starts.scatter(&compute_visibility(&times, window_ms))
}
