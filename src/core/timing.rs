//! Rhythm features computed from note-start times.
//!
//! Every feature is computed on the compact note-start subsequence and then
//! scattered back to the full scorepoint sequence. Short runs simply yield
//! missing values; they are not errors.

use crate::core::record::Column;
use crate::core::subsequence::Subsequence;
use crate::scorepoint::Scorepoint;

/// An interval shorter than `previous * TEMPO_SPEEDUP_RATIO` counts as a speed-up.
pub const TEMPO_SPEEDUP_RATIO: f64 = 0.95;

/// An interval longer than `previous * TEMPO_SLOWDOWN_RATIO` counts as a slow-down.
pub const TEMPO_SLOWDOWN_RATIO: f64 = 1.05;

/// Rhythm feature columns, all of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingFeatures {
    /// `t[i] - t[i-1]`
    pub press_interval: Column,
    /// `t[i] - t[i-2]`
    pub press_interval3: Column,
    /// Time accumulated since the interval last shrank by more than 5%
    pub time_since_tempo_increase: Column,
    /// Time accumulated since the interval last grew by more than 5%
    pub time_since_tempo_decrease: Column,
    /// Position of the middle beat between its neighbours, in percent
    pub rhythm_ratio: Column,
    /// Reserved: press/release pairing for holds is not defined
    pub hold_duration: Column,
}

impl TimingFeatures {
    fn missing(len: usize) -> Self {
        Self {
            press_interval: vec![None; len],
            press_interval3: vec![None; len],
            time_since_tempo_increase: vec![None; len],
            time_since_tempo_decrease: vec![None; len],
            rhythm_ratio: vec![None; len],
            hold_duration: vec![None; len],
        }
    }

    fn scatter(&self, subsequence: &Subsequence) -> Self {
        Self {
            press_interval: subsequence.scatter(&self.press_interval),
            press_interval3: subsequence.scatter(&self.press_interval3),
            time_since_tempo_increase: subsequence.scatter(&self.time_since_tempo_increase),
            time_since_tempo_decrease: subsequence.scatter(&self.time_since_tempo_decrease),
            rhythm_ratio: subsequence.scatter(&self.rhythm_ratio),
            hold_duration: subsequence.scatter(&self.hold_duration),
        }
    }
}

/// Which interval change resets a [`TempoTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoEdge {
    /// Interval shrank by more than 5%; resets to zero.
    Shrink,
    /// Interval grew by more than 5%; resets to the excess over the
    /// previous interval, i.e. the time since the beat that was skipped.
    Growth,
}

/// Hysteresis accumulator over consecutive note-start intervals.
///
/// The only state is the accumulated time, so each step needs nothing but
/// the previous and the current interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoTracker {
    edge: TempoEdge,
    accumulated: f64,
}

impl TempoTracker {
    pub fn new(edge: TempoEdge, accumulated: f64) -> Self {
        Self { edge, accumulated }
    }

    pub fn edge(&self) -> TempoEdge {
        self.edge
    }

    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    /// Advance by one interval pair, returning the new state and its output.
    pub fn step(self, previous_interval: f64, interval: f64) -> (Self, f64) {
        let accumulated = match self.edge {
            TempoEdge::Shrink if interval < previous_interval * TEMPO_SPEEDUP_RATIO => 0.0,
            TempoEdge::Growth if interval > previous_interval * TEMPO_SLOWDOWN_RATIO => {
                interval - previous_interval
            }
            _ => self.accumulated + interval,
        };
        let next = Self {
            edge: self.edge,
            accumulated,
        };
        (next, accumulated)
    }
}

/// Compute rhythm features over compact note-start times.
///
/// Times must be non-decreasing. The output has the same length as `times`.
pub fn compute_timing(times: &[f64]) -> TimingFeatures {
    let n = times.len();
    let mut features = TimingFeatures::missing(n);

    for i in 1..n {
        features.press_interval[i] = Some(times[i] - times[i - 1]);
    }

    if n < 3 {
        return features;
    }

    let first_interval = times[1] - times[0];
    let mut since_shrink = TempoTracker::new(TempoEdge::Shrink, first_interval);
    let mut since_growth = TempoTracker::new(TempoEdge::Growth, 0.0);

    features.time_since_tempo_increase[0] = Some(0.0);
    features.time_since_tempo_increase[1] = Some(first_interval);
    features.time_since_tempo_decrease[0] = Some(0.0);
    features.time_since_tempo_decrease[1] = Some(0.0);

    for i in 2..n {
        let previous = times[i - 1] - times[i - 2];
        let current = times[i] - times[i - 1];
        let span = times[i] - times[i - 2];

        features.press_interval3[i] = Some(span);
        features.rhythm_ratio[i] = if span != 0.0 {
            Some(100.0 * current / span)
        } else {
            None
        };

        let (next, value) = since_shrink.step(previous, current);
        since_shrink = next;
        features.time_since_tempo_increase[i] = Some(value);

        let (next, value) = since_growth.step(previous, current);
        since_growth = next;
        features.time_since_tempo_decrease[i] = Some(value);
    }

    features
}

/// Extract rhythm features aligned to the full scorepoint sequence.
pub fn extract_timing(points: &[Scorepoint]) -> TimingFeatures {
    let note_starts = Subsequence::note_starts(points);
    let times = note_starts.gather(points, |p| p.map_time);
    compute_timing(&times).scatter(&note_starts)
}
