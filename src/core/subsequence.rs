//! Index tables for the note-start and aim subsequences.
//!
//! Extractors work on a compact subsequence and scatter their results back
//! to the full scorepoint sequence through a table of positions.

use crate::core::record::Column;
use crate::scorepoint::Scorepoint;

/// Positions of the selected scorepoints within the full sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subsequence {
    positions: Vec<usize>,
    full_len: usize,
}

impl Subsequence {
    /// Select the scorepoints matching `keep`, remembering where they came from.
    pub fn select(points: &[Scorepoint], keep: impl Fn(&Scorepoint) -> bool) -> Self {
        let positions = points
            .iter()
            .enumerate()
            .filter(|(_, p)| keep(p))
            .map(|(pos, _)| pos)
            .collect();

        Self {
            positions,
            full_len: points.len(),
        }
    }

    /// Judged presses that start a note.
    pub fn note_starts(points: &[Scorepoint]) -> Self {
        Self::select(points, Scorepoint::is_note_start)
    }

    /// Press and hold points, i.e. the cursor targets.
    pub fn aim_targets(points: &[Scorepoint]) -> Self {
        Self::select(points, Scorepoint::is_aim_target)
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Length of the sequence the subsequence was taken from.
    pub fn full_len(&self) -> usize {
        self.full_len
    }

    /// Project a field of each selected scorepoint.
    pub fn gather<T>(&self, points: &[Scorepoint], field: impl Fn(&Scorepoint) -> T) -> Vec<T> {
        self.positions.iter().map(|&pos| field(&points[pos])).collect()
    }

    /// Place compact values back at their original positions; every
    /// position outside the subsequence is missing.
    pub fn scatter(&self, values: &[Option<f64>]) -> Column {
        let mut full = vec![None; self.full_len];
        for (&pos, value) in self.positions.iter().zip(values) {
            full[pos] = *value;
        }
        full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorepoint::{ActionType, PlayKey, ResultType};

    fn sequence() -> Vec<Scorepoint> {
        let key = PlayKey::new("m", 1, 0);
        vec![
            Scorepoint::new(&key, 0, ActionType::Press, ResultType::HitPress, 0.0, 0.0, 0.0),
            Scorepoint::new(&key, 1, ActionType::Hold, ResultType::HitAim, 50.0, 10.0, 0.0),
            Scorepoint::new(&key, 2, ActionType::Release, ResultType::HitRelease, 100.0, 20.0, 0.0),
            Scorepoint::new(&key, 3, ActionType::Press, ResultType::Empty, 150.0, 0.0, 0.0),
            Scorepoint::new(&key, 4, ActionType::Press, ResultType::Miss, 200.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_note_start_positions() {
        let points = sequence();
        let starts = Subsequence::note_starts(&points);
        assert_eq!(starts.positions(), &[0, 4]);
        assert_eq!(starts.full_len(), 5);
        assert_eq!(starts.gather(&points, |p| p.map_time), vec![0.0, 200.0]);
    }

    #[test]
    fn test_aim_positions_include_holds_and_empty_presses() {
        let points = sequence();
        let aim = Subsequence::aim_targets(&points);
        assert_eq!(aim.positions(), &[0, 1, 3, 4]);
    }

    #[test]
    fn test_scatter_fills_missing() {
        let points = sequence();
        let starts = Subsequence::note_starts(&points);
        let full = starts.scatter(&[Some(1.0), None]);
        assert_eq!(full, vec![Some(1.0), None, None, None, None]);
    }
}
