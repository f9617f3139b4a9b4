//! Feature table assembly.
//!
//! The assembler validates one play's scorepoint sequence, runs the timing,
//! spatial and visibility extractors over it, and zips their columns into
//! keyed [`FeatureRecord`]s.

use crate::core::record::{Column, FeatureColumn, FeatureRecord, FeatureTable};
use crate::core::spatial::extract_spatial;
use crate::core::timing::extract_timing;
use crate::core::visibility::extract_visibility;
use crate::scorepoint::{PlayKey, Scorepoint};
use thiserror::Error;

/// Approach window used when a play does not report a usable one.
pub const DEFAULT_APPROACH_WINDOW_MS: f64 = 1200.0;

/// Errors raised while turning a scorepoint sequence into features.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// An extractor produced a column of the wrong length. This is a bug,
    /// not a property of the input.
    #[error("{feature} has {actual} values for {expected} scorepoints")]
    ShapeMismatch {
        feature: FeatureColumn,
        expected: usize,
        actual: usize,
    },
    #[error("scorepoint {position} belongs to {found}, expected {expected}")]
    MixedPlays {
        expected: PlayKey,
        found: PlayKey,
        position: usize,
    },
    #[error("invalid scorepoint sequence at position {position}: {reason}")]
    InvalidSequence { position: usize, reason: String },
}

/// Builds a [`FeatureTable`] from the scorepoints of a single play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureTableAssembler {
    fallback_window_ms: f64,
}

impl Default for FeatureTableAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureTableAssembler {
    /// Create an assembler with the default fallback window.
    pub fn new() -> Self {
        Self {
            fallback_window_ms: DEFAULT_APPROACH_WINDOW_MS,
        }
    }

    /// Use `window_ms` for plays whose approach rate is zero, negative or not a number.
    pub fn with_fallback_window(mut self, window_ms: f64) -> Self {
        self.fallback_window_ms = window_ms;
        self
    }

    /// Extract every feature for one play.
    ///
    /// An empty sequence yields an empty table.
    pub fn assemble(&self, points: &[Scorepoint]) -> Result<FeatureTable, FeatureError> {
        let Some(first) = points.first() else {
            return Ok(FeatureTable::new());
        };
        validate_sequence(points)?;

        let window_ms = if first.approach_rate_ms.is_finite() && first.approach_rate_ms > 0.0 {
            first.approach_rate_ms
        } else {
            self.fallback_window_ms
        };

        let timing = extract_timing(points);
        let spatial = extract_spatial(points);
        let visible = extract_visibility(points, window_ms);

        zip_columns(
            points,
            vec![
                (FeatureColumn::PressInterval, timing.press_interval),
                (FeatureColumn::PressInterval3, timing.press_interval3),
                (
                    FeatureColumn::TimeSinceTempoIncrease,
                    timing.time_since_tempo_increase,
                ),
                (
                    FeatureColumn::TimeSinceTempoDecrease,
                    timing.time_since_tempo_decrease,
                ),
                (FeatureColumn::RhythmRatio, timing.rhythm_ratio),
                (FeatureColumn::HoldDuration, timing.hold_duration),
                (FeatureColumn::Distance, spatial.distance),
                (FeatureColumn::Angle, spatial.angle),
                (FeatureColumn::LinearVelocity, spatial.linear_velocity),
                (FeatureColumn::AngularVelocity, spatial.angular_velocity),
                (FeatureColumn::VisibleCount, visible),
            ],
        )
    }
}

/// Extract features with the default assembler.
pub fn extract_features(points: &[Scorepoint]) -> Result<FeatureTable, FeatureError> {
    FeatureTableAssembler::new().assemble(points)
}

/// One play, contiguous indices, finite map values, non-decreasing times.
fn validate_sequence(points: &[Scorepoint]) -> Result<(), FeatureError> {
    let Some(first) = points.first() else {
        return Ok(());
    };
    let key = first.play_key();

    for (position, point) in points.iter().enumerate() {
        if !point.belongs_to(&key) {
            return Err(FeatureError::MixedPlays {
                expected: key,
                found: point.play_key(),
                position,
            });
        }

        for (field, value) in [
            ("mapTime", point.map_time),
            ("mapX", point.map_x),
            ("mapY", point.map_y),
        ] {
            if !value.is_finite() {
                return Err(FeatureError::InvalidSequence {
                    position,
                    reason: format!("{field} is {value}"),
                });
            }
        }

        let expected_index = u64::from(first.index) + position as u64;
        if u64::from(point.index) != expected_index {
            return Err(FeatureError::InvalidSequence {
                position,
                reason: format!("index {} where {} was expected", point.index, expected_index),
            });
        }

        if position > 0 && point.map_time < points[position - 1].map_time {
            return Err(FeatureError::InvalidSequence {
                position,
                reason: format!(
                    "mapTime {} goes back from {}",
                    point.map_time,
                    points[position - 1].map_time
                ),
            });
        }
    }

    Ok(())
}

/// Zip full-length columns into records, checking every column's length.
pub(crate) fn zip_columns(
    points: &[Scorepoint],
    columns: Vec<(FeatureColumn, Column)>,
) -> Result<FeatureTable, FeatureError> {
    let expected = points.len();
    if let Some((feature, column)) = columns.iter().find(|(_, c)| c.len() != expected) {
        return Err(FeatureError::ShapeMismatch {
            feature: *feature,
            expected,
            actual: column.len(),
        });
    }

    let mut records: Vec<FeatureRecord> = points
        .iter()
        .map(|p| FeatureRecord::new(&p.play_key(), p.index))
        .collect();

    for (feature, column) in columns {
        for (record, value) in records.iter_mut().zip(column) {
            record.set(feature, value);
        }
    }

    Ok(FeatureTable::from_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorepoint::{ActionType, ResultType};

    fn key() -> PlayKey {
        PlayKey::new("c0ffee", 1_700_000_000, 72)
    }

    fn stream(times: &[f64]) -> Vec<Scorepoint> {
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                Scorepoint::new(
                    &key(),
                    i as u32,
                    ActionType::Press,
                    ResultType::HitPress,
                    t,
                    (i * 50) as f64,
                    0.0,
                )
                .with_hit(t + 3.0, (i * 50) as f64, 1.0)
                .with_play_constants(600.0, 32.0)
            })
            .collect()
    }

    #[test]
    fn test_assemble_keys_and_columns() {
        let points = stream(&[0.0, 500.0, 1000.0, 1500.0]);
        let table = extract_features(&points).unwrap();

        assert_eq!(table.len(), 4);
        for (record, point) in table.iter().zip(&points) {
            assert_eq!(record.play_key(), key());
            assert_eq!(record.index, point.index);
        }
        assert_eq!(
            table.column(FeatureColumn::PressInterval),
            vec![None, Some(500.0), Some(500.0), Some(500.0)]
        );
        // 600ms window: each note sees itself and the next one.
        assert_eq!(
            table.column(FeatureColumn::VisibleCount),
            vec![Some(2.0), Some(2.0), Some(2.0), Some(1.0)]
        );
        assert!(table
            .column(FeatureColumn::HoldDuration)
            .iter()
            .all(Option::is_none));
    }

    #[test]
    fn test_empty_sequence() {
        assert!(extract_features(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_fallback_window() {
        let points: Vec<Scorepoint> = stream(&[0.0, 500.0, 1000.0])
            .into_iter()
            .map(|p| p.with_play_constants(0.0, 32.0))
            .collect();

        let table = FeatureTableAssembler::new()
            .with_fallback_window(5000.0)
            .assemble(&points)
            .unwrap();
        assert_eq!(
            table.column(FeatureColumn::VisibleCount),
            vec![Some(3.0), Some(2.0), Some(1.0)]
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let points = stream(&[0.0, 100.0, 200.0]);
        let err = zip_columns(
            &points,
            vec![
                (FeatureColumn::Distance, vec![Some(0.0); 3]),
                (FeatureColumn::Angle, vec![None; 2]),
            ],
        )
        .unwrap_err();

        assert_eq!(
            err,
            FeatureError::ShapeMismatch {
                feature: FeatureColumn::Angle,
                expected: 3,
                actual: 2,
            }
        );
    }

    #[test]
    fn test_mixed_plays_rejected() {
        let mut points = stream(&[0.0, 100.0, 200.0]);
        points[2].mod_mask = 0;

        match extract_features(&points).unwrap_err() {
            FeatureError::MixedPlays { position, found, .. } => {
                assert_eq!(position, 2);
                assert_eq!(found.mod_mask, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_gap_in_index_rejected() {
        let mut points = stream(&[0.0, 100.0, 200.0]);
        points[2].index = 5;
        assert!(matches!(
            extract_features(&points),
            Err(FeatureError::InvalidSequence { position: 2, .. })
        ));
    }

    #[test]
    fn test_time_going_back_rejected() {
        let points = stream(&[0.0, 500.0, 250.0]);
        assert!(matches!(
            extract_features(&points),
            Err(FeatureError::InvalidSequence { position: 2, .. })
        ));
    }

    #[test]
    fn test_non_finite_map_values_rejected() {
        let points = stream(&[0.0, 100.0, f64::INFINITY]);
        assert!(matches!(
            extract_features(&points),
            Err(FeatureError::InvalidSequence { position: 2, .. })
        ));

        let mut points = stream(&[0.0, 100.0, 200.0]);
        points[1].map_x = f64::NAN;
        assert!(matches!(
            extract_features(&points),
            Err(FeatureError::InvalidSequence { position: 1, .. })
        ));

        let mut points = stream(&[0.0, 100.0, 200.0]);
        points[0].map_y = f64::NEG_INFINITY;
        match extract_features(&points).unwrap_err() {
            FeatureError::InvalidSequence { position, reason } => {
                assert_eq!(position, 0);
                assert!(reason.contains("mapY"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sequence_may_start_past_zero() {
        let points: Vec<Scorepoint> = stream(&[0.0, 100.0])
            .into_iter()
            .map(|mut p| {
                p.index += 10;
                p
            })
            .collect();
        let table = extract_features(&points).unwrap();
        assert_eq!(table.records()[0].index, 10);
        assert_eq!(table.records()[1].index, 11);
    }
}
