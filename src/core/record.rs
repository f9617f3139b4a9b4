//! Feature records and tables.
//!
//! Every feature is an `Option<f64>`: `None` means "no data" and is kept
//! distinct from a measured zero all the way into the store.

use crate::scorepoint::PlayKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One feature value per scorepoint, aligned with the input sequence.
pub type Column = Vec<Option<f64>>;

/// The derived feature columns, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    PressInterval,
    PressInterval3,
    TimeSinceTempoIncrease,
    TimeSinceTempoDecrease,
    RhythmRatio,
    HoldDuration,
    Distance,
    Angle,
    LinearVelocity,
    AngularVelocity,
    VisibleCount,
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; 11] = [
        FeatureColumn::PressInterval,
        FeatureColumn::PressInterval3,
        FeatureColumn::TimeSinceTempoIncrease,
        FeatureColumn::TimeSinceTempoDecrease,
        FeatureColumn::RhythmRatio,
        FeatureColumn::HoldDuration,
        FeatureColumn::Distance,
        FeatureColumn::Angle,
        FeatureColumn::LinearVelocity,
        FeatureColumn::AngularVelocity,
        FeatureColumn::VisibleCount,
    ];

    /// Name used in exported records.
    pub fn name(self) -> &'static str {
        match self {
            FeatureColumn::PressInterval => "pressInterval",
            FeatureColumn::PressInterval3 => "pressInterval3",
            FeatureColumn::TimeSinceTempoIncrease => "timeSinceTempoIncrease",
            FeatureColumn::TimeSinceTempoDecrease => "timeSinceTempoDecrease",
            FeatureColumn::RhythmRatio => "rhythmRatio",
            FeatureColumn::HoldDuration => "holdDuration",
            FeatureColumn::Distance => "distance",
            FeatureColumn::Angle => "angle",
            FeatureColumn::LinearVelocity => "linearVelocity",
            FeatureColumn::AngularVelocity => "angularVelocity",
            FeatureColumn::VisibleCount => "visibleCount",
        }
    }

    /// Column name in the feature store.
    pub fn sql_name(self) -> &'static str {
        match self {
            FeatureColumn::PressInterval => "press_interval",
            FeatureColumn::PressInterval3 => "press_interval3",
            FeatureColumn::TimeSinceTempoIncrease => "time_since_tempo_increase",
            FeatureColumn::TimeSinceTempoDecrease => "time_since_tempo_decrease",
            FeatureColumn::RhythmRatio => "rhythm_ratio",
            FeatureColumn::HoldDuration => "hold_duration",
            FeatureColumn::Distance => "distance",
            FeatureColumn::Angle => "angle",
            FeatureColumn::LinearVelocity => "linear_velocity",
            FeatureColumn::AngularVelocity => "angular_velocity",
            FeatureColumn::VisibleCount => "visible_count",
        }
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived features of one scorepoint, keyed by
/// `(map_hash, timestamp, mod_mask, index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    pub map_hash: String,
    pub timestamp: i64,
    pub mod_mask: u32,
    pub index: u32,
    pub press_interval: Option<f64>,
    pub press_interval3: Option<f64>,
    pub time_since_tempo_increase: Option<f64>,
    pub time_since_tempo_decrease: Option<f64>,
    pub rhythm_ratio: Option<f64>,
    pub hold_duration: Option<f64>,
    pub distance: Option<f64>,
    pub angle: Option<f64>,
    pub linear_velocity: Option<f64>,
    pub angular_velocity: Option<f64>,
    pub visible_count: Option<f64>,
}

impl FeatureRecord {
    /// A record with every feature missing.
    pub fn new(key: &PlayKey, index: u32) -> Self {
        Self {
            map_hash: key.map_hash.clone(),
            timestamp: key.timestamp,
            mod_mask: key.mod_mask,
            index,
            press_interval: None,
            press_interval3: None,
            time_since_tempo_increase: None,
            time_since_tempo_decrease: None,
            rhythm_ratio: None,
            hold_duration: None,
            distance: None,
            angle: None,
            linear_velocity: None,
            angular_velocity: None,
            visible_count: None,
        }
    }

    /// Key of the play this record belongs to.
    pub fn play_key(&self) -> PlayKey {
        PlayKey::new(self.map_hash.clone(), self.timestamp, self.mod_mask)
    }

    /// Value of one feature column.
    pub fn get(&self, column: FeatureColumn) -> Option<f64> {
        match column {
            FeatureColumn::PressInterval => self.press_interval,
            FeatureColumn::PressInterval3 => self.press_interval3,
            FeatureColumn::TimeSinceTempoIncrease => self.time_since_tempo_increase,
            FeatureColumn::TimeSinceTempoDecrease => self.time_since_tempo_decrease,
            FeatureColumn::RhythmRatio => self.rhythm_ratio,
            FeatureColumn::HoldDuration => self.hold_duration,
            FeatureColumn::Distance => self.distance,
            FeatureColumn::Angle => self.angle,
            FeatureColumn::LinearVelocity => self.linear_velocity,
            FeatureColumn::AngularVelocity => self.angular_velocity,
            FeatureColumn::VisibleCount => self.visible_count,
        }
    }

    /// Set one feature column.
    pub fn set(&mut self, column: FeatureColumn, value: Option<f64>) {
        let slot = match column {
            FeatureColumn::PressInterval => &mut self.press_interval,
            FeatureColumn::PressInterval3 => &mut self.press_interval3,
            FeatureColumn::TimeSinceTempoIncrease => &mut self.time_since_tempo_increase,
            FeatureColumn::TimeSinceTempoDecrease => &mut self.time_since_tempo_decrease,
            FeatureColumn::RhythmRatio => &mut self.rhythm_ratio,
            FeatureColumn::HoldDuration => &mut self.hold_duration,
            FeatureColumn::Distance => &mut self.distance,
            FeatureColumn::Angle => &mut self.angle,
            FeatureColumn::LinearVelocity => &mut self.linear_velocity,
            FeatureColumn::AngularVelocity => &mut self.angular_velocity,
            FeatureColumn::VisibleCount => &mut self.visible_count,
        };
        *slot = value;
    }
}

/// Ordered feature records of one or more plays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureTable {
    records: Vec<FeatureRecord>,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap records as a table, keeping their order.
    pub fn from_records(records: Vec<FeatureRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<FeatureRecord> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one feature across all records.
    pub fn column(&self, column: FeatureColumn) -> Column {
        self.records.iter().map(|r| r.get(column)).collect()
    }

    /// Distinct plays present in the table, in order of first appearance.
    pub fn play_keys(&self) -> Vec<PlayKey> {
        let mut keys: Vec<PlayKey> = Vec::new();
        for record in &self.records {
            let key = record.play_key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

impl<'a> IntoIterator for &'a FeatureTable {
    type Item = &'a FeatureRecord;
    type IntoIter = std::slice::Iter<'a, FeatureRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_cover_every_column() {
        let mut record = FeatureRecord::new(&PlayKey::new("m", 1, 0), 0);
        for (i, column) in FeatureColumn::ALL.iter().enumerate() {
            assert_eq!(record.get(*column), None);
            record.set(*column, Some(i as f64));
        }
        for (i, column) in FeatureColumn::ALL.iter().enumerate() {
            assert_eq!(record.get(*column), Some(i as f64));
        }
    }

    #[test]
    fn test_missing_serializes_as_null() {
        let mut record = FeatureRecord::new(&PlayKey::new("m", 1, 0), 2);
        record.distance = Some(0.0);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["pressInterval"], serde_json::Value::Null);
        assert_eq!(json["distance"], serde_json::json!(0.0));
        assert_eq!(json["index"], serde_json::json!(2));
    }

    #[test]
    fn test_play_keys_deduplicates() {
        let a = PlayKey::new("a", 1, 0);
        let b = PlayKey::new("b", 1, 0);
        let table = FeatureTable::from_records(vec![
            FeatureRecord::new(&a, 0),
            FeatureRecord::new(&a, 1),
            FeatureRecord::new(&b, 0),
        ]);
        assert_eq!(table.play_keys(), vec![a, b]);
    }
}
