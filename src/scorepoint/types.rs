//! Scorepoint records produced by the external replay-to-note alignment.
//!
//! One scorepoint describes how the player interacted with a single map
//! object event: the note's nominal time and position, and what the player
//! actually did.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a scorepoint in the note timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Initiating press of a note
    Press,
    /// Aim target along a held object
    Hold,
    /// End of a held object
    Release,
}

/// Judged outcome of a scorepoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    HitPress,
    HitRelease,
    HitAim,
    Miss,
    /// No input was associated with this event
    Empty,
}

/// Identity of one recorded play.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayKey {
    pub map_hash: String,
    pub timestamp: i64,
    pub mod_mask: u32,
}

impl PlayKey {
    /// Create a play key.
    pub fn new(map_hash: impl Into<String>, timestamp: i64, mod_mask: u32) -> Self {
        Self {
            map_hash: map_hash.into(),
            timestamp,
            mod_mask,
        }
    }
}

impl fmt::Display for PlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}+{}", self.map_hash, self.timestamp, self.mod_mask)
    }
}

/// A single aligned interaction between the player and a map object.
///
/// `hit_*` fields are `None` when the event has no associated input
/// (`ResultType::Empty`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scorepoint {
    pub map_hash: String,
    pub timestamp: i64,
    pub mod_mask: u32,
    /// Position within the play, 0-based and contiguous
    pub index: u32,
    pub action_type: ActionType,
    pub result_type: ResultType,
    /// Nominal note time in milliseconds
    pub map_time: f64,
    pub map_x: f64,
    pub map_y: f64,
    #[serde(default)]
    pub hit_time: Option<f64>,
    #[serde(default)]
    pub hit_x: Option<f64>,
    #[serde(default)]
    pub hit_y: Option<f64>,
    /// Approach window of the play in milliseconds
    pub approach_rate_ms: f64,
    /// Circle radius of the play in osu!pixels
    pub circle_size_px: f64,
}

impl Scorepoint {
    /// Create a scorepoint with no recorded input and zeroed play constants.
    pub fn new(
        key: &PlayKey,
        index: u32,
        action_type: ActionType,
        result_type: ResultType,
        map_time: f64,
        map_x: f64,
        map_y: f64,
    ) -> Self {
        Self {
            map_hash: key.map_hash.clone(),
            timestamp: key.timestamp,
            mod_mask: key.mod_mask,
            index,
            action_type,
            result_type,
            map_time,
            map_x,
            map_y,
            hit_time: None,
            hit_x: None,
            hit_y: None,
            approach_rate_ms: 0.0,
            circle_size_px: 0.0,
        }
    }

    /// Attach the recorded input for this event.
    pub fn with_hit(mut self, hit_time: f64, hit_x: f64, hit_y: f64) -> Self {
        self.hit_time = Some(hit_time);
        self.hit_x = Some(hit_x);
        self.hit_y = Some(hit_y);
        self
    }

    /// Set the per-play approach window and circle size.
    pub fn with_play_constants(mut self, approach_rate_ms: f64, circle_size_px: f64) -> Self {
        self.approach_rate_ms = approach_rate_ms;
        self.circle_size_px = circle_size_px;
        self
    }

    /// Key of the play this scorepoint belongs to.
    pub fn play_key(&self) -> PlayKey {
        PlayKey::new(self.map_hash.clone(), self.timestamp, self.mod_mask)
    }

    /// Whether this scorepoint is part of the play `key`.
    pub fn belongs_to(&self, key: &PlayKey) -> bool {
        self.map_hash == key.map_hash
            && self.timestamp == key.timestamp
            && self.mod_mask == key.mod_mask
    }

    /// Initiating press of a note that received a judgment.
    pub fn is_note_start(&self) -> bool {
        self.action_type == ActionType::Press && self.result_type != ResultType::Empty
    }

    /// Press or hold point the cursor has to reach.
    pub fn is_aim_target(&self) -> bool {
        matches!(self.action_type, ActionType::Press | ActionType::Hold)
    }
}

/// All scorepoints of one play, ordered by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    pub key: PlayKey,
    pub scorepoints: Vec<Scorepoint>,
}

impl Play {
    pub fn len(&self) -> usize {
        self.scorepoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scorepoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        let json = serde_json::to_string(&ResultType::HitAim).unwrap();
        assert_eq!(json, "\"HIT_AIM\"");

        let action: ActionType = serde_json::from_str("\"RELEASE\"").unwrap();
        assert_eq!(action, ActionType::Release);
    }

    #[test]
    fn test_scorepoint_camel_case_and_missing_hit() {
        let json = r#"{
            "mapHash": "abc", "timestamp": 1700000000, "modMask": 64, "index": 3,
            "actionType": "PRESS", "resultType": "EMPTY",
            "mapTime": 1200.0, "mapX": 256.0, "mapY": 192.0,
            "hitTime": null,
            "approachRateMs": 450.0, "circleSizePx": 36.5
        }"#;
        let point: Scorepoint = serde_json::from_str(json).unwrap();

        assert_eq!(point.play_key(), PlayKey::new("abc", 1_700_000_000, 64));
        assert_eq!(point.index, 3);
        assert_eq!(point.hit_time, None);
        assert_eq!(point.hit_x, None);
        assert!(!point.is_note_start());
        assert!(point.is_aim_target());
    }

    #[test]
    fn test_subsequence_membership() {
        let key = PlayKey::new("m", 1, 0);
        let press = Scorepoint::new(&key, 0, ActionType::Press, ResultType::HitPress, 0.0, 0.0, 0.0);
        let hold = Scorepoint::new(&key, 1, ActionType::Hold, ResultType::HitAim, 10.0, 0.0, 0.0);
        let release =
            Scorepoint::new(&key, 2, ActionType::Release, ResultType::HitRelease, 20.0, 0.0, 0.0);

        assert!(press.is_note_start() && press.is_aim_target());
        assert!(!hold.is_note_start() && hold.is_aim_target());
        assert!(!release.is_note_start() && !release.is_aim_target());
    }

    #[test]
    fn test_play_key_display() {
        let key = PlayKey::new("deadbeef", 42, 8);
        assert_eq!(key.to_string(), "deadbeef@42+8");
    }
}
