//! Key predicates for store queries.

use crate::scorepoint::PlayKey;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Inclusive bounds on one key component. Both ends open means "any".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T> Default for KeyRange<T> {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
        }
    }
}

impl<T: Clone> KeyRange<T> {
    /// Match every value.
    pub fn any() -> Self {
        Self::default()
    }

    /// Match a single value.
    pub fn exact(value: T) -> Self {
        Self {
            min: Some(value.clone()),
            max: Some(value),
        }
    }

    /// Match `min..=max`.
    pub fn between(min: T, max: T) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Match values `>= min`.
    pub fn at_least(min: T) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Match values `<= max`.
    pub fn at_most(max: T) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Whether this range leaves the component unconstrained.
    pub fn is_any(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Predicate over the composite key; components combine with AND.
///
/// The default filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayFilter {
    pub map_hash: KeyRange<String>,
    pub timestamp: KeyRange<i64>,
    pub mod_mask: KeyRange<u32>,
    pub index: KeyRange<u32>,
}

impl PlayFilter {
    /// A filter matching the whole store.
    pub fn all() -> Self {
        Self::default()
    }

    /// Every record of one play.
    pub fn for_play(key: &PlayKey) -> Self {
        Self {
            map_hash: KeyRange::exact(key.map_hash.clone()),
            timestamp: KeyRange::exact(key.timestamp),
            mod_mask: KeyRange::exact(key.mod_mask),
            index: KeyRange::any(),
        }
    }

    /// Restrict the map hash.
    pub fn map_hash(mut self, range: KeyRange<String>) -> Self {
        self.map_hash = range;
        self
    }

    /// Restrict the play timestamp.
    pub fn timestamp(mut self, range: KeyRange<i64>) -> Self {
        self.timestamp = range;
        self
    }

    /// Restrict the mod mask.
    pub fn mod_mask(mut self, range: KeyRange<u32>) -> Self {
        self.mod_mask = range;
        self
    }

    /// Restrict the scorepoint index.
    pub fn index(mut self, range: KeyRange<u32>) -> Self {
        self.index = range;
        self
    }

    /// Whether no component is constrained.
    pub fn is_all(&self) -> bool {
        self.map_hash.is_any()
            && self.timestamp.is_any()
            && self.mod_mask.is_any()
            && self.index.is_any()
    }

    /// `WHERE` clause (empty when matching everything) and its bound values.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        push_range(&mut clauses, &mut values, "map_hash", &self.map_hash, |v| {
            Value::Text(v.clone())
        });
        push_range(&mut clauses, &mut values, "timestamp", &self.timestamp, |v| {
            Value::Integer(*v)
        });
        push_range(&mut clauses, &mut values, "mod_mask", &self.mod_mask, |v| {
            Value::Integer(i64::from(*v))
        });
        push_range(&mut clauses, &mut values, "idx", &self.index, |v| {
            Value::Integer(i64::from(*v))
        });

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

fn push_range<T: PartialEq>(
    clauses: &mut Vec<String>,
    values: &mut Vec<Value>,
    column: &str,
    range: &KeyRange<T>,
    to_value: impl Fn(&T) -> Value,
) {
    match (&range.min, &range.max) {
        (Some(min), Some(max)) if min == max => {
            values.push(to_value(min));
            clauses.push(format!("{column} = ?{}", values.len()));
        }
        (min, max) => {
            if let Some(min) = min {
                values.push(to_value(min));
                clauses.push(format!("{column} >= ?{}", values.len()));
            }
            if let Some(max) = max {
                values.push(to_value(max));
                clauses.push(format!("{column} <= ?{}", values.len()));
            }
        }
    }
}
