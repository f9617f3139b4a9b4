//! Descriptive statistics over feature columns.

use crate::core::record::{FeatureColumn, FeatureTable};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution, Max, Median, Min};

/// Summary of one feature column. Statistics cover defined values only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    /// Number of defined values
    pub count: usize,
    /// Number of missing values
    pub missing: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub median: Option<f64>,
    pub max: Option<f64>,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Summarize a single column.
pub fn summarize_column(table: &FeatureTable, column: FeatureColumn) -> ColumnSummary {
    let values = table.column(column);
    let defined: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    let count = defined.len();
    let missing = values.len() - count;

    if defined.is_empty() {
        return ColumnSummary {
            column: column.name().to_string(),
            count,
            missing,
            mean: None,
            std_dev: None,
            min: None,
            median: None,
            max: None,
        };
    }

    let data = Data::new(defined);
    ColumnSummary {
        column: column.name().to_string(),
        count,
        missing,
        mean: data.mean().and_then(finite),
        std_dev: data.std_dev().and_then(finite),
        min: finite(data.min()),
        median: finite(data.median()),
        max: finite(data.max()),
    }
}

/// Summarize every feature column in storage order.
pub fn summarize(table: &FeatureTable) -> Vec<ColumnSummary> {
    FeatureColumn::ALL
        .iter()
        .map(|&column| summarize_column(table, column))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::FeatureRecord;
    use crate::scorepoint::PlayKey;

    fn table(distances: &[Option<f64>]) -> FeatureTable {
        let key = PlayKey::new("m", 1, 0);
        let records = distances
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let mut record = FeatureRecord::new(&key, i as u32);
                record.distance = d;
                record
            })
            .collect();
        FeatureTable::from_records(records)
    }

    #[test]
    fn test_summary_ignores_missing() {
        let summary = summarize_column(
            &table(&[Some(0.0), None, Some(100.0), Some(50.0), None]),
            FeatureColumn::Distance,
        );

        assert_eq!(summary.column, "distance");
        assert_eq!(summary.count, 3);
        assert_eq!(summary.missing, 2);
        assert_eq!(summary.min, Some(0.0));
        assert_eq!(summary.max, Some(100.0));
        assert_eq!(summary.median, Some(50.0));
        assert!((summary.mean.unwrap() - 50.0).abs() < 1e-9);
        assert!((summary.std_dev.unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_missing_column() {
        let summary = summarize_column(&table(&[None, None]), FeatureColumn::Angle);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.missing, 2);
        assert_eq!(summary.mean, None);
        assert_eq!(summary.median, None);
    }

    #[test]
    fn test_summarize_covers_every_column() {
        let summaries = summarize(&table(&[Some(1.0)]));
        assert_eq!(summaries.len(), FeatureColumn::ALL.len());
        assert_eq!(summaries[0].column, "pressInterval");
    }
}
