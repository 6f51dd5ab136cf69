//! Standard score of a named metric over a dataset.

use chrono::NaiveDate;
use serde::Serialize;
use tidemark_core::{DerivedPoint, TimeSeries};

use crate::window::{mean, population_std_dev};

/// Z-score of a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZScorePoint {
    /// Observation date.
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    /// Source value of the scored field.
    pub value: f64,
    /// `(value - mean) / std`.
    pub zscore: f64,
}

derived_point!(ZScorePoint {
    value => "value",
    zscore => "zscore",
});

/// Scores one field of a dataset against the population statistics of that field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZScore {
    key: String,
}

impl ZScore {
    /// Score the field named `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Name of the scored field.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Score every point whose field is present and finite.
    ///
    /// Returns nothing when the field has zero variance.
    pub fn compute(&self, dataset: &[DerivedPoint]) -> Vec<ZScorePoint> {
        let observations: Vec<(NaiveDate, f64)> = dataset
            .iter()
            .filter_map(|point| {
                point
                    .get(&self.key)
                    .filter(|v| v.is_finite())
                    .map(|v| (point.timestamp, v))
            })
            .collect();

        let values: Vec<f64> = observations.iter().map(|(_, v)| *v).collect();
        let (Some(mean), Some(std)) = (mean(&values), population_std_dev(&values)) else {
            return Vec::new();
        };
        if std == 0.0 {
            return Vec::new();
        }

        observations
            .into_iter()
            .map(|(timestamp, value)| ZScorePoint {
                timestamp,
                value,
                zscore: (value - mean) / std,
            })
            .collect()
    }

    /// Score the `value` field of a plain series.
    pub fn compute_series(series: &TimeSeries) -> Vec<ZScorePoint> {
        ZScore::new("value").compute(&DerivedPoint::from_series(series))
    }
}
