use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::series::{TimePoint, TimeSeries};

/// Sequence of derived observations.
pub type DerivedSeries = Vec<DerivedPoint>;

/// Observation carrying any number of named numeric fields.
///
/// Serialized flat, e.g. `{"time": "2024-01-01", "value": 1.0, "risk": 0.4}`,
/// which is the shape chart layers consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedPoint {
    #[serde(rename = "time")]
    pub timestamp: NaiveDate,
    #[serde(flatten)]
    pub fields: BTreeMap<String, f64>,
}

impl DerivedPoint {
    pub fn new(timestamp: NaiveDate) -> Self {
        Self {
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    /// Convert every point of a series into a derived point with a `value` field.
    pub fn from_series(series: &TimeSeries) -> DerivedSeries {
        series.iter().map(DerivedPoint::from).collect()
    }
}

impl From<&TimePoint> for DerivedPoint {
    fn from(point: &TimePoint) -> Self {
        DerivedPoint::new(point.timestamp).with("value", point.value)
    }
}

impl From<TimePoint> for DerivedPoint {
    fn from(point: TimePoint) -> Self {
        DerivedPoint::from(&point)
    }
}
